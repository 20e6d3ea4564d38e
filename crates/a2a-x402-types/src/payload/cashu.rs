//! Cashu ecash payloads for the `cashu-token` scheme.
//!
//! Payment evidence is a bundle of signed tokens from named mints. Each token
//! carries the mint URL and its blind-signed proofs; `encoded` holds the same
//! tokens in their serialized `cashuB...` form, aligned by index.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single Cashu proof (NUT-00).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashuProof {
    /// Denomination of the proof in the mint's unit.
    pub amount: u64,
    /// Keyset id the proof was signed under.
    pub id: String,
    /// The proof secret.
    pub secret: String,
    /// The mint's signature point.
    #[serde(rename = "C")]
    pub c: String,
}

/// A bundle of proofs issued by one mint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashuToken {
    /// URL of the issuing mint.
    pub mint: String,
    pub proofs: Vec<CashuProof>,
}

/// Payload carried by the `cashu-token` scheme.
///
/// `tokens` and `encoded` describe the same ecash twice: structured and in
/// serialized token form. They must have the same length; helpers reject
/// bundles where they do not line up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashuPaymentPayload {
    pub tokens: Vec<CashuToken>,
    pub encoded: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// NUT-10 locking conditions, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locks: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<u64>,
}

impl CashuPaymentPayload {
    /// Mints referenced by the structured tokens, in order of appearance.
    pub fn mints(&self) -> Vec<&str> {
        self.tokens.iter().map(|token| token.mint.as_str()).collect()
    }
}
