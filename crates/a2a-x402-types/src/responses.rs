//! Facilitator verification and settlement responses.

use serde::{Deserialize, Serialize};

use crate::network::Network;

/// Returned after verifying a payment payload against payment requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl VerifyResponse {
    /// A successful verification naming the payer.
    pub fn valid<S: Into<String>>(payer: S) -> Self {
        Self {
            is_valid: true,
            invalid_reason: None,
            payer: Some(payer.into()),
        }
    }

    /// A failed verification with the reason the payload was rejected.
    pub fn invalid<S: Into<String>>(reason: S) -> Self {
        Self {
            is_valid: false,
            invalid_reason: Some(reason.into()),
            payer: None,
        }
    }
}

/// Returned after attempting to settle a payment.
///
/// One settle response is appended to the task's receipt trail per
/// settlement attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
    pub network: Network,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
}

impl SettleResponse {
    /// A failed settlement carrying a human-readable reason.
    pub fn failure<S: Into<String>>(network: Network, reason: S) -> Self {
        Self {
            success: false,
            error_reason: Some(reason.into()),
            transaction: None,
            network,
            payer: None,
        }
    }
}
