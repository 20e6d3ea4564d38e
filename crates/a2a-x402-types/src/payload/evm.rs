//! EIP-3009 authorization payloads for the `exact` scheme on EVM networks.
//!
//! An exact EVM payment is a signed `transferWithAuthorization` permission:
//! the buyer authorizes a relayer to move a specific amount of tokens within
//! a time window, identified by a unique nonce. The signature is an EIP-712
//! typed-data signature over the [`TransferWithAuthorization`] struct.

use alloy_primitives::U256;
use alloy_sol_types::sol;
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::EvmAddress;
use crate::money::TokenAmount;
use crate::timestamp::UnixTimestamp;

/// Decode a `0x`-prefixed hex string into exactly `N` bytes.
///
/// `what` names the field in error messages; the length check runs before
/// decoding so a truncated value reports its size rather than a hex error.
fn decode_fixed_hex<const N: usize>(input: &str, what: &str) -> Result<[u8; N], String> {
    let Some(stripped) = input.strip_prefix("0x") else {
        return Err(format!("{what} must be a 0x-prefixed hex string"));
    };
    if stripped.len() != 2 * N {
        return Err(format!(
            "{} must encode exactly {} bytes, got {} hex characters",
            what,
            N,
            stripped.len()
        ));
    }
    let mut bytes = [0u8; N];
    hex::decode_to_slice(stripped, &mut bytes)
        .map_err(|_| format!("{what} contains non-hex characters"))?;
    Ok(bytes)
}

fn encode_fixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// A 65-byte ECDSA signature over EIP-712 typed data, carried on the wire as
/// a `0x`-prefixed 130-character hex string.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EvmSignature(pub [u8; 65]);

impl<'de> Deserialize<'de> for EvmSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode_fixed_hex::<65>(&s, "EIP-712 signature")
            .map(EvmSignature)
            .map_err(Error::custom)
    }
}

impl Serialize for EvmSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&encode_fixed_hex(&self.0))
    }
}

impl From<[u8; 65]> for EvmSignature {
    fn from(bytes: [u8; 65]) -> Self {
        EvmSignature(bytes)
    }
}

/// The 32-byte random nonce identifying one `transferWithAuthorization`,
/// carried as a `0x`-prefixed 64-character hex string.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HexEncodedNonce(pub [u8; 32]);

impl<'de> Deserialize<'de> for HexEncodedNonce {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode_fixed_hex::<32>(&s, "transfer nonce")
            .map(HexEncodedNonce)
            .map_err(Error::custom)
    }
}

impl Serialize for HexEncodedNonce {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&encode_fixed_hex(&self.0))
    }
}

/// EIP-3009 authorization contents: who can transfer how much and when.
///
/// All numeric fields travel as decimal strings; the nonce is 0x-prefixed hex.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eip3009Authorization {
    pub from: EvmAddress,
    pub to: EvmAddress,
    pub value: TokenAmount,
    pub valid_after: UnixTimestamp,
    pub valid_before: UnixTimestamp,
    pub nonce: HexEncodedNonce,
}

/// Full payload authorizing an EIP-3009 transfer:
/// the EIP-712 signature plus the signed authorization struct.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactEvmPayload {
    pub signature: EvmSignature,
    pub authorization: Eip3009Authorization,
}

sol!(
    /// Solidity-compatible struct definition for EIP-3009 `transferWithAuthorization`.
    ///
    /// Used to compute the EIP-712 signing hash for an [`Eip3009Authorization`]:
    /// the authorization to transfer `value` tokens from `from` to `to`, valid
    /// only between `validAfter` and `validBefore`, identified by `nonce`.
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

impl From<&Eip3009Authorization> for TransferWithAuthorization {
    fn from(authorization: &Eip3009Authorization) -> Self {
        TransferWithAuthorization {
            from: authorization.from.into(),
            to: authorization.to.into(),
            value: U256::from(authorization.value.as_u64()),
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: alloy_primitives::FixedBytes(authorization.nonce.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    fn authorization() -> Eip3009Authorization {
        Eip3009Authorization {
            from: address!("0x1111111111111111111111111111111111111111").into(),
            to: address!("0x2222222222222222222222222222222222222222").into(),
            value: TokenAmount(1_500_000),
            valid_after: UnixTimestamp::from_secs(1_700_000_000),
            valid_before: UnixTimestamp::from_secs(1_700_000_600),
            nonce: HexEncodedNonce([7u8; 32]),
        }
    }

    #[test]
    fn authorization_uses_camel_case_decimal_strings() {
        let value = serde_json::to_value(authorization()).unwrap();
        assert_eq!(value["value"], "1500000");
        assert_eq!(value["validAfter"], "1700000000");
        assert_eq!(value["validBefore"], "1700000600");
        assert_eq!(value["nonce"], format!("0x{}", "07".repeat(32)));
    }

    #[test]
    fn signature_round_trips_and_validates() {
        let sig = EvmSignature([0xab; 65]);
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "ab".repeat(65)));
        let back: EvmSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sig);

        // Too short, unprefixed, and non-hex are each rejected.
        assert!(serde_json::from_str::<EvmSignature>("\"0x1234\"").is_err());
        let unprefixed = format!("\"{}\"", "ab".repeat(65));
        assert!(serde_json::from_str::<EvmSignature>(&unprefixed).is_err());
        let non_hex = format!("\"0x{}\"", "zz".repeat(65));
        assert!(serde_json::from_str::<EvmSignature>(&non_hex).is_err());
    }

    #[test]
    fn nonce_rejects_wrong_length() {
        assert!(serde_json::from_str::<HexEncodedNonce>("\"0xdeadbeef\"").is_err());
        let ok = format!("\"0x{}\"", "00ff".repeat(16));
        assert!(serde_json::from_str::<HexEncodedNonce>(&ok).is_ok());
    }

    #[test]
    fn transfer_struct_mirrors_authorization() {
        let auth = authorization();
        let transfer = TransferWithAuthorization::from(&auth);
        assert_eq!(transfer.value, U256::from(1_500_000u64));
        assert_eq!(transfer.validAfter, U256::from(1_700_000_000u64));
        assert_eq!(transfer.nonce.0, [7u8; 32]);
    }
}
