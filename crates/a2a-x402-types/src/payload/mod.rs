//! Signed payment payloads.
//!
//! A [`PaymentPayload`] is the envelope a client produces after authorizing a
//! payment. The envelope names the protocol version, scheme, and network; the
//! inner payload shape is decided by the `(scheme, network)` pair.

use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;

use crate::network::{Network, NetworkFamily};
use crate::scheme::Scheme;

pub mod cashu;
pub mod evm;
pub mod spark;

pub use cashu::{CashuPaymentPayload, CashuProof, CashuToken};
pub use evm::{
    Eip3009Authorization, EvmSignature, ExactEvmPayload, HexEncodedNonce,
    TransferWithAuthorization,
};
pub use spark::{ExactSparkPayload, SparkPaymentType};

/// Represents the protocol version. Currently only version 1 is supported;
/// engines reject anything else at the deserialization boundary.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct X402Version;

impl X402Version {
    pub const VALUE: u8 = 1;
}

#[derive(Debug, thiserror::Error)]
#[error("Unsupported x402Version: {0}")]
pub struct X402VersionError(pub u8);

impl TryFrom<u8> for X402Version {
    type Error = X402VersionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value == Self::VALUE {
            Ok(X402Version)
        } else {
            Err(X402VersionError(value))
        }
    }
}

impl From<X402Version> for u8 {
    fn from(_: X402Version) -> Self {
        X402Version::VALUE
    }
}

impl Serialize for X402Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for X402Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let num = u8::deserialize(deserializer)?;
        X402Version::try_from(num).map_err(Error::custom)
    }
}

impl Display for X402Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::VALUE)
    }
}

/// Scheme-specific inner payload, one variant per supported
/// `(scheme, network)` combination.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ExactPaymentPayload {
    Evm(ExactEvmPayload),
    Spark(ExactSparkPayload),
    Cashu(CashuPaymentPayload),
}

impl ExactPaymentPayload {
    pub fn as_evm(&self) -> Option<&ExactEvmPayload> {
        match self {
            ExactPaymentPayload::Evm(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_spark(&self) -> Option<&ExactSparkPayload> {
        match self {
            ExactPaymentPayload::Spark(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn as_cashu(&self) -> Option<&CashuPaymentPayload> {
        match self {
            ExactPaymentPayload::Cashu(payload) => Some(payload),
            _ => None,
        }
    }
}

/// A signed payment authorization from the buyer.
///
/// The inner `payload` is dispatched on `(scheme, network)` during
/// deserialization: `exact` on an EVM network carries an EIP-3009
/// authorization, `exact` on `spark` a transfer reference, and `cashu-token`
/// an ecash bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentPayload {
    pub x402_version: X402Version,
    pub scheme: Scheme,
    pub network: Network,
    pub payload: ExactPaymentPayload,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentPayloadWireRef<'a> {
    x402_version: X402Version,
    scheme: Scheme,
    network: Network,
    payload: &'a ExactPaymentPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentPayloadWire {
    x402_version: X402Version,
    scheme: Scheme,
    network: Network,
    payload: serde_json::Value,
}

impl Serialize for PaymentPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PaymentPayloadWireRef {
            x402_version: self.x402_version,
            scheme: self.scheme,
            network: self.network,
            payload: &self.payload,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PaymentPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = PaymentPayloadWire::deserialize(deserializer)?;
        let payload = match (wire.scheme, wire.network.family()) {
            (Scheme::Exact, NetworkFamily::Evm) => serde_json::from_value(wire.payload)
                .map(ExactPaymentPayload::Evm)
                .map_err(Error::custom)?,
            (Scheme::Exact, NetworkFamily::Spark) => serde_json::from_value(wire.payload)
                .map(ExactPaymentPayload::Spark)
                .map_err(Error::custom)?,
            (Scheme::CashuToken, _) => serde_json::from_value(wire.payload)
                .map(ExactPaymentPayload::Cashu)
                .map_err(Error::custom)?,
            (scheme, _) => {
                return Err(Error::custom(format!(
                    "Unsupported payment payload for scheme {scheme} on network {}",
                    wire.network
                )));
            }
        };
        Ok(PaymentPayload {
            x402_version: wire.x402_version,
            scheme: wire.scheme,
            network: wire.network,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::TokenAmount;
    use crate::timestamp::UnixTimestamp;
    use alloy_primitives::address;
    use serde_json::json;

    fn evm_payload() -> PaymentPayload {
        PaymentPayload {
            x402_version: X402Version,
            scheme: Scheme::Exact,
            network: Network::BaseSepolia,
            payload: ExactPaymentPayload::Evm(ExactEvmPayload {
                signature: EvmSignature([0x11; 65]),
                authorization: Eip3009Authorization {
                    from: address!("0x1111111111111111111111111111111111111111").into(),
                    to: address!("0x2222222222222222222222222222222222222222").into(),
                    value: TokenAmount(1_000_000),
                    valid_after: UnixTimestamp::from_secs(1_700_000_000),
                    valid_before: UnixTimestamp::from_secs(1_700_000_600),
                    nonce: HexEncodedNonce([0x33; 32]),
                },
            }),
        }
    }

    #[test]
    fn evm_wire_format_matches_protocol() {
        let value = serde_json::to_value(evm_payload()).unwrap();
        assert_eq!(value["x402Version"], 1);
        assert_eq!(value["scheme"], "exact");
        assert_eq!(value["network"], "base-sepolia");
        assert_eq!(value["payload"]["authorization"]["value"], "1000000");
        assert_eq!(
            value["payload"]["authorization"]["validAfter"],
            "1700000000"
        );
    }

    #[test]
    fn evm_round_trips() {
        let original = evm_payload();
        let json = serde_json::to_string(&original).unwrap();
        let back: PaymentPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn spark_payload_dispatches_on_network() {
        let wire = json!({
            "x402Version": 1,
            "scheme": "exact",
            "network": "spark",
            "payload": { "paymentType": "LIGHTNING", "preimage": "00ff" }
        });
        let payload: PaymentPayload = serde_json::from_value(wire).unwrap();
        let spark = payload.payload.as_spark().unwrap();
        assert_eq!(spark.payment_type(), SparkPaymentType::Lightning);
        assert_eq!(spark.preimage(), Some("00ff"));
    }

    #[test]
    fn cashu_payload_dispatches_on_scheme() {
        let wire = json!({
            "x402Version": 1,
            "scheme": "cashu-token",
            "network": "bitcoin-testnet",
            "payload": {
                "tokens": [{ "mint": "https://mint.example/", "proofs": [] }],
                "encoded": ["cashuBexample"]
            }
        });
        let payload: PaymentPayload = serde_json::from_value(wire).unwrap();
        let cashu = payload.payload.as_cashu().unwrap();
        assert_eq!(cashu.mints(), vec!["https://mint.example/"]);
    }

    #[test]
    fn rejects_unknown_version() {
        let wire = json!({
            "x402Version": 2,
            "scheme": "exact",
            "network": "spark",
            "payload": { "paymentType": "SPARK", "transfer_id": "tr" }
        });
        assert!(serde_json::from_value::<PaymentPayload>(wire).is_err());
    }
}
