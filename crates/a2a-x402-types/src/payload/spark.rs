//! Spark payloads for the `exact` scheme on the `spark` network.
//!
//! Spark payments settle outside the x402 engine, over one of three
//! transports. The payload carries a reference to the completed transfer:
//! a Spark transfer id, a Lightning preimage, or a Bitcoin L1 txid. Exactly
//! one reference is present, and it must match the declared transport.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;

/// Enumerates transports supported by the Spark exact scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SparkPaymentType {
    #[serde(rename = "SPARK")]
    Spark,
    #[serde(rename = "LIGHTNING")]
    Lightning,
    #[serde(rename = "L1")]
    L1,
}

impl SparkPaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SparkPaymentType::Spark => "SPARK",
            SparkPaymentType::Lightning => "LIGHTNING",
            SparkPaymentType::L1 => "L1",
        }
    }
}

impl Display for SparkPaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload carried in the exact scheme when the network is `spark`.
///
/// Modeled as a sum type so the transport invariant holds by construction:
/// a `SPARK` payment carries a `transfer_id`, a `LIGHTNING` payment a
/// `preimage`, an `L1` payment a `txid`, and nothing else. The JSON form is
/// `{ "paymentType": "...", "<reference field>": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExactSparkPayload {
    Spark { transfer_id: String },
    Lightning { preimage: String },
    L1 { txid: String },
}

impl ExactSparkPayload {
    pub fn payment_type(&self) -> SparkPaymentType {
        match self {
            ExactSparkPayload::Spark { .. } => SparkPaymentType::Spark,
            ExactSparkPayload::Lightning { .. } => SparkPaymentType::Lightning,
            ExactSparkPayload::L1 { .. } => SparkPaymentType::L1,
        }
    }

    pub fn transfer_id(&self) -> Option<&str> {
        match self {
            ExactSparkPayload::Spark { transfer_id } => Some(transfer_id),
            _ => None,
        }
    }

    pub fn preimage(&self) -> Option<&str> {
        match self {
            ExactSparkPayload::Lightning { preimage } => Some(preimage),
            _ => None,
        }
    }

    pub fn txid(&self) -> Option<&str> {
        match self {
            ExactSparkPayload::L1 { txid } => Some(txid),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct SparkPayloadWire {
    #[serde(rename = "paymentType")]
    payment_type: SparkPaymentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transfer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preimage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    txid: Option<String>,
}

impl Serialize for ExactSparkPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            ExactSparkPayload::Spark { transfer_id } => SparkPayloadWire {
                payment_type: SparkPaymentType::Spark,
                transfer_id: Some(transfer_id.clone()),
                preimage: None,
                txid: None,
            },
            ExactSparkPayload::Lightning { preimage } => SparkPayloadWire {
                payment_type: SparkPaymentType::Lightning,
                transfer_id: None,
                preimage: Some(preimage.clone()),
                txid: None,
            },
            ExactSparkPayload::L1 { txid } => SparkPayloadWire {
                payment_type: SparkPaymentType::L1,
                transfer_id: None,
                preimage: None,
                txid: Some(txid.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExactSparkPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SparkPayloadWire::deserialize(deserializer)?;
        let extra_references = |allowed: &str| {
            serde::de::Error::custom(format!(
                "Spark payload must carry exactly one transfer reference ({allowed})"
            ))
        };
        match wire.payment_type {
            SparkPaymentType::Spark => {
                if wire.preimage.is_some() || wire.txid.is_some() {
                    return Err(extra_references("transfer_id"));
                }
                let transfer_id = wire
                    .transfer_id
                    .ok_or_else(|| serde::de::Error::missing_field("transfer_id"))?;
                Ok(ExactSparkPayload::Spark { transfer_id })
            }
            SparkPaymentType::Lightning => {
                if wire.transfer_id.is_some() || wire.txid.is_some() {
                    return Err(extra_references("preimage"));
                }
                let preimage = wire
                    .preimage
                    .ok_or_else(|| serde::de::Error::missing_field("preimage"))?;
                Ok(ExactSparkPayload::Lightning { preimage })
            }
            SparkPaymentType::L1 => {
                if wire.transfer_id.is_some() || wire.preimage.is_some() {
                    return Err(extra_references("txid"));
                }
                let txid = wire
                    .txid
                    .ok_or_else(|| serde::de::Error::missing_field("txid"))?;
                Ok(ExactSparkPayload::L1 { txid })
            }
        }
    }
}
