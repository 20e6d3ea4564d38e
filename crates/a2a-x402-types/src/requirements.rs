//! Payment requirements and the facilitator request wrappers.

use serde::{Deserialize, Serialize};

use crate::address::MixedAddress;
use crate::money::TokenAmount;
use crate::network::Network;
use crate::payload::{PaymentPayload, X402Version};
use crate::scheme::Scheme;

/// Payment terms set by the merchant: one acceptable way to pay.
///
/// `asset` is the token identifier on networks that have one; it is absent
/// for Cashu offers, where `extra.mints` names the accepted mints instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// The payment scheme (e.g., "exact").
    pub scheme: Scheme,
    /// The network the payment settles on.
    pub network: Network,
    /// The maximum amount required, in atomic units.
    pub max_amount_required: TokenAmount,
    /// The resource being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    pub description: String,
    /// MIME type of the resource.
    pub mime_type: String,
    /// Optional JSON schema describing the paid response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// The recipient identifier for the payment.
    pub pay_to: MixedAddress,
    /// Maximum time in seconds for payment validity.
    pub max_timeout_seconds: u64,
    /// The token asset identifier, when the scheme has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<MixedAddress>,
    /// Scheme-specific extra data: the EIP-712 domain for EVM `exact`,
    /// mint URLs and unit for `cashu-token`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

/// Payment-required response body: an ordered, non-empty list of acceptable
/// payment methods, plus an optional human-readable error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredResponse {
    pub x402_version: X402Version,
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PaymentRequiredResponse {
    pub fn new(accepts: Vec<PaymentRequirements>, error: Option<String>) -> Self {
        Self {
            x402_version: X402Version,
            accepts,
            error,
        }
    }
}

/// Wrapper for a payment payload and the requirements it was produced
/// against, sent to a facilitator for verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub x402_version: X402Version,
    pub payment_payload: PaymentPayload,
    pub payment_requirements: PaymentRequirements,
}

impl VerifyRequest {
    pub fn new(payment_payload: PaymentPayload, payment_requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: X402Version,
            payment_payload,
            payment_requirements,
        }
    }
}

/// Wrapper for a payment payload and requirements to be used for settlement.
pub type SettleRequest = VerifyRequest;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: Scheme::Exact,
            network: Network::Base,
            max_amount_required: TokenAmount(1_500_000),
            resource: "/svc".into(),
            description: "Service".into(),
            mime_type: "application/json".into(),
            output_schema: None,
            pay_to: MixedAddress::new("0x2222222222222222222222222222222222222222").unwrap(),
            max_timeout_seconds: 600,
            asset: Some(
                MixedAddress::new("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap(),
            ),
            extra: Some(json!({ "name": "USDC", "version": "2" })),
        }
    }

    #[test]
    fn wire_format_is_camel_case() {
        let value = serde_json::to_value(requirements()).unwrap();
        assert_eq!(value["maxAmountRequired"], "1500000");
        assert_eq!(value["payTo"], "0x2222222222222222222222222222222222222222");
        assert_eq!(value["mimeType"], "application/json");
        assert_eq!(value["maxTimeoutSeconds"], 600);
        assert!(value.get("outputSchema").is_none());
    }

    #[test]
    fn asset_is_optional_for_cashu() {
        let wire = json!({
            "scheme": "cashu-token",
            "network": "bitcoin-testnet",
            "maxAmountRequired": "5000",
            "resource": "/cashu",
            "description": "",
            "mimeType": "application/json",
            "payTo": "cashu:merchant",
            "maxTimeoutSeconds": 600,
            "extra": { "mints": ["https://mint.example/"], "unit": "sat" }
        });
        let parsed: PaymentRequirements = serde_json::from_value(wire).unwrap();
        assert!(parsed.asset.is_none());
        assert_eq!(parsed.scheme, Scheme::CashuToken);
    }

    #[test]
    fn payment_required_response_defaults_accepts() {
        let parsed: PaymentRequiredResponse =
            serde_json::from_value(json!({ "x402Version": 1 })).unwrap();
        assert!(parsed.accepts.is_empty());
        assert!(parsed.error.is_none());
    }

    #[test]
    fn requirements_round_trip() {
        let original = requirements();
        let json = serde_json::to_string(&original).unwrap();
        let back: PaymentRequirements = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }
}
