//! Payment signing and selection helpers for the client side.
//!
//! The signer capability is the [`alloy_signer::Signer`] trait: an address
//! plus raw (EIP-191) and typed-data (EIP-712) signing. In-process keys,
//! remote wallets, and HSMs all slot in behind the same trait object; no key
//! material crosses this module.

use alloy_signer::Signer;
use alloy_sol_types::{SolStruct, eip712_domain};
use rand::{Rng, rng};
use std::time::SystemTimeError;
use tracing::debug;

use a2a_x402_types::{
    Base64Bytes, Eip3009Authorization, ExactPaymentPayload, ExactSparkPayload, HexEncodedNonce,
    MixedAddressError, Network, NetworkFamily, PaymentPayload, PaymentRequiredResponse,
    PaymentRequirements, Scheme, TokenAmount, TransferWithAuthorization, UnixTimestamp, X402Error,
    X402Version,
};

/// How long before "now" an authorization becomes valid, to absorb clock
/// skew between buyer and facilitator.
const VALID_AFTER_SKEW_SECONDS: u64 = 60;

/// Errors that can occur while selecting or constructing a payment.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// The selected payment amount exceeds the configured maximum.
    #[error("Payment amount {requested} exceeds maximum allowed {allowed}")]
    PaymentAmountTooLarge {
        requested: TokenAmount,
        allowed: TokenAmount,
    },
    /// None of the offered payment methods can be used by this wallet.
    #[error("No suitable payment method among {count} offered requirement(s)")]
    NoSuitablePaymentMethod { count: usize },
    /// The selected scheme settles outside this wallet; the protocol refuses
    /// to fabricate out-of-band settlement evidence.
    #[error(
        "{scheme} payments on {network} settle externally; complete the transfer and use {helper}"
    )]
    ExternalSettlementRequired {
        scheme: Scheme,
        network: Network,
        helper: &'static str,
    },
    /// The requirement's network cannot be signed with an EIP-3009 flow.
    #[error("Network {0} is not supported for EIP-3009 signing")]
    UnsupportedNetwork(Network),
    /// The requirement names no token asset to act as verifying contract.
    #[error("Payment requirements carry no asset for network {0}")]
    MissingAsset(Network),
    /// A party address is not a valid EVM address.
    #[error("Invalid EVM address")]
    InvalidEvmAddress(#[source] MixedAddressError),
    /// The system clock could not be read.
    #[error("Failed to get system clock")]
    ClockError(#[source] SystemTimeError),
    /// Signing the EIP-712 payload failed.
    #[error("Failed to sign payment payload")]
    SigningError(#[source] alloy_signer::Error),
    /// The payload could not be serialized for transport.
    #[error("Failed to encode payment payload")]
    JsonEncodeError(#[source] serde_json::Error),
    /// A payment header or payload failed structural validation.
    #[error("Invalid payment header: {0}")]
    InvalidHeader(String),
    /// The bundle references a mint the requirements do not accept.
    #[error("Cashu payload contains mints not accepted by the payment requirements: {0}")]
    MintNotAccepted(String),
    /// `encoded` and `tokens` do not line up.
    #[error("Cashu payload encoded tokens must align with provided token entries")]
    TokenCountMismatch,
    /// The requirements are for a different scheme than the helper handles.
    #[error("Expected {expected} requirements, found {found}")]
    SchemeMismatch { expected: Scheme, found: Scheme },
}

impl From<WalletError> for X402Error {
    fn from(error: WalletError) -> Self {
        X402Error::validation(error.to_string())
    }
}

/// Select one requirement from the merchant's alternatives.
///
/// Requirements within the budget are preferred (with a budget set, ones
/// above it are ineligible); among those, requirements this wallet can sign
/// directly (`exact` on an EVM network) win; remaining ties go to list order.
pub fn select_payment_requirements<'a>(
    accepts: &'a [PaymentRequirements],
    max_value: Option<TokenAmount>,
) -> Result<&'a PaymentRequirements, WalletError> {
    let eligible: Vec<&PaymentRequirements> = match max_value {
        Some(max) => {
            let within: Vec<&PaymentRequirements> = accepts
                .iter()
                .filter(|requirements| requirements.max_amount_required <= max)
                .collect();
            if within.is_empty() {
                // Everything breaches the budget; report the cheapest offer.
                if let Some(cheapest) = accepts
                    .iter()
                    .map(|requirements| requirements.max_amount_required)
                    .min()
                {
                    return Err(WalletError::PaymentAmountTooLarge {
                        requested: cheapest,
                        allowed: max,
                    });
                }
            }
            within
        }
        None => accepts.iter().collect(),
    };
    let Some(&first) = eligible.first() else {
        return Err(WalletError::NoSuitablePaymentMethod {
            count: accepts.len(),
        });
    };
    let selected = eligible
        .iter()
        .copied()
        .find(|requirements| {
            requirements.scheme == Scheme::Exact
                && requirements.network.family() == NetworkFamily::Evm
        })
        .unwrap_or(first);
    Ok(selected)
}

/// Sign an EIP-3009 `transferWithAuthorization` for the given requirement.
///
/// The authorization window runs from one minute in the past to
/// `max_timeout_seconds` in the future, identified by a fresh random nonce.
pub async fn process_payment(
    requirements: &PaymentRequirements,
    signer: &(dyn Signer + Send + Sync),
    max_value: Option<TokenAmount>,
) -> Result<PaymentPayload, WalletError> {
    if let Some(max) = max_value {
        if requirements.max_amount_required > max {
            return Err(WalletError::PaymentAmountTooLarge {
                requested: requirements.max_amount_required,
                allowed: max,
            });
        }
    }

    match (requirements.scheme, requirements.network.family()) {
        (Scheme::Exact, NetworkFamily::Evm) => {}
        (Scheme::CashuToken, _) => {
            return Err(WalletError::ExternalSettlementRequired {
                scheme: requirements.scheme,
                network: requirements.network,
                helper: "process_cashu_payment",
            });
        }
        (Scheme::Exact, NetworkFamily::Spark) => {
            return Err(WalletError::ExternalSettlementRequired {
                scheme: requirements.scheme,
                network: requirements.network,
                helper: "create_spark_payment_payload",
            });
        }
        (Scheme::Exact, _) => {
            return Err(WalletError::UnsupportedNetwork(requirements.network));
        }
    }

    let chain_id = requirements
        .network
        .chain_id()
        .ok_or(WalletError::UnsupportedNetwork(requirements.network))?;

    let (name, version) = match &requirements.extra {
        None => (None, None),
        Some(extra) => {
            let name = extra
                .get("name")
                .and_then(|v| v.as_str())
                .map(ToOwned::to_owned);
            let version = extra
                .get("version")
                .and_then(|v| v.as_str())
                .map(ToOwned::to_owned);
            (name, version)
        }
    };

    let asset = requirements
        .asset
        .as_ref()
        .ok_or(WalletError::MissingAsset(requirements.network))?;
    let verifying_contract = asset.as_evm().map_err(WalletError::InvalidEvmAddress)?;
    let domain = eip712_domain! {
        name: name.unwrap_or_default(),
        version: version.unwrap_or_default(),
        chain_id: chain_id,
        verifying_contract: verifying_contract,
    };

    let now = UnixTimestamp::try_now().map_err(WalletError::ClockError)?;
    let valid_after = now.saturating_sub(VALID_AFTER_SKEW_SECONDS);
    let valid_before = now + requirements.max_timeout_seconds;
    let nonce: [u8; 32] = rng().random();

    let authorization = Eip3009Authorization {
        from: signer.address().into(),
        to: requirements
            .pay_to
            .as_evm()
            .map_err(WalletError::InvalidEvmAddress)?
            .into(),
        value: requirements.max_amount_required,
        valid_after,
        valid_before,
        nonce: HexEncodedNonce(nonce),
    };
    debug!(?authorization, "Constructed authorization payload");

    let transfer_with_authorization = TransferWithAuthorization::from(&authorization);
    let eip712_hash = transfer_with_authorization.eip712_signing_hash(&domain);
    let signature = signer
        .sign_hash(&eip712_hash)
        .await
        .map_err(WalletError::SigningError)?;
    debug!(?signature, "Signature obtained");

    Ok(PaymentPayload {
        x402_version: X402Version,
        scheme: requirements.scheme,
        network: requirements.network,
        payload: ExactPaymentPayload::Evm(a2a_x402_types::ExactEvmPayload {
            signature: signature.as_bytes().into(),
            authorization,
        }),
    })
}

/// Select one of the merchant's alternatives and sign it.
///
/// Spark and Cashu selections fail with
/// [`WalletError::ExternalSettlementRequired`]: their settlement evidence is
/// produced outside this wallet and wrapped with the transport-specific
/// helper instead.
pub async fn process_payment_required(
    payment_required: &PaymentRequiredResponse,
    signer: &(dyn Signer + Send + Sync),
    max_value: Option<TokenAmount>,
) -> Result<PaymentPayload, WalletError> {
    let selected = select_payment_requirements(&payment_required.accepts, max_value)?;
    process_payment(selected, signer, max_value).await
}

/// Wrap an externally settled Spark transfer into a payment payload.
///
/// The transport invariant (one reference, matching the transport) holds by
/// construction of [`ExactSparkPayload`].
pub fn create_spark_payment_payload(transport: ExactSparkPayload) -> PaymentPayload {
    PaymentPayload {
        x402_version: X402Version,
        scheme: Scheme::Exact,
        network: Network::Spark,
        payload: ExactPaymentPayload::Spark(transport),
    }
}

/// Borrow the structured Spark payload out of a payment payload.
pub fn get_spark_payment_payload(
    payment_payload: &PaymentPayload,
) -> Result<&ExactSparkPayload, WalletError> {
    payment_payload
        .payload
        .as_spark()
        .ok_or_else(|| WalletError::InvalidHeader("payload is not targeting Spark".into()))
}

/// Encode a Spark payment payload for the `X-PAYMENT` HTTP header:
/// canonical JSON (sorted keys) wrapped in base64.
pub fn encode_spark_payment_header(
    payment_payload: &PaymentPayload,
) -> Result<String, WalletError> {
    get_spark_payment_payload(payment_payload)?;
    // Through Value so keys serialize in sorted (canonical) order.
    let canonical =
        serde_json::to_value(payment_payload).map_err(WalletError::JsonEncodeError)?;
    let json = serde_json::to_vec(&canonical).map_err(WalletError::JsonEncodeError)?;
    Ok(Base64Bytes::encode(json).to_string())
}

/// Decode an `X-PAYMENT` header back into a Spark payment payload.
pub fn decode_spark_payment_header(header_value: &str) -> Result<PaymentPayload, WalletError> {
    let bytes = Base64Bytes::from(header_value)
        .decode()
        .map_err(|e| WalletError::InvalidHeader(format!("invalid base64: {e}")))?;
    let payment_payload: PaymentPayload = serde_json::from_slice(&bytes)
        .map_err(|e| WalletError::InvalidHeader(format!("invalid payload JSON: {e}")))?;
    if payment_payload.network != Network::Spark {
        return Err(WalletError::InvalidHeader(
            "decoded payload is not targeting the Spark network".into(),
        ));
    }
    Ok(payment_payload)
}

/// Wrap a caller-supplied Cashu ecash bundle into a payment payload.
///
/// Validates that every token's mint is accepted by the requirements and
/// that the encoded forms line up with the structured tokens.
pub fn process_cashu_payment(
    requirements: &PaymentRequirements,
    cashu_payload: a2a_x402_types::CashuPaymentPayload,
) -> Result<PaymentPayload, WalletError> {
    if requirements.scheme != Scheme::CashuToken {
        return Err(WalletError::SchemeMismatch {
            expected: Scheme::CashuToken,
            found: requirements.scheme,
        });
    }

    let accepted_mints: Vec<&str> = requirements
        .extra
        .as_ref()
        .and_then(|extra| extra.get("mints"))
        .and_then(|mints| mints.as_array())
        .map(|mints| mints.iter().filter_map(|m| m.as_str()).collect())
        .unwrap_or_default();
    if !accepted_mints.is_empty() {
        let mut missing: Vec<&str> = cashu_payload
            .tokens
            .iter()
            .map(|token| token.mint.as_str())
            .filter(|mint| !accepted_mints.contains(mint))
            .collect();
        if !missing.is_empty() {
            missing.sort_unstable();
            missing.dedup();
            return Err(WalletError::MintNotAccepted(missing.join(", ")));
        }
    }

    if cashu_payload.encoded.len() != cashu_payload.tokens.len() {
        return Err(WalletError::TokenCountMismatch);
    }

    Ok(PaymentPayload {
        x402_version: X402Version,
        scheme: requirements.scheme,
        network: requirements.network,
        payload: ExactPaymentPayload::Cashu(cashu_payload),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merchant::{
        CashuOffer, create_cashu_payment_requirements, create_payment_requirements,
        create_spark_payment_requirements,
    };
    use a2a_x402_types::{CashuPaymentPayload, CashuProof, CashuToken, MoneyAmount, Price};
    use alloy_signer_local::PrivateKeySigner;

    fn evm_requirements(amount: &str) -> PaymentRequirements {
        create_payment_requirements(
            Price::Money(MoneyAmount::parse(amount).unwrap()),
            "0x2222222222222222222222222222222222222222",
            "/svc",
            Network::Base,
        )
        .unwrap()
    }

    fn cashu_requirements() -> PaymentRequirements {
        let offer = CashuOffer::new(
            Price::Money(MoneyAmount::parse("5000").unwrap()),
            "cashu:merchant",
            "/cashu",
            Network::BitcoinTestnet,
        )
        .with_mint("https://nofees.testnut.cashu.space/");
        create_cashu_payment_requirements(offer).unwrap()
    }

    fn cashu_bundle(mint: &str) -> CashuPaymentPayload {
        CashuPaymentPayload {
            tokens: vec![CashuToken {
                mint: mint.into(),
                proofs: vec![CashuProof {
                    amount: 5000,
                    id: "001122aabbccdd".into(),
                    secret: "secret".into(),
                    c: "ab".repeat(32),
                }],
            }],
            encoded: vec!["cashuBexample".into()],
            memo: None,
            unit: Some("sat".into()),
            locks: None,
            payer: Some("payer-id".into()),
            expiry: None,
        }
    }

    #[tokio::test]
    async fn signs_eip3009_authorization() {
        let signer = PrivateKeySigner::random();
        let requirements = evm_requirements("$1.50");
        let payload = process_payment(&requirements, &signer, None).await.unwrap();

        assert_eq!(payload.scheme, Scheme::Exact);
        assert_eq!(payload.network, Network::Base);
        let evm = payload.payload.as_evm().unwrap();
        assert_eq!(evm.authorization.value, TokenAmount(1_500_000));
        assert_eq!(evm.authorization.from.0, signer.address());
        let window =
            evm.authorization.valid_before.as_secs() - evm.authorization.valid_after.as_secs();
        assert_eq!(
            window,
            requirements.max_timeout_seconds + VALID_AFTER_SKEW_SECONDS
        );
    }

    #[tokio::test]
    async fn nonces_are_unique_per_payment() {
        let signer = PrivateKeySigner::random();
        let requirements = evm_requirements("$1.50");
        let first = process_payment(&requirements, &signer, None).await.unwrap();
        let second = process_payment(&requirements, &signer, None).await.unwrap();
        assert_ne!(
            first.payload.as_evm().unwrap().authorization.nonce,
            second.payload.as_evm().unwrap().authorization.nonce
        );
    }

    #[tokio::test]
    async fn enforces_max_value_budget() {
        let signer = PrivateKeySigner::random();
        let requirements = evm_requirements("$10");
        let result =
            process_payment(&requirements, &signer, Some(TokenAmount(5_000_000))).await;
        assert!(matches!(
            result,
            Err(WalletError::PaymentAmountTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn selection_prefers_budget_then_evm_then_order() {
        let expensive = evm_requirements("$10");
        let spark = create_spark_payment_requirements(TokenAmount(100), "sp1receiver", "/svc", None)
            .unwrap();
        let affordable = evm_requirements("$1");

        let accepts = vec![expensive, spark.clone(), affordable];
        let selected =
            select_payment_requirements(&accepts, Some(TokenAmount(2_000_000))).unwrap();
        assert_eq!(selected.max_amount_required, TokenAmount(1_000_000));
        assert_eq!(selected.network, Network::Base);

        // Without a supported scheme, list order wins.
        let only_spark = vec![spark];
        let selected = select_payment_requirements(&only_spark, None).unwrap();
        assert_eq!(selected.network, Network::Spark);
    }

    #[tokio::test]
    async fn spark_selection_demands_external_helper() {
        let signer = PrivateKeySigner::random();
        let spark =
            create_spark_payment_requirements(TokenAmount(100), "sp1receiver", "/svc", None)
                .unwrap();
        let required = PaymentRequiredResponse::new(vec![spark], None);
        let result = process_payment_required(&required, &signer, None).await;
        assert!(matches!(
            result,
            Err(WalletError::ExternalSettlementRequired {
                helper: "create_spark_payment_payload",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn cashu_selection_demands_external_helper() {
        let signer = PrivateKeySigner::random();
        let required = PaymentRequiredResponse::new(vec![cashu_requirements()], None);
        let result = process_payment_required(&required, &signer, None).await;
        assert!(matches!(
            result,
            Err(WalletError::ExternalSettlementRequired {
                helper: "process_cashu_payment",
                ..
            })
        ));
    }

    #[test]
    fn spark_header_round_trips() {
        let input = create_spark_payment_payload(ExactSparkPayload::Lightning {
            preimage: "00ff".repeat(16),
        });
        let header = encode_spark_payment_header(&input).unwrap();
        let decoded = decode_spark_payment_header(&header).unwrap();
        assert_eq!(decoded, input);

        let spark = get_spark_payment_payload(&decoded).unwrap();
        assert_eq!(spark.payment_type().as_str(), "LIGHTNING");
        assert_eq!(spark.preimage(), Some("00ff".repeat(16).as_str()));
        assert_eq!(spark.transfer_id(), None);
        assert_eq!(spark.txid(), None);
    }

    #[test]
    fn spark_header_rejects_non_spark_payloads() {
        let bundle = process_cashu_payment(&cashu_requirements(), cashu_bundle(
            "https://nofees.testnut.cashu.space/",
        ))
        .unwrap();
        assert!(encode_spark_payment_header(&bundle).is_err());
        assert!(decode_spark_payment_header("not-base64!").is_err());
    }

    #[test]
    fn cashu_payment_validates_mints() {
        let requirements = cashu_requirements();
        let payload =
            process_cashu_payment(&requirements, cashu_bundle("https://nofees.testnut.cashu.space/"))
                .unwrap();
        assert_eq!(payload.scheme, Scheme::CashuToken);
        assert_eq!(payload.network, Network::BitcoinTestnet);

        let result =
            process_cashu_payment(&requirements, cashu_bundle("https://mint.minibits.cash/Bitcoin"));
        assert!(matches!(result, Err(WalletError::MintNotAccepted(_))));
    }

    #[test]
    fn cashu_payment_validates_encoded_alignment() {
        let requirements = cashu_requirements();
        let mut bundle = cashu_bundle("https://nofees.testnut.cashu.space/");
        bundle.encoded.push("cashuBextra".into());
        assert!(matches!(
            process_cashu_payment(&requirements, bundle),
            Err(WalletError::TokenCountMismatch)
        ));
    }
}
