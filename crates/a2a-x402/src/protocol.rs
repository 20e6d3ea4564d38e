//! Protocol primitives: the facilitator capability and the verify/settle
//! operations built on it.
//!
//! A facilitator validates payment authorizations and performs settlement.
//! The engine never talks to a chain itself; everything on-chain happens
//! behind the [`Facilitator`] trait.

use std::fmt::{Debug, Display};
use std::sync::Arc;
use std::time::Duration;

use a2a_x402_types::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse, X402Error};

/// Default bound on a verification round-trip.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(15);

/// The asynchronous verification and settlement interface.
///
/// Implementations target different settlement networks or mocks; the
/// middleware is parameterized on this capability and nothing else.
pub trait Facilitator {
    /// The error type returned by this facilitator.
    type Error: Debug + Display + Send + Sync;

    /// Verify a payment payload against the payment requirements it claims
    /// to satisfy. May block on network I/O.
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    /// Settle a verified payment. May block on network I/O, potentially for
    /// tens of seconds while a transaction confirms.
    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;
}

impl<T: Facilitator + Sync> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }
}

/// Verify a payment with the facilitator under the default 15-second bound.
pub async fn verify_payment<F: Facilitator>(
    request: &VerifyRequest,
    facilitator: &F,
) -> Result<VerifyResponse, X402Error> {
    verify_payment_with_timeout(request, facilitator, DEFAULT_VERIFY_TIMEOUT).await
}

/// Verify a payment with the facilitator, bounding the round-trip.
///
/// Timeouts and transport failures surface as payment errors; the caller
/// decides how they map onto task state.
pub async fn verify_payment_with_timeout<F: Facilitator>(
    request: &VerifyRequest,
    facilitator: &F,
    timeout: Duration,
) -> Result<VerifyResponse, X402Error> {
    match tokio::time::timeout(timeout, facilitator.verify(request)).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(error)) => Err(X402Error::payment(format!("Verification failed: {error}"))),
        Err(_) => Err(X402Error::payment(format!(
            "Verification timed out after {}s",
            timeout.as_secs()
        ))),
    }
}

/// Settle a payment with the facilitator.
///
/// Transport failures are normalized into a failed [`SettleResponse`] so the
/// caller always has a receipt to record; the engine never retries.
pub async fn settle_payment<F: Facilitator>(
    request: &SettleRequest,
    facilitator: &F,
) -> SettleResponse {
    match facilitator.settle(request).await {
        Ok(response) => response,
        Err(error) => SettleResponse::failure(
            request.payment_requirements.network,
            format!("Settlement failed: {error}"),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merchant::create_payment_requirements;
    use a2a_x402_types::{
        Eip3009Authorization, EvmSignature, ExactEvmPayload, ExactPaymentPayload, HexEncodedNonce,
        Network, PaymentPayload, Price, Scheme, TokenAmount, UnixTimestamp, X402Version,
    };
    use alloy_primitives::address;
    use std::convert::Infallible;

    struct SlowFacilitator;

    impl Facilitator for SlowFacilitator {
        type Error = Infallible;

        async fn verify(&self, _request: &VerifyRequest) -> Result<VerifyResponse, Infallible> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(VerifyResponse::valid("0xBuyer"))
        }

        async fn settle(&self, _request: &SettleRequest) -> Result<SettleResponse, Infallible> {
            Ok(SettleResponse::failure(Network::Base, "unused"))
        }
    }

    struct BrokenFacilitator;

    impl Facilitator for BrokenFacilitator {
        type Error = String;

        async fn verify(&self, _request: &VerifyRequest) -> Result<VerifyResponse, String> {
            Err("connection refused".to_string())
        }

        async fn settle(&self, _request: &SettleRequest) -> Result<SettleResponse, String> {
            Err("connection refused".to_string())
        }
    }

    fn request() -> VerifyRequest {
        let requirements = create_payment_requirements(
            Price::try_from("$1.50").unwrap(),
            "0x2222222222222222222222222222222222222222",
            "/svc",
            Network::Base,
        )
        .unwrap();
        let payload = PaymentPayload {
            x402_version: X402Version,
            scheme: Scheme::Exact,
            network: Network::Base,
            payload: ExactPaymentPayload::Evm(ExactEvmPayload {
                signature: EvmSignature([0x11; 65]),
                authorization: Eip3009Authorization {
                    from: address!("0x1111111111111111111111111111111111111111").into(),
                    to: address!("0x2222222222222222222222222222222222222222").into(),
                    value: TokenAmount(1_500_000),
                    valid_after: UnixTimestamp::from_secs(1_700_000_000),
                    valid_before: UnixTimestamp::from_secs(1_700_000_600),
                    nonce: HexEncodedNonce([0x33; 32]),
                },
            }),
        };
        VerifyRequest::new(payload, requirements)
    }

    #[tokio::test(start_paused = true)]
    async fn verification_timeout_is_a_payment_error() {
        let result =
            verify_payment_with_timeout(&request(), &SlowFacilitator, Duration::from_secs(15))
                .await;
        match result {
            Err(X402Error::Payment(message)) => assert!(message.contains("timed out")),
            other => panic!("expected payment error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn facilitator_errors_normalize_per_operation() {
        let verify = verify_payment(&request(), &BrokenFacilitator).await;
        assert!(matches!(verify, Err(X402Error::Payment(_))));

        let settle = settle_payment(&request(), &BrokenFacilitator).await;
        assert!(!settle.success);
        assert!(settle.error_reason.unwrap().contains("connection refused"));
        assert_eq!(settle.network, Network::Base);
    }
}
