//! The typed interrupt business logic raises to demand payment.

use std::fmt;
use std::fmt::Display;

use a2a_x402_types::{ErrorCode, Network, PaymentRequirements, Price, X402Error};

use crate::merchant::PriceTag;

/// Raised from inside a business agent to request payment with dynamic
/// requirements.
///
/// This is control flow, not a failure: code deep in a tool handler can
/// demand payment without threading pricing configuration up to the
/// transport. The server middleware is the only component that catches it,
/// translating the carried requirements into a payment-required task.
#[derive(Debug, Clone)]
pub struct PaymentRequiredException {
    message: String,
    accepts: Vec<PaymentRequirements>,
    error_code: Option<ErrorCode>,
}

impl PaymentRequiredException {
    /// A payment demand offering one or more alternatives, in preference
    /// order.
    pub fn new<S: Into<String>>(message: S, accepts: Vec<PaymentRequirements>) -> Self {
        Self {
            message: message.into(),
            accepts,
            error_code: None,
        }
    }

    /// The common single-option case.
    pub fn single<S: Into<String>>(message: S, requirements: PaymentRequirements) -> Self {
        Self::new(message, vec![requirements])
    }

    pub fn with_error_code(mut self, error_code: ErrorCode) -> Self {
        self.error_code = Some(error_code);
        self
    }

    /// Build the single-option demand for a simple priced service: USD (or
    /// token) price, receiver, and resource on the given network.
    pub fn for_service<P: Into<Price>>(
        price: P,
        pay_to_address: &str,
        resource: &str,
        network: Network,
        description: Option<&str>,
        message: Option<&str>,
    ) -> Result<Self, X402Error> {
        let description = description.unwrap_or("Payment required for this service");
        let requirements = PriceTag::new(price, pay_to_address, resource, network)
            .with_description(description)
            .into_requirements()?;
        Ok(Self::single(message.unwrap_or(description), requirements))
    }

    /// The payment alternatives, in preference order.
    pub fn accepts(&self) -> &[PaymentRequirements] {
        &self.accepts
    }

    pub fn into_accepts(self) -> Vec<PaymentRequirements> {
        self.accepts
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error_code
    }
}

impl Display for PaymentRequiredException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for PaymentRequiredException {}

#[cfg(test)]
mod tests {
    use super::*;
    use a2a_x402_types::{Scheme, TokenAmount};

    #[test]
    fn for_service_builds_single_offer() {
        let exception = PaymentRequiredException::for_service(
            Price::try_from("$1.00").unwrap(),
            "0x2222222222222222222222222222222222222222",
            "/premium-feature",
            Network::Base,
            None,
            None,
        )
        .unwrap();

        assert_eq!(exception.accepts().len(), 1);
        let requirements = &exception.accepts()[0];
        assert_eq!(requirements.scheme, Scheme::Exact);
        assert_eq!(requirements.max_amount_required, TokenAmount(1_000_000));
        assert_eq!(exception.message(), "Payment required for this service");
    }

    #[test]
    fn custom_message_overrides_description() {
        let exception = PaymentRequiredException::for_service(
            Price::try_from("$1.00").unwrap(),
            "0x2222222222222222222222222222222222222222",
            "/premium-feature",
            Network::Base,
            Some("Premium image generation"),
            Some("Choose a payment method"),
        )
        .unwrap();
        assert_eq!(exception.to_string(), "Choose a payment method");
        assert_eq!(exception.accepts()[0].description, "Premium image generation");
    }
}
