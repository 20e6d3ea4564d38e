//! Configuration for the x402 middleware.

use a2a_x402_types::{Network, PaymentRequirements, Price, X402Error};

use crate::extension::X402_EXTENSION_URI;
use crate::merchant::{DEFAULT_MAX_TIMEOUT_SECONDS, DEFAULT_MIME_TYPE, PriceTag};

/// Configuration of the x402 extension on an executor.
#[derive(Debug, Clone)]
pub struct X402ExtensionConfig {
    pub extension_uri: String,
    pub version: String,
    pub x402_version: u8,
    /// When true, the middleware treats the extension as active even if the
    /// client did not request it via header.
    pub required: bool,
}

impl Default for X402ExtensionConfig {
    fn default() -> Self {
        Self {
            extension_uri: X402_EXTENSION_URI.to_string(),
            version: "0.1".to_string(),
            x402_version: 1,
            required: true,
        }
    }
}

impl X402ExtensionConfig {
    /// An optional extension: active only when the client asks for it.
    pub fn optional() -> Self {
        Self {
            required: false,
            ..Self::default()
        }
    }
}

/// Static pricing configuration for a merchant that charges the same price
/// for every request.
#[derive(Debug, Clone)]
pub struct X402ServerConfig {
    pub price: Price,
    pub pay_to_address: String,
    pub network: Network,
    pub description: String,
    pub mime_type: String,
    pub max_timeout_seconds: u64,
    pub resource: Option<String>,
}

impl X402ServerConfig {
    pub fn new<P: Into<Price>, S: Into<String>>(price: P, pay_to_address: S) -> Self {
        Self {
            price: price.into(),
            pay_to_address: pay_to_address.into(),
            network: Network::Base,
            description: "Payment required".to_string(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            resource: None,
        }
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_resource<S: Into<String>>(mut self, resource: S) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Resolve into payment requirements, using `fallback_resource` when the
    /// config does not pin one.
    pub fn to_payment_requirements(
        &self,
        fallback_resource: &str,
    ) -> Result<PaymentRequirements, X402Error> {
        let resource = self.resource.as_deref().unwrap_or(fallback_resource);
        PriceTag::new(
            self.price.clone(),
            self.pay_to_address.clone(),
            resource,
            self.network,
        )
        .with_description(self.description.clone())
        .with_mime_type(self.mime_type.clone())
        .with_timeout(self.max_timeout_seconds)
        .into_requirements()
    }
}
