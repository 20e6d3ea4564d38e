//! Requirement builders: from a human-readable price to [`PaymentRequirements`].
//!
//! Each supported scheme has its own constructor. EVM offers resolve the
//! network's default USDC deployment and EIP-712 domain; Cashu offers carry
//! mint URLs in `extra`; Spark offers only pin the receiver and amount, since
//! settlement happens out of band.

use serde_json::{Value, json};

use a2a_x402_types::{
    MixedAddress, Network, NetworkFamily, PaymentRequirements, Price, Scheme, TokenAmount,
    USDCDeployment, X402Error,
};

pub const DEFAULT_MIME_TYPE: &str = "application/json";
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 600;

/// Default Cashu mint per network, used when the merchant does not name one.
fn default_cashu_mint(network: Network) -> Option<&'static str> {
    match network {
        Network::BitcoinTestnet => Some("https://nofees.testnut.cashu.space/"),
        Network::BitcoinMainnet => Some("https://mint.minibits.cash/Bitcoin"),
        _ => None,
    }
}

/// A priced offer for a resource, convertible into [`PaymentRequirements`].
///
/// Covers the `exact` scheme on networks with a default USDC asset (EVM and
/// Sui). Spark and Cashu offers have their own builders.
#[derive(Debug, Clone)]
pub struct PriceTag {
    pub price: Price,
    pub pay_to: String,
    pub resource: String,
    pub network: Network,
    pub description: String,
    pub mime_type: String,
    pub max_timeout_seconds: u64,
    pub output_schema: Option<Value>,
}

impl PriceTag {
    pub fn new<P, S1, S2>(price: P, pay_to: S1, resource: S2, network: Network) -> Self
    where
        P: Into<Price>,
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            price: price.into(),
            pay_to: pay_to.into(),
            resource: resource.into(),
            network,
            description: String::new(),
            mime_type: DEFAULT_MIME_TYPE.into(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            output_schema: None,
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_mime_type<S: Into<String>>(mut self, mime_type: S) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.max_timeout_seconds = seconds;
        self
    }

    pub fn with_output_schema(mut self, schema: Value) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Resolve the offer into concrete payment requirements.
    pub fn into_requirements(self) -> Result<PaymentRequirements, X402Error> {
        match self.network.family() {
            NetworkFamily::Evm | NetworkFamily::Sui => {}
            NetworkFamily::Spark => {
                return Err(X402Error::validation(
                    "Spark offers are built with create_spark_payment_requirements",
                ));
            }
            NetworkFamily::Bitcoin => {
                return Err(X402Error::validation(
                    "Cashu offers are built with create_cashu_payment_requirements",
                ));
            }
        }

        let pay_to = MixedAddress::new(self.pay_to.as_str())
            .map_err(|e| X402Error::validation(format!("Invalid pay_to address: {e}")))?;

        let (max_amount_required, asset, extra) = match self.price {
            Price::Money(amount) => {
                let deployment = USDCDeployment::by_network(self.network).ok_or_else(|| {
                    X402Error::validation(format!(
                        "No default asset known for network {}",
                        self.network
                    ))
                })?;
                let atomic = amount
                    .as_token_amount(deployment.decimals as u32)
                    .map_err(|e| X402Error::validation(format!("Invalid price: {e}")))?;
                let extra = deployment.eip712.as_ref().map(|meta| {
                    json!({ "name": meta.name, "version": meta.version })
                });
                (atomic, deployment.address.clone(), extra)
            }
            Price::Token { amount, deployment } => {
                if deployment.network != self.network {
                    return Err(X402Error::validation(format!(
                        "Token asset is deployed on {}, offer is for {}",
                        deployment.network, self.network
                    )));
                }
                let extra = deployment.eip712.as_ref().map(|meta| {
                    json!({ "name": meta.name, "version": meta.version })
                });
                (amount, deployment.address, extra)
            }
        };

        Ok(PaymentRequirements {
            scheme: Scheme::Exact,
            network: self.network,
            max_amount_required,
            resource: self.resource,
            description: self.description,
            mime_type: self.mime_type,
            output_schema: self.output_schema,
            pay_to,
            max_timeout_seconds: self.max_timeout_seconds,
            asset: Some(asset),
            extra,
        })
    }
}

/// Build `exact` payment requirements from a price and receiver.
///
/// The common single-offer case; use [`PriceTag`] directly for the optional
/// fields.
pub fn create_payment_requirements<P: Into<Price>>(
    price: P,
    pay_to: &str,
    resource: &str,
    network: Network,
) -> Result<PaymentRequirements, X402Error> {
    PriceTag::new(price, pay_to, resource, network).into_requirements()
}

/// A Cashu ecash offer.
///
/// The price is a whole number of satoshis; at least one mint must be
/// resolvable, either named explicitly or defaulted for the network.
#[derive(Debug, Clone)]
pub struct CashuOffer {
    pub price: Price,
    pub pay_to: String,
    pub resource: String,
    pub network: Network,
    pub description: String,
    pub mime_type: String,
    pub max_timeout_seconds: u64,
    pub output_schema: Option<Value>,
    pub mints: Vec<String>,
    pub unit: String,
    pub keyset_ids: Vec<String>,
    pub facilitator_url: Option<String>,
    /// NUT-10 locking conditions, passed through to `extra.nut10`.
    pub locks: Option<Value>,
    pub asset: Option<String>,
}

impl CashuOffer {
    pub fn new<P, S1, S2>(price: P, pay_to: S1, resource: S2, network: Network) -> Self
    where
        P: Into<Price>,
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            price: price.into(),
            pay_to: pay_to.into(),
            resource: resource.into(),
            network,
            description: String::new(),
            mime_type: DEFAULT_MIME_TYPE.into(),
            max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
            output_schema: None,
            mints: Vec::new(),
            unit: "sat".into(),
            keyset_ids: Vec::new(),
            facilitator_url: None,
            locks: None,
            asset: None,
        }
    }

    pub fn with_mint<S: Into<String>>(mut self, mint: S) -> Self {
        self.mints.push(mint.into());
        self
    }

    pub fn with_keyset_id<S: Into<String>>(mut self, keyset_id: S) -> Self {
        self.keyset_ids.push(keyset_id.into());
        self
    }

    pub fn with_facilitator_url<S: Into<String>>(mut self, url: S) -> Self {
        self.facilitator_url = Some(url.into());
        self
    }

    pub fn with_locks(mut self, locks: Value) -> Self {
        self.locks = Some(locks);
        self
    }

    fn satoshi_amount(&self) -> Result<TokenAmount, X402Error> {
        match &self.price {
            Price::Money(amount) => {
                if !amount.is_integer() {
                    return Err(X402Error::validation(
                        "cashu-token price must be a whole number of satoshis",
                    ));
                }
                // Satoshis are already atomic; no decimal scaling applies.
                amount
                    .as_token_amount(0)
                    .map_err(|e| X402Error::validation(format!("Invalid satoshi amount: {e}")))
            }
            Price::Token { .. } => Err(X402Error::validation(
                "cashu-token scheme expects a numeric satoshi price, not a token amount",
            )),
        }
    }
}

/// Build `cashu-token` payment requirements from a Cashu offer.
pub fn create_cashu_payment_requirements(
    offer: CashuOffer,
) -> Result<PaymentRequirements, X402Error> {
    let amount = offer.satoshi_amount()?;

    let mut mints = offer.mints.clone();
    if mints.is_empty() {
        if let Some(default_mint) = default_cashu_mint(offer.network) {
            mints.push(default_mint.to_string());
        }
    }
    if mints.is_empty() {
        return Err(X402Error::validation(format!(
            "A mint URL must be provided for cashu-token when network {} has no default mint",
            offer.network
        )));
    }

    let pay_to = MixedAddress::new(offer.pay_to.as_str())
        .map_err(|e| X402Error::validation(format!("Invalid pay_to address: {e}")))?;
    let asset = offer
        .asset
        .map(MixedAddress::new)
        .transpose()
        .map_err(|e| X402Error::validation(format!("Invalid asset identifier: {e}")))?;

    let mut extra = serde_json::Map::new();
    extra.insert("mints".into(), json!(mints));
    extra.insert("unit".into(), json!(offer.unit));
    if !offer.keyset_ids.is_empty() {
        extra.insert("keysetIds".into(), json!(offer.keyset_ids));
    }
    if let Some(facilitator_url) = offer.facilitator_url {
        extra.insert("facilitatorUrl".into(), json!(facilitator_url));
    }
    if let Some(locks) = offer.locks {
        extra.insert("nut10".into(), locks);
    }

    Ok(PaymentRequirements {
        scheme: Scheme::CashuToken,
        network: offer.network,
        max_amount_required: amount,
        resource: offer.resource,
        description: offer.description,
        mime_type: offer.mime_type,
        output_schema: offer.output_schema,
        pay_to,
        max_timeout_seconds: offer.max_timeout_seconds,
        asset,
        extra: Some(Value::Object(extra)),
    })
}

/// Build `exact` payment requirements on the Spark network.
///
/// Spark settlement is external to the engine, so the builder only validates
/// the receiver and amount; any mint or network metadata the caller supplies
/// travels in `extra` untouched.
pub fn create_spark_payment_requirements(
    amount: TokenAmount,
    pay_to: &str,
    resource: &str,
    extra: Option<Value>,
) -> Result<PaymentRequirements, X402Error> {
    let pay_to = MixedAddress::new(pay_to)
        .map_err(|e| X402Error::validation(format!("Invalid pay_to address: {e}")))?;

    Ok(PaymentRequirements {
        scheme: Scheme::Exact,
        network: Network::Spark,
        max_amount_required: amount,
        resource: resource.to_string(),
        description: String::new(),
        mime_type: DEFAULT_MIME_TYPE.into(),
        output_schema: None,
        pay_to,
        max_timeout_seconds: DEFAULT_MAX_TIMEOUT_SECONDS,
        asset: None,
        extra,
    })
}
