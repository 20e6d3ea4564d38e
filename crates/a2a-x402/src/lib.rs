//! x402 payment extension for A2A agents.
//!
//! Two autonomous agents - a merchant and a client - exchange task-oriented
//! messages; when the merchant requires payment before rendering a service,
//! both sides engage a four-phase protocol (request → requirement →
//! authorization → settlement) layered on the A2A task state machine.
//!
//! # Architecture
//!
//! - [`a2a`] - the transport vocabulary the middleware is built against:
//!   tasks, messages, the event queue, and the [`a2a::AgentExecutor`] trait
//! - [`state`] - the payment state machine and metadata codec
//!   ([`state::X402Utils`]), sole writer of the reserved `x402.payment.*`
//!   keys
//! - [`merchant`] - requirement builders per scheme
//! - [`exception`] - [`exception::PaymentRequiredException`], the typed
//!   interrupt business logic raises to demand payment
//! - [`wallet`] - client-side requirement selection and signing (EIP-3009
//!   over EIP-712), plus the Spark header codec and Cashu wrapping
//! - [`protocol`] / [`facilitator`] - the [`protocol::Facilitator`]
//!   capability and an HTTP client for remote facilitators
//! - [`executors`] - the server and client middleware
//! - [`extension`] - agent-card declaration and HTTP activation handshake
//!
//! # Server side
//!
//! Wrap a business executor; raise a payment demand from anywhere inside it:
//!
//! ```ignore
//! let exec = X402ServerExecutor::new(my_agent, facilitator, X402ExtensionConfig::default());
//! // ... in the business agent:
//! return Err(PaymentRequiredException::for_service(
//!     Price::try_from("$1.00")?,
//!     "0xMerchant...",
//!     "/premium-feature",
//!     Network::Base,
//!     None,
//!     None,
//! )?
//! .into());
//! ```
//!
//! # Client side
//!
//! ```ignore
//! let exec = X402ClientExecutor::new(my_client, X402ExtensionConfig::default(), signer)
//!     .with_max_value(TokenAmount(5_000_000));
//! ```

pub mod a2a;
pub mod config;
pub mod exception;
pub mod executors;
pub mod extension;
pub mod facilitator;
pub mod merchant;
pub mod protocol;
pub mod state;
pub mod wallet;

pub use a2a_x402_types as types;

pub use a2a::{AgentError, AgentExecutor, Event, EventQueue, Message, RequestContext, Task};
pub use config::{X402ExtensionConfig, X402ServerConfig};
pub use exception::PaymentRequiredException;
pub use executors::{X402ClientExecutor, X402ServerExecutor};
pub use extension::{
    X402_EXTENSION_URI, add_extension_activation_header, check_extension_activation,
    get_extension_declaration,
};
pub use facilitator::{FacilitatorClient, FacilitatorConfig};
pub use merchant::{
    CashuOffer, PriceTag, create_cashu_payment_requirements, create_payment_requirements,
    create_spark_payment_requirements,
};
pub use protocol::{Facilitator, settle_payment, verify_payment};
pub use state::{PaymentStatus, X402Metadata, X402Utils, extract_task_correlation};
pub use wallet::{
    WalletError, create_spark_payment_payload, decode_spark_payment_header,
    encode_spark_payment_header, process_cashu_payment, process_payment,
    process_payment_required,
};
