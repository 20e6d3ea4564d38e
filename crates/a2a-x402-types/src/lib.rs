//! Core data model for the x402 payment extension to the A2A agent protocol.
//!
//! This crate defines the wire format shared by merchants, clients, and
//! facilitators in an A2A x402 payment flow: payment requirements offered by a
//! merchant, signed payment payloads produced by a client, and the
//! verification/settlement responses returned by a facilitator.
//!
//! It is transport-agnostic: nothing in here knows about A2A tasks or the
//! middleware that drives the payment state machine. That logic lives in the
//! `a2a-x402` crate.
//!
//! # Wire Format
//!
//! All types serialize to JSON with camelCase field names for compatibility
//! with existing x402 deployments. Numeric amounts and timestamps travel as
//! decimal strings to avoid precision loss in JavaScript consumers.
//!
//! # Payment Schemes
//!
//! The payload is a tagged union on `(scheme, network)`:
//!
//! - `exact` on an EVM network - an EIP-3009 `transferWithAuthorization`
//!   signed with EIP-712 ([`ExactEvmPayload`])
//! - `exact` on `spark` - a reference to an externally completed Spark,
//!   Lightning, or Bitcoin L1 transfer ([`ExactSparkPayload`])
//! - `cashu-token` - a bundle of Chaumian ecash tokens
//!   ([`CashuPaymentPayload`])

pub mod address;
pub mod error;
pub mod money;
pub mod network;
pub mod payload;
pub mod requirements;
pub mod responses;
pub mod scheme;
pub mod timestamp;
pub mod util;

pub use address::{EvmAddress, MixedAddress, MixedAddressError, TransactionHash};
pub use error::{ErrorCode, X402Error};
pub use money::{MoneyAmount, MoneyAmountParseError, Price, TokenAmount};
pub use network::{Eip712Meta, Network, NetworkFamily, TokenDeployment, USDCDeployment};
pub use payload::{
    CashuPaymentPayload, CashuProof, CashuToken, Eip3009Authorization, EvmSignature,
    ExactEvmPayload, ExactPaymentPayload, ExactSparkPayload, HexEncodedNonce, PaymentPayload,
    SparkPaymentType, TransferWithAuthorization, X402Version,
};
pub use requirements::{PaymentRequiredResponse, PaymentRequirements, SettleRequest, VerifyRequest};
pub use responses::{SettleResponse, VerifyResponse};
pub use scheme::Scheme;
pub use timestamp::UnixTimestamp;
pub use util::Base64Bytes;
