//! Payment middleware: executors that wrap a business agent.
//!
//! [`server::X402ServerExecutor`] wraps a merchant's agent and drives the
//! verify → execute → settle pipeline; [`client::X402ClientExecutor`] wraps a
//! consumer's agent and auto-signs when the merchant demands payment.

pub mod client;
pub mod server;

pub use client::X402ClientExecutor;
pub use server::X402ServerExecutor;
