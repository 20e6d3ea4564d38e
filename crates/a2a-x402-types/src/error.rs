//! Protocol error taxonomy and stable error codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// Errors raised by the x402 protocol engine.
///
/// Four kinds cover the failure surface: malformed task/message metadata,
/// payload or requirement schema violations, facilitator-reported payment
/// failures, and state-machine violations. The payment-required interrupt is
/// deliberately not part of this enum; it is a control-flow signal, not an
/// error.
#[derive(Debug, thiserror::Error)]
pub enum X402Error {
    /// Malformed task or message metadata.
    #[error("message error: {0}")]
    Message(String),
    /// Payload or requirement schema violation, or a budget breach.
    #[error("validation error: {0}")]
    Validation(String),
    /// Facilitator-reported settlement or verification failure.
    #[error("payment error: {0}")]
    Payment(String),
    /// Attempted transition not allowed by the payment state machine.
    #[error("state error: {0}")]
    State(String),
}

impl X402Error {
    pub fn message<S: Into<String>>(msg: S) -> Self {
        X402Error::Message(msg.into())
    }

    pub fn validation<S: Into<String>>(msg: S) -> Self {
        X402Error::Validation(msg.into())
    }

    pub fn payment<S: Into<String>>(msg: S) -> Self {
        X402Error::Payment(msg.into())
    }

    pub fn state<S: Into<String>>(msg: S) -> Self {
        X402Error::State(msg.into())
    }

    /// Map to the stable error code carried in task metadata, where the
    /// taxonomy pins one down.
    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            X402Error::Validation(_) => Some(ErrorCode::InvalidSignature),
            X402Error::Payment(_) => Some(ErrorCode::SettlementFailed),
            X402Error::Message(_) | X402Error::State(_) => None,
        }
    }
}

/// Stable error codes recorded under `x402.payment.error` on failed tasks.
///
/// The wire strings are fixed; exactly these seven exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InsufficientFunds,
    InvalidSignature,
    ExpiredPayment,
    DuplicateNonce,
    NetworkMismatch,
    InvalidAmount,
    SettlementFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorCode::InvalidSignature => "INVALID_SIGNATURE",
            ErrorCode::ExpiredPayment => "EXPIRED_PAYMENT",
            ErrorCode::DuplicateNonce => "DUPLICATE_NONCE",
            ErrorCode::NetworkMismatch => "NETWORK_MISMATCH",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::SettlementFailed => "SETTLEMENT_FAILED",
        }
    }

    /// All defined error codes.
    pub fn all() -> &'static [ErrorCode] {
        &[
            ErrorCode::InsufficientFunds,
            ErrorCode::InvalidSignature,
            ErrorCode::ExpiredPayment,
            ErrorCode::DuplicateNonce,
            ErrorCode::NetworkMismatch,
            ErrorCode::InvalidAmount,
            ErrorCode::SettlementFailed,
        ]
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown error code string.
#[derive(Debug, thiserror::Error)]
#[error("Unknown error code: {0}")]
pub struct UnknownErrorCode(pub String);

impl FromStr for ErrorCode {
    type Err = UnknownErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ErrorCode::all()
            .iter()
            .find(|code| code.as_str() == s)
            .copied()
            .ok_or_else(|| UnknownErrorCode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exactly_seven_codes_with_fixed_strings() {
        let strings: Vec<&str> = ErrorCode::all().iter().map(|c| c.as_str()).collect();
        assert_eq!(
            strings,
            vec![
                "INSUFFICIENT_FUNDS",
                "INVALID_SIGNATURE",
                "EXPIRED_PAYMENT",
                "DUPLICATE_NONCE",
                "NETWORK_MISMATCH",
                "INVALID_AMOUNT",
                "SETTLEMENT_FAILED",
            ]
        );
    }

    #[test]
    fn codes_round_trip_through_serde_and_fromstr() {
        for code in ErrorCode::all() {
            let json = serde_json::to_string(code).unwrap();
            assert_eq!(json, format!("\"{code}\""));
            assert_eq!(code.as_str().parse::<ErrorCode>().unwrap(), *code);
        }
        assert!("UNKNOWN_ERROR".parse::<ErrorCode>().is_err());
    }

    #[test]
    fn taxonomy_maps_to_codes() {
        assert_eq!(
            X402Error::validation("too expensive").error_code(),
            Some(ErrorCode::InvalidSignature)
        );
        assert_eq!(
            X402Error::payment("settle reverted").error_code(),
            Some(ErrorCode::SettlementFailed)
        );
        assert_eq!(X402Error::state("bad transition").error_code(), None);
    }
}
