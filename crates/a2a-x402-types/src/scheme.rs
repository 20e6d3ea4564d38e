//! Payment scheme identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

/// Enumerates the payment schemes understood by this engine.
///
/// Together with [`crate::network::Network`], the scheme selects the shape of
/// the inner payment payload. `exact` means the transferred amount must match
/// the requirement exactly; `cashu-token` carries a bundle of ecash tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    #[serde(rename = "exact")]
    Exact,
    #[serde(rename = "cashu-token")]
    CashuToken,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Exact => "exact",
            Scheme::CashuToken => "cashu-token",
        }
    }
}

impl Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown scheme identifier.
#[derive(Debug, thiserror::Error)]
#[error("Unknown payment scheme: {0}")]
pub struct UnknownScheme(pub String);

impl FromStr for Scheme {
    type Err = UnknownScheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Scheme::Exact),
            "cashu-token" => Ok(Scheme::CashuToken),
            other => Err(UnknownScheme(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_wire_names() {
        assert_eq!(serde_json::to_string(&Scheme::Exact).unwrap(), "\"exact\"");
        assert_eq!(
            serde_json::to_string(&Scheme::CashuToken).unwrap(),
            "\"cashu-token\""
        );
    }

    #[test]
    fn parses_from_wire_names() {
        assert_eq!("exact".parse::<Scheme>().unwrap(), Scheme::Exact);
        assert_eq!("cashu-token".parse::<Scheme>().unwrap(), Scheme::CashuToken);
        assert!("permit2".parse::<Scheme>().is_err());
    }
}
