//! Address and hash newtypes used across the protocol.
//!
//! Addresses appear in three shapes: typed EVM addresses, transaction hashes,
//! and "mixed" receiver identifiers that may be an EVM address, a Sui coin
//! type, a Cashu receiver, or any other scheme-specific identifier.

use alloy_primitives::Address;
use alloy_primitives::hex::FromHex;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;

/// Wrapper around [`alloy_primitives::Address`], providing display and
/// serialization support. Used for typed Ethereum address handling wherever
/// the scheme guarantees an EVM party.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmAddress(pub Address);

impl Display for EvmAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Address> for EvmAddress {
    fn from(address: Address) -> Self {
        EvmAddress(address)
    }
}

impl From<EvmAddress> for Address {
    fn from(address: EvmAddress) -> Self {
        address.0
    }
}

impl From<EvmAddress> for MixedAddress {
    fn from(address: EvmAddress) -> Self {
        MixedAddress(format!("{address}"))
    }
}

/// Errors produced when validating or converting a [`MixedAddress`].
#[derive(Debug, thiserror::Error)]
pub enum MixedAddressError {
    #[error("Invalid address format: {0:?}")]
    InvalidFormat(String),
    #[error("Not an EVM address")]
    NotEvm(#[source] alloy_primitives::hex::FromHexError),
}

/// A receiver identifier that is either an EVM address (`0x...`) or an opaque
/// off-chain identifier (Sui coin type, Cashu receiver, Spark address).
///
/// Validation is intentionally loose for the off-chain form: any printable
/// ASCII string up to 256 characters is accepted. Scheme-specific code decides
/// whether the identifier is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MixedAddress(String);

static EVM_ADDRESS_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("Invalid EVM address regex"));

impl MixedAddress {
    pub fn new<S: Into<String>>(value: S) -> Result<Self, MixedAddressError> {
        let value = value.into();
        let valid = !value.is_empty()
            && value.len() <= 256
            && value.chars().all(|c| c.is_ascii_graphic());
        if valid {
            Ok(MixedAddress(value))
        } else {
            Err(MixedAddressError::InvalidFormat(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier has the `0x` + 40 hex EVM shape.
    pub fn is_evm(&self) -> bool {
        EVM_ADDRESS_REGEX.is_match(&self.0)
    }

    /// Parse the identifier as a typed EVM address.
    pub fn as_evm(&self) -> Result<Address, MixedAddressError> {
        Address::from_hex(&self.0).map_err(MixedAddressError::NotEvm)
    }
}

impl Display for MixedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for MixedAddress {
    type Error = MixedAddressError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        MixedAddress::new(value)
    }
}

impl From<Address> for MixedAddress {
    fn from(address: Address) -> Self {
        MixedAddress(format!("{address}"))
    }
}

impl<'de> Deserialize<'de> for MixedAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        MixedAddress::new(s).map_err(Error::custom)
    }
}

/// A 32-byte EVM transaction hash, encoded as 0x-prefixed hex string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHash(pub [u8; 32]);

static TX_HASH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("Invalid transaction hash regex"));

impl<'de> Deserialize<'de> for TransactionHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;

        if !TX_HASH_REGEX.is_match(&s) {
            return Err(Error::custom("Invalid transaction hash format"));
        }

        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|_| Error::custom("Invalid hex in transaction hash"))?;

        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| Error::custom("Transaction hash must be exactly 32 bytes"))?;

        Ok(TransactionHash(array))
    }
}

impl Serialize for TransactionHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let hex_string = format!("0x{}", hex::encode(self.0));
        serializer.serialize_str(&hex_string)
    }
}

impl Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
