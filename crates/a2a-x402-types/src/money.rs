//! Human-readable prices and atomic token amounts.
//!
//! Merchants quote prices in human form (`"$1.50"`, `0.10`) or as explicit
//! token amounts. On the wire every amount is a decimal string of atomic
//! units, so this module provides the conversion between the two worlds.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

use crate::network::TokenDeployment;

/// A monetary amount as merchants write it: `"$1.50"`, `"0.10"`, `"1,000"`.
///
/// Held as an exact decimal. Scaling to atomic units happens against a
/// specific token's decimal places via [`MoneyAmount::as_token_amount`].
#[derive(Debug, Clone, PartialEq)]
pub struct MoneyAmount(pub Decimal);

/// Errors produced when reading a price or scaling it to token units.
#[derive(Debug, thiserror::Error)]
pub enum MoneyAmountParseError {
    /// The input has no readable number in it.
    #[error("not a monetary amount: {0:?}")]
    NotANumber(String),
    /// Prices are unsigned; a leading minus is rejected outright.
    #[error("monetary amounts cannot be negative")]
    Negative,
    /// The amount is finer-grained than the token can represent.
    #[error("amount carries more precision than the token's {decimals} decimals")]
    PrecisionLoss { decimals: u32 },
    /// The scaled amount does not fit in 64-bit atomic units.
    #[error("amount does not fit in atomic token units")]
    Overflow,
}

impl MoneyAmount {
    /// Read a price from its human form.
    ///
    /// A leading currency marker (`$`, `€`, `USD `) and digit-grouping commas
    /// are tolerated; what remains must be a plain unsigned decimal number.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let not_a_number = || MoneyAmountParseError::NotANumber(input.to_string());
        let trimmed = input.trim();
        // The currency marker is whatever precedes the number itself.
        let start = trimmed
            .find(|c: char| c.is_ascii_digit() || c == '-' || c == '.')
            .ok_or_else(|| not_a_number())?;
        let number = &trimmed[start..];
        if number.starts_with('-') {
            return Err(MoneyAmountParseError::Negative);
        }
        let digits: String = number.chars().filter(|c| *c != ',').collect();
        let value = Decimal::from_str(&digits).map_err(|_| not_a_number())?;
        Ok(MoneyAmount(value))
    }

    /// Whether the amount has no fractional part (after normalization).
    pub fn is_integer(&self) -> bool {
        self.0.normalize().scale() == 0
    }

    /// Convert to an atomic [`TokenAmount`] for a token with the given number
    /// of decimals. Fails when the input carries more precision than the
    /// token supports or the scaled value overflows.
    pub fn as_token_amount(&self, decimals: u32) -> Result<TokenAmount, MoneyAmountParseError> {
        let normalized = self.0.normalize();
        let scale = normalized.scale();
        if scale > decimals {
            return Err(MoneyAmountParseError::PrecisionLoss { decimals });
        }
        let mantissa = normalized.mantissa().unsigned_abs();
        let scaled = mantissa
            .checked_mul(10u128.pow(decimals - scale))
            .ok_or(MoneyAmountParseError::Overflow)?;
        let atomic = u64::try_from(scaled).map_err(|_| MoneyAmountParseError::Overflow)?;
        Ok(TokenAmount(atomic))
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s)
    }
}

impl TryFrom<&str> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        MoneyAmount::from_str(value)
    }
}

impl From<u64> for MoneyAmount {
    fn from(value: u64) -> Self {
        MoneyAmount(Decimal::from(value))
    }
}

impl TryFrom<f64> for MoneyAmount {
    type Error = MoneyAmountParseError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let decimal = Decimal::from_f64(value)
            .ok_or_else(|| MoneyAmountParseError::NotANumber(value.to_string()))?;
        if decimal.is_sign_negative() {
            return Err(MoneyAmountParseError::Negative);
        }
        Ok(MoneyAmount(decimal))
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// An amount of atomic token units (e.g., 1 USDC = `1_000_000`).
///
/// Parsed from and serialized to a decimal string to prevent accidental loss
/// of precision in JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub u64);

impl TokenAmount {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)
            .and_then(|string| string.parse::<u64>().map_err(Error::custom))
            .map(TokenAmount)
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        TokenAmount(value)
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A price as quoted by a merchant: either a human currency amount settled in
/// the network's default asset (USDC), or an explicit token amount.
#[derive(Debug, Clone, PartialEq)]
pub enum Price {
    Money(MoneyAmount),
    Token {
        amount: TokenAmount,
        deployment: TokenDeployment,
    },
}

impl From<MoneyAmount> for Price {
    fn from(value: MoneyAmount) -> Self {
        Price::Money(value)
    }
}

impl TryFrom<&str> for Price {
    type Error = MoneyAmountParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Ok(Price::Money(MoneyAmount::parse(value)?))
    }
}

impl TryFrom<f64> for Price {
    type Error = MoneyAmountParseError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Ok(Price::Money(MoneyAmount::try_from(value)?))
    }
}

impl From<(TokenAmount, TokenDeployment)> for Price {
    fn from((amount, deployment): (TokenAmount, TokenDeployment)) -> Self {
        Price::Token { amount, deployment }
    }
}
