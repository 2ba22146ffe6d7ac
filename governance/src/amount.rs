//! Fixed-point token amounts.
//!
//! Balances and tallies are kept as raw `uint256` base units. Conversion to
//! and from human-readable decimals happens only at the edges.

use std::fmt;

use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Decimal exponent of the governance token.
pub const TOKEN_DECIMALS: usize = 18;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("malformed amount {0:?}")]
    Malformed(String),
    #[error("invalid character {0:?} in amount")]
    InvalidDigit(char),
    #[error("amount has more than {max} decimal places")]
    TooManyDecimals { max: usize },
    #[error("amount does not fit in 256 bits")]
    Overflow,
}

/// Non-negative amount of token base units.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(U256);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(U256([0, 0, 0, 0]));

    pub fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    /// `tokens * 10^18` base units.
    pub fn from_tokens(tokens: u64) -> Self {
        Self(U256::from(tokens) * U256::exp10(TOKEN_DECIMALS))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn checked_add(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(other.0).map(TokenAmount)
    }

    pub fn checked_sub(self, other: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_sub(other.0).map(TokenAmount)
    }

    /// Parse a human decimal string into base units, scaling by `10^decimals`.
    ///
    /// Trailing fractional zeros are ignored; any other precision beyond
    /// `decimals` is rejected rather than rounded.
    pub fn parse_units(input: &str, decimals: usize) -> Result<Self, AmountError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => {
                if frac.is_empty() {
                    return Err(AmountError::Malformed(s.to_string()));
                }
                (whole, frac)
            }
            None => (s, ""),
        };
        if whole.is_empty() {
            return Err(AmountError::Malformed(s.to_string()));
        }
        if let Some(bad) = whole.chars().chain(frac.chars()).find(|c| !c.is_ascii_digit()) {
            return Err(AmountError::InvalidDigit(bad));
        }
        let frac = frac.trim_end_matches('0');
        if frac.len() > decimals {
            return Err(AmountError::TooManyDecimals { max: decimals });
        }
        let digits = format!("{whole}{frac:0<decimals$}");
        U256::from_dec_str(&digits)
            .map(TokenAmount)
            .map_err(|_| AmountError::Overflow)
    }

    /// Render with `decimals` fractional digits, trimming trailing zeros but
    /// always keeping one (`"1.0"`, `"0.5"`).
    pub fn format_units(&self, decimals: usize) -> String {
        let (whole, frac) = self.0.div_mod(U256::exp10(decimals));
        let padded = format!("{:0>decimals$}", frac.to_string());
        let trimmed = padded.trim_end_matches('0');
        let frac = if trimmed.is_empty() { "0" } else { trimmed };
        format!("{whole}.{frac}")
    }

    /// Whole tokens rounded half away from zero.
    pub fn whole_tokens_rounded(&self) -> U256 {
        let base = U256::exp10(TOKEN_DECIMALS);
        let (whole, rem) = self.0.div_mod(base);
        if rem >= base / 2 {
            whole + U256::one()
        } else {
            whole
        }
    }
}

impl From<u64> for TokenAmount {
    fn from(raw: u64) -> Self {
        Self(U256::from(raw))
    }
}

impl From<u128> for TokenAmount {
    fn from(raw: u128) -> Self {
        Self(U256::from(raw))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format_units(TOKEN_DECIMALS))
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAmount({})", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(TokenAmount::from(n)),
            Raw::Text(s) => {
                let parsed = match s.strip_prefix("0x") {
                    Some(hex) => U256::from_str_radix(hex, 16).ok(),
                    None => U256::from_dec_str(&s).ok(),
                };
                parsed
                    .map(TokenAmount)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid token amount {s:?}")))
            }
        }
    }
}
