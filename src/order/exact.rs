//! Exact values taken from a relayer quote
//!
//! Amounts and other uint256 order fields are parsed once from the relayer's
//! decimal strings and handed on untouched. No arithmetic is exposed: the
//! signed order must carry the relayer's numbers bit for bit.

use crate::error::{CoordinatorError, CoordinatorResult};

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A uint256 kept together with the decimal text it was parsed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactAmount {
    raw: String,
    value: U256,
}

impl ExactAmount {
    /// Parse a base-10 unsigned integer string
    pub fn parse(raw: &str) -> CoordinatorResult<Self> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoordinatorError::InvalidInput(format!(
                "'{}' is not an unsigned integer string",
                raw
            )));
        }

        let value = U256::from_str_radix(raw, 10).map_err(|e| {
            CoordinatorError::InvalidInput(format!("'{}' does not fit in uint256: {}", raw, e))
        })?;

        Ok(Self {
            raw: raw.to_string(),
            value,
        })
    }

    /// Parse an amount that must be strictly positive
    pub fn parse_positive(raw: &str) -> CoordinatorResult<Self> {
        let amount = Self::parse(raw)?;
        if amount.value.is_zero() {
            return Err(CoordinatorError::InvalidInput(
                "amount must be greater than zero".to_string(),
            ));
        }
        Ok(amount)
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for ExactAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for ExactAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for ExactAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ExactAmount::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Order fields the relayer fixes when it prices a quote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactValues {
    pub salt: ExactAmount,
    pub taker_asset: Address,
    pub making_amount: ExactAmount,
    pub taking_amount: ExactAmount,
    pub maker_traits: ExactAmount,
    #[serde(default)]
    pub extension: Bytes,
}
