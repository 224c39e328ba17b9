//! Relayer wire types
//!
//! Responses are deserialized into loose wire structs and converted once into
//! typed values; anything malformed is rejected here so the rest of the crate
//! can rely on the shape.

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::order::{ExactAmount, ExactValues};
use crate::secrets::{SecretHash, MAX_SECRETS};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Parameters of a quote request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteParams {
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub src_token_address: Address,
    pub dst_token_address: Address,
    pub amount: ExactAmount,
    pub wallet_address: Address,
    pub enable_estimate: bool,
}

/// Auction preset offered with a quote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub secrets_count: usize,
    pub auction_duration: u64,
    pub start_auction_in: u64,
    pub auction_start_amount: Option<ExactAmount>,
    pub auction_end_amount: Option<ExactAmount>,
    pub allow_partial_fills: bool,
    pub allow_multiple_fills: bool,
}

/// A validated quote; lives for one swap attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub quote_id: String,
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub src_token_amount: ExactAmount,
    pub dst_token_amount: ExactAmount,
    pub presets: HashMap<String, Preset>,
    pub recommended_preset: String,
    pub exact_values: ExactValues,
}

impl Quote {
    /// Named preset, or the recommended one when `name` is `None`
    pub fn preset(&self, name: Option<&str>) -> CoordinatorResult<&Preset> {
        let name = name.unwrap_or(&self.recommended_preset);
        self.presets.get(name).ok_or_else(|| {
            CoordinatorError::QuoteUnavailable(format!(
                "quote {} has no preset '{}'",
                self.quote_id, name
            ))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresetResponse {
    secrets_count: Option<u64>,
    #[serde(default)]
    auction_duration: u64,
    #[serde(default)]
    start_auction_in: u64,
    auction_start_amount: Option<ExactAmount>,
    auction_end_amount: Option<ExactAmount>,
    #[serde(default)]
    allow_partial_fills: bool,
    #[serde(default)]
    allow_multiple_fills: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuoteResponse {
    quote_id: Option<String>,
    src_chain_id: Option<u64>,
    dst_chain_id: Option<u64>,
    src_token_amount: ExactAmount,
    dst_token_amount: ExactAmount,
    #[serde(default)]
    presets: HashMap<String, PresetResponse>,
    recommended_preset: Option<String>,
    exact_values: Option<ExactValues>,
}

impl QuoteResponse {
    /// Validate the response shape against the request that produced it
    pub(crate) fn into_quote(self, params: &QuoteParams) -> CoordinatorResult<Quote> {
        let unavailable = |msg: String| CoordinatorError::QuoteUnavailable(msg);

        let quote_id = self
            .quote_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| unavailable("quote has no id".into()))?;

        let src_chain_id = self.src_chain_id.unwrap_or(params.src_chain_id);
        let dst_chain_id = self.dst_chain_id.unwrap_or(params.dst_chain_id);
        if src_chain_id != params.src_chain_id || dst_chain_id != params.dst_chain_id {
            return Err(unavailable(format!(
                "quote {} is for chains {}->{}, requested {}->{}",
                quote_id, src_chain_id, dst_chain_id, params.src_chain_id, params.dst_chain_id
            )));
        }

        if self.presets.is_empty() {
            return Err(unavailable(format!("quote {} has no presets", quote_id)));
        }

        let mut presets = HashMap::with_capacity(self.presets.len());
        for (name, preset) in self.presets {
            let secrets_count = match preset.secrets_count {
                Some(count) if count >= 1 && count <= MAX_SECRETS as u64 => count as usize,
                other => {
                    return Err(unavailable(format!(
                        "preset '{}' has invalid secretsCount {:?}",
                        name, other
                    )))
                }
            };
            presets.insert(
                name,
                Preset {
                    secrets_count,
                    auction_duration: preset.auction_duration,
                    start_auction_in: preset.start_auction_in,
                    auction_start_amount: preset.auction_start_amount,
                    auction_end_amount: preset.auction_end_amount,
                    allow_partial_fills: preset.allow_partial_fills,
                    allow_multiple_fills: preset.allow_multiple_fills,
                },
            );
        }

        let recommended_preset = self
            .recommended_preset
            .ok_or_else(|| unavailable(format!("quote {} has no recommended preset", quote_id)))?;
        if !presets.contains_key(&recommended_preset) {
            return Err(unavailable(format!(
                "recommended preset '{}' missing from quote {}",
                recommended_preset, quote_id
            )));
        }

        let exact_values = self
            .exact_values
            .ok_or_else(|| unavailable(format!("quote {} carries no exact values", quote_id)))?;
        if exact_values.making_amount.value().is_zero() {
            return Err(unavailable(format!("quote {} has zero making amount", quote_id)));
        }

        Ok(Quote {
            quote_id,
            src_chain_id,
            dst_chain_id,
            src_token_amount: self.src_token_amount,
            dst_token_amount: self.dst_token_amount,
            presets,
            recommended_preset,
            exact_values,
        })
    }
}

/// Relayer-issued identifier of a submitted order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderHash(String);

impl OrderHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signed order plus hash-lock material
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOrderRequest {
    pub order: Value,
    pub src_chain_id: u64,
    pub signature: String,
    pub extension: String,
    pub quote_id: String,
    pub hash_lock: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub merkle_leaves: Vec<String>,
    pub secret_hashes: Vec<SecretHash>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubmitOrderResponse {
    pub order_hash: Option<String>,
}

/// Order lifecycle as reported by the relayer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    PartiallyFilled,
    Executed,
    Expired,
    Refunding,
    Refunded,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::PartiallyFilled => "partially-filled",
            OrderStatus::Executed => "executed",
            OrderStatus::Expired => "expired",
            OrderStatus::Refunding => "refunding",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderStatusResponse {
    pub status: OrderStatus,
}

/// A fill whose resolver has locked funds and awaits the secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyFill {
    pub idx: usize,
    #[serde(default)]
    pub src_escrow_deploy_tx_hash: Option<String>,
    #[serde(default)]
    pub dst_escrow_deploy_tx_hash: Option<String>,
}

impl ReadyFill {
    pub fn new(idx: usize) -> Self {
        Self {
            idx,
            src_escrow_deploy_tx_hash: None,
            dst_escrow_deploy_tx_hash: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReadyFillsResponse {
    #[serde(default)]
    pub fills: Vec<ReadyFill>,
}

#[derive(Serialize)]
pub(crate) struct SecretSubmission<'a> {
    pub idx: usize,
    pub secret: &'a str,
}
