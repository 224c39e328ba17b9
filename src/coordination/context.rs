//! Per-attempt swap state and results

use crate::config::SwapConfig;
use crate::error::{StageFailure, SwapStage};
use crate::order::{OrderSignature, SignableOrder};
use crate::relayer::{OrderHash, Quote, QuoteParams};
use crate::secrets::HashLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What the maker asked for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub src_token_address: String,
    pub dst_token_address: String,
    /// Integer amount in the source token's smallest unit
    pub amount: String,
    /// Preset to use; the quote's recommended preset when absent
    pub preset: Option<String>,
}

impl From<SwapConfig> for SwapRequest {
    fn from(config: SwapConfig) -> Self {
        Self {
            src_chain_id: config.src_chain_id,
            dst_chain_id: config.dst_chain_id,
            src_token_address: config.src_token_address,
            dst_token_address: config.dst_token_address,
            amount: config.amount,
            preset: config.preset,
        }
    }
}

/// Everything one swap attempt owns
///
/// Built fresh for every attempt and never shared. A restart gets a new
/// context, so a quote can never be paired with another attempt's secrets.
/// Each stage fills its field as it completes, so on failure the context
/// shows how far the attempt got. The secrets themselves move into the fill
/// monitor once the order is submitted.
pub struct SwapContext {
    pub attempt_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub request: SwapRequest,
    pub params: Option<QuoteParams>,
    pub quote: Option<Quote>,
    pub hash_lock: Option<HashLock>,
    pub order: Option<SignableOrder>,
    pub signature: Option<OrderSignature>,
    pub order_hash: Option<OrderHash>,
}

impl SwapContext {
    pub fn new(request: SwapRequest) -> Self {
        Self {
            attempt_id: Uuid::new_v4(),
            started_at: Utc::now(),
            request,
            params: None,
            quote: None,
            hash_lock: None,
            order: None,
            signature: None,
            order_hash: None,
        }
    }
}

impl fmt::Debug for SwapContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SwapContext")
            .field("attempt_id", &self.attempt_id)
            .field("started_at", &self.started_at)
            .field("request", &self.request)
            .field("quote_id", &self.quote.as_ref().map(|q| &q.quote_id))
            .field("hash_lock", &self.hash_lock.as_ref().map(|l| l.value()))
            .field("order_hash", &self.order_hash)
            .finish()
    }
}

/// Terminal record of a swap attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SwapResult {
    Completed {
        order_hash: OrderHash,
        revealed_secret_count: usize,
    },
    Expired {
        order_hash: OrderHash,
    },
    Failed {
        order_hash: Option<OrderHash>,
        stage: SwapStage,
        reason: String,
        /// A fresh attempt (new quote, new secrets) may succeed
        retryable: bool,
    },
    /// Monitoring was cancelled by the caller
    Cancelled {
        order_hash: OrderHash,
        revealed_secret_count: usize,
    },
}

impl SwapResult {
    pub fn failed(order_hash: Option<OrderHash>, failure: &StageFailure) -> Self {
        SwapResult::Failed {
            order_hash,
            stage: failure.stage,
            reason: failure.error.to_string(),
            retryable: failure.is_retryable(),
        }
    }

    pub fn order_hash(&self) -> Option<&OrderHash> {
        match self {
            SwapResult::Completed { order_hash, .. }
            | SwapResult::Expired { order_hash }
            | SwapResult::Cancelled { order_hash, .. } => Some(order_hash),
            SwapResult::Failed { order_hash, .. } => order_hash.as_ref(),
        }
    }

    /// Label used in metrics and logs
    pub fn outcome(&self) -> &'static str {
        match self {
            SwapResult::Completed { .. } => "completed",
            SwapResult::Expired { .. } => "expired",
            SwapResult::Failed { .. } => "failed",
            SwapResult::Cancelled { .. } => "cancelled",
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, SwapResult::Completed { .. })
    }
}

impl fmt::Display for SwapResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapResult::Completed {
                order_hash,
                revealed_secret_count,
            } => write!(
                f,
                "order {} completed, {} secret(s) revealed",
                order_hash, revealed_secret_count
            ),
            SwapResult::Expired { order_hash } => write!(f, "order {} expired", order_hash),
            SwapResult::Failed {
                stage,
                reason,
                retryable,
                ..
            } => write!(
                f,
                "failed at {} stage ({}): {}",
                stage,
                if *retryable { "retryable" } else { "permanent" },
                reason
            ),
            SwapResult::Cancelled {
                order_hash,
                revealed_secret_count,
            } => write!(
                f,
                "monitoring of order {} cancelled after {} secret(s) revealed",
                order_hash, revealed_secret_count
            ),
        }
    }
}
