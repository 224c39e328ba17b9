//! Error types for the swap coordinator

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Main error type for the coordinator
#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Chain {chain_id} is not supported")]
    UnsupportedChain { chain_id: u64 },

    #[error("Secret count must be between 1 and 65536, got {count}")]
    InvalidCount { count: usize },

    #[error("Hash lock needs between 1 and 65536 secret hashes, got {count}")]
    InvalidSecretCount { count: usize },

    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    #[error("User rejected the signature request")]
    UserRejectedSignature,

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Order rejected by relayer: {reason}")]
    OrderRejected { reason: String },

    #[error("Relayer unavailable: {0}")]
    RelayerUnavailable(String),

    #[error("Rate limited by relayer")]
    RateLimited,

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Protocol violation on order {order_hash}: {message}")]
    ProtocolViolation { order_hash: String, message: String },

    #[error("Chain read error for chain {chain_id}: {message}")]
    ChainRead { chain_id: u64, message: String },

    #[error("Insufficient allowance for {token}: have {have}, need {need}")]
    InsufficientAllowance {
        token: String,
        have: String,
        need: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    /// Check if waiting (or a fresh attempt) can clear the error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordinatorError::RelayerUnavailable(_)
                | CoordinatorError::RateLimited
                | CoordinatorError::Timeout { .. }
                | CoordinatorError::QuoteUnavailable(_)
                | CoordinatorError::OrderRejected { .. }
                | CoordinatorError::ChainRead { .. }
                | CoordinatorError::InsufficientAllowance { .. }
        )
    }

    /// Errors a single monitor tick may swallow and retry on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CoordinatorError::RelayerUnavailable(_)
                | CoordinatorError::RateLimited
                | CoordinatorError::Timeout { .. }
        )
    }

    /// Check if error should trigger an alert
    pub fn should_alert(&self) -> bool {
        matches!(
            self,
            CoordinatorError::ProtocolViolation { .. }
                | CoordinatorError::Wallet(_)
                | CoordinatorError::Internal(_)
        )
    }
}

/// Result type for coordinator operations
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Lifecycle stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStage {
    Validation,
    Quote,
    Secrets,
    HashLock,
    Approval,
    Signing,
    Submission,
    Monitoring,
}

impl SwapStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStage::Validation => "validation",
            SwapStage::Quote => "quote",
            SwapStage::Secrets => "secrets",
            SwapStage::HashLock => "hash_lock",
            SwapStage::Approval => "approval",
            SwapStage::Signing => "signing",
            SwapStage::Submission => "submission",
            SwapStage::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for SwapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hard failure tagged with the stage that produced it
#[derive(Error, Debug)]
#[error("{stage} stage failed: {error}")]
pub struct StageFailure {
    pub stage: SwapStage,
    #[source]
    pub error: CoordinatorError,
}

impl StageFailure {
    pub fn new(stage: SwapStage, error: CoordinatorError) -> Self {
        Self { stage, error }
    }

    /// A fresh attempt (new quote, new secrets) may succeed
    pub fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

/// Attach a stage to a coordinator result
pub trait AtStage<T> {
    fn at(self, stage: SwapStage) -> Result<T, StageFailure>;
}

impl<T> AtStage<T> for CoordinatorResult<T> {
    fn at(self, stage: SwapStage) -> Result<T, StageFailure> {
        self.map_err(|error| StageFailure::new(stage, error))
    }
}
