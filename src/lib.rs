//! Swap Coordinator - maker-side client for hash-locked cross-chain swaps
//!
//! Turns a relayer quote into a signed, hash-locked order, submits it and
//! reveals each secret once a resolver has locked the matching fill.

pub mod chain;
pub mod config;
pub mod coordination;
pub mod error;
pub mod events;
pub mod metrics;
pub mod order;
pub mod relayer;
pub mod secrets;

pub use coordination::{SwapCoordinator, SwapHandle, SwapRequest, SwapResult};
pub use error::{CoordinatorError, CoordinatorResult, StageFailure, SwapStage};
