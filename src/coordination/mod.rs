//! Swap coordination
//!
//! The coordination layer:
//! 1. Validates the request and fetches a quote
//! 2. Generates secrets and builds the hash lock
//! 3. Signs and submits the order
//! 4. Monitors fills and reveals secrets until the order settles

pub mod context;
pub mod engine;
pub mod monitor;


pub use context::{SwapContext, SwapRequest, SwapResult};
pub use engine::{SwapCoordinator, SwapHandle};
pub use monitor::{FillMonitor, FillTracker, MonitorCanceller, MonitorHandle, MonitorOutcome};
