//! Swap lifecycle events
//!
//! The coordinator broadcasts these to any subscriber (UI bridges, logs,
//! tests). Secret material never appears in an event.

use crate::error::SwapStage;
use crate::relayer::{OrderHash, OrderStatus};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Something that happened during one swap attempt
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwapEvent {
    /// Quote accepted for the attempt
    QuoteReceived {
        attempt_id: Uuid,
        quote_id: String,
        preset: String,
        secrets_count: usize,
    },

    /// Secrets generated and hash lock built
    HashLockBuilt {
        attempt_id: Uuid,
        secrets_count: usize,
        multiple_fills: bool,
    },

    /// Maker signed the order
    OrderSigned { attempt_id: Uuid, quote_id: String },

    /// Relayer accepted the order
    OrderSubmitted {
        attempt_id: Uuid,
        order_hash: OrderHash,
    },

    /// Relayer reported a status change
    StatusChanged {
        attempt_id: Uuid,
        order_hash: OrderHash,
        status: OrderStatus,
    },

    /// A fill is ready for its secret
    FillObserved {
        attempt_id: Uuid,
        order_hash: OrderHash,
        idx: usize,
    },

    /// Secret for a fill was accepted by the relayer
    SecretRevealed {
        attempt_id: Uuid,
        order_hash: OrderHash,
        idx: usize,
    },

    /// A stage failed; `Finished` follows
    StageFailed {
        attempt_id: Uuid,
        /// Set once a quote was accepted
        quote_id: Option<String>,
        /// Set once the relayer accepted the order
        order_hash: Option<OrderHash>,
        stage: SwapStage,
        reason: String,
        retryable: bool,
    },

    /// Terminal state reached; the last event of every attempt
    Finished {
        attempt_id: Uuid,
        outcome: &'static str,
        at: DateTime<Utc>,
    },
}

impl SwapEvent {
    /// Get event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            SwapEvent::QuoteReceived { .. } => "quote_received",
            SwapEvent::HashLockBuilt { .. } => "hash_lock_built",
            SwapEvent::OrderSigned { .. } => "order_signed",
            SwapEvent::OrderSubmitted { .. } => "order_submitted",
            SwapEvent::StatusChanged { .. } => "status_changed",
            SwapEvent::FillObserved { .. } => "fill_observed",
            SwapEvent::SecretRevealed { .. } => "secret_revealed",
            SwapEvent::StageFailed { .. } => "stage_failed",
            SwapEvent::Finished { .. } => "finished",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SwapEvent::Finished { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = SwapEvent::SecretRevealed {
            attempt_id: Uuid::nil(),
            order_hash: OrderHash::new("0xabc"),
            idx: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "secret_revealed");
        assert_eq!(json["order_hash"], "0xabc");
        assert_eq!(json["idx"], 2);
        assert_eq!(event.name(), "secret_revealed");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_stage_failure_is_not_terminal() {
        let failed = SwapEvent::StageFailed {
            attempt_id: Uuid::nil(),
            quote_id: Some("quote-1".into()),
            order_hash: None,
            stage: SwapStage::Signing,
            reason: "rejected".into(),
            retryable: false,
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["stage"], "signing");
        assert_eq!(json["quote_id"], "quote-1");
        assert!(json["order_hash"].is_null());
        assert!(!failed.is_terminal());

        let finished = SwapEvent::Finished {
            attempt_id: Uuid::nil(),
            outcome: "failed",
            at: Utc::now(),
        };
        assert!(finished.is_terminal());
    }
}
