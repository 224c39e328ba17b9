//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Swap attempts and their outcomes
//! - Stage failures
//! - Fill observation and secret reveal
//! - Relayer call latency and polling errors

use crate::error::{CoordinatorError, CoordinatorResult, SwapStage};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Swap metrics
    pub static ref SWAPS_STARTED: CounterVec = register_counter_vec!(
        "swap_coordinator_swaps_started_total",
        "Total swap attempts started",
        &["src_chain_id", "dst_chain_id"]
    ).expect("metric can be created");

    pub static ref SWAPS_FINISHED: CounterVec = register_counter_vec!(
        "swap_coordinator_swaps_finished_total",
        "Total swap attempts finished by outcome",
        &["outcome"]
    ).expect("metric can be created");

    pub static ref STAGE_FAILURES: CounterVec = register_counter_vec!(
        "swap_coordinator_stage_failures_total",
        "Total swap failures by stage",
        &["stage", "retryable"]
    ).expect("metric can be created");

    pub static ref ACTIVE_MONITORS: Gauge = register_gauge!(
        "swap_coordinator_active_monitors",
        "Fill monitors currently polling"
    ).expect("metric can be created");

    // Fill metrics
    pub static ref FILLS_OBSERVED: CounterVec = register_counter_vec!(
        "swap_coordinator_fills_observed_total",
        "Total fills reported ready for a secret",
        &["src_chain_id"]
    ).expect("metric can be created");

    pub static ref SECRETS_REVEALED: CounterVec = register_counter_vec!(
        "swap_coordinator_secrets_revealed_total",
        "Total secrets submitted to the relayer",
        &["src_chain_id"]
    ).expect("metric can be created");

    pub static ref POLL_ERRORS: CounterVec = register_counter_vec!(
        "swap_coordinator_poll_errors_total",
        "Total polling errors by kind",
        &["kind"]
    ).expect("metric can be created");

    // Relayer metrics
    pub static ref RELAYER_LATENCY: HistogramVec = register_histogram_vec!(
        "swap_coordinator_relayer_latency_seconds",
        "Relayer call latency",
        &["endpoint"],
        vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).expect("metric can be created");
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> CoordinatorResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| CoordinatorError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| CoordinatorError::Internal(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    render().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e))
}

/// Text exposition of every registered metric
pub fn render() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}

// Helper functions to record metrics

pub fn record_swap_started(src_chain_id: u64, dst_chain_id: u64) {
    SWAPS_STARTED
        .with_label_values(&[&src_chain_id.to_string(), &dst_chain_id.to_string()])
        .inc();
}

/// `outcome` is one of completed, expired, failed, cancelled
pub fn record_swap_finished(outcome: &str) {
    SWAPS_FINISHED.with_label_values(&[outcome]).inc();
}

pub fn record_stage_failure(stage: SwapStage, retryable: bool) {
    STAGE_FAILURES
        .with_label_values(&[stage.as_str(), if retryable { "true" } else { "false" }])
        .inc();
}

pub fn record_monitor_started() {
    ACTIVE_MONITORS.inc();
}

pub fn record_monitor_stopped() {
    ACTIVE_MONITORS.dec();
}

pub fn record_fill_observed(src_chain_id: u64) {
    FILLS_OBSERVED
        .with_label_values(&[&src_chain_id.to_string()])
        .inc();
}

pub fn record_secret_revealed(src_chain_id: u64) {
    SECRETS_REVEALED
        .with_label_values(&[&src_chain_id.to_string()])
        .inc();
}

pub fn record_poll_error(error: &CoordinatorError) {
    let kind = match error {
        CoordinatorError::RateLimited => "rate_limited",
        CoordinatorError::Timeout { .. } => "timeout",
        CoordinatorError::RelayerUnavailable(_) => "unavailable",
        CoordinatorError::ProtocolViolation { .. } => "protocol",
        _ => "other",
    };
    POLL_ERRORS.with_label_values(&[kind]).inc();
}

pub fn record_relayer_latency(endpoint: &str, latency_secs: f64) {
    RELAYER_LATENCY
        .with_label_values(&[endpoint])
        .observe(latency_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_metrics() {
        record_swap_finished("expired");
        record_poll_error(&CoordinatorError::RateLimited);
        record_relayer_latency("quote", 0.2);

        let text = render().unwrap();
        assert!(text.contains("swap_coordinator_swaps_finished_total"));
        assert!(text.contains("kind=\"rate_limited\""));
        assert!(text.contains("swap_coordinator_relayer_latency_seconds_bucket"));
    }
}
