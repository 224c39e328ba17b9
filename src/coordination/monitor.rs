//! Fill monitoring and secret reveal
//!
//! One [`FillMonitor`] task runs per submitted order. Each tick it asks the
//! relayer for the order status, then for fills that are ready to accept a
//! secret, and reveals the matching secrets. A secret is never sent before the
//! relayer reports its fill.

use crate::config::MonitorConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::events::SwapEvent;
use crate::metrics;
use crate::relayer::{OrderHash, OrderStatus, ReadyFill, RelayerApi};
use crate::secrets::SecretSet;

use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, timeout, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How a monitor stopped
#[derive(Debug)]
pub enum MonitorOutcome {
    /// Relayer reported the order executed
    Completed { revealed: usize },
    /// Expiry window passed, or the relayer expired/refunded the order
    Expired { revealed: usize },
    /// Unrecoverable error; polling stopped
    Failed {
        error: CoordinatorError,
        revealed: usize,
    },
    /// Caller cancelled monitoring
    Cancelled { revealed: usize },
}

impl MonitorOutcome {
    pub fn revealed(&self) -> usize {
        match self {
            MonitorOutcome::Completed { revealed }
            | MonitorOutcome::Expired { revealed }
            | MonitorOutcome::Failed { revealed, .. }
            | MonitorOutcome::Cancelled { revealed } => *revealed,
        }
    }
}

/// Which fill indices have had their secret accepted
#[derive(Debug)]
pub struct FillTracker {
    secret_count: usize,
    processed: HashSet<usize>,
}

impl FillTracker {
    pub fn new(secret_count: usize) -> Self {
        Self {
            secret_count,
            processed: HashSet::new(),
        }
    }

    /// Indices from one relayer response still waiting for their secret
    ///
    /// Every entry is checked before anything is returned, so a response with
    /// an unknown index or conflicting duplicates reveals nothing at all.
    pub fn pending(&self, fills: &[ReadyFill]) -> Result<Vec<usize>, String> {
        let mut seen: HashMap<usize, &ReadyFill> = HashMap::new();
        let mut pending = Vec::new();

        for fill in fills {
            if fill.idx >= self.secret_count {
                return Err(format!(
                    "fill index {} has no local secret (order has {})",
                    fill.idx, self.secret_count
                ));
            }

            match seen.get(&fill.idx) {
                Some(previous) if *previous != fill => {
                    return Err(format!(
                        "fill index {} reported twice with conflicting escrow data",
                        fill.idx
                    ));
                }
                Some(_) => continue,
                None => {
                    seen.insert(fill.idx, fill);
                }
            }

            if !self.processed.contains(&fill.idx) {
                pending.push(fill.idx);
            }
        }

        Ok(pending)
    }

    /// Record an accepted secret; false when it was already recorded
    pub fn mark_processed(&mut self, idx: usize) -> bool {
        self.processed.insert(idx)
    }

    pub fn revealed(&self) -> usize {
        self.processed.len()
    }
}

enum Tick {
    Continue,
    Completed,
    Expired,
}

/// Polls one order and reveals secrets as fills become ready
pub struct FillMonitor {
    relayer: Arc<dyn RelayerApi>,
    order_hash: OrderHash,
    secrets: SecretSet,
    config: MonitorConfig,
    request_timeout: Duration,
    attempt_id: Uuid,
    src_chain_id: u64,
    events: Option<broadcast::Sender<SwapEvent>>,
}

impl FillMonitor {
    /// The monitor takes ownership of the order's secrets; every relayer call
    /// is bounded by `request_timeout`
    pub fn new(
        relayer: Arc<dyn RelayerApi>,
        order_hash: OrderHash,
        secrets: SecretSet,
        config: MonitorConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            relayer,
            order_hash,
            secrets,
            config,
            request_timeout,
            attempt_id: Uuid::nil(),
            src_chain_id: 0,
            events: None,
        }
    }

    /// Tag emitted events and metrics with the owning attempt
    pub fn with_attempt(mut self, attempt_id: Uuid, src_chain_id: u64) -> Self {
        self.attempt_id = attempt_id;
        self.src_chain_id = src_chain_id;
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<SwapEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run the polling loop on its own task
    pub fn spawn(self) -> MonitorHandle {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let order_hash = self.order_hash.clone();
        let join = tokio::spawn(self.run(cancel_rx));

        MonitorHandle {
            order_hash,
            cancel: MonitorCanceller(Arc::new(cancel_tx)),
            join,
        }
    }

    /// Poll until the order reaches a terminal state or `cancel` flips to true
    pub async fn run(self, mut cancel: watch::Receiver<bool>) -> MonitorOutcome {
        metrics::record_monitor_started();
        info!(
            "Monitoring order {} ({} secret(s), polling every {:?}, expiry {:?})",
            self.order_hash,
            self.secrets.len(),
            self.config.poll_interval(),
            self.config.order_expiry()
        );

        let deadline = Instant::now() + self.config.order_expiry();
        let expiry = sleep_until(deadline);
        tokio::pin!(expiry);

        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut tracker = FillTracker::new(self.secrets.len());
        let mut last_status = None;
        let mut cancel_open = true;

        let outcome = loop {
            if *cancel.borrow() {
                break MonitorOutcome::Cancelled {
                    revealed: tracker.revealed(),
                };
            }

            tokio::select! {
                biased;

                changed = cancel.changed(), if cancel_open => {
                    // A dropped handle leaves the monitor running to completion
                    if changed.is_err() {
                        cancel_open = false;
                    }
                }

                _ = &mut expiry => {
                    info!("Order {} expired without completing", self.order_hash);
                    break MonitorOutcome::Expired { revealed: tracker.revealed() };
                }

                _ = ticker.tick() => {
                    match self.tick(&mut tracker, &mut last_status, &cancel, deadline).await {
                        Ok(Tick::Continue) => {}
                        Ok(Tick::Completed) => {
                            info!(
                                "Order {} executed, {} secret(s) revealed",
                                self.order_hash,
                                tracker.revealed()
                            );
                            break MonitorOutcome::Completed { revealed: tracker.revealed() };
                        }
                        Ok(Tick::Expired) => {
                            info!("Order {} expired", self.order_hash);
                            break MonitorOutcome::Expired { revealed: tracker.revealed() };
                        }
                        Err(e) if e.is_transient() => {
                            metrics::record_poll_error(&e);
                            warn!("Polling order {} failed, retrying next tick: {}", self.order_hash, e);
                        }
                        Err(e) => {
                            metrics::record_poll_error(&e);
                            error!("Monitoring order {} failed: {}", self.order_hash, e);
                            break MonitorOutcome::Failed { error: e, revealed: tracker.revealed() };
                        }
                    }
                }
            }
        };

        metrics::record_monitor_stopped();
        outcome
    }

    async fn tick(
        &self,
        tracker: &mut FillTracker,
        last_status: &mut Option<OrderStatus>,
        cancel: &watch::Receiver<bool>,
        deadline: Instant,
    ) -> CoordinatorResult<Tick> {
        let status = self
            .bounded("order status", self.relayer.get_order_status(&self.order_hash))
            .await?;

        if *last_status != Some(status) {
            debug!("Order {} status: {}", self.order_hash, status.as_str());
            *last_status = Some(status);
            self.emit(SwapEvent::StatusChanged {
                attempt_id: self.attempt_id,
                order_hash: self.order_hash.clone(),
                status,
            });
        }

        match status {
            OrderStatus::Executed => return Ok(Tick::Completed),
            OrderStatus::Expired | OrderStatus::Refunding | OrderStatus::Refunded => {
                return Ok(Tick::Expired)
            }
            OrderStatus::Cancelled => {
                return Err(CoordinatorError::OrderRejected {
                    reason: format!("order {} was cancelled", self.order_hash),
                })
            }
            OrderStatus::Pending | OrderStatus::PartiallyFilled | OrderStatus::Unknown => {}
        }

        let fills = self
            .bounded("ready fills", self.relayer.get_ready_fills(&self.order_hash))
            .await?;

        let pending = tracker
            .pending(&fills)
            .map_err(|message| CoordinatorError::ProtocolViolation {
                order_hash: self.order_hash.to_string(),
                message,
            })?;

        if pending.is_empty() {
            return Ok(Tick::Continue);
        }

        // Nothing goes out once the caller has cancelled or the window closed
        if *cancel.borrow() {
            return Ok(Tick::Continue);
        }
        if Instant::now() >= deadline {
            return Ok(Tick::Expired);
        }

        for idx in &pending {
            metrics::record_fill_observed(self.src_chain_id);
            self.emit(SwapEvent::FillObserved {
                attempt_id: self.attempt_id,
                order_hash: self.order_hash.clone(),
                idx: *idx,
            });
        }

        let results = join_all(pending.iter().map(|&idx| self.reveal(idx))).await;

        let mut fatal = None;
        for (idx, result) in pending.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    if tracker.mark_processed(idx) {
                        metrics::record_secret_revealed(self.src_chain_id);
                        self.emit(SwapEvent::SecretRevealed {
                            attempt_id: self.attempt_id,
                            order_hash: self.order_hash.clone(),
                            idx,
                        });
                    }
                }
                Err(e) if e.is_transient() => {
                    metrics::record_poll_error(&e);
                    warn!(
                        "Secret {} for order {} not delivered, retrying next tick: {}",
                        idx, self.order_hash, e
                    );
                }
                Err(e) => {
                    if fatal.is_none() {
                        fatal = Some(e);
                    }
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(Tick::Continue),
        }
    }

    async fn reveal(&self, idx: usize) -> CoordinatorResult<()> {
        let secret = self.secrets.get(idx).ok_or_else(|| CoordinatorError::ProtocolViolation {
            order_hash: self.order_hash.to_string(),
            message: format!("fill index {} has no local secret", idx),
        })?;

        self.bounded("secret submission", self.relayer.submit_secret(&self.order_hash, idx, secret))
            .await?;

        info!("Revealed secret {} for order {}", idx, self.order_hash);
        Ok(())
    }

    /// Apply the per-call timeout to a relayer request
    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = CoordinatorResult<T>>,
    ) -> CoordinatorResult<T> {
        timeout(self.request_timeout, call)
            .await
            .map_err(|_| CoordinatorError::Timeout {
                operation: operation.to_string(),
            })?
    }

    fn emit(&self, event: SwapEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Cancels a running monitor; cheap to clone
#[derive(Clone)]
pub struct MonitorCanceller(Arc<watch::Sender<bool>>);

impl MonitorCanceller {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }

    /// True once the monitor task has stopped
    pub fn is_finished(&self) -> bool {
        self.0.is_closed()
    }
}

/// Handle to a spawned [`FillMonitor`]
pub struct MonitorHandle {
    order_hash: OrderHash,
    cancel: MonitorCanceller,
    join: JoinHandle<MonitorOutcome>,
}

impl MonitorHandle {
    pub fn order_hash(&self) -> &OrderHash {
        &self.order_hash
    }

    /// Stop polling; no further secrets are sent
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn canceller(&self) -> MonitorCanceller {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the monitor to stop
    pub async fn wait(self) -> MonitorOutcome {
        match self.join.await {
            Ok(outcome) => outcome,
            Err(e) => MonitorOutcome::Failed {
                error: CoordinatorError::Internal(format!("monitor task failed: {}", e)),
                revealed: 0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relayer::client::MockRelayerApi;
    use crate::relayer::{Quote, QuoteParams, SubmitOrderRequest};
    use crate::secrets::{Secret, SecretVault};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config() -> MonitorConfig {
        MonitorConfig {
            poll_interval_ms: 10,
            order_expiry_secs: 5,
        }
    }

    fn monitor_for(relayer: Arc<dyn RelayerApi>, order_hash: &str, secrets: SecretSet) -> FillMonitor {
        FillMonitor::new(
            relayer,
            OrderHash::new(order_hash),
            secrets,
            fast_config(),
            Duration::from_secs(1),
        )
    }

    /// Relayer whose status and fill calls can stall
    struct SlowRelayer {
        /// Delay on the first status call; later calls report `executed`
        stall_first_status: Option<Duration>,
        fills_delay: Duration,
        status_calls: AtomicUsize,
        secrets_sent: AtomicUsize,
    }

    impl SlowRelayer {
        fn new(stall_first_status: Option<Duration>, fills_delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                stall_first_status,
                fills_delay,
                status_calls: AtomicUsize::new(0),
                secrets_sent: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RelayerApi for SlowRelayer {
        async fn get_quote(&self, _params: &QuoteParams) -> CoordinatorResult<Quote> {
            Err(CoordinatorError::Internal("no quotes here".into()))
        }

        async fn submit_order(&self, _request: &SubmitOrderRequest) -> CoordinatorResult<OrderHash> {
            Err(CoordinatorError::Internal("no orders here".into()))
        }

        async fn get_order_status(&self, _order_hash: &OrderHash) -> CoordinatorResult<OrderStatus> {
            let call = self.status_calls.fetch_add(1, Ordering::SeqCst);
            match self.stall_first_status {
                Some(stall) if call == 0 => {
                    tokio::time::sleep(stall).await;
                    Ok(OrderStatus::Pending)
                }
                Some(_) => Ok(OrderStatus::Executed),
                None => Ok(OrderStatus::PartiallyFilled),
            }
        }

        async fn get_ready_fills(&self, _order_hash: &OrderHash) -> CoordinatorResult<Vec<ReadyFill>> {
            tokio::time::sleep(self.fills_delay).await;
            Ok(vec![ReadyFill::new(0)])
        }

        async fn submit_secret(
            &self,
            _order_hash: &OrderHash,
            _idx: usize,
            _secret: &Secret,
        ) -> CoordinatorResult<()> {
            self.secrets_sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fill(idx: usize, src: Option<&str>) -> ReadyFill {
        ReadyFill {
            idx,
            src_escrow_deploy_tx_hash: src.map(str::to_string),
            dst_escrow_deploy_tx_hash: None,
        }
    }

    #[test]
    fn test_tracker_skips_processed() {
        let mut tracker = FillTracker::new(3);
        assert_eq!(tracker.pending(&[fill(2, None), fill(0, None)]).unwrap(), vec![2, 0]);

        assert!(tracker.mark_processed(2));
        assert!(!tracker.mark_processed(2));
        assert_eq!(tracker.pending(&[fill(2, None), fill(0, None)]).unwrap(), vec![0]);
        assert_eq!(tracker.revealed(), 1);
    }

    #[test]
    fn test_tracker_rejects_unknown_index() {
        let tracker = FillTracker::new(2);
        let err = tracker.pending(&[fill(0, None), fill(2, None)]).unwrap_err();
        assert!(err.contains("no local secret"));
    }

    #[test]
    fn test_tracker_duplicates() {
        let tracker = FillTracker::new(2);
        assert_eq!(
            tracker.pending(&[fill(1, Some("0xaa")), fill(1, Some("0xaa"))]).unwrap(),
            vec![1]
        );
        assert!(tracker
            .pending(&[fill(1, Some("0xaa")), fill(1, Some("0xbb"))])
            .is_err());
    }

    #[tokio::test]
    async fn test_cancel_stops_without_reveal() {
        let mut relayer = MockRelayerApi::new();
        relayer
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::Pending));
        relayer.expect_get_ready_fills().returning(|_| Ok(vec![]));
        relayer.expect_submit_secret().never();

        let secrets = SecretVault::generate(1).unwrap();
        let handle = monitor_for(Arc::new(relayer), "0x01", secrets).spawn();

        tokio::time::sleep(Duration::from_millis(40)).await;
        handle.cancel();
        let outcome = handle.wait().await;
        assert!(matches!(outcome, MonitorOutcome::Cancelled { revealed: 0 }));
    }

    #[tokio::test]
    async fn test_relayer_cancelled_order_fails() {
        let mut relayer = MockRelayerApi::new();
        relayer
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::Cancelled));
        relayer.expect_get_ready_fills().never();

        let secrets = SecretVault::generate(1).unwrap();
        let outcome = monitor_for(Arc::new(relayer), "0x02", secrets)
            .spawn()
            .wait()
            .await;
        assert!(matches!(outcome, MonitorOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_refunded_order_is_expired() {
        let mut relayer = MockRelayerApi::new();
        relayer
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::Refunded));

        let secrets = SecretVault::generate(2).unwrap();
        let outcome = monitor_for(Arc::new(relayer), "0x03", secrets)
            .spawn()
            .wait()
            .await;
        assert!(matches!(outcome, MonitorOutcome::Expired { revealed: 0 }));
    }

    #[tokio::test]
    async fn test_one_failed_reveal_does_not_block_others() {
        let mut relayer = MockRelayerApi::new();
        relayer
            .expect_get_order_status()
            .returning(|_| Ok(OrderStatus::PartiallyFilled));
        relayer
            .expect_get_ready_fills()
            .returning(|_| Ok(vec![ReadyFill::new(0), ReadyFill::new(1)]));
        relayer.expect_submit_secret().returning(|hash, idx, _| {
            if idx == 0 {
                Err(CoordinatorError::ProtocolViolation {
                    order_hash: hash.to_string(),
                    message: "relayer rejected secret 0".into(),
                })
            } else {
                Ok(())
            }
        });

        let secrets = SecretVault::generate(2).unwrap();
        let outcome = monitor_for(Arc::new(relayer), "0x04", secrets)
            .spawn()
            .wait()
            .await;
        match outcome {
            MonitorOutcome::Failed { error, revealed } => {
                assert!(matches!(error, CoordinatorError::ProtocolViolation { .. }));
                assert_eq!(revealed, 1);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transient_secret_failure_retried_next_tick() {
        let calls = Arc::new(AtomicUsize::new(0));

        let mut relayer = MockRelayerApi::new();
        let delivered = calls.clone();
        relayer.expect_get_order_status().returning(move |_| {
            if delivered.load(Ordering::SeqCst) >= 2 {
                Ok(OrderStatus::Executed)
            } else {
                Ok(OrderStatus::PartiallyFilled)
            }
        });
        relayer
            .expect_get_ready_fills()
            .returning(|_| Ok(vec![ReadyFill::new(0)]));
        let attempts = calls.clone();
        relayer.expect_submit_secret().returning(move |_, _, _| {
            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(CoordinatorError::RelayerUnavailable("connection reset".into()))
            } else {
                Ok(())
            }
        });

        let secrets = SecretVault::generate(1).unwrap();
        let outcome = monitor_for(Arc::new(relayer), "0x05", secrets).spawn().wait().await;

        assert!(matches!(outcome, MonitorOutcome::Completed { revealed: 1 }), "{outcome:?}");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bounded_call_times_out() {
        let relayer = SlowRelayer::new(None, Duration::ZERO);
        let monitor = FillMonitor::new(
            relayer,
            OrderHash::new("0x06"),
            SecretVault::generate(1).unwrap(),
            fast_config(),
            Duration::from_millis(20),
        );

        let err = monitor
            .bounded("order status", std::future::pending::<CoordinatorResult<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Timeout { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_stalled_status_call_retried_after_timeout() {
        let relayer = SlowRelayer::new(Some(Duration::from_secs(30)), Duration::ZERO);
        let monitor = FillMonitor::new(
            relayer.clone(),
            OrderHash::new("0x07"),
            SecretVault::generate(1).unwrap(),
            fast_config(),
            Duration::from_millis(50),
        );

        let outcome = tokio::time::timeout(Duration::from_secs(5), monitor.spawn().wait())
            .await
            .expect("stalled call was not cut off");

        assert!(matches!(outcome, MonitorOutcome::Completed { revealed: 0 }), "{outcome:?}");
        assert_eq!(relayer.status_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fills_after_deadline_are_withheld() {
        let relayer = SlowRelayer::new(None, Duration::from_millis(1_200));
        let config = MonitorConfig {
            poll_interval_ms: 10,
            order_expiry_secs: 1,
        };
        let monitor = FillMonitor::new(
            relayer.clone(),
            OrderHash::new("0x08"),
            SecretVault::generate(1).unwrap(),
            config,
            Duration::from_secs(5),
        );

        let outcome = monitor.spawn().wait().await;

        assert!(matches!(outcome, MonitorOutcome::Expired { revealed: 0 }), "{outcome:?}");
        assert_eq!(relayer.secrets_sent.load(Ordering::SeqCst), 0);
    }
}
