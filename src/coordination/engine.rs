//! Swap coordinator: quote to executed order

use super::context::{SwapContext, SwapRequest, SwapResult};
use super::monitor::{FillMonitor, MonitorCanceller, MonitorHandle, MonitorOutcome};
use crate::chain::AllowanceReader;
use crate::config::{MonitorConfig, Settings};
use crate::error::{AtStage, CoordinatorError, CoordinatorResult, StageFailure, SwapStage};
use crate::events::SwapEvent;
use crate::metrics;
use crate::order::{OrderSigner, TypedDataSigner};
use crate::relayer::{OrderHash, OrderSubmitter, QuoteClient, QuoteParams, RelayerApi};
use crate::secrets::{HashLockBuilder, SecretVault};

use alloy_primitives::Address;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs swap attempts end to end
///
/// Each attempt gets its own [`SwapContext`]; nothing but configuration and
/// collaborators is shared between attempts.
pub struct SwapCoordinator {
    relayer: Arc<dyn RelayerApi>,
    quote_client: QuoteClient,
    order_signer: OrderSigner,
    submitter: OrderSubmitter,
    allowance: Option<Arc<dyn AllowanceReader>>,
    /// Limit order contract per enabled chain
    contracts: HashMap<u64, Address>,
    monitor_config: MonitorConfig,
    request_timeout: Duration,
    active: Arc<DashMap<Uuid, MonitorCanceller>>,
    event_tx: broadcast::Sender<SwapEvent>,
}

impl SwapCoordinator {
    pub fn new(
        settings: &Settings,
        relayer: Arc<dyn RelayerApi>,
        signer: Arc<dyn TypedDataSigner>,
        allowance: Option<Arc<dyn AllowanceReader>>,
    ) -> CoordinatorResult<Self> {
        let mut contracts = HashMap::new();
        for (_, chain) in settings.enabled_chains() {
            let contract = chain
                .limit_order_contract()
                .map_err(|e| CoordinatorError::Config(format!("{:#}", e)))?;
            contracts.insert(chain.chain_id, contract);
        }

        let (event_tx, _) = broadcast::channel(1024);

        Ok(Self {
            quote_client: QuoteClient::new(relayer.clone(), contracts.keys().copied()),
            order_signer: OrderSigner::new(signer, settings.order.clone()),
            submitter: OrderSubmitter::new(relayer.clone()),
            relayer,
            allowance,
            contracts,
            monitor_config: settings.monitor.clone(),
            request_timeout: settings.relayer.request_timeout(),
            active: Arc::new(DashMap::new()),
            event_tx,
        })
    }

    /// Run a swap to its terminal state
    pub async fn execute_swap(&self, request: SwapRequest) -> SwapResult {
        match self.start_swap(request).await {
            Ok(handle) => handle.wait().await,
            Err(failure) => SwapResult::failed(None, &failure),
        }
    }

    /// Run every stage through submission and hand back the running monitor
    pub async fn start_swap(&self, request: SwapRequest) -> Result<SwapHandle, StageFailure> {
        self.active.retain(|_, canceller| !canceller.is_finished());

        let mut ctx = SwapContext::new(request);
        metrics::record_swap_started(ctx.request.src_chain_id, ctx.request.dst_chain_id);
        info!(
            "Starting swap attempt {}: {} of {} on chain {} -> chain {}",
            ctx.attempt_id,
            ctx.request.amount,
            ctx.request.src_token_address,
            ctx.request.src_chain_id,
            ctx.request.dst_chain_id
        );

        match self.prepare(&mut ctx).await {
            Ok(handle) => Ok(handle),
            Err(failure) => {
                self.report_failure(&ctx, &failure);
                Err(failure)
            }
        }
    }

    /// Lifecycle events of every attempt
    pub fn subscribe_events(&self) -> broadcast::Receiver<SwapEvent> {
        self.event_tx.subscribe()
    }

    /// Cancel every running monitor
    pub fn cancel_all(&self) {
        let mut cancelled = 0;
        for entry in self.active.iter() {
            if !entry.value().is_finished() {
                entry.value().cancel();
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            info!("Cancelled {} active fill monitor(s)", cancelled);
        }
    }

    /// Number of monitors still polling
    pub fn active_swaps(&self) -> usize {
        self.active
            .iter()
            .filter(|entry| !entry.value().is_finished())
            .count()
    }

    /// Runs the stages in order, recording each stage's output in `ctx`
    async fn prepare(&self, ctx: &mut SwapContext) -> Result<SwapHandle, StageFailure> {
        // Validation
        let maker = self.order_signer.maker();
        let params = QuoteParams::parse(
            ctx.request.src_chain_id,
            ctx.request.dst_chain_id,
            &ctx.request.src_token_address,
            &ctx.request.dst_token_address,
            &ctx.request.amount,
            maker,
        )
        .at(SwapStage::Validation)?;
        self.quote_client.validate(&params).at(SwapStage::Validation)?;
        let contract = self
            .contracts
            .get(&params.src_chain_id)
            .copied()
            .ok_or(CoordinatorError::UnsupportedChain {
                chain_id: params.src_chain_id,
            })
            .at(SwapStage::Validation)?;
        let params = &*ctx.params.insert(params);

        // Quote
        let quote = self.quote_client.get_quote(params).await.at(SwapStage::Quote)?;
        let quote = &*ctx.quote.insert(quote);
        let preset_name = ctx
            .request
            .preset
            .clone()
            .unwrap_or_else(|| quote.recommended_preset.clone());
        let secrets_count = quote
            .preset(Some(preset_name.as_str()))
            .at(SwapStage::Quote)?
            .secrets_count;
        self.emit(SwapEvent::QuoteReceived {
            attempt_id: ctx.attempt_id,
            quote_id: quote.quote_id.clone(),
            preset: preset_name,
            secrets_count,
        });

        // Secrets, then the lock over their hashes
        let secrets = SecretVault::generate(secrets_count).at(SwapStage::Secrets)?;
        let hash_lock = HashLockBuilder::build(secrets.secret_hashes()).at(SwapStage::HashLock)?;
        let hash_lock = &*ctx.hash_lock.insert(hash_lock);
        debug!(
            "Attempt {} hash lock {} over {} secret(s)",
            ctx.attempt_id,
            hash_lock.value(),
            secrets_count
        );
        self.emit(SwapEvent::HashLockBuilt {
            attempt_id: ctx.attempt_id,
            secrets_count,
            multiple_fills: hash_lock.is_multiple(),
        });

        // Allowance gate
        if let Some(reader) = &self.allowance {
            let need = quote.exact_values.making_amount.value();
            let have = reader
                .allowance(params.src_chain_id, params.src_token_address, maker, contract)
                .await
                .at(SwapStage::Approval)?;
            if have < need {
                return Err(StageFailure::new(
                    SwapStage::Approval,
                    CoordinatorError::InsufficientAllowance {
                        token: params.src_token_address.to_string(),
                        have: have.to_string(),
                        need: need.to_string(),
                    },
                ));
            }
        }

        // Signing
        let order = OrderSigner::build_signable_order(quote, maker, params.src_token_address);
        let order = &*ctx.order.insert(order);
        let domain = self.order_signer.domain(quote.src_chain_id, contract);
        let signature = self
            .order_signer
            .sign(order, &domain)
            .await
            .at(SwapStage::Signing)?;
        let signature = &*ctx.signature.insert(signature);
        self.emit(SwapEvent::OrderSigned {
            attempt_id: ctx.attempt_id,
            quote_id: quote.quote_id.clone(),
        });

        // Submission
        let order_hash = self
            .submitter
            .submit(order, signature, hash_lock, secrets.secret_hashes())
            .await
            .at(SwapStage::Submission)?;
        let order_hash = ctx.order_hash.insert(order_hash).clone();
        self.emit(SwapEvent::OrderSubmitted {
            attempt_id: ctx.attempt_id,
            order_hash: order_hash.clone(),
        });

        // Monitoring; the monitor now owns the secrets
        let monitor = FillMonitor::new(
            self.relayer.clone(),
            order_hash,
            secrets,
            self.monitor_config.clone(),
            self.request_timeout,
        )
        .with_attempt(ctx.attempt_id, ctx.request.src_chain_id)
        .with_events(self.event_tx.clone());
        let monitor = monitor.spawn();
        self.active.insert(ctx.attempt_id, monitor.canceller());

        Ok(SwapHandle {
            attempt_id: ctx.attempt_id,
            quote_id: quote.quote_id.clone(),
            started_at: ctx.started_at,
            monitor,
            active: self.active.clone(),
            event_tx: self.event_tx.clone(),
        })
    }

    fn report_failure(&self, ctx: &SwapContext, failure: &StageFailure) {
        let quote_id = ctx.quote.as_ref().map(|quote| quote.quote_id.clone());
        let quote_label = quote_id.as_deref().unwrap_or("-");
        if failure.error.should_alert() {
            error!(
                "Swap attempt {} (quote {}) failed: {}",
                ctx.attempt_id, quote_label, failure
            );
        } else {
            warn!(
                "Swap attempt {} (quote {}) failed ({}): {}",
                ctx.attempt_id,
                quote_label,
                if failure.is_retryable() { "retryable" } else { "permanent" },
                failure
            );
        }

        metrics::record_stage_failure(failure.stage, failure.is_retryable());
        metrics::record_swap_finished("failed");
        self.emit(SwapEvent::StageFailed {
            attempt_id: ctx.attempt_id,
            quote_id,
            order_hash: ctx.order_hash.clone(),
            stage: failure.stage,
            reason: failure.error.to_string(),
            retryable: failure.is_retryable(),
        });
        self.emit(SwapEvent::Finished {
            attempt_id: ctx.attempt_id,
            outcome: "failed",
            at: Utc::now(),
        });
    }

    fn emit(&self, event: SwapEvent) {
        let _ = self.event_tx.send(event);
    }
}

/// A submitted swap whose fills are being monitored
pub struct SwapHandle {
    attempt_id: Uuid,
    quote_id: String,
    started_at: chrono::DateTime<Utc>,
    monitor: MonitorHandle,
    active: Arc<DashMap<Uuid, MonitorCanceller>>,
    event_tx: broadcast::Sender<SwapEvent>,
}

impl SwapHandle {
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn order_hash(&self) -> &OrderHash {
        self.monitor.order_hash()
    }

    /// Stop monitoring; secrets already revealed stay revealed
    pub fn cancel(&self) {
        self.monitor.cancel();
    }

    /// Wait for the terminal result
    pub async fn wait(self) -> SwapResult {
        let order_hash = self.monitor.order_hash().clone();
        let outcome = self.monitor.wait().await;
        self.active.remove(&self.attempt_id);

        let result = match outcome {
            MonitorOutcome::Completed { revealed } => SwapResult::Completed {
                order_hash,
                revealed_secret_count: revealed,
            },
            MonitorOutcome::Expired { .. } => SwapResult::Expired { order_hash },
            MonitorOutcome::Cancelled { revealed } => SwapResult::Cancelled {
                order_hash,
                revealed_secret_count: revealed,
            },
            MonitorOutcome::Failed { error, .. } => {
                let failure = StageFailure::new(SwapStage::Monitoring, error);
                metrics::record_stage_failure(failure.stage, failure.is_retryable());
                let _ = self.event_tx.send(SwapEvent::StageFailed {
                    attempt_id: self.attempt_id,
                    quote_id: Some(self.quote_id.clone()),
                    order_hash: Some(order_hash.clone()),
                    stage: failure.stage,
                    reason: failure.error.to_string(),
                    retryable: failure.is_retryable(),
                });
                SwapResult::failed(Some(order_hash), &failure)
            }
        };

        let elapsed = (Utc::now() - self.started_at).num_seconds();
        info!(
            "Swap attempt {} finished after {}s: {}",
            self.attempt_id, elapsed, result
        );
        metrics::record_swap_finished(result.outcome());
        let _ = self.event_tx.send(SwapEvent::Finished {
            attempt_id: self.attempt_id,
            outcome: result.outcome(),
            at: Utc::now(),
        });

        result
    }
}
