//! Swap Coordinator - runs one cross-chain swap from configuration
//!
//! Loads settings, the maker wallet and the `[swap]` request, then drives the
//! swap until the order settles, expires or fails. Ctrl-C cancels monitoring.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use swap_coordinator::chain::{AllowanceReader, ChainManager};
use swap_coordinator::config::Settings;
use swap_coordinator::metrics::MetricsServer;
use swap_coordinator::order::LocalWalletSigner;
use swap_coordinator::relayer::HttpRelayerClient;
use swap_coordinator::{SwapCoordinator, SwapRequest, SwapResult};

const DEFAULT_KEY_ENV: &str = "MAKER_PRIVATE_KEY";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Swap Coordinator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for {} chains",
        settings.enabled_chains().len()
    );

    let request: SwapRequest = settings
        .swap
        .clone()
        .context("No [swap] section configured")?
        .into();

    // Maker wallet
    let key_env = settings
        .wallet
        .private_key_env
        .as_deref()
        .unwrap_or(DEFAULT_KEY_ENV);
    let signer = Arc::new(LocalWalletSigner::from_env(key_env)?);

    let relayer = Arc::new(HttpRelayerClient::new(&settings.relayer)?);

    let allowance: Option<Arc<dyn AllowanceReader>> = if settings.order.check_allowance {
        let chains = ChainManager::new(&settings)?;
        info!("Allowance checks enabled for chains {:?}", chains.connected_chains());
        Some(Arc::new(chains))
    } else {
        None
    };

    let coordinator = Arc::new(SwapCoordinator::new(&settings, relayer, signer, allowance)?);

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    let result = match coordinator.start_swap(request).await {
        Ok(handle) => {
            info!("Order {} submitted, waiting for fills", handle.order_hash());
            let wait = handle.wait();
            tokio::pin!(wait);

            tokio::select! {
                result = &mut wait => result,
                _ = shutdown_signal() => {
                    info!("Shutdown signal received, cancelling monitoring...");
                    coordinator.cancel_all();
                    wait.await
                }
            }
        }
        Err(failure) => SwapResult::failed(None, &failure),
    };

    if let Some(h) = metrics_handle {
        h.abort();
    }

    match &result {
        SwapResult::Completed { .. } => info!("Swap finished: {}", result),
        SwapResult::Expired { .. } | SwapResult::Cancelled { .. } => {
            warn!("Swap finished: {}", result)
        }
        SwapResult::Failed { .. } => {
            error!("Swap finished: {}", result);
            anyhow::bail!("swap failed: {}", result);
        }
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,swap_coordinator=debug,hyper=warn,reqwest=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
