//! Chain read provider with multi-RPC support and automatic failover

use crate::config::ChainConfig;
use crate::error::{CoordinatorError, CoordinatorResult};

use alloy_primitives::{Address, U256};
use ethers::contract::abigen;
use ethers::providers::{Http, Provider};
use ethers::types::H160;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

abigen!(
    ERC20,
    r#"[
        function allowance(address owner, address spender) external view returns (uint256)
    ]"#
);

/// Multi-provider wrapper with automatic failover
pub struct ChainProvider {
    chain_id: u64,
    name: String,
    /// HTTP providers (multiple for failover)
    http_providers: Vec<Arc<Provider<Http>>>,
    /// Current active provider index
    current_provider: AtomicUsize,
    /// Bound on each RPC call before failing over
    call_timeout: Duration,
}

impl ChainProvider {
    /// Create a provider over every parsable RPC URL of the chain
    pub fn new(config: &ChainConfig, call_timeout: Duration) -> CoordinatorResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(500));
                    http_providers.push(Arc::new(provider));
                    debug!("Added HTTP provider for chain {}: {}", config.chain_id, url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(CoordinatorError::ChainRead {
                chain_id: config.chain_id,
                message: "No valid RPC providers".to_string(),
            });
        }

        Ok(Self {
            chain_id: config.chain_id,
            name: config.name.clone(),
            http_providers,
            current_provider: AtomicUsize::new(0),
            call_timeout,
        })
    }

    /// Get the active HTTP provider
    pub fn http(&self) -> Arc<Provider<Http>> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        self.http_providers[idx % self.http_providers.len()].clone()
    }

    /// Switch to next available provider
    pub fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.name, next);
    }

    /// ERC-20 allowance granted by `owner` to `spender`, trying each RPC once
    pub async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> CoordinatorResult<U256> {
        let mut last_error = String::from("no providers tried");

        for _ in 0..self.http_providers.len() {
            let contract = ERC20::new(to_h160(token), self.http());
            let call = contract.allowance(to_h160(owner), to_h160(spender));
            match timeout(self.call_timeout, call.call()).await {
                Ok(Ok(allowance)) => return Ok(U256::from_limbs(allowance.0)),
                Ok(Err(e)) => {
                    warn!(
                        "Failed to read allowance of {} on chain {}: {}",
                        token, self.name, e
                    );
                    last_error = e.to_string();
                }
                Err(_) => {
                    warn!(
                        "Allowance read on chain {} timed out after {:?}",
                        self.name, self.call_timeout
                    );
                    last_error = format!("timed out after {:?}", self.call_timeout);
                }
            }
            self.failover();
        }

        Err(CoordinatorError::ChainRead {
            chain_id: self.chain_id,
            message: format!("All providers failed: {}", last_error),
        })
    }

    /// Get chain ID
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn provider_count(&self) -> usize {
        self.http_providers.len()
    }
}

fn to_h160(address: Address) -> H160 {
    H160::from_slice(address.as_slice())
}
