//! Chain module - read access to the configured chains
//!
//! Only used for the pre-signing allowance check; the swap protocol itself
//! runs through the relayer.

pub mod provider;

pub use provider::ChainProvider;

use crate::config::Settings;
use crate::error::{CoordinatorError, CoordinatorResult};

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

#[cfg(test)]
use mockall::automock;

/// Reads ERC-20 allowances on a given chain
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AllowanceReader: Send + Sync {
    async fn allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> CoordinatorResult<U256>;
}

/// Providers for all enabled chains that have RPC URLs
pub struct ChainManager {
    providers: DashMap<u64, Arc<ChainProvider>>,
}

impl ChainManager {
    pub fn new(settings: &Settings) -> CoordinatorResult<Self> {
        let providers = DashMap::new();

        for (name, chain_config) in settings.enabled_chains() {
            if chain_config.rpc_urls.is_empty() {
                continue;
            }

            let provider = ChainProvider::new(chain_config, settings.relayer.request_timeout())?;
            info!(
                "Chain {} (ID: {}) ready with {} RPC provider(s)",
                name,
                chain_config.chain_id,
                provider.provider_count()
            );
            providers.insert(chain_config.chain_id, Arc::new(provider));
        }

        Ok(Self { providers })
    }

    /// Get provider for a specific chain
    pub fn get_provider(&self, chain_id: u64) -> CoordinatorResult<Arc<ChainProvider>> {
        self.providers
            .get(&chain_id)
            .map(|p| p.clone())
            .ok_or(CoordinatorError::UnsupportedChain { chain_id })
    }

    pub fn connected_chains(&self) -> Vec<u64> {
        self.providers.iter().map(|e| *e.key()).collect()
    }
}

#[async_trait]
impl AllowanceReader for ChainManager {
    async fn allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> CoordinatorResult<U256> {
        self.get_provider(chain_id)?
            .erc20_allowance(token, owner, spender)
            .await
    }
}
