//! Configuration management for the swap coordinator
//!
//! Loads configuration from TOML files with environment variable substitution.

use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub relayer: RelayerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub order: OrderConfig,
    pub metrics: MetricsConfig,
    pub wallet: WalletConfig,
    pub swap: Option<SwapConfig>,
    pub chains: HashMap<String, ChainConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelayerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Bound on every outbound call: relayer requests and chain reads
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    pub order_expiry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderConfig {
    pub domain_name: String,
    pub domain_version: String,
    pub check_allowance: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    pub private_key_env: Option<String>,
}

/// The swap the binary runs on start
#[derive(Debug, Clone, Deserialize)]
pub struct SwapConfig {
    pub src_chain_id: u64,
    pub dst_chain_id: u64,
    pub src_token_address: String,
    pub dst_token_address: String,
    pub amount: String,
    pub preset: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    pub limit_order_contract: String,
    pub enabled: bool,
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            order_expiry_secs: 30 * 60,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn order_expiry(&self) -> Duration {
        Duration::from_secs(self.order_expiry_secs)
    }
}

impl RelayerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            domain_name: "1inch Aggregation Router".to_string(),
            domain_version: "6".to_string(),
            check_allowance: false,
        }
    }
}

impl ChainConfig {
    /// Parsed verifying contract for the EIP-712 domain
    pub fn limit_order_contract(&self) -> Result<Address> {
        self.limit_order_contract
            .parse()
            .with_context(|| format!("Invalid limit order contract for chain {}", self.name))
    }
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("SWAP_COORDINATOR_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::from_toml(&config_str)
    }

    /// Parse settings from TOML text, substituting environment variables first
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.enabled_chains().is_empty() {
            anyhow::bail!("At least one chain must be enabled");
        }

        if self.relayer.base_url.is_empty() {
            anyhow::bail!("Relayer base URL is required");
        }
        url::Url::parse(&self.relayer.base_url)
            .with_context(|| format!("Invalid relayer URL: {}", self.relayer.base_url))?;
        if self.relayer.request_timeout_secs == 0 {
            anyhow::bail!("Request timeout must be greater than zero");
        }

        if self.monitor.poll_interval_ms == 0 {
            anyhow::bail!("Monitor poll interval must be greater than zero");
        }
        if self.monitor.order_expiry_secs == 0 {
            anyhow::bail!("Order expiry window must be greater than zero");
        }

        for (name, chain) in &self.chains {
            if !chain.enabled {
                continue;
            }
            chain.limit_order_contract()?;
            if self.order.check_allowance && chain.rpc_urls.is_empty() {
                anyhow::bail!(
                    "Chain {} has no RPC URLs configured but allowance checks are enabled",
                    name
                );
            }
        }

        if let Some(swap) = &self.swap {
            for chain_id in [swap.src_chain_id, swap.dst_chain_id] {
                if self.get_chain_by_id(chain_id).is_none() {
                    tracing::warn!("Swap references chain {} which is not enabled", chain_id);
                }
            }
        }

        Ok(())
    }

    /// Get list of enabled chains
    pub fn enabled_chains(&self) -> Vec<(&String, &ChainConfig)> {
        self.chains.iter().filter(|(_, c)| c.enabled).collect()
    }

    /// Get enabled chain config by chain ID
    pub fn get_chain_by_id(&self, chain_id: u64) -> Option<&ChainConfig> {
        self.chains
            .values()
            .find(|c| c.enabled && c.chain_id == chain_id)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static pattern");
    }

    let mut result = input.to_string();
    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const SAMPLE: &str = r#"
[relayer]
base_url = "https://relayer.example.com/fusion-plus/"
api_key = "${SWAP_TEST_API_KEY}"

[monitor]
poll_interval_ms = 250
order_expiry_secs = 60

[metrics]
enabled = false
port = 9102

[wallet]
private_key_env = "MAKER_PRIVATE_KEY"

[chains.ethereum]
chain_id = 1
name = "Ethereum"
rpc_urls = ["https://eth.example.com"]
limit_order_contract = "0x111111125421ca6dc452d289314280a0f8842a65"
enabled = true

[chains.polygon]
chain_id = 137
name = "Polygon"
limit_order_contract = "0x111111125421ca6dc452d289314280a0f8842a65"
enabled = false
"#;

    #[test]
    fn test_env_var_substitution() {
        env::set_var("TEST_VAR", "test_value");
        let input = "url = \"https://api.example.com/${TEST_VAR}/endpoint\"";
        let result = substitute_env_vars(input);
        assert_eq!(result, "url = \"https://api.example.com/test_value/endpoint\"");
    }

    #[test]
    fn test_load_from_file() {
        env::set_var("SWAP_TEST_API_KEY", "secret-key");
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let settings = Settings::load_from(file.path()).unwrap();
        assert_eq!(settings.relayer.api_key.as_deref(), Some("secret-key"));
        assert_eq!(settings.relayer.request_timeout_secs, 15);
        assert_eq!(settings.monitor.poll_interval(), Duration::from_millis(250));
        assert_eq!(settings.order.domain_version, "6");
        assert_eq!(settings.enabled_chains().len(), 1);
        assert!(settings.get_chain_by_id(1).is_some());
        assert!(settings.get_chain_by_id(137).is_none());
        assert!(settings.swap.is_none());
    }

    #[test]
    fn test_rejects_zero_request_timeout() {
        let input = SAMPLE.replace(
            "api_key = \"${SWAP_TEST_API_KEY}\"",
            "api_key = \"${SWAP_TEST_API_KEY}\"\nrequest_timeout_secs = 0",
        );
        let err = Settings::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("Request timeout"));

        let input = SAMPLE.replace(
            "api_key = \"${SWAP_TEST_API_KEY}\"",
            "api_key = \"${SWAP_TEST_API_KEY}\"\nrequest_timeout_secs = 3",
        );
        let settings = Settings::from_toml(&input).unwrap();
        assert_eq!(settings.relayer.request_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_rejects_no_enabled_chains() {
        let input = SAMPLE.replace("enabled = true", "enabled = false");
        let err = Settings::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("At least one chain"));
    }

    #[test]
    fn test_rejects_bad_verifying_contract() {
        let input = SAMPLE.replacen(
            "0x111111125421ca6dc452d289314280a0f8842a65",
            "not-an-address",
            1,
        );
        assert!(Settings::from_toml(&input).is_err());
    }

    #[test]
    fn test_allowance_checks_need_rpc_urls() {
        let input = SAMPLE
            .replace("rpc_urls = [\"https://eth.example.com\"]\n", "")
            .replace(
                "[metrics]",
                "[order]\ndomain_name = \"Router\"\ndomain_version = \"6\"\ncheck_allowance = true\n\n[metrics]",
            );
        let err = Settings::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("no RPC URLs"));
    }
}
