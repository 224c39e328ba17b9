//! Quote fetching with input validation

use super::client::RelayerApi;
use super::types::{Quote, QuoteParams};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::order::ExactAmount;

use alloy_primitives::Address;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

impl QuoteParams {
    /// Parse user-supplied swap parameters
    ///
    /// `amount` must be a positive integer in the source token's smallest unit.
    pub fn parse(
        src_chain_id: u64,
        dst_chain_id: u64,
        src_token_address: &str,
        dst_token_address: &str,
        amount: &str,
        wallet_address: Address,
    ) -> CoordinatorResult<Self> {
        Ok(Self {
            src_chain_id,
            dst_chain_id,
            src_token_address: parse_address("source token", src_token_address)?,
            dst_token_address: parse_address("destination token", dst_token_address)?,
            amount: ExactAmount::parse_positive(amount)?,
            wallet_address,
            enable_estimate: true,
        })
    }
}

fn parse_address(label: &str, raw: &str) -> CoordinatorResult<Address> {
    let address: Address = raw
        .trim()
        .parse()
        .map_err(|e| CoordinatorError::InvalidInput(format!("{} address '{}': {}", label, raw, e)))?;
    if address == Address::ZERO {
        return Err(CoordinatorError::InvalidInput(format!(
            "{} address must not be zero",
            label
        )));
    }
    Ok(address)
}

/// Fetches quotes for supported chain pairs
///
/// No retries and no caching: a quote is only good for the attempt that asked
/// for it.
pub struct QuoteClient {
    relayer: Arc<dyn RelayerApi>,
    supported_chains: HashSet<u64>,
}

impl QuoteClient {
    pub fn new(relayer: Arc<dyn RelayerApi>, supported_chains: impl IntoIterator<Item = u64>) -> Self {
        Self {
            relayer,
            supported_chains: supported_chains.into_iter().collect(),
        }
    }

    /// Reject parameters the relayer would never quote
    pub fn validate(&self, params: &QuoteParams) -> CoordinatorResult<()> {
        for chain_id in [params.src_chain_id, params.dst_chain_id] {
            if !self.supported_chains.contains(&chain_id) {
                return Err(CoordinatorError::UnsupportedChain { chain_id });
            }
        }

        if params.src_chain_id == params.dst_chain_id {
            return Err(CoordinatorError::InvalidInput(
                "source and destination chain must differ".to_string(),
            ));
        }

        if params.wallet_address == Address::ZERO {
            return Err(CoordinatorError::InvalidInput(
                "wallet address must not be zero".to_string(),
            ));
        }

        if params.amount.value().is_zero() {
            return Err(CoordinatorError::InvalidInput(
                "amount must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub async fn get_quote(&self, params: &QuoteParams) -> CoordinatorResult<Quote> {
        self.validate(params)?;

        debug!(
            "Fetching quote for {} of {} on chain {} -> {} on chain {}",
            params.amount,
            params.src_token_address,
            params.src_chain_id,
            params.dst_token_address,
            params.dst_chain_id
        );

        let quote = self.relayer.get_quote(params).await.map_err(|e| match e {
            CoordinatorError::QuoteUnavailable(_) => e,
            other => CoordinatorError::QuoteUnavailable(other.to_string()),
        })?;

        info!(
            "Quote {} received: {} -> {} (recommended preset '{}')",
            quote.quote_id, quote.src_token_amount, quote.dst_token_amount, quote.recommended_preset
        );
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relayer::client::MockRelayerApi;
    use crate::relayer::types::fixtures::{sample_params, sample_quote};
    use tokio_test::{assert_err, assert_ok};

    fn client_with(relayer: MockRelayerApi) -> QuoteClient {
        QuoteClient::new(Arc::new(relayer), [1, 137, 42161])
    }

    #[test]
    fn test_parse_rejects_bad_amounts() {
        let wallet = Address::repeat_byte(0xaa);
        let token = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
        for amount in ["0", "1.5", "-3", "", "1e6"] {
            assert!(
                QuoteParams::parse(1, 137, token, token, amount, wallet).is_err(),
                "{amount:?} should be rejected"
            );
        }
        let params = assert_ok!(QuoteParams::parse(1, 137, token, token, "1000", wallet));
        assert_eq!(params.amount.to_string(), "1000");
    }

    #[test]
    fn test_parse_rejects_bad_addresses() {
        let wallet = Address::repeat_byte(0xaa);
        let token = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48";
        assert_err!(QuoteParams::parse(1, 137, "0x1234", token, "1", wallet));
        assert_err!(QuoteParams::parse(
            1,
            137,
            token,
            "0x0000000000000000000000000000000000000000",
            "1",
            wallet
        ));
    }

    #[tokio::test]
    async fn test_unsupported_chain_never_calls_relayer() {
        let mut relayer = MockRelayerApi::new();
        relayer.expect_get_quote().never();

        let mut params = sample_params();
        params.dst_chain_id = 56;

        let err = client_with(relayer).get_quote(&params).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::UnsupportedChain { chain_id: 56 }));
    }

    #[tokio::test]
    async fn test_same_chain_rejected() {
        let mut relayer = MockRelayerApi::new();
        relayer.expect_get_quote().never();

        let mut params = sample_params();
        params.dst_chain_id = params.src_chain_id;

        let err = client_with(relayer).get_quote(&params).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_relayer_failure_becomes_quote_unavailable() {
        let mut relayer = MockRelayerApi::new();
        relayer
            .expect_get_quote()
            .times(1)
            .returning(|_| Err(CoordinatorError::RelayerUnavailable("connection refused".into())));

        let err = client_with(relayer).get_quote(&sample_params()).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::QuoteUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_valid_quote_passes_through() {
        let mut relayer = MockRelayerApi::new();
        relayer
            .expect_get_quote()
            .times(1)
            .returning(|_| Ok(sample_quote(1)));

        let quote = client_with(relayer).get_quote(&sample_params()).await.unwrap();
        assert_eq!(quote, sample_quote(1));
    }
}
