//! Order construction from a quote and maker signing

use super::types::{order_domain, Order, SignableOrder};
use crate::config::OrderConfig;
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::relayer::Quote;

use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::Eip712Domain;
use async_trait::async_trait;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Signature, H256};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

/// What a wallet is asked to sign
#[derive(Debug, Clone)]
pub struct TypedDataRequest {
    /// `eth_signTypedData_v4` payload for wallets that render typed data
    pub typed_data: Value,
    /// EIP-712 digest for signers that sign raw hashes
    pub digest: B256,
}

/// 65-byte `r ++ s ++ v` order signature
#[derive(Clone, PartialEq, Eq)]
pub struct OrderSignature(Bytes);

impl OrderSignature {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> CoordinatorResult<Self> {
        let bytes = bytes.into();
        if bytes.len() != 65 {
            return Err(CoordinatorError::Wallet(format!(
                "signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    /// Recover the signing address for an EIP-712 digest
    pub fn recover(&self, digest: B256) -> CoordinatorResult<Address> {
        let signature = Signature::try_from(self.0.as_ref())
            .map_err(|e| CoordinatorError::Wallet(format!("malformed signature: {}", e)))?;
        let signer = signature
            .recover(H256::from_slice(digest.as_slice()))
            .map_err(|e| CoordinatorError::Wallet(format!("signature recovery failed: {}", e)))?;
        Ok(Address::from_slice(signer.as_bytes()))
    }
}

impl fmt::Debug for OrderSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderSignature({})", self.to_hex())
    }
}

/// Wallet that signs EIP-712 typed data on the maker's behalf
///
/// Implementations may suspend until the user approves. A user decline must
/// surface as [`CoordinatorError::UserRejectedSignature`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TypedDataSigner: Send + Sync {
    /// Maker address the wallet signs for
    fn address(&self) -> Address;

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> CoordinatorResult<OrderSignature>;
}

/// Private-key wallet signing the digest locally
pub struct LocalWalletSigner {
    wallet: LocalWallet,
}

impl LocalWalletSigner {
    pub fn new(wallet: LocalWallet) -> Self {
        Self { wallet }
    }

    /// Load the key from the named environment variable
    pub fn from_env(var: &str) -> CoordinatorResult<Self> {
        let key = std::env::var(var).map_err(|_| {
            CoordinatorError::Wallet(format!("No wallet configured. Set {}", var))
        })?;

        key.trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map(Self::new)
            .map_err(|e| CoordinatorError::Wallet(format!("Invalid private key: {}", e)))
    }
}

#[async_trait]
impl TypedDataSigner for LocalWalletSigner {
    fn address(&self) -> Address {
        Address::from_slice(self.wallet.address().as_bytes())
    }

    async fn sign_typed_data(&self, request: &TypedDataRequest) -> CoordinatorResult<OrderSignature> {
        let signature = self
            .wallet
            .sign_hash(H256::from_slice(request.digest.as_slice()))
            .map_err(|e| CoordinatorError::Wallet(e.to_string()))?;

        OrderSignature::from_bytes(signature.to_vec())
    }
}

/// Builds orders from quotes and obtains the maker's signature
pub struct OrderSigner {
    signer: Arc<dyn TypedDataSigner>,
    config: OrderConfig,
}

impl OrderSigner {
    pub fn new(signer: Arc<dyn TypedDataSigner>, config: OrderConfig) -> Self {
        Self { signer, config }
    }

    /// Maker address of the underlying wallet
    pub fn maker(&self) -> Address {
        self.signer.address()
    }

    /// Domain for orders on `chain_id`
    pub fn domain(&self, chain_id: u64, verifying_contract: Address) -> Eip712Domain {
        order_domain(&self.config, chain_id, verifying_contract)
    }

    /// Copy the quote's exact values into a signable order
    ///
    /// The receiver is left as the zero address, which pays back to the maker.
    pub fn build_signable_order(quote: &Quote, maker: Address, maker_asset: Address) -> SignableOrder {
        let exact = &quote.exact_values;

        let order = Order {
            salt: exact.salt.value(),
            maker,
            receiver: Address::ZERO,
            makerAsset: maker_asset,
            takerAsset: exact.taker_asset,
            makingAmount: exact.making_amount.value(),
            takingAmount: exact.taking_amount.value(),
            makerTraits: exact.maker_traits.value(),
        };

        SignableOrder {
            order,
            quote_id: quote.quote_id.clone(),
            src_chain_id: quote.src_chain_id,
            extension: exact.extension.clone(),
            making_amount: exact.making_amount.clone(),
            taking_amount: exact.taking_amount.clone(),
            salt: exact.salt.clone(),
            maker_traits: exact.maker_traits.clone(),
        }
    }

    /// Ask the wallet to sign the order under `domain`
    pub async fn sign(
        &self,
        order: &SignableOrder,
        domain: &Eip712Domain,
    ) -> CoordinatorResult<OrderSignature> {
        let digest = order.signing_hash(domain);
        let request = TypedDataRequest {
            typed_data: order.typed_data_json(domain),
            digest,
        };

        debug!(
            "Requesting signature for quote {} (digest {})",
            order.quote_id, digest
        );

        let signature = self.signer.sign_typed_data(&request).await?;

        info!("Order for quote {} signed by {}", order.quote_id, self.maker());
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relayer::types::fixtures::sample_quote;
    use ethers::core::rand::thread_rng;

    fn local_signer() -> Arc<LocalWalletSigner> {
        Arc::new(LocalWalletSigner::new(LocalWallet::new(&mut thread_rng())))
    }

    fn domain() -> Eip712Domain {
        order_domain(
            &OrderConfig::default(),
            1,
            "0x111111125421ca6dc452d289314280a0f8842a65".parse().unwrap(),
        )
    }

    #[test]
    fn test_build_copies_exact_values() {
        let quote = sample_quote(1);
        let maker: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        let maker_asset: Address = "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse().unwrap();

        let signable = OrderSigner::build_signable_order(&quote, maker, maker_asset);
        let exact = &quote.exact_values;

        assert_eq!(signable.order.salt, exact.salt.value());
        assert_eq!(signable.order.maker, maker);
        assert_eq!(signable.order.receiver, Address::ZERO);
        assert_eq!(signable.order.makerAsset, maker_asset);
        assert_eq!(signable.order.takerAsset, exact.taker_asset);
        assert_eq!(signable.order.makingAmount, exact.making_amount.value());
        assert_eq!(signable.order.takingAmount, exact.taking_amount.value());
        assert_eq!(signable.order.makerTraits, exact.maker_traits.value());
        assert_eq!(signable.message_json()["makingAmount"], exact.making_amount.as_str());
        assert_eq!(signable.quote_id, quote.quote_id);
    }

    #[tokio::test]
    async fn test_sign_then_recover_yields_maker() {
        let wallet = local_signer();
        let maker = wallet.address();
        let signer = OrderSigner::new(wallet, OrderConfig::default());

        let quote = sample_quote(2);
        let signable = OrderSigner::build_signable_order(&quote, maker, Address::repeat_byte(0x42));
        let domain = domain();

        let signature = signer.sign(&signable, &domain).await.unwrap();
        let recovered = signature.recover(signable.signing_hash(&domain)).unwrap();
        assert_eq!(recovered, maker);
    }

    #[tokio::test]
    async fn test_signature_bound_to_domain() {
        let wallet = local_signer();
        let maker = wallet.address();
        let signer = OrderSigner::new(wallet, OrderConfig::default());

        let signable = OrderSigner::build_signable_order(&sample_quote(1), maker, Address::repeat_byte(1));
        let signature = signer.sign(&signable, &domain()).await.unwrap();

        let other_chain = signer.domain(137, "0x111111125421ca6dc452d289314280a0f8842a65".parse().unwrap());
        let recovered = signature.recover(signable.signing_hash(&other_chain)).unwrap();
        assert_ne!(recovered, maker);
    }

    #[tokio::test]
    async fn test_rejection_propagates() {
        let mut wallet = MockTypedDataSigner::new();
        wallet.expect_address().return_const(Address::repeat_byte(7));
        wallet
            .expect_sign_typed_data()
            .times(1)
            .returning(|_| Err(CoordinatorError::UserRejectedSignature));

        let signer = OrderSigner::new(Arc::new(wallet), OrderConfig::default());
        let signable = OrderSigner::build_signable_order(&sample_quote(1), Address::repeat_byte(7), Address::repeat_byte(1));

        let err = signer.sign(&signable, &domain()).await.unwrap_err();
        assert!(matches!(err, CoordinatorError::UserRejectedSignature));
    }

    #[test]
    fn test_typed_data_payload_shape() {
        let signable = OrderSigner::build_signable_order(&sample_quote(1), Address::repeat_byte(7), Address::repeat_byte(1));
        let payload = signable.typed_data_json(&domain());

        assert_eq!(payload["primaryType"], "Order");
        assert_eq!(payload["domain"]["chainId"], "1");
        assert_eq!(payload["types"]["Order"].as_array().unwrap().len(), 8);
        assert_eq!(payload["types"]["EIP712Domain"].as_array().unwrap().len(), 4);
        assert_eq!(
            payload["message"]["receiver"],
            "0x0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn test_signature_length_checked() {
        assert!(OrderSignature::from_bytes(vec![0u8; 64]).is_err());
        assert!(OrderSignature::from_bytes(vec![0u8; 65]).is_ok());
    }
}
