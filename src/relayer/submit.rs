//! Signed order submission

use super::client::RelayerApi;
use super::types::{OrderHash, SubmitOrderRequest};
use crate::error::{CoordinatorError, CoordinatorResult};
use crate::order::{OrderSignature, SignableOrder};
use crate::secrets::{HashLock, HashLockBuilder, SecretHash};

use std::sync::Arc;
use tracing::info;

/// Submits signed orders together with their hash-lock material
pub struct OrderSubmitter {
    relayer: Arc<dyn RelayerApi>,
}

impl OrderSubmitter {
    pub fn new(relayer: Arc<dyn RelayerApi>) -> Self {
        Self { relayer }
    }

    /// Submit the order; either an order hash comes back or nothing happened
    pub async fn submit(
        &self,
        order: &SignableOrder,
        signature: &OrderSignature,
        hash_lock: &HashLock,
        secret_hashes: &[SecretHash],
    ) -> CoordinatorResult<OrderHash> {
        let request = Self::build_request(order, signature, hash_lock, secret_hashes)?;

        let order_hash = self.relayer.submit_order(&request).await?;

        info!(
            "Order {} submitted for quote {} with {} secret hash(es)",
            order_hash,
            order.quote_id,
            secret_hashes.len()
        );
        Ok(order_hash)
    }

    /// Request body, refusing material that does not belong together
    pub fn build_request(
        order: &SignableOrder,
        signature: &OrderSignature,
        hash_lock: &HashLock,
        secret_hashes: &[SecretHash],
    ) -> CoordinatorResult<SubmitOrderRequest> {
        if secret_hashes.len() != hash_lock.secret_count() {
            return Err(CoordinatorError::InvalidInput(format!(
                "hash lock commits to {} secrets but {} hashes were given",
                hash_lock.secret_count(),
                secret_hashes.len()
            )));
        }
        if HashLockBuilder::build(secret_hashes)? != *hash_lock {
            return Err(CoordinatorError::InvalidInput(
                "hash lock was not built from the given secret hashes".to_string(),
            ));
        }

        Ok(SubmitOrderRequest {
            order: order.message_json(),
            src_chain_id: order.src_chain_id,
            signature: signature.to_hex(),
            extension: format!("0x{}", hex::encode(&order.extension)),
            quote_id: order.quote_id.clone(),
            hash_lock: format!("0x{}", hex::encode(hash_lock.value())),
            merkle_leaves: hash_lock
                .leaves()
                .iter()
                .map(|leaf| format!("0x{}", hex::encode(leaf)))
                .collect(),
            secret_hashes: secret_hashes.to_vec(),
        })
    }
}
