//! Per-order secret generation
//!
//! Secrets live only in memory for the lifetime of one swap attempt. Nothing
//! here persists or logs secret material.

use super::hashlock::MAX_SECRETS;
use crate::error::{CoordinatorError, CoordinatorResult};

use alloy_primitives::B256;
use ethers::core::rand::{rngs::OsRng, RngCore};
use serde::{Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;

/// 32-byte preimage unlocking one fill of an order
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(B256);

impl Secret {
    /// Draw a fresh secret from the OS random source
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self(B256::from(bytes))
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    /// keccak256 of the raw secret bytes
    pub fn hash(&self) -> SecretHash {
        SecretHash(keccak(self.0.as_slice()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0 .0
    }

    /// 0x-prefixed hex, the form the relayer expects on reveal
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// Commitment to a secret, safe to publish at submission time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SecretHash(B256);

impl SecretHash {
    pub fn as_b256(&self) -> B256 {
        self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl From<B256> for SecretHash {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl fmt::Display for SecretHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for SecretHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Index-aligned secrets and their hashes for one order
pub struct SecretSet {
    secrets: Vec<Secret>,
    hashes: Vec<SecretHash>,
}

impl SecretSet {
    /// Secret for a fill index, if the order has one
    pub fn get(&self, idx: usize) -> Option<&Secret> {
        self.secrets.get(idx)
    }

    pub fn secret_hashes(&self) -> &[SecretHash] {
        &self.hashes
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl fmt::Debug for SecretSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretSet")
            .field("count", &self.secrets.len())
            .field("hashes", &self.hashes)
            .finish()
    }
}

/// Generates secret sets; stateless
pub struct SecretVault;

impl SecretVault {
    /// Generate `count` secrets and their hashes
    pub fn generate(count: usize) -> CoordinatorResult<SecretSet> {
        if count < 1 || count > MAX_SECRETS {
            return Err(CoordinatorError::InvalidCount { count });
        }

        let secrets: Vec<Secret> = (0..count).map(|_| Secret::random()).collect();
        Ok(Self::from_secrets(secrets))
    }

    /// Build a set from known secrets, keeping their order
    pub fn from_secrets(secrets: Vec<Secret>) -> SecretSet {
        let hashes = secrets.iter().map(Secret::hash).collect();
        SecretSet { secrets, hashes }
    }
}

pub(crate) fn keccak(data: &[u8]) -> B256 {
    B256::from_slice(&Keccak256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_counts_and_alignment() {
        for count in 1..=16 {
            let set = SecretVault::generate(count).unwrap();
            assert_eq!(set.len(), count);
            assert_eq!(set.secret_hashes().len(), count);

            for (i, hash) in set.secret_hashes().iter().enumerate() {
                assert_eq!(*hash, set.get(i).unwrap().hash());
            }

            let distinct: HashSet<_> = (0..count).map(|i| *set.get(i).unwrap().as_bytes()).collect();
            assert_eq!(distinct.len(), count);
        }
    }

    #[test]
    fn test_zero_count_rejected() {
        let err = SecretVault::generate(0).unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidCount { count: 0 }));
    }

    #[test]
    fn test_count_above_lock_limit_rejected() {
        let err = SecretVault::generate(MAX_SECRETS + 1).unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidCount { .. }));
    }

    #[test]
    fn test_hash_is_keccak_of_secret() {
        let secret = Secret::from_bytes([0u8; 32]);
        // keccak256(bytes32(0))
        assert_eq!(
            secret.hash().to_hex(),
            "0x290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563"
        );
    }

    #[test]
    fn test_debug_redacts_secret() {
        let set = SecretVault::generate(2).unwrap();
        let secret = set.get(0).unwrap();
        let rendered = format!("{:?} {:?}", secret, set);
        assert!(!rendered.contains(&secret.to_hex()[2..]));
        assert!(rendered.contains("redacted"));
    }
}
