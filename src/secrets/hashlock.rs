//! Hash lock derivation for single-fill and multi-fill orders
//!
//! Multi-fill leaves are `keccak256(uint64(idx) ++ secretHash)` in secret index
//! order. The lock value is the Merkle root over those leaves with the top 16
//! bits replaced by `leaves - 1`, so resolvers can read the part count from the
//! lock itself.

use super::vault::{keccak, Secret, SecretHash};
use crate::error::{CoordinatorError, CoordinatorResult};

use alloy_primitives::B256;

/// Largest part count the 16-bit tag in a multi-fill lock can carry
pub const MAX_SECRETS: usize = u16::MAX as usize + 1;

/// Commitment the order's escrows are locked under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashLock {
    /// One secret unlocks the whole order
    Single(B256),
    /// One secret per fill part
    Multiple { value: B256, leaves: Vec<B256> },
}

impl HashLock {
    /// Lock for an order that can only be filled once
    pub fn for_single_fill(secret: &Secret) -> Self {
        HashLock::Single(secret.hash().as_b256())
    }

    /// Lock over prepared Merkle leaves; needs at least two
    pub fn for_multiple_fills(leaves: Vec<B256>) -> CoordinatorResult<Self> {
        if leaves.len() < 2 {
            return Err(CoordinatorError::InvalidSecretCount {
                count: leaves.len(),
            });
        }

        let parts = u16::try_from(leaves.len() - 1).map_err(|_| {
            CoordinatorError::InvalidSecretCount {
                count: leaves.len(),
            }
        })?;
        let mut value = merkle_root(&leaves).0;
        value[..2].copy_from_slice(&parts.to_be_bytes());

        Ok(HashLock::Multiple {
            value: B256::from(value),
            leaves,
        })
    }

    /// Leaf for fill index `idx`
    pub fn merkle_leaf(idx: u64, secret_hash: &SecretHash) -> B256 {
        let mut packed = [0u8; 40];
        packed[..8].copy_from_slice(&idx.to_be_bytes());
        packed[8..].copy_from_slice(secret_hash.as_b256().as_slice());
        keccak(&packed)
    }

    /// The 32-byte lock value placed in the order
    pub fn value(&self) -> B256 {
        match self {
            HashLock::Single(value) => *value,
            HashLock::Multiple { value, .. } => *value,
        }
    }

    /// Merkle leaves, empty for single-fill locks
    pub fn leaves(&self) -> &[B256] {
        match self {
            HashLock::Single(_) => &[],
            HashLock::Multiple { leaves, .. } => leaves,
        }
    }

    /// Number of secrets this lock commits to
    pub fn secret_count(&self) -> usize {
        match self {
            HashLock::Single(_) => 1,
            HashLock::Multiple { leaves, .. } => leaves.len(),
        }
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self, HashLock::Multiple { .. })
    }
}

/// Builds hash locks from ordered secret hashes
pub struct HashLockBuilder;

impl HashLockBuilder {
    pub fn build(secret_hashes: &[SecretHash]) -> CoordinatorResult<HashLock> {
        match secret_hashes {
            [] => Err(CoordinatorError::InvalidSecretCount { count: 0 }),
            [single] => Ok(HashLock::Single(single.as_b256())),
            many => {
                let leaves = many
                    .iter()
                    .enumerate()
                    .map(|(idx, hash)| HashLock::merkle_leaf(idx as u64, hash))
                    .collect();
                HashLock::for_multiple_fills(leaves)
            }
        }
    }
}

/// Root of a complete binary tree with leaves laid out right to left at the
/// bottom level and sorted-pair keccak for internal nodes.
fn merkle_root(leaves: &[B256]) -> B256 {
    let n = leaves.len();
    let mut tree = vec![B256::ZERO; 2 * n - 1];
    let last = tree.len() - 1;

    for (i, leaf) in leaves.iter().enumerate() {
        tree[last - i] = *leaf;
    }
    for i in (0..tree.len() - n).rev() {
        tree[i] = hash_pair(&tree[2 * i + 1], &tree[2 * i + 2]);
    }

    tree[0]
}

fn hash_pair(a: &B256, b: &B256) -> B256 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut buf = [0u8; 64];
    buf[..32].copy_from_slice(lo.as_slice());
    buf[32..].copy_from_slice(hi.as_slice());
    keccak(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretVault;

    #[test]
    fn test_single_path_matches_direct_lock() {
        let set = SecretVault::generate(1).unwrap();
        let built = HashLockBuilder::build(set.secret_hashes()).unwrap();
        assert_eq!(built, HashLock::for_single_fill(set.get(0).unwrap()));
        assert!(built.leaves().is_empty());
        assert_eq!(built.secret_count(), 1);
    }

    #[test]
    fn test_empty_rejected() {
        let err = HashLockBuilder::build(&[]).unwrap_err();
        assert!(matches!(err, CoordinatorError::InvalidSecretCount { count: 0 }));
    }

    #[test]
    fn test_deterministic_and_order_sensitive() {
        let set = SecretVault::generate(3).unwrap();
        let hashes = set.secret_hashes().to_vec();

        let first = HashLockBuilder::build(&hashes).unwrap();
        let second = HashLockBuilder::build(&hashes).unwrap();
        assert_eq!(first, second);

        let mut reordered = hashes.clone();
        reordered.swap(0, 2);
        let third = HashLockBuilder::build(&reordered).unwrap();
        assert_ne!(first.value(), third.value());
        assert_ne!(first.leaves(), third.leaves());
    }

    #[test]
    fn test_leaves_follow_index_order() {
        let set = SecretVault::generate(4).unwrap();
        let lock = HashLockBuilder::build(set.secret_hashes()).unwrap();
        assert_eq!(lock.secret_count(), 4);
        for (idx, leaf) in lock.leaves().iter().enumerate() {
            assert_eq!(
                *leaf,
                HashLock::merkle_leaf(idx as u64, &set.secret_hashes()[idx])
            );
        }
    }

    #[test]
    fn test_leaf_encoding_is_packed_uint64_and_hash() {
        let hash = SecretHash::from(B256::repeat_byte(0x11));
        let mut expected_input = vec![0, 0, 0, 0, 0, 0, 0, 5];
        expected_input.extend_from_slice(&[0x11; 32]);
        assert_eq!(HashLock::merkle_leaf(5, &hash), keccak(&expected_input));
    }

    #[test]
    fn test_two_leaf_root_carries_part_count() {
        let a = B256::repeat_byte(0x01);
        let b = B256::repeat_byte(0x02);
        let lock = HashLock::for_multiple_fills(vec![a, b]).unwrap();

        let root = hash_pair(&a, &b);
        let value = lock.value();
        assert_eq!(&value[..2], &[0, 1]);
        assert_eq!(&value[2..], &root[2..]);
    }

    #[test]
    fn test_part_count_beyond_tag_rejected() {
        let leaves = vec![B256::repeat_byte(0x01); MAX_SECRETS + 1];
        let err = HashLock::for_multiple_fills(leaves).unwrap_err();
        assert!(matches!(
            err,
            CoordinatorError::InvalidSecretCount { count } if count == MAX_SECRETS + 1
        ));
    }

    #[test]
    fn test_part_count_for_larger_sets() {
        let set = SecretVault::generate(16).unwrap();
        let lock = HashLockBuilder::build(set.secret_hashes()).unwrap();
        assert_eq!(&lock.value()[..2], &[0, 15]);
    }
}
