//! Secret material and hash locks
//!
//! - Secret generation and keccak commitments, held in memory only
//! - Single-fill and Merkle multi-fill hash locks

mod hashlock;
mod vault;

pub use hashlock::{HashLock, HashLockBuilder, MAX_SECRETS};
pub use vault::{Secret, SecretHash, SecretSet, SecretVault};
