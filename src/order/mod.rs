//! Maker order construction and signing
//!
//! Orders are assembled strictly from the quote's exact values and signed
//! under the source chain's EIP-712 domain.

pub mod exact;
pub mod signer;
pub mod types;

pub use exact::{ExactAmount, ExactValues};
pub use signer::{LocalWalletSigner, OrderSignature, OrderSigner, TypedDataRequest, TypedDataSigner};
pub use types::{order_domain, Order, SignableOrder};
