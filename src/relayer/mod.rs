//! Relayer access: quotes, order submission, fill polling and secret reveal

pub mod client;
pub mod quote;
pub mod submit;
pub mod types;

pub use client::{Endpoint, HttpRelayerClient, RelayerApi};
pub use quote::QuoteClient;
pub use submit::OrderSubmitter;
pub use types::{
    OrderHash, OrderStatus, Preset, Quote, QuoteParams, ReadyFill, SubmitOrderRequest,
};
