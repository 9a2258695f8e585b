//! Blockchain client implementations.
//!
//! Only EVM-compatible chains are supported.

mod evm;

pub use evm::{find_unsupported_transaction, EvmClient};
