//! Blockchain client interfaces and implementations.
//!
//! Provides the node-facing side of the watcher:
//!
//! - Generic blockchain client trait
//! - The EVM client built on alloy providers
//! - A factory so the orchestrator can be driven by test doubles
//! - Error handling for blockchain operations

mod client;
mod clients;
mod error;
mod factory;

pub use client::{BlockChainClient, HeaderStream};
pub use clients::{find_unsupported_transaction, EvmClient};
pub use error::BlockChainError;
pub use factory::{ClientFactory, EvmClientFactory};
