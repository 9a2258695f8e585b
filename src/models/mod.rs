//! Domain models and data structures for the transaction watcher.
//!
//! This module contains all the core data structures used throughout the application:
//!
//! - `blockchain`: Block, receipt and header shapes for EVM networks
//! - `config`: Configuration loading and validation
//! - `core`: Core domain models (Network, Transaction, Webhook)

mod blockchain;
mod config;
mod core;

// Re-export blockchain types
pub use blockchain::evm::{
	BlockFetch, BlockHeader, BlockTransaction, ConfirmedBlock, EVMTransactionReceipt, ReceiptLog,
};
pub use blockchain::ProcessedBlock;

// Re-export core types
pub use core::{
	DeliveryStatus, Network, TokenTransfer, Transaction, TransactionStatus, WatchedAddress,
	Webhook, WebhookDelivery,
};

// Re-export config types
pub use config::{ConfigError, ConfigLoader, WorkerConfig};
