//! Core domain models for the transaction watcher.
//!
//! This module contains the fundamental data structures that represent:
//! - Networks: EVM network definitions and connection details
//! - Transactions: stored transactions and their ERC-20 transfers
//! - Webhooks: watched addresses, endpoints and delivery records

mod network;
mod transaction;
mod webhook;

pub use network::Network;
pub use transaction::{TokenTransfer, Transaction, TransactionStatus};
pub use webhook::{DeliveryStatus, WatchedAddress, Webhook, WebhookDelivery};
