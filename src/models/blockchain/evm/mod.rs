//! Ethereum Virtual Machine (EVM) blockchain specific implementations.
//!
//! This module contains the block, transaction and receipt shapes handed from
//! the chain client to the watcher and the block processor.

mod block;
mod receipt;

pub use block::{BlockFetch, BlockHeader, BlockTransaction, ConfirmedBlock};
pub use receipt::{ReceiptLog, TransactionReceipt as EVMTransactionReceipt};
