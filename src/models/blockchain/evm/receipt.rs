//! EVM receipt data structures.

use alloy::primitives::{Address, Bytes, B256};

/// A log entry emitted during transaction execution
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiptLog {
	/// Contract that emitted the log
	pub address: Address,
	pub topics: Vec<B256>,
	pub data: Bytes,
	/// Position of the log within the block
	pub log_index: u64,
}

/// The subset of a transaction receipt the processor consumes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionReceipt {
	/// `true` when execution succeeded
	pub status: bool,
	pub gas_used: u64,
	pub effective_gas_price: u128,
	pub transaction_index: u64,
	pub logs: Vec<ReceiptLog>,
}
