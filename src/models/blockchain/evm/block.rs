//! EVM block data structures.

use alloy::{
	consensus::TxEnvelope,
	primitives::{B256, U256},
};
use chrono::{DateTime, Utc};

use super::receipt::TransactionReceipt;

/// A new-head notification that has not reached its confirmation depth yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
	pub number: u64,
	pub hash: B256,
	/// Block timestamp in seconds since the epoch
	pub timestamp: u64,
	/// When this process first saw the header
	pub observed_at: DateTime<Utc>,
}

impl BlockHeader {
	pub fn new(number: u64, hash: B256, timestamp: u64) -> Self {
		Self {
			number,
			hash,
			timestamp,
			observed_at: Utc::now(),
		}
	}
}

/// A signed transaction paired with its receipt
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTransaction {
	pub envelope: TxEnvelope,
	pub receipt: TransactionReceipt,
}

impl BlockTransaction {
	/// Gas price to record: the receipt's effective price when the node reports one.
	pub fn gas_price(&self) -> U256 {
		use alloy::consensus::Transaction as _;

		if self.receipt.effective_gas_price > 0 {
			U256::from(self.receipt.effective_gas_price)
		} else {
			U256::from(
				self.envelope
					.gas_price()
					.unwrap_or_else(|| self.envelope.max_fee_per_gas()),
			)
		}
	}
}

/// A block that reached its confirmation depth, with everything the processor needs
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedBlock {
	/// Slug of the network the block came from
	pub network: String,
	pub chain_id: u64,
	pub number: u64,
	pub hash: B256,
	pub timestamp: u64,
	/// Transactions in block order
	pub transactions: Vec<BlockTransaction>,
}

impl ConfirmedBlock {
	pub fn timestamp_utc(&self) -> DateTime<Utc> {
		DateTime::<Utc>::from_timestamp(self.timestamp as i64, 0).unwrap_or_default()
	}
}

/// Result of fetching a full block from a node.
///
/// Some L2 networks include transaction types the client cannot decode. Those
/// blocks are reported as `Unsupported` so the watcher can fall back to a
/// header-only notification.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockFetch {
	Supported(Box<ConfirmedBlock>),
	Unsupported { number: u64, reason: String },
}
