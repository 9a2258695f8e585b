//! Blockchain model implementations.
//!
//! Only EVM networks are supported. The `evm` submodule holds the block and
//! receipt shapes, this module holds the per-block processing summary.

pub mod evm;

/// Outcome of handling one confirmed block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedBlock {
	pub network: String,
	pub block_number: u64,
	/// Transactions newly written to the store
	pub transactions_stored: usize,
	/// Transactions already present from an earlier pass
	pub transactions_duplicate: usize,
	/// Transactions that could not be converted or persisted
	pub transactions_skipped: usize,
	pub token_transfers: usize,
	pub deliveries_created: usize,
	/// The whole block was skipped because it had been processed before
	pub already_processed: bool,
}
