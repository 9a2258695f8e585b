//! Block processor error types.

use thiserror::Error;

use crate::repositories::RepositoryError;

/// Per-transaction failures. Each one skips a single transaction; the rest of
/// the block is still processed.
#[derive(Debug, Error)]
pub enum ProcessorError {
	#[error("Failed to convert transaction {hash}: {reason}")]
	TransactionConversion { hash: String, reason: String },

	#[error("Failed to persist transaction {hash}: {source}")]
	Persistence {
		hash: String,
		#[source]
		source: RepositoryError,
	},

	#[error("Failed to load watched addresses: {0}")]
	WatchedAddresses(#[source] RepositoryError),

	#[error("Failed to build webhook payload: {0}")]
	Payload(#[from] serde_json::Error),
}

impl ProcessorError {
	pub fn conversion(hash: impl Into<String>, reason: impl Into<String>) -> Self {
		Self::TransactionConversion {
			hash: hash.into(),
			reason: reason.into(),
		}
	}
}
