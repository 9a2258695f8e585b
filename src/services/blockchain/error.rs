//! Blockchain error types and handling.
//!
//! Covers dialing a node, verifying its chain id, the new-head subscription,
//! and block or receipt retrieval.

use crate::services::blockwatcher::BlockWatcherError;

use log::error;

/// Represents possible errors that can occur during blockchain operations
#[derive(Debug)]
pub enum BlockChainError {
	/// The node could not be reached or the connection dropped
	ConnectionError(String),

	/// The node reports a different chain than the network configuration
	ChainMismatch { expected: u64, actual: u64 },

	/// The new-head subscription failed or ended
	SubscriptionError(String),

	/// Errors related to malformed requests or invalid responses
	RequestError(String),

	/// When a requested block cannot be found on the blockchain
	///
	/// Contains the block number that was not found
	BlockNotFound(u64),

	/// A transaction receipt could not be fetched
	ReceiptFetchError(String),
}

impl BlockChainError {
	/// Formats the error message based on the error type
	fn format_message(&self) -> String {
		match self {
			Self::ConnectionError(msg) => format!("Connection error: {}", msg),
			Self::ChainMismatch { expected, actual } => format!(
				"Chain mismatch: expected chain id {}, node reports {}",
				expected, actual
			),
			Self::SubscriptionError(msg) => format!("Subscription error: {}", msg),
			Self::RequestError(msg) => format!("Request error: {}", msg),
			Self::BlockNotFound(number) => format!("Block not found: {}", number),
			Self::ReceiptFetchError(msg) => format!("Receipt fetch error: {}", msg),
		}
	}

	/// Creates a new connection error with logging
	pub fn connection_error(msg: impl Into<String>) -> Self {
		let error = Self::ConnectionError(msg.into());
		error!("{}", error.format_message());
		error
	}

	/// Creates a new chain mismatch error with logging
	pub fn chain_mismatch(expected: u64, actual: u64) -> Self {
		let error = Self::ChainMismatch { expected, actual };
		error!("{}", error.format_message());
		error
	}

	/// Creates a new subscription error with logging
	pub fn subscription_error(msg: impl Into<String>) -> Self {
		let error = Self::SubscriptionError(msg.into());
		error!("{}", error.format_message());
		error
	}

	/// Creates a new request error with logging
	pub fn request_error(msg: impl Into<String>) -> Self {
		let error = Self::RequestError(msg.into());
		error!("{}", error.format_message());
		error
	}

	/// Creates a new block not found error with logging
	pub fn block_not_found(number: u64) -> Self {
		let error = Self::BlockNotFound(number);
		error!("{}", error.format_message());
		error
	}

	/// Creates a new receipt error with logging
	pub fn receipt_fetch_error(msg: impl Into<String>) -> Self {
		let error = Self::ReceiptFetchError(msg.into());
		error!("{}", error.format_message());
		error
	}
}

impl std::fmt::Display for BlockChainError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.format_message())
	}
}

impl std::error::Error for BlockChainError {}

impl From<alloy::transports::TransportError> for BlockChainError {
	fn from(err: alloy::transports::TransportError) -> Self {
		Self::request_error(err.to_string())
	}
}

/// Conversion from BlockChainError to BlockWatcherError
impl From<BlockChainError> for BlockWatcherError {
	fn from(err: BlockChainError) -> Self {
		BlockWatcherError::network_error(err.to_string())
	}
}
