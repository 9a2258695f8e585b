//! Core blockchain client interface.
//!
//! One client exists per watched network. The watcher only depends on this
//! trait so tests can drive it with scripted header streams.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{
	models::{BlockFetch, BlockHeader, Network},
	services::blockchain::BlockChainError,
};

/// New-head notifications in arrival order.
///
/// An `Err` item or the end of the stream means the subscription is gone and
/// must be re-established.
pub type HeaderStream = BoxStream<'static, Result<BlockHeader, BlockChainError>>;

/// Defines the interface the watcher needs from a node connection
#[async_trait]
pub trait BlockChainClient: Send + Sync {
	/// Network this client is connected to
	fn network(&self) -> &Network;

	/// Retrieves the latest block number from the blockchain
	async fn get_latest_block_number(&self) -> Result<u64, BlockChainError>;

	/// Opens a new-head subscription
	async fn subscribe_headers(&self) -> Result<HeaderStream, BlockChainError>;

	/// Fetches a block with its transactions and their receipts.
	///
	/// Blocks whose transactions cannot be decoded are returned as
	/// [`BlockFetch::Unsupported`] rather than as an error.
	async fn get_block_with_receipts(&self, number: u64) -> Result<BlockFetch, BlockChainError>;

	/// Releases the connection. Further calls fail with a connection error.
	async fn close(&self);
}
