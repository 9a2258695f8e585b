//! Blockchain client factory implementation.
//!
//! Abstracts client initialization so the orchestrator can connect every
//! configured network without knowing how the connection is made.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
	models::Network,
	services::blockchain::{clients::EvmClient, BlockChainClient, BlockChainError},
};

/// Creates connected clients for configured networks
#[async_trait]
pub trait ClientFactory: Send + Sync {
	/// Connects to the network's node and verifies its chain id
	///
	/// # Arguments
	/// * `network` - Network configuration containing the connection details
	///
	/// # Returns
	/// * `Result<Arc<dyn BlockChainClient>, BlockChainError>` - Connected client or error
	async fn connect(
		&self,
		network: &Network,
	) -> Result<Arc<dyn BlockChainClient>, BlockChainError>;
}

/// Factory producing [`EvmClient`]s
#[derive(Clone, Copy, Debug, Default)]
pub struct EvmClientFactory;

#[async_trait]
impl ClientFactory for EvmClientFactory {
	async fn connect(
		&self,
		network: &Network,
	) -> Result<Arc<dyn BlockChainClient>, BlockChainError> {
		let client = EvmClient::connect(network).await?;
		Ok(Arc::new(client))
	}
}
