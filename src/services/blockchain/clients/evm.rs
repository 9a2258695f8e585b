//! EVM-compatible blockchain client implementation.
//!
//! Talks to one node through an alloy provider: WebSocket endpoints get a real
//! `eth_subscribe` head subscription, HTTP endpoints are polled through a
//! block filter.

use std::time::Duration;

use alloy::{
	consensus::TxEnvelope,
	eips::BlockNumberOrTag,
	network::ReceiptResponse,
	primitives::B256,
	providers::{DynProvider, Provider, ProviderBuilder},
	rpc::types::{Block, TransactionReceipt},
	transports::ws::WsConnect,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
	models::{
		BlockFetch, BlockHeader, BlockTransaction, ConfirmedBlock, EVMTransactionReceipt, Network,
		ReceiptLog,
	},
	services::blockchain::{client::BlockChainClient, BlockChainError, HeaderStream},
	utils::WithRetry,
};

/// Time allowed for dialing the node and verifying its chain id
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Transaction envelope types the client can decode and recover senders from
const SUPPORTED_TX_TYPES: [u64; 5] = [0x0, 0x1, 0x2, 0x3, 0x4];

/// Client for one EVM network
pub struct EvmClient {
	network: Network,
	/// `None` once the client is closed
	provider: RwLock<Option<DynProvider>>,
}

impl EvmClient {
	/// Dials the network's node and verifies it serves the configured chain.
	///
	/// # Errors
	/// - `ConnectionError` if the node cannot be reached in time
	/// - `ChainMismatch` if `eth_chainId` differs from `network.chain_id`
	pub async fn connect(network: &Network) -> Result<Self, BlockChainError> {
		let provider = tokio::time::timeout(CONNECT_TIMEOUT, dial(network))
			.await
			.map_err(|_| {
				BlockChainError::connection_error(format!(
					"Timed out connecting to {} after {:?}",
					network.slug, CONNECT_TIMEOUT
				))
			})??;

		let client = Self::with_provider(network.clone(), provider);
		client.verify_chain_id().await?;
		info!(network = %network.slug, chain_id = network.chain_id, "Connected to node");
		Ok(client)
	}

	/// Wraps an existing provider without dialing or verification.
	pub fn with_provider(network: Network, provider: DynProvider) -> Self {
		Self {
			network,
			provider: RwLock::new(Some(provider)),
		}
	}

	/// Compares the node's chain id with the configured one.
	pub async fn verify_chain_id(&self) -> Result<(), BlockChainError> {
		let actual = self.provider().await?.get_chain_id().await.map_err(|e| {
			BlockChainError::connection_error(format!("Failed to read chain id: {}", e))
		})?;
		if actual != self.network.chain_id {
			return Err(BlockChainError::chain_mismatch(self.network.chain_id, actual));
		}
		Ok(())
	}

	/// Hands out a handle to the open provider.
	async fn provider(&self) -> Result<DynProvider, BlockChainError> {
		self.provider.read().await.clone().ok_or_else(|| {
			BlockChainError::connection_error(format!("Client for {} is closed", self.network.slug))
		})
	}

	async fn fetch_receipt(
		&self,
		provider: &DynProvider,
		hash: B256,
	) -> Result<Option<TransactionReceipt>, BlockChainError> {
		WithRetry::with_default_config()
			.attempt(|| async {
				provider
					.get_transaction_receipt(hash)
					.await
					.map_err(|e| BlockChainError::receipt_fetch_error(format!("{}: {}", hash, e)))
			})
			.await
	}
}

async fn dial(network: &Network) -> Result<DynProvider, BlockChainError> {
	if network.is_websocket() {
		let provider = ProviderBuilder::new()
			.connect_ws(WsConnect::new(network.rpc_url.clone()))
			.await
			.map_err(|e| {
				BlockChainError::connection_error(format!(
					"Failed to connect to {}: {}",
					network.slug, e
				))
			})?;
		Ok(provider.erased())
	} else {
		let url = Url::parse(&network.rpc_url).map_err(|e| {
			BlockChainError::connection_error(format!(
				"Invalid rpc_url for {}: {}",
				network.slug, e
			))
		})?;
		Ok(ProviderBuilder::new().connect_http(url).erased())
	}
}

/// Finds the first transaction whose `type` the client cannot decode.
///
/// Works on the raw JSON so that blocks from L2s with custom transaction
/// types (deposit transactions and the like) are detected by shape instead of
/// by decoder error text.
pub fn find_unsupported_transaction(block: &Value) -> Option<String> {
	let transactions = block.get("transactions")?.as_array()?;
	transactions.iter().find_map(|tx| {
		let raw_type = tx.get("type").and_then(Value::as_str).unwrap_or("0x0");
		let hash = tx.get("hash").and_then(Value::as_str).unwrap_or("unknown");
		match u64::from_str_radix(raw_type.trim_start_matches("0x"), 16) {
			Ok(tx_type) if SUPPORTED_TX_TYPES.contains(&tx_type) => None,
			Ok(_) | Err(_) => Some(format!(
				"transaction {} has unsupported type {}",
				hash, raw_type
			)),
		}
	})
}

fn convert_receipt(receipt: &TransactionReceipt, fallback_index: u64) -> EVMTransactionReceipt {
	EVMTransactionReceipt {
		status: ReceiptResponse::status(receipt),
		gas_used: ReceiptResponse::gas_used(receipt),
		effective_gas_price: ReceiptResponse::effective_gas_price(receipt),
		transaction_index: ReceiptResponse::transaction_index(receipt).unwrap_or(fallback_index),
		logs: receipt
			.inner
			.logs()
			.iter()
			.map(|log| ReceiptLog {
				address: log.address(),
				topics: log.topics().to_vec(),
				data: log.data().data.clone(),
				log_index: log.log_index.unwrap_or_default(),
			})
			.collect(),
	}
}

#[async_trait]
impl BlockChainClient for EvmClient {
	fn network(&self) -> &Network {
		&self.network
	}

	async fn get_latest_block_number(&self) -> Result<u64, BlockChainError> {
		let provider = self.provider().await?;
		WithRetry::with_default_config()
			.attempt(|| async {
				provider
					.get_block_number()
					.await
					.map_err(|e| BlockChainError::request_error(e.to_string()))
			})
			.await
	}

	async fn subscribe_headers(&self) -> Result<HeaderStream, BlockChainError> {
		let provider = self.provider().await?;

		if self.network.is_websocket() {
			let subscription = provider.subscribe_blocks().await.map_err(|e| {
				BlockChainError::subscription_error(format!(
					"Failed to subscribe to new heads on {}: {}",
					self.network.slug, e
				))
			})?;
			debug!(network = %self.network.slug, "Subscribed to new heads");
			let stream = subscription.into_stream().map(|header| {
				Ok(BlockHeader::new(header.number, header.hash, header.timestamp))
			});
			return Ok(stream.boxed());
		}

		let poller = provider.watch_blocks().await.map_err(|e| {
			BlockChainError::subscription_error(format!(
				"Failed to install block filter on {}: {}",
				self.network.slug, e
			))
		})?;
		debug!(network = %self.network.slug, "Polling for new heads");
		let stream = poller
			.into_stream()
			.flat_map(futures::stream::iter)
			.then(move |hash| {
				let provider = provider.clone();
				async move {
					match provider.get_block_by_hash(hash).await {
						Ok(Some(block)) => Ok(BlockHeader::new(
							block.header.number,
							block.header.hash,
							block.header.timestamp,
						)),
						Ok(None) => Err(BlockChainError::request_error(format!(
							"Announced block {} not found",
							hash
						))),
						Err(e) => Err(BlockChainError::subscription_error(e.to_string())),
					}
				}
			});
		Ok(stream.boxed())
	}

	async fn get_block_with_receipts(&self, number: u64) -> Result<BlockFetch, BlockChainError> {
		let provider = self.provider().await?;

		let raw: Value = provider
			.raw_request(
				"eth_getBlockByNumber".into(),
				(BlockNumberOrTag::Number(number), true),
			)
			.await?;

		if raw.is_null() {
			return Err(BlockChainError::block_not_found(number));
		}

		if let Some(reason) = find_unsupported_transaction(&raw) {
			return Ok(BlockFetch::Unsupported { number, reason });
		}

		let block: Block = match serde_json::from_value(raw) {
			Ok(block) => block,
			Err(e) => {
				return Ok(BlockFetch::Unsupported {
					number,
					reason: format!("block body could not be decoded: {}", e),
				})
			}
		};

		let header = &block.header;
		let mut confirmed = ConfirmedBlock {
			network: self.network.slug.clone(),
			chain_id: self.network.chain_id,
			number: header.number,
			hash: header.hash,
			timestamp: header.timestamp,
			transactions: Vec::new(),
		};

		for (index, tx) in block.transactions.into_transactions().enumerate() {
			let envelope: TxEnvelope = tx.inner.into_inner();
			let hash = *envelope.tx_hash();
			match self.fetch_receipt(&provider, hash).await {
				Ok(Some(receipt)) => confirmed.transactions.push(BlockTransaction {
					envelope,
					receipt: convert_receipt(&receipt, index as u64),
				}),
				Ok(None) => {
					warn!(
						network = %self.network.slug,
						block = number,
						tx = %hash,
						"Receipt not available, skipping transaction"
					);
				}
				Err(e) => {
					warn!(
						network = %self.network.slug,
						block = number,
						tx = %hash,
						error = %e,
						"Failed to fetch receipt, skipping transaction"
					);
				}
			}
		}

		Ok(BlockFetch::Supported(Box::new(confirmed)))
	}

	async fn close(&self) {
		// Dropping the last provider handle shuts down its transport
		if self.provider.write().await.take().is_some() {
			info!(network = %self.network.slug, "Closed node connection");
		}
	}
}
