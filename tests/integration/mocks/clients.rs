//! Mock implementations of blockchain clients.
//!
//! - [`MockBlockChainClient`] - mockall client for expectation-driven tests
//! - [`MockClientFactory`] - mockall factory for orchestrator tests
//! - [`ScriptedClient`] - client whose header stream is fed by the test

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc, Mutex,
	},
};

use async_trait::async_trait;
use futures::{
	channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender},
	stream, StreamExt,
};
use mockall::mock;

use evm_tx_watcher::{
	models::{BlockFetch, BlockHeader, ConfirmedBlock, Network},
	services::blockchain::{BlockChainClient, BlockChainError, ClientFactory, HeaderStream},
	utils::tests::builders::block::{block_hash, ConfirmedBlockBuilder},
};

mock! {
	pub BlockChainClient {}

	#[async_trait]
	impl BlockChainClient for BlockChainClient {
		fn network(&self) -> &Network;
		async fn get_latest_block_number(&self) -> Result<u64, BlockChainError>;
		async fn subscribe_headers(&self) -> Result<HeaderStream, BlockChainError>;
		async fn get_block_with_receipts(&self, number: u64) -> Result<BlockFetch, BlockChainError>;
		async fn close(&self);
	}
}

mock! {
	pub ClientFactory {}

	#[async_trait]
	impl ClientFactory for ClientFactory {
		async fn connect(
			&self,
			network: &Network,
		) -> Result<Arc<dyn BlockChainClient>, BlockChainError>;
	}
}

/// Header announcing block `number` with the hash the block builders use
pub fn header(number: u64) -> BlockHeader {
	BlockHeader::new(number, block_hash(number), 1_700_000_000 + number)
}

/// Client driven by headers the test pushes through [`UnboundedSender`].
///
/// The first subscription yields the pushed headers; later subscriptions never
/// yield, so a lost stream does not spin. Blocks not registered with
/// [`ScriptedClient::with_block`] are served empty.
pub struct ScriptedClient {
	network: Network,
	headers: Mutex<Option<UnboundedReceiver<BlockHeader>>>,
	blocks: Mutex<HashMap<u64, BlockFetch>>,
	fetched: Mutex<Vec<u64>>,
	closed: AtomicBool,
}

impl ScriptedClient {
	pub fn new(network: Network) -> (Arc<Self>, UnboundedSender<BlockHeader>) {
		let (sender, receiver) = unbounded();
		let client = Arc::new(Self {
			network,
			headers: Mutex::new(Some(receiver)),
			blocks: Mutex::new(HashMap::new()),
			fetched: Mutex::new(Vec::new()),
			closed: AtomicBool::new(false),
		});
		(client, sender)
	}

	pub fn with_block(&self, block: ConfirmedBlock) {
		self.blocks
			.lock()
			.unwrap()
			.insert(block.number, BlockFetch::Supported(Box::new(block)));
	}

	pub fn with_unsupported(&self, number: u64) {
		self.blocks.lock().unwrap().insert(
			number,
			BlockFetch::Unsupported {
				number,
				reason: "transaction 0xdeposit has unsupported type 0x7e".to_string(),
			},
		);
	}

	/// Block numbers requested so far, in request order
	pub fn fetched(&self) -> Vec<u64> {
		self.fetched.lock().unwrap().clone()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl BlockChainClient for ScriptedClient {
	fn network(&self) -> &Network {
		&self.network
	}

	async fn get_latest_block_number(&self) -> Result<u64, BlockChainError> {
		Ok(0)
	}

	async fn subscribe_headers(&self) -> Result<HeaderStream, BlockChainError> {
		match self.headers.lock().unwrap().take() {
			Some(receiver) => Ok(receiver.map(Ok).boxed()),
			None => Ok(stream::pending().boxed()),
		}
	}

	async fn get_block_with_receipts(&self, number: u64) -> Result<BlockFetch, BlockChainError> {
		self.fetched.lock().unwrap().push(number);
		let registered = self.blocks.lock().unwrap().get(&number).cloned();
		Ok(registered.unwrap_or_else(|| {
			BlockFetch::Supported(Box::new(
				ConfirmedBlockBuilder::new()
					.network(&self.network.slug)
					.chain_id(self.network.chain_id)
					.number(number)
					.build(),
			))
		}))
	}

	async fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);
	}
}
