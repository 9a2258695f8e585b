use serde::{Deserialize, Serialize};

/// Configuration for a single EVM network to watch.
///
/// Loaded from `config/networks/*.json` at startup and never mutated afterwards.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Network {
	/// Unique identifier used in logs, metrics and cache keys
	pub slug: String,
	/// Human-readable name
	pub name: String,
	/// Chain id the remote node must report
	pub chain_id: u64,
	/// WebSocket (`ws://`, `wss://`) or HTTP endpoint of the node
	pub rpc_url: String,
	/// Number of blocks that must be built on top of a block before it is processed
	pub confirmation_blocks: u64,
}

impl Network {
	/// Whether the endpoint supports `eth_subscribe`.
	pub fn is_websocket(&self) -> bool {
		self.rpc_url.starts_with("ws://") || self.rpc_url.starts_with("wss://")
	}
}
