//! Test helper utilities for Network configuration
//!
//! - `NetworkBuilder`: Builder for creating test Network instances

use crate::models::Network;

/// Builder for creating test Network instances
pub struct NetworkBuilder {
	slug: String,
	name: String,
	chain_id: u64,
	rpc_url: String,
	confirmation_blocks: u64,
}

impl Default for NetworkBuilder {
	fn default() -> Self {
		Self {
			slug: "ethereum-sepolia".to_string(),
			name: "Ethereum Sepolia".to_string(),
			chain_id: 11155111,
			rpc_url: "wss://sepolia.node.example".to_string(),
			confirmation_blocks: 12,
		}
	}
}

impl NetworkBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn slug(mut self, slug: &str) -> Self {
		self.slug = slug.to_string();
		self
	}

	pub fn name(mut self, name: &str) -> Self {
		self.name = name.to_string();
		self
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.chain_id = chain_id;
		self
	}

	pub fn rpc_url(mut self, rpc_url: &str) -> Self {
		self.rpc_url = rpc_url.to_string();
		self
	}

	pub fn confirmation_blocks(mut self, confirmation_blocks: u64) -> Self {
		self.confirmation_blocks = confirmation_blocks;
		self
	}

	pub fn build(self) -> Network {
		Network {
			slug: self.slug,
			name: self.name,
			chain_id: self.chain_id,
			rpc_url: self.rpc_url,
			confirmation_blocks: self.confirmation_blocks,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_network() {
		let network = NetworkBuilder::new().build();
		assert_eq!(network.slug, "ethereum-sepolia");
		assert_eq!(network.chain_id, 11155111);
		assert!(network.is_websocket());
	}

	#[test]
	fn test_http_network() {
		let network = NetworkBuilder::new()
			.slug("base-sepolia")
			.chain_id(84532)
			.rpc_url("https://base-sepolia.node.example")
			.confirmation_blocks(3)
			.build();
		assert_eq!(network.slug, "base-sepolia");
		assert_eq!(network.confirmation_blocks, 3);
		assert!(!network.is_websocket());
	}
}
