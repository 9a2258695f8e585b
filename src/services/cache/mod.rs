//! Read-through cache in front of the store.
//!
//! Holds watched-address lists per chain and processed-block markers. The
//! bundled [`InMemoryCache`] keeps entries in process; anything implementing
//! [`CacheTrait`] can replace it.

mod memory;

use async_trait::async_trait;
use std::time::Duration;

use crate::models::WatchedAddress;

pub use memory::InMemoryCache;

#[async_trait]
pub trait CacheTrait: Send + Sync {
	async fn get_watched_addresses(&self, chain_id: u64) -> Option<Vec<WatchedAddress>>;

	async fn set_watched_addresses(
		&self,
		chain_id: u64,
		addresses: &[WatchedAddress],
		ttl: Duration,
	);

	async fn invalidate_watched_addresses(&self, chain_id: u64);

	async fn is_block_processed(&self, network: &str, block_number: u64) -> bool;

	async fn mark_block_processed(&self, network: &str, block_number: u64, ttl: Duration);
}

pub(crate) fn watched_addresses_key(chain_id: u64) -> String {
	format!("watched_addresses:{}", chain_id)
}

pub(crate) fn processed_block_key(network: &str, block_number: u64) -> String {
	format!("processed_block:{}:{}", network, block_number)
}
