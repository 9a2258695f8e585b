//! Mock implementations of the delivery queue and cache.

use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use uuid::Uuid;

use evm_tx_watcher::{
	models::WatchedAddress,
	services::{
		cache::CacheTrait,
		delivery::{DeliveryError, DeliveryQueue},
	},
};

mock! {
	pub DeliveryQueue {}

	#[async_trait]
	impl DeliveryQueue for DeliveryQueue {
		async fn push(&self, delivery_id: Uuid) -> Result<(), DeliveryError>;
		async fn pop(&self, timeout: Duration) -> Result<Option<Uuid>, DeliveryError>;
		async fn len(&self) -> Result<u64, DeliveryError>;
	}
}

mock! {
	pub Cache {}

	#[async_trait]
	impl CacheTrait for Cache {
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
}
