use async_trait::async_trait;
use std::{
	collections::HashMap,
	sync::Arc,
	time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::warn;

use super::{processed_block_key, watched_addresses_key, CacheTrait};
use crate::models::WatchedAddress;

/// Writes between two sweeps of expired entries
const SWEEP_EVERY: u64 = 256;

struct Entry {
	value: String,
	expires_at: Instant,
}

#[derive(Default)]
struct Store {
	entries: HashMap<String, Entry>,
	writes: u64,
}

impl Store {
	fn sweep(&mut self, now: Instant) {
		self.entries.retain(|_, entry| entry.expires_at > now);
	}
}

/// Process-local key/value cache with per-entry expiry.
///
/// Values are stored serialized so entries behave like those of an external
/// key/value store. Expired entries are removed lazily on access and swept
/// once every [`SWEEP_EVERY`] writes, so keys that are never read again do
/// not pile up.
#[derive(Clone, Default)]
pub struct InMemoryCache {
	store: Arc<RwLock<Store>>,
}

impl InMemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	async fn get(&self, key: &str) -> Option<String> {
		let now = Instant::now();
		{
			let store = self.store.read().await;
			match store.entries.get(key) {
				Some(entry) if entry.expires_at > now => return Some(entry.value.clone()),
				Some(_) => {}
				None => return None,
			}
		}
		let mut store = self.store.write().await;
		if store.entries.get(key).is_some_and(|entry| entry.expires_at <= now) {
			store.entries.remove(key);
		}
		None
	}

	async fn set(&self, key: String, value: String, ttl: Duration) {
		let now = Instant::now();
		let mut store = self.store.write().await;
		store.writes = store.writes.wrapping_add(1);
		if store.writes % SWEEP_EVERY == 0 {
			store.sweep(now);
		}
		store.entries.insert(
			key,
			Entry {
				value,
				expires_at: now + ttl,
			},
		);
	}

	/// Number of live entries
	pub async fn len(&self) -> usize {
		let now = Instant::now();
		self.store
			.read()
			.await
			.entries
			.values()
			.filter(|entry| entry.expires_at > now)
			.count()
	}

	pub async fn is_empty(&self) -> bool {
		self.len().await == 0
	}
}

#[async_trait]
impl CacheTrait for InMemoryCache {
	async fn get_watched_addresses(&self, chain_id: u64) -> Option<Vec<WatchedAddress>> {
		let raw = self.get(&watched_addresses_key(chain_id)).await?;
		match serde_json::from_str(&raw) {
			Ok(addresses) => Some(addresses),
			Err(e) => {
				warn!(chain_id, error = %e, "Discarding unreadable watched address cache entry");
				None
			}
		}
	}

	async fn set_watched_addresses(
		&self,
		chain_id: u64,
		addresses: &[WatchedAddress],
		ttl: Duration,
	) {
		match serde_json::to_string(addresses) {
			Ok(raw) => self.set(watched_addresses_key(chain_id), raw, ttl).await,
			Err(e) => warn!(chain_id, error = %e, "Failed to cache watched addresses"),
		}
	}

	async fn invalidate_watched_addresses(&self, chain_id: u64) {
		self.store
			.write()
			.await
			.entries
			.remove(&watched_addresses_key(chain_id));
	}

	async fn is_block_processed(&self, network: &str, block_number: u64) -> bool {
		self.get(&processed_block_key(network, block_number))
			.await
			.is_some()
	}

	async fn mark_block_processed(&self, network: &str, block_number: u64, ttl: Duration) {
		self.set(
			processed_block_key(network, block_number),
			"1".to_string(),
			ttl,
		)
		.await;
	}
}
