//! Block watcher service implementation.
//!
//! Owns one [`NetworkWatcher`] task per connected network and the sending half
//! of the block channel they share.

use std::{collections::HashMap, sync::Arc};

use tokio::{
	sync::{mpsc, watch, Mutex},
	task::JoinHandle,
};
use tracing::{info, warn};

use crate::{
	models::ConfirmedBlock,
	services::{
		blockchain::BlockChainClient,
		blockwatcher::{
			error::BlockWatcherError,
			watcher::{NetworkWatcher, WatcherSettings, WatcherState},
		},
	},
	utils::metrics::NETWORKS_WATCHED,
};

struct ActiveWatcher {
	shutdown: watch::Sender<bool>,
	state: watch::Receiver<WatcherState>,
	handle: JoinHandle<Result<(), BlockWatcherError>>,
}

/// Service for starting and stopping network watchers
pub struct BlockWatcherService {
	sender: mpsc::Sender<ConfirmedBlock>,
	settings: WatcherSettings,
	active_watchers: Arc<Mutex<HashMap<String, ActiveWatcher>>>,
}

impl BlockWatcherService {
	/// Creates a new block watcher service
	///
	/// # Arguments
	/// * `sender` - Channel every watcher forwards confirmed blocks into
	/// * `settings` - Reconnect and eviction tunables shared by all watchers
	pub fn new(sender: mpsc::Sender<ConfirmedBlock>, settings: WatcherSettings) -> Self {
		Self {
			sender,
			settings,
			active_watchers: Arc::new(Mutex::new(HashMap::new())),
		}
	}

	/// Starts a watcher for the client's network.
	///
	/// Starting a network that already has a watcher is a no-op.
	pub async fn start_network_watcher(&self, client: Arc<dyn BlockChainClient>) {
		let slug = client.network().slug.clone();
		let mut watchers = self.active_watchers.lock().await;
		if watchers.contains_key(&slug) {
			warn!(network = %slug, "Watcher already running");
			return;
		}

		let (shutdown, shutdown_rx) = watch::channel(false);
		let watcher = NetworkWatcher::new(client, self.sender.clone(), self.settings.clone());
		let state = watcher.state();
		let handle = tokio::spawn(watcher.run(shutdown_rx));

		watchers.insert(
			slug.clone(),
			ActiveWatcher {
				shutdown,
				state,
				handle,
			},
		);
		NETWORKS_WATCHED.set(watchers.len() as f64);
		info!(network = %slug, "Started network watcher");
	}

	/// Signals the network's watcher to stop and waits for it to finish.
	pub async fn stop_network_watcher(&self, slug: &str) -> Result<(), BlockWatcherError> {
		let watcher = {
			let mut watchers = self.active_watchers.lock().await;
			let watcher = watchers.remove(slug);
			NETWORKS_WATCHED.set(watchers.len() as f64);
			watcher
		};
		match watcher {
			Some(watcher) => stop(slug, watcher).await,
			None => Ok(()),
		}
	}

	/// Stops every watcher, then releases the block channel sender so the
	/// processor sees the end of the stream once it has drained.
	pub async fn shutdown(self) -> Result<(), BlockWatcherError> {
		let watchers: Vec<(String, ActiveWatcher)> =
			self.active_watchers.lock().await.drain().collect();
		NETWORKS_WATCHED.set(0.0);

		for (_, watcher) in &watchers {
			let _ = watcher.shutdown.send(true);
		}
		let mut first_error = None;
		for (slug, watcher) in watchers {
			if let Err(e) = stop(&slug, watcher).await {
				first_error.get_or_insert(e);
			}
		}
		drop(self.sender);
		first_error.map_or(Ok(()), Err)
	}

	/// Current lifecycle state of the network's watcher
	pub async fn watcher_state(&self, slug: &str) -> Option<WatcherState> {
		self.active_watchers
			.lock()
			.await
			.get(slug)
			.map(|watcher| *watcher.state.borrow())
	}

	/// Slugs of networks with a watcher, sorted
	pub async fn active_networks(&self) -> Vec<String> {
		let mut slugs: Vec<String> = self.active_watchers.lock().await.keys().cloned().collect();
		slugs.sort();
		slugs
	}
}

async fn stop(slug: &str, watcher: ActiveWatcher) -> Result<(), BlockWatcherError> {
	let _ = watcher.shutdown.send(true);
	let result = watcher
		.handle
		.await
		.map_err(|e| {
			BlockWatcherError::shutdown_error(format!("watcher for {} failed: {}", slug, e))
		})?;
	info!(network = %slug, "Stopped network watcher");
	result
}
