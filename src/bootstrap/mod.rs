//! Bootstrap module for wiring the watcher's long-running tasks.
//!
//! [`WorkerOrchestrator::start`] connects the configured networks and spawns:
//! - one `NetworkWatcher` per connected network (through `BlockWatcherService`)
//! - the `BlockProcessor`, sole consumer of the confirmed-block channel
//! - `dispatcher_workers` webhook delivery workers
//! - the `RetryScheduler`
//!
//! [`WorkerOrchestrator::shutdown`] stops them in dependency order so every
//! block already forwarded is processed before the store is closed.

use std::{collections::BTreeMap, path::Path, sync::Arc};

use futures::future::join_all;
use thiserror::Error;
use tokio::{
	sync::{mpsc, watch},
	task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::{
	models::{ConfigError, ConfigLoader, Network, WorkerConfig},
	repositories::{
		RepositoryError, SqliteStore, TransactionRepository, WatchedAddressRepository,
		WebhookDeliveryRepository,
	},
	services::{
		blockchain::{BlockChainClient, ClientFactory},
		blockwatcher::{BlockWatcherService, WatcherSettings},
		cache::InMemoryCache,
		delivery::{
			DeliveryError, DeliveryQueue, DispatcherSettings, RetryScheduler, SqliteDeliveryQueue,
			WebhookDispatcher,
		},
		processor::{BlockProcessor, ProcessorSettings},
	},
	utils::{metrics::DELIVERY_QUEUE_LENGTH, HttpRetryConfig, RetryConfig},
};

/// Type alias for results at the binary edge
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Failures that prevent the watcher from starting or stopping cleanly
#[derive(Debug, Error)]
pub enum BootstrapError {
	#[error("no networks configured")]
	NoNetworksConfigured,

	#[error("none of the {0} configured networks could be connected")]
	NoNetworksConnected(usize),

	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Repository(#[from] RepositoryError),

	#[error(transparent)]
	Delivery(#[from] DeliveryError),

	#[error("task failed during shutdown: {0}")]
	Shutdown(String),
}

/// Loads every valid network file in `dir`, ordered by slug.
pub fn load_networks(dir: &Path) -> std::result::Result<Vec<Network>, BootstrapError> {
	let networks: BTreeMap<String, Network> = Network::load_all(Some(dir))?;
	if networks.is_empty() {
		return Err(BootstrapError::NoNetworksConfigured);
	}
	Ok(networks.into_values().collect())
}

/// Running set of watcher, processor and delivery tasks
pub struct WorkerOrchestrator {
	store: SqliteStore,
	watchers: BlockWatcherService,
	clients: Vec<Arc<dyn BlockChainClient>>,
	processor: JoinHandle<()>,
	workers: Vec<JoinHandle<()>>,
	scheduler: JoinHandle<()>,
	worker_shutdown: watch::Sender<bool>,
}

impl WorkerOrchestrator {
	/// Opens the database from `config.database_url`, applies migrations and
	/// starts every task.
	pub async fn start(
		config: WorkerConfig,
		networks: Vec<Network>,
		factory: Arc<dyn ClientFactory>,
	) -> std::result::Result<Self, BootstrapError> {
		if networks.is_empty() {
			return Err(BootstrapError::NoNetworksConfigured);
		}
		let store = SqliteStore::connect(&config.database_url).await?;
		store.run_migrations().await?;
		Self::start_with_store(config, networks, factory, store).await
	}

	/// Starts every task on an already migrated store.
	///
	/// Networks whose client cannot connect are skipped. Starting fails only
	/// when none connects.
	pub async fn start_with_store(
		config: WorkerConfig,
		networks: Vec<Network>,
		factory: Arc<dyn ClientFactory>,
		store: SqliteStore,
	) -> std::result::Result<Self, BootstrapError> {
		if networks.is_empty() {
			return Err(BootstrapError::NoNetworksConfigured);
		}

		let clients = connect_all(factory.as_ref(), &networks).await;
		if clients.is_empty() {
			return Err(BootstrapError::NoNetworksConnected(networks.len()));
		}

		let transactions = Arc::new(TransactionRepository::new(&store));
		let addresses = Arc::new(WatchedAddressRepository::new(&store));
		let deliveries = Arc::new(WebhookDeliveryRepository::new(&store));
		let cache = Arc::new(InMemoryCache::new());
		let queue: Arc<dyn DeliveryQueue> = Arc::new(SqliteDeliveryQueue::new(&store));
		DELIVERY_QUEUE_LENGTH.set(queue.len().await? as f64);

		let dispatcher = Arc::new(WebhookDispatcher::new(
			deliveries.clone(),
			addresses.clone(),
			queue.clone(),
			DispatcherSettings {
				request_timeout: config.webhook_timeout,
				dequeue_timeout: config.dequeue_timeout,
				backoff: RetryConfig {
					max_retries: config.max_retries,
					initial_delay: config.retry_base_delay,
					max_delay: config.retry_max_delay,
				},
				http_retry: HttpRetryConfig::default(),
			},
		)?);

		let processor = Arc::new(BlockProcessor::new(
			transactions,
			addresses,
			deliveries.clone(),
			cache,
			queue.clone(),
			ProcessorSettings {
				max_retries: config.max_retries,
				watched_address_ttl: config.watched_address_cache_ttl,
				processed_block_ttl: config.processed_block_ttl,
			},
		));

		let (worker_shutdown, worker_shutdown_rx) = watch::channel(false);
		let workers = (0..config.dispatcher_workers)
			.map(|worker_id| {
				tokio::spawn(
					dispatcher
						.clone()
						.run_worker(worker_id, worker_shutdown_rx.clone()),
				)
			})
			.collect();
		let scheduler = tokio::spawn(
			RetryScheduler::new(
				deliveries,
				queue,
				config.retry_sweep_interval,
				config.retry_batch_size,
				config.delivery_claim_timeout,
			)
			.run(worker_shutdown_rx),
		);

		// The watcher service owns the only sender, so the processor ends once
		// every watcher has stopped and the channel is drained.
		let (sender, receiver) = mpsc::channel(config.block_channel_capacity);
		let processor = tokio::spawn(processor.run(receiver));
		let watchers = BlockWatcherService::new(
			sender,
			WatcherSettings {
				reconnect_delay: config.reconnect_delay,
				stale_block_window: config.stale_block_window,
			},
		);
		for client in &clients {
			watchers.start_network_watcher(client.clone()).await;
		}

		info!(
			networks = clients.len(),
			workers = config.dispatcher_workers,
			"Watcher started"
		);
		Ok(Self {
			store,
			watchers,
			clients,
			processor,
			workers,
			scheduler,
			worker_shutdown,
		})
	}

	/// Slugs of networks being watched, sorted
	pub async fn active_networks(&self) -> Vec<String> {
		self.watchers.active_networks().await
	}

	pub fn store(&self) -> &SqliteStore {
		&self.store
	}

	/// Stops watchers, lets the processor drain, stops delivery tasks, then
	/// closes clients and the store. Every step runs even if an earlier one
	/// failed; the first failure is returned.
	pub async fn shutdown(self) -> std::result::Result<(), BootstrapError> {
		info!("Stopping network watchers");
		let mut first_error = self
			.watchers
			.shutdown()
			.await
			.err()
			.map(|e| BootstrapError::Shutdown(e.to_string()));

		info!("Draining block processor");
		if let Err(e) = self.processor.await {
			error!(error = %e, "Block processor task failed");
			first_error.get_or_insert(BootstrapError::Shutdown(e.to_string()));
		}

		info!("Stopping delivery workers");
		let _ = self.worker_shutdown.send(true);
		let mut handles = self.workers;
		handles.push(self.scheduler);
		for result in join_all(handles).await {
			if let Err(e) = result {
				error!(error = %e, "Delivery task failed");
				first_error.get_or_insert(BootstrapError::Shutdown(e.to_string()));
			}
		}

		join_all(self.clients.iter().map(|client| client.close())).await;
		self.store.close().await;
		info!("Shutdown complete");

		first_error.map_or(Ok(()), Err)
	}
}

async fn connect_all(
	factory: &dyn ClientFactory,
	networks: &[Network],
) -> Vec<Arc<dyn BlockChainClient>> {
	let attempts = join_all(networks.iter().map(|network| async move {
		(network, factory.connect(network).await)
	}))
	.await;

	attempts
		.into_iter()
		.filter_map(|(network, result)| match result {
			Ok(client) => Some(client),
			Err(e) => {
				warn!(
					network = %network.slug,
					error = %e,
					"Skipping network that failed to connect"
				);
				None
			}
		})
		.collect()
}
