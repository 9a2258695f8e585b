//! Per-network watcher loop.
//!
//! Subscribes to new heads, holds each header until it is
//! `confirmation_blocks` deep, then fetches the canonical block at that height
//! and hands it to the processor. Subscription failures are retried after a
//! fixed delay until shutdown.

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use tokio::sync::{
	mpsc::{self, error::TrySendError},
	watch,
};
use tracing::{debug, info, warn};

use crate::{
	models::{BlockFetch, BlockHeader, ConfirmedBlock},
	services::{
		blockchain::{BlockChainClient, HeaderStream},
		blockwatcher::{error::BlockWatcherError, pending::PendingHeaders},
	},
	utils::metrics::{
		BLOCKS_CONFIRMED, BLOCKS_DROPPED, HEADERS_RECEIVED, PENDING_EVICTED, PENDING_HEADERS,
		UNSUPPORTED_BLOCKS, WATCHER_RECONNECTS,
	},
};

/// Lifecycle of a network watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
	Starting,
	Subscribed,
	Reconnecting,
	Stopped,
}

/// Tunables shared by all watchers
#[derive(Debug, Clone)]
pub struct WatcherSettings {
	/// Pause before re-subscribing after the stream fails
	pub reconnect_delay: Duration,
	/// Pending headers further than this behind the head are dropped
	pub stale_block_window: u64,
}

enum StreamEnd {
	Shutdown,
	Failed(String),
}

/// Watches one network and forwards its confirmed blocks
pub struct NetworkWatcher {
	client: Arc<dyn BlockChainClient>,
	sender: mpsc::Sender<ConfirmedBlock>,
	settings: WatcherSettings,
	state: watch::Sender<WatcherState>,
	pending: PendingHeaders,
}

impl NetworkWatcher {
	pub fn new(
		client: Arc<dyn BlockChainClient>,
		sender: mpsc::Sender<ConfirmedBlock>,
		settings: WatcherSettings,
	) -> Self {
		let (state, _) = watch::channel(WatcherState::Starting);
		Self {
			client,
			sender,
			settings,
			state,
			pending: PendingHeaders::new(),
		}
	}

	/// Observes the watcher's lifecycle
	pub fn state(&self) -> watch::Receiver<WatcherState> {
		self.state.subscribe()
	}

	fn slug(&self) -> &str {
		&self.client.network().slug
	}

	fn set_state(&self, state: WatcherState) {
		self.state.send_replace(state);
	}

	/// Runs until `shutdown` flips to true or the processor goes away.
	///
	/// # Errors
	/// Returns `ChannelClosed` when the block channel has no receiver. All node
	/// errors are retried.
	pub async fn run(
		mut self,
		mut shutdown: watch::Receiver<bool>,
	) -> Result<(), BlockWatcherError> {
		let result = self.watch(&mut shutdown).await;
		self.set_state(WatcherState::Stopped);
		PENDING_HEADERS.with_label_values(&[self.slug()]).set(0.0);
		info!(network = %self.slug(), "Watcher stopped");
		result
	}

	async fn watch(
		&mut self,
		shutdown: &mut watch::Receiver<bool>,
	) -> Result<(), BlockWatcherError> {
		match self.client.get_latest_block_number().await {
			Ok(head) => info!(network = %self.slug(), head, "Starting watcher"),
			Err(e) => warn!(network = %self.slug(), error = %e, "Failed to read chain head"),
		}

		loop {
			if *shutdown.borrow() {
				return Ok(());
			}

			match self.client.subscribe_headers().await {
				Ok(stream) => {
					self.set_state(WatcherState::Subscribed);
					info!(network = %self.slug(), "Watching new heads");
					match self.consume(stream, shutdown).await? {
						StreamEnd::Shutdown => return Ok(()),
						StreamEnd::Failed(reason) => {
							warn!(
								network = %self.slug(),
								reason = %reason,
								"Header subscription lost"
							);
						}
					}
				}
				Err(e) => {
					warn!(network = %self.slug(), error = %e, "Failed to subscribe to new heads");
				}
			}

			self.set_state(WatcherState::Reconnecting);
			WATCHER_RECONNECTS.with_label_values(&[self.slug()]).inc();
			info!(
				network = %self.slug(),
				delay_ms = self.settings.reconnect_delay.as_millis() as u64,
				"Reconnecting after delay"
			);
			tokio::select! {
				_ = tokio::time::sleep(self.settings.reconnect_delay) => {}
				_ = shutdown.changed() => return Ok(()),
			}
		}
	}

	async fn consume(
		&mut self,
		mut stream: HeaderStream,
		shutdown: &mut watch::Receiver<bool>,
	) -> Result<StreamEnd, BlockWatcherError> {
		loop {
			let next = tokio::select! {
				next = stream.next() => next,
				_ = shutdown.changed() => return Ok(StreamEnd::Shutdown),
			};
			match next {
				Some(Ok(header)) => self.on_header(header).await?,
				Some(Err(e)) => return Ok(StreamEnd::Failed(e.to_string())),
				None => return Ok(StreamEnd::Failed("stream ended".to_string())),
			}
		}
	}

	/// Applies one new head: record it, release everything now deep enough,
	/// then drop headers that fell out of the window.
	async fn on_header(&mut self, header: BlockHeader) -> Result<(), BlockWatcherError> {
		let slug = self.slug().to_string();
		let head = header.number;
		HEADERS_RECEIVED.with_label_values(&[&slug]).inc();
		debug!(network = %slug, block = head, hash = %header.hash, "Received header");

		if let Some(replaced) = self.pending.insert(header) {
			debug!(
				network = %slug,
				block = head,
				replaced = %replaced.hash,
				"Header replaced at same height"
			);
		}

		let confirmations = self.client.network().confirmation_blocks;
		for confirmed in self.pending.take_confirmed(head, confirmations) {
			self.forward(confirmed).await?;
		}

		let evicted = self.pending.evict_stale(head, self.settings.stale_block_window);
		if !evicted.is_empty() {
			PENDING_EVICTED
				.with_label_values(&[&slug])
				.inc_by(evicted.len() as u64);
			warn!(network = %slug, blocks = ?evicted, "Evicted stale pending headers");
		}
		PENDING_HEADERS
			.with_label_values(&[&slug])
			.set(self.pending.len() as f64);
		Ok(())
	}

	async fn forward(&self, header: BlockHeader) -> Result<(), BlockWatcherError> {
		let slug = self.slug();
		let block = match self.client.get_block_with_receipts(header.number).await {
			Ok(BlockFetch::Supported(block)) => block,
			Ok(BlockFetch::Unsupported { number, reason }) => {
				UNSUPPORTED_BLOCKS.with_label_values(&[slug]).inc();
				info!(
					network = %slug,
					block = number,
					reason = %reason,
					"Skipping block with unsupported transactions"
				);
				return Ok(());
			}
			Err(e) => {
				warn!(
					network = %slug,
					block = header.number,
					error = %e,
					"Failed to fetch confirmed block"
				);
				return Ok(());
			}
		};

		if block.hash != header.hash {
			debug!(
				network = %slug,
				block = block.number,
				announced = %header.hash,
				canonical = %block.hash,
				"Canonical block differs from announced header"
			);
		}

		match self.sender.try_send(*block) {
			Ok(()) => {
				BLOCKS_CONFIRMED.with_label_values(&[slug]).inc();
				debug!(network = %slug, block = header.number, "Forwarded confirmed block");
				Ok(())
			}
			Err(TrySendError::Full(block)) => {
				BLOCKS_DROPPED.with_label_values(&[slug]).inc();
				warn!(
					network = %slug,
					block = block.number,
					"Processor channel full, dropping block"
				);
				Ok(())
			}
			Err(TrySendError::Closed(_)) => Err(BlockWatcherError::channel_closed(format!(
				"processor stopped receiving blocks for {}",
				slug
			))),
		}
	}
}
