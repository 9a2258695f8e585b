//! Periodic sweep that re-enqueues failed deliveries once they are due.
//!
//! The same sweep recovers `pending` deliveries that left the queue without an
//! outcome being recorded (a worker stopped mid-attempt, or the processor
//! stopped between committing and queueing). A pop refreshes the delivery's
//! `updated_at`, so a delivery counts as abandoned only once it has sat
//! unqueued for longer than `claim_timeout`.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
	repositories::WebhookDeliveryRepositoryTrait,
	services::delivery::{error::DeliveryError, queue::DeliveryQueue},
};

/// Moves due `failed` and abandoned `pending` deliveries back onto the queue
pub struct RetryScheduler {
	deliveries: Arc<dyn WebhookDeliveryRepositoryTrait>,
	queue: Arc<dyn DeliveryQueue>,
	interval: Duration,
	batch_size: u32,
	claim_timeout: Duration,
}

impl RetryScheduler {
	pub fn new(
		deliveries: Arc<dyn WebhookDeliveryRepositoryTrait>,
		queue: Arc<dyn DeliveryQueue>,
		interval: Duration,
		batch_size: u32,
		claim_timeout: Duration,
	) -> Self {
		Self {
			deliveries,
			queue,
			interval,
			batch_size,
			claim_timeout,
		}
	}

	/// Sweeps every `interval` until shutdown. The first sweep runs immediately
	/// so deliveries left due by a previous run are picked up at startup.
	pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
		info!(interval_ms = self.interval.as_millis() as u64, "Retry scheduler started");
		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
		loop {
			tokio::select! {
				_ = ticker.tick() => {}
				_ = shutdown.changed() => break,
			}
			if *shutdown.borrow() {
				break;
			}
			if let Err(e) = self.sweep().await {
				warn!(error = %e, "Retry sweep failed");
			}
		}
		info!("Retry scheduler stopped");
	}

	/// Claims and enqueues one batch of due deliveries, then one batch of
	/// abandoned ones.
	///
	/// A delivery is pushed only after its claim succeeds, so overlapping
	/// sweeps never enqueue it twice. If the push fails the claim is released
	/// and the next sweep sees the delivery again.
	pub async fn sweep(&self) -> Result<usize, DeliveryError> {
		let now = Utc::now();
		let due = self
			.deliveries
			.find_due_retries(now, self.batch_size)
			.await?;
		let mut enqueued = 0;
		for delivery in due {
			if !self.deliveries.claim_for_retry(delivery.id).await? {
				debug!(delivery_id = %delivery.id, "Delivery claimed elsewhere");
				continue;
			}
			if self.push_claimed(delivery.id).await? {
				enqueued += 1;
			}
		}
		if enqueued > 0 {
			info!(count = enqueued, "Re-enqueued due deliveries");
		}

		let reclaimed = self.reclaim_abandoned().await?;
		Ok(enqueued + reclaimed)
	}

	async fn reclaim_abandoned(&self) -> Result<usize, DeliveryError> {
		let now = Utc::now();
		let timeout = chrono::Duration::from_std(self.claim_timeout)
			.unwrap_or_else(|_| chrono::Duration::days(365));
		let stale_before = now - timeout;
		let stale = self
			.deliveries
			.find_stale_claims(stale_before, self.batch_size)
			.await?;
		let mut reclaimed = 0;
		for delivery in stale {
			if !self
				.deliveries
				.reclaim_stale(delivery.id, stale_before, now)
				.await?
			{
				continue;
			}
			warn!(
				delivery_id = %delivery.id,
				retry_count = delivery.retry_count,
				"Re-enqueueing delivery abandoned without an outcome"
			);
			if self.push_claimed(delivery.id).await? {
				reclaimed += 1;
			}
		}
		Ok(reclaimed)
	}

	/// Pushes a claimed delivery, releasing the claim if the queue refuses it.
	async fn push_claimed(&self, id: Uuid) -> Result<bool, DeliveryError> {
		match self.queue.push(id).await {
			Ok(()) => Ok(true),
			Err(e) => {
				warn!(delivery_id = %id, error = %e, "Failed to enqueue retry, releasing claim");
				self.deliveries.release_claim(id, Utc::now()).await?;
				Ok(false)
			}
		}
	}
}
