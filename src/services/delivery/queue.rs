//! Durable FIFO of delivery ids awaiting an attempt.
//!
//! Entries survive restarts because they live in the same SQLite database as
//! the deliveries. Every worker pops from the one shared table; a pop removes
//! the oldest entry atomically so no two workers receive the same entry.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tokio::{sync::Notify, time::Instant};
use uuid::Uuid;

use crate::{
	repositories::{RepositoryError, SqliteStore},
	services::delivery::error::DeliveryError,
	utils::metrics::DELIVERY_QUEUE_LENGTH,
};

/// Upper bound on how long a waiting pop goes without re-checking the table.
///
/// Pushes from this process wake waiters immediately; the poll picks up
/// entries written by other processes sharing the database.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Queue of delivery ids
#[async_trait]
pub trait DeliveryQueue: Send + Sync {
	/// Appends a delivery to the tail of the queue
	async fn push(&self, delivery_id: Uuid) -> Result<(), DeliveryError>;

	/// Removes the head of the queue, waiting up to `timeout` for one to arrive
	async fn pop(&self, timeout: Duration) -> Result<Option<Uuid>, DeliveryError>;

	async fn len(&self) -> Result<u64, DeliveryError>;
}

/// [`DeliveryQueue`] backed by the `delivery_queue` table
#[derive(Clone)]
pub struct SqliteDeliveryQueue {
	pool: SqlitePool,
	notify: Arc<Notify>,
}

impl SqliteDeliveryQueue {
	pub fn new(store: &SqliteStore) -> Self {
		Self {
			pool: store.pool().clone(),
			notify: Arc::new(Notify::new()),
		}
	}

	/// Removes the oldest entry and refreshes its delivery's `updated_at` in
	/// the same transaction, so the retry sweep treats the delivery as in
	/// flight until the claim timeout passes.
	async fn try_pop(&self) -> Result<Option<Uuid>, DeliveryError> {
		let mut tx = self.pool.begin().await.map_err(queue_error)?;
		let id: Option<String> = sqlx::query_scalar(
			"DELETE FROM delivery_queue
			 WHERE seq = (SELECT seq FROM delivery_queue ORDER BY seq LIMIT 1)
			 RETURNING delivery_id",
		)
		.fetch_optional(&mut *tx)
		.await
		.map_err(queue_error)?;

		let Some(id) = id else {
			return Ok(None);
		};
		sqlx::query(
			"UPDATE webhook_deliveries SET updated_at = ? WHERE id = ? AND status = 'pending'",
		)
		.bind(Utc::now().timestamp_millis())
		.bind(&id)
		.execute(&mut *tx)
		.await
		.map_err(queue_error)?;
		tx.commit().await.map_err(queue_error)?;

		DELIVERY_QUEUE_LENGTH.dec();
		Uuid::parse_str(&id).map(Some).map_err(|e| {
			DeliveryError::Repository(RepositoryError::decode_error(format!(
				"invalid queued delivery id {}: {}",
				id, e
			)))
		})
	}
}

fn queue_error(e: sqlx::Error) -> DeliveryError {
	DeliveryError::Queue(e.to_string())
}

#[async_trait]
impl DeliveryQueue for SqliteDeliveryQueue {
	async fn push(&self, delivery_id: Uuid) -> Result<(), DeliveryError> {
		sqlx::query("INSERT INTO delivery_queue (delivery_id, enqueued_at) VALUES (?, ?)")
			.bind(delivery_id.to_string())
			.bind(Utc::now().timestamp_millis())
			.execute(&self.pool)
			.await
			.map_err(queue_error)?;
		DELIVERY_QUEUE_LENGTH.inc();
		self.notify.notify_one();
		Ok(())
	}

	async fn pop(&self, timeout: Duration) -> Result<Option<Uuid>, DeliveryError> {
		let deadline = Instant::now() + timeout;
		loop {
			if let Some(id) = self.try_pop().await? {
				return Ok(Some(id));
			}
			let now = Instant::now();
			if now >= deadline {
				return Ok(None);
			}
			let wait = (deadline - now).min(POLL_INTERVAL);
			tokio::select! {
				_ = self.notify.notified() => {}
				_ = tokio::time::sleep(wait) => {}
			}
		}
	}

	async fn len(&self) -> Result<u64, DeliveryError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM delivery_queue")
			.fetch_one(&self.pool)
			.await
			.map_err(queue_error)?;
		Ok(count as u64)
	}
}
