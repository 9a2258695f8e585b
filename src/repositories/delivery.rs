//! Webhook delivery repository.
//!
//! Stores delivery records and their state transitions. Status changes are
//! driven by the dispatcher and the retry scheduler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::{
	models::{DeliveryStatus, WebhookDelivery},
	repositories::{
		codec::{from_millis, from_optional_millis, parse_uuid, to_millis},
		error::RepositoryError,
		store::SqliteStore,
	},
};

const DELIVERY_COLUMNS: &str = "id, webhook_id, transaction_id, payload, status, \
	http_status_code, response_body, error_message, retry_count, max_retries, next_retry_at, \
	delivered_at, created_at, updated_at";

#[async_trait]
pub trait WebhookDeliveryRepositoryTrait: Send + Sync {
	async fn create_delivery(&self, delivery: &WebhookDelivery) -> Result<(), RepositoryError>;

	/// Persists the mutable fields of `delivery` (status, attempt bookkeeping).
	async fn update_delivery(&self, delivery: &WebhookDelivery) -> Result<(), RepositoryError>;

	async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, RepositoryError>;

	/// Failed deliveries with attempts left whose retry time has passed, oldest first.
	async fn find_due_retries(
		&self,
		now: DateTime<Utc>,
		limit: u32,
	) -> Result<Vec<WebhookDelivery>, RepositoryError>;

	/// Moves a due delivery back to `pending`. Returns `false` when another
	/// sweep already claimed it or its state changed.
	async fn claim_for_retry(&self, id: Uuid) -> Result<bool, RepositoryError>;

	/// Reverts a claim whose enqueue failed so a later sweep retries it.
	async fn release_claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError>;

	/// `pending` deliveries that have no queue entry and were last touched at
	/// or before `stale_before`, oldest first.
	///
	/// These were popped by a worker that never recorded an outcome, or were
	/// committed by a processor that stopped before queueing them.
	async fn find_stale_claims(
		&self,
		stale_before: DateTime<Utc>,
		limit: u32,
	) -> Result<Vec<WebhookDelivery>, RepositoryError>;

	/// Takes over a stale `pending` delivery by refreshing its `updated_at`.
	/// Returns `false` when it was queued, popped or updated in the meantime.
	async fn reclaim_stale(
		&self,
		id: Uuid,
		stale_before: DateTime<Utc>,
		now: DateTime<Utc>,
	) -> Result<bool, RepositoryError>;

	async fn count_by_status(&self, status: DeliveryStatus) -> Result<u64, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct DeliveryRow {
	id: String,
	webhook_id: String,
	transaction_id: String,
	payload: String,
	status: String,
	http_status_code: Option<i64>,
	response_body: Option<String>,
	error_message: Option<String>,
	retry_count: i64,
	max_retries: i64,
	next_retry_at: Option<i64>,
	delivered_at: Option<i64>,
	created_at: i64,
	updated_at: i64,
}

impl TryFrom<DeliveryRow> for WebhookDelivery {
	type Error = RepositoryError;

	fn try_from(row: DeliveryRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: parse_uuid(&row.id)?,
			webhook_id: parse_uuid(&row.webhook_id)?,
			transaction_id: parse_uuid(&row.transaction_id)?,
			payload: row.payload,
			status: row
				.status
				.parse::<DeliveryStatus>()
				.map_err(RepositoryError::decode_error)?,
			http_status_code: row.http_status_code.map(|code| code as u16),
			response_body: row.response_body,
			error_message: row.error_message,
			retry_count: row.retry_count as u32,
			max_retries: row.max_retries as u32,
			next_retry_at: from_optional_millis(row.next_retry_at)?,
			delivered_at: from_optional_millis(row.delivered_at)?,
			created_at: from_millis(row.created_at)?,
			updated_at: from_millis(row.updated_at)?,
		})
	}
}

/// Inserts a delivery through any executor, so it can join a larger unit of work.
pub(crate) async fn insert_delivery<'e, E>(
	executor: E,
	delivery: &WebhookDelivery,
) -> Result<(), RepositoryError>
where
	E: Executor<'e, Database = Sqlite>,
{
	sqlx::query(&format!(
		"INSERT INTO webhook_deliveries ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
		DELIVERY_COLUMNS
	))
	.bind(delivery.id.to_string())
	.bind(delivery.webhook_id.to_string())
	.bind(delivery.transaction_id.to_string())
	.bind(&delivery.payload)
	.bind(delivery.status.as_str())
	.bind(delivery.http_status_code.map(i64::from))
	.bind(&delivery.response_body)
	.bind(&delivery.error_message)
	.bind(i64::from(delivery.retry_count))
	.bind(i64::from(delivery.max_retries))
	.bind(delivery.next_retry_at.map(to_millis))
	.bind(delivery.delivered_at.map(to_millis))
	.bind(to_millis(delivery.created_at))
	.bind(to_millis(delivery.updated_at))
	.execute(executor)
	.await?;
	Ok(())
}

/// SQLite implementation of [`WebhookDeliveryRepositoryTrait`]
#[derive(Clone)]
pub struct WebhookDeliveryRepository {
	pool: SqlitePool,
}

impl WebhookDeliveryRepository {
	pub fn new(store: &SqliteStore) -> Self {
		Self {
			pool: store.pool().clone(),
		}
	}
}

#[async_trait]
impl WebhookDeliveryRepositoryTrait for WebhookDeliveryRepository {
	async fn create_delivery(&self, delivery: &WebhookDelivery) -> Result<(), RepositoryError> {
		insert_delivery(&self.pool, delivery).await
	}

	async fn update_delivery(&self, delivery: &WebhookDelivery) -> Result<(), RepositoryError> {
		let result = sqlx::query(
			"UPDATE webhook_deliveries SET status = ?, http_status_code = ?, response_body = ?, \
			 error_message = ?, retry_count = ?, next_retry_at = ?, delivered_at = ?, \
			 updated_at = ? WHERE id = ?",
		)
		.bind(delivery.status.as_str())
		.bind(delivery.http_status_code.map(i64::from))
		.bind(&delivery.response_body)
		.bind(&delivery.error_message)
		.bind(i64::from(delivery.retry_count))
		.bind(delivery.next_retry_at.map(to_millis))
		.bind(delivery.delivered_at.map(to_millis))
		.bind(to_millis(delivery.updated_at))
		.bind(delivery.id.to_string())
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(RepositoryError::not_found(format!("delivery {}", delivery.id)));
		}
		Ok(())
	}

	async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, RepositoryError> {
		let row: Option<DeliveryRow> = sqlx::query_as(&format!(
			"SELECT {} FROM webhook_deliveries WHERE id = ?",
			DELIVERY_COLUMNS
		))
		.bind(id.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(WebhookDelivery::try_from).transpose()
	}

	async fn find_due_retries(
		&self,
		now: DateTime<Utc>,
		limit: u32,
	) -> Result<Vec<WebhookDelivery>, RepositoryError> {
		let rows: Vec<DeliveryRow> = sqlx::query_as(&format!(
			"SELECT {} FROM webhook_deliveries \
			 WHERE status = 'failed' AND retry_count < max_retries \
			 AND (next_retry_at IS NULL OR next_retry_at <= ?) \
			 ORDER BY created_at ASC LIMIT ?",
			DELIVERY_COLUMNS
		))
		.bind(to_millis(now))
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(WebhookDelivery::try_from).collect()
	}

	async fn claim_for_retry(&self, id: Uuid) -> Result<bool, RepositoryError> {
		let result = sqlx::query(
			"UPDATE webhook_deliveries SET status = 'pending', updated_at = ? \
			 WHERE id = ? AND status = 'failed' AND retry_count < max_retries",
		)
		.bind(Utc::now().timestamp_millis())
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected() == 1)
	}

	async fn release_claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), RepositoryError> {
		sqlx::query(
			"UPDATE webhook_deliveries SET status = 'failed', next_retry_at = ?, updated_at = ? \
			 WHERE id = ? AND status = 'pending'",
		)
		.bind(to_millis(now))
		.bind(to_millis(now))
		.bind(id.to_string())
		.execute(&self.pool)
		.await?;
		Ok(())
	}

	async fn find_stale_claims(
		&self,
		stale_before: DateTime<Utc>,
		limit: u32,
	) -> Result<Vec<WebhookDelivery>, RepositoryError> {
		let rows: Vec<DeliveryRow> = sqlx::query_as(&format!(
			"SELECT {} FROM webhook_deliveries \
			 WHERE status = 'pending' AND updated_at <= ? \
			 AND NOT EXISTS (SELECT 1 FROM delivery_queue \
			 WHERE delivery_queue.delivery_id = webhook_deliveries.id) \
			 ORDER BY updated_at ASC LIMIT ?",
			DELIVERY_COLUMNS
		))
		.bind(to_millis(stale_before))
		.bind(i64::from(limit))
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(WebhookDelivery::try_from).collect()
	}

	async fn reclaim_stale(
		&self,
		id: Uuid,
		stale_before: DateTime<Utc>,
		now: DateTime<Utc>,
	) -> Result<bool, RepositoryError> {
		let result = sqlx::query(
			"UPDATE webhook_deliveries SET updated_at = ? \
			 WHERE id = ? AND status = 'pending' AND updated_at <= ? \
			 AND NOT EXISTS (SELECT 1 FROM delivery_queue \
			 WHERE delivery_queue.delivery_id = webhook_deliveries.id)",
		)
		.bind(to_millis(now))
		.bind(id.to_string())
		.bind(to_millis(stale_before))
		.execute(&self.pool)
		.await?;
		Ok(result.rows_affected() == 1)
	}

	async fn count_by_status(&self, status: DeliveryStatus) -> Result<u64, RepositoryError> {
		let (count,): (i64,) =
			sqlx::query_as("SELECT COUNT(*) FROM webhook_deliveries WHERE status = ?")
				.bind(status.as_str())
				.fetch_one(&self.pool)
				.await?;
		Ok(count as u64)
	}
}
