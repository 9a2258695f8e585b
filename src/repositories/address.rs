//! Watched address and webhook repository.
//!
//! Registration normally happens through an external surface; this repository
//! exposes the read side the processor and dispatcher need plus a helper to
//! seed registrations.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
	models::{WatchedAddress, Webhook},
	repositories::{
		codec::parse_uuid,
		error::RepositoryError,
		store::SqliteStore,
	},
};

/// Read access to watched addresses and their webhooks
#[async_trait]
pub trait WatchedAddressRepositoryTrait: Send + Sync {
	/// Active watched addresses on `chain_id`, one entry per attached webhook.
	async fn find_active_watched_addresses(
		&self,
		chain_id: u64,
	) -> Result<Vec<WatchedAddress>, RepositoryError>;

	async fn find_webhook(&self, webhook_id: Uuid) -> Result<Option<Webhook>, RepositoryError>;

	/// Registers `address` on `chain_id` with a webhook, reusing the address row
	/// when it already exists.
	async fn register_watched_address(
		&self,
		address: &str,
		chain_id: u64,
		url: &str,
		secret: &str,
	) -> Result<WatchedAddress, RepositoryError>;

	async fn set_active(&self, address_id: Uuid, active: bool) -> Result<(), RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct WatchedAddressRow {
	id: String,
	address: String,
	chain_id: i64,
	is_active: bool,
	webhook_id: String,
	webhook_url: String,
}

impl TryFrom<WatchedAddressRow> for WatchedAddress {
	type Error = RepositoryError;

	fn try_from(row: WatchedAddressRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: parse_uuid(&row.id)?,
			address: row.address,
			chain_id: row.chain_id as u64,
			is_active: row.is_active,
			webhook_id: parse_uuid(&row.webhook_id)?,
			webhook_url: row.webhook_url,
		})
	}
}

#[derive(sqlx::FromRow)]
struct WebhookRow {
	id: String,
	address_id: String,
	url: String,
	secret: String,
}

impl TryFrom<WebhookRow> for Webhook {
	type Error = RepositoryError;

	fn try_from(row: WebhookRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: parse_uuid(&row.id)?,
			address_id: parse_uuid(&row.address_id)?,
			url: row.url,
			secret: row.secret,
		})
	}
}

/// SQLite implementation of [`WatchedAddressRepositoryTrait`]
#[derive(Clone)]
pub struct WatchedAddressRepository {
	pool: SqlitePool,
}

impl WatchedAddressRepository {
	pub fn new(store: &SqliteStore) -> Self {
		Self {
			pool: store.pool().clone(),
		}
	}
}

#[async_trait]
impl WatchedAddressRepositoryTrait for WatchedAddressRepository {
	async fn find_active_watched_addresses(
		&self,
		chain_id: u64,
	) -> Result<Vec<WatchedAddress>, RepositoryError> {
		let rows: Vec<WatchedAddressRow> = sqlx::query_as(
			"SELECT wa.id, wa.address, wa.chain_id, wa.is_active, w.id AS webhook_id, \
			 w.url AS webhook_url \
			 FROM watched_addresses wa \
			 JOIN webhooks w ON w.address_id = wa.id \
			 WHERE wa.chain_id = ? AND wa.is_active = 1 \
			 ORDER BY wa.address, w.created_at",
		)
		.bind(chain_id as i64)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(WatchedAddress::try_from).collect()
	}

	async fn find_webhook(&self, webhook_id: Uuid) -> Result<Option<Webhook>, RepositoryError> {
		let row: Option<WebhookRow> =
			sqlx::query_as("SELECT id, address_id, url, secret FROM webhooks WHERE id = ?")
				.bind(webhook_id.to_string())
				.fetch_optional(&self.pool)
				.await?;

		row.map(Webhook::try_from).transpose()
	}

	async fn register_watched_address(
		&self,
		address: &str,
		chain_id: u64,
		url: &str,
		secret: &str,
	) -> Result<WatchedAddress, RepositoryError> {
		let address = address.to_lowercase();
		let now = Utc::now().timestamp_millis();
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			"INSERT INTO watched_addresses (id, address, chain_id, is_active, created_at) \
			 VALUES (?, ?, ?, 1, ?) \
			 ON CONFLICT (address, chain_id) DO UPDATE SET is_active = 1",
		)
		.bind(Uuid::new_v4().to_string())
		.bind(&address)
		.bind(chain_id as i64)
		.bind(now)
		.execute(&mut *tx)
		.await?;

		let (address_id,): (String,) =
			sqlx::query_as("SELECT id FROM watched_addresses WHERE address = ? AND chain_id = ?")
				.bind(&address)
				.bind(chain_id as i64)
				.fetch_one(&mut *tx)
				.await?;

		let webhook_id = Uuid::new_v4();
		sqlx::query(
			"INSERT INTO webhooks (id, address_id, url, secret, created_at) VALUES (?, ?, ?, ?, ?)",
		)
		.bind(webhook_id.to_string())
		.bind(&address_id)
		.bind(url)
		.bind(secret)
		.bind(now)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		Ok(WatchedAddress {
			id: parse_uuid(&address_id)?,
			address,
			chain_id,
			is_active: true,
			webhook_id,
			webhook_url: url.to_string(),
		})
	}

	async fn set_active(&self, address_id: Uuid, active: bool) -> Result<(), RepositoryError> {
		let result = sqlx::query("UPDATE watched_addresses SET is_active = ? WHERE id = ?")
			.bind(active)
			.bind(address_id.to_string())
			.execute(&self.pool)
			.await?;
		if result.rows_affected() == 0 {
			return Err(RepositoryError::not_found(format!(
				"watched address {}",
				address_id
			)));
		}
		Ok(())
	}
}
