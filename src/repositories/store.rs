//! SQLite connection pool shared by every repository.

use std::{path::Path, str::FromStr, time::Duration};

use sqlx::{
	sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
	SqlitePool,
};
use tracing::{debug, info};

use crate::repositories::error::RepositoryError;

/// Owns the connection pool and the schema
#[derive(Clone, Debug)]
pub struct SqliteStore {
	pool: SqlitePool,
}

impl SqliteStore {
	/// Opens (and creates if missing) the database at `database_url`.
	///
	/// In-memory databases are pinned to a single, never-recycled connection so
	/// every query sees the same data.
	#[tracing::instrument(level = "info")]
	pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
		let in_memory = database_url.contains(":memory:");
		if !in_memory {
			ensure_parent_dir(database_url)?;
		}

		let mut options = SqliteConnectOptions::from_str(database_url)
			.map_err(|e| RepositoryError::connection_error(e.to_string()))?
			.create_if_missing(true)
			.foreign_keys(true)
			.busy_timeout(Duration::from_secs(5));
		if !in_memory {
			options = options.journal_mode(SqliteJournalMode::Wal);
		}

		let pool_options = if in_memory {
			SqlitePoolOptions::new()
				.max_connections(1)
				.min_connections(1)
				.idle_timeout(None)
				.max_lifetime(None)
		} else {
			SqlitePoolOptions::new().max_connections(8)
		};

		let pool = pool_options.connect_with(options).await.map_err(|e| {
			RepositoryError::connection_error(format!("Failed to connect to database: {}", e))
		})?;
		info!(database_url, "Connected to SQLite database");
		Ok(Self { pool })
	}

	/// Opens a private in-memory database with the schema applied.
	pub async fn in_memory() -> Result<Self, RepositoryError> {
		let store = Self::connect("sqlite::memory:").await?;
		store.run_migrations().await?;
		Ok(store)
	}

	#[tracing::instrument(skip(self), level = "info")]
	pub async fn run_migrations(&self) -> Result<(), RepositoryError> {
		debug!("Running database migrations");
		sqlx::migrate!("./migrations")
			.run(&self.pool)
			.await
			.map_err(|e| RepositoryError::migration_error(e.to_string()))?;
		info!("Database migrations completed");
		Ok(())
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	pub async fn close(&self) {
		self.pool.close().await;
		info!("SQLite connection pool closed");
	}
}

fn ensure_parent_dir(database_url: &str) -> Result<(), RepositoryError> {
	let path = database_url
		.trim_start_matches("sqlite://")
		.trim_start_matches("sqlite:")
		.split('?')
		.next()
		.unwrap_or_default();
	if let Some(parent) = Path::new(path).parent() {
		if !parent.as_os_str().is_empty() && !parent.exists() {
			std::fs::create_dir_all(parent).map_err(|e| {
				RepositoryError::connection_error(format!(
					"Failed to create {}: {}",
					parent.display(),
					e
				))
			})?;
		}
	}
	Ok(())
}
