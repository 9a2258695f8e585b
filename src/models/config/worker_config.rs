//! Process-wide worker settings.
//!
//! Every value has a default and can be overridden through the environment
//! (a `.env` file is loaded by the binary before this is read).

use std::{path::PathBuf, str::FromStr, time::Duration};

use super::error::ConfigError;

/// Tunables shared by the watchers, processor and delivery workers
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
	/// SQLite connection string
	pub database_url: String,
	/// Directory holding network JSON files
	pub networks_dir: PathBuf,
	/// Wait before re-subscribing after a subscription error
	pub reconnect_delay: Duration,
	/// Pending headers older than this many blocks behind the head are dropped
	pub stale_block_window: u64,
	/// Capacity of the channel between watchers and the processor
	pub block_channel_capacity: usize,
	/// Base of the webhook retry backoff
	pub retry_base_delay: Duration,
	/// Upper bound of the webhook retry backoff
	pub retry_max_delay: Duration,
	/// Attempts allowed per delivery
	pub max_retries: u32,
	/// Timeout of one webhook POST
	pub webhook_timeout: Duration,
	/// Number of concurrent delivery workers
	pub dispatcher_workers: usize,
	/// How long a worker blocks on an empty queue before re-checking shutdown
	pub dequeue_timeout: Duration,
	/// Period of the retry sweep
	pub retry_sweep_interval: Duration,
	/// Maximum deliveries re-enqueued per sweep
	pub retry_batch_size: u32,
	/// How long a popped delivery may go without a recorded outcome before
	/// the retry sweep queues it again
	pub delivery_claim_timeout: Duration,
	/// Lifetime of cached watched-address lists
	pub watched_address_cache_ttl: Duration,
	/// Lifetime of processed-block markers
	pub processed_block_ttl: Duration,
}

impl Default for WorkerConfig {
	fn default() -> Self {
		Self {
			database_url: "sqlite://data/watcher.db".to_string(),
			networks_dir: PathBuf::from(super::network_config::DEFAULT_NETWORKS_DIR),
			reconnect_delay: Duration::from_secs(10),
			stale_block_window: 100,
			block_channel_capacity: 50,
			retry_base_delay: Duration::from_secs(30),
			retry_max_delay: Duration::from_secs(3600),
			max_retries: 5,
			webhook_timeout: Duration::from_secs(10),
			dispatcher_workers: 2,
			dequeue_timeout: Duration::from_secs(5),
			retry_sweep_interval: Duration::from_secs(30),
			retry_batch_size: 100,
			delivery_claim_timeout: Duration::from_secs(300),
			watched_address_cache_ttl: Duration::from_secs(300),
			processed_block_ttl: Duration::from_secs(24 * 3600),
		}
	}
}

impl WorkerConfig {
	/// Reads settings from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads settings through `lookup`, falling back to defaults for absent keys.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let defaults = Self::default();
		let millis = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
			parse_or(&lookup, key, default.as_millis() as u64).map(Duration::from_millis)
		};

		let config = Self {
			database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
			networks_dir: lookup("NETWORKS_CONFIG_DIR")
				.map(PathBuf::from)
				.unwrap_or(defaults.networks_dir),
			reconnect_delay: millis("RECONNECT_DELAY_MS", defaults.reconnect_delay)?,
			stale_block_window: parse_or(
				&lookup,
				"STALE_BLOCK_WINDOW",
				defaults.stale_block_window,
			)?,
			block_channel_capacity: parse_or(
				&lookup,
				"BLOCK_CHANNEL_CAPACITY",
				defaults.block_channel_capacity,
			)?,
			retry_base_delay: millis("WEBHOOK_RETRY_BASE_MS", defaults.retry_base_delay)?,
			retry_max_delay: millis("WEBHOOK_RETRY_MAX_MS", defaults.retry_max_delay)?,
			max_retries: parse_or(&lookup, "WEBHOOK_MAX_RETRIES", defaults.max_retries)?,
			webhook_timeout: millis("WEBHOOK_TIMEOUT_MS", defaults.webhook_timeout)?,
			dispatcher_workers: parse_or(
				&lookup,
				"DISPATCHER_WORKERS",
				defaults.dispatcher_workers,
			)?,
			dequeue_timeout: millis("DEQUEUE_TIMEOUT_MS", defaults.dequeue_timeout)?,
			retry_sweep_interval: millis("RETRY_SWEEP_INTERVAL_MS", defaults.retry_sweep_interval)?,
			retry_batch_size: parse_or(&lookup, "RETRY_BATCH_SIZE", defaults.retry_batch_size)?,
			delivery_claim_timeout: millis(
				"DELIVERY_CLAIM_TIMEOUT_MS",
				defaults.delivery_claim_timeout,
			)?,
			watched_address_cache_ttl: millis(
				"WATCHED_ADDRESS_CACHE_TTL_MS",
				defaults.watched_address_cache_ttl,
			)?,
			processed_block_ttl: defaults.processed_block_ttl,
		};

		config.validate()?;
		Ok(config)
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.block_channel_capacity == 0 {
			return Err(ConfigError::validation_error(
				"BLOCK_CHANNEL_CAPACITY must be greater than 0",
			));
		}
		if self.stale_block_window == 0 {
			return Err(ConfigError::validation_error(
				"STALE_BLOCK_WINDOW must be greater than 0",
			));
		}
		if self.max_retries == 0 {
			return Err(ConfigError::validation_error(
				"WEBHOOK_MAX_RETRIES must be greater than 0",
			));
		}
		if self.dispatcher_workers == 0 {
			return Err(ConfigError::validation_error(
				"DISPATCHER_WORKERS must be greater than 0",
			));
		}
		if self.dequeue_timeout.is_zero() {
			return Err(ConfigError::validation_error(
				"DEQUEUE_TIMEOUT_MS must be greater than 0",
			));
		}
		if self.retry_sweep_interval.is_zero() {
			return Err(ConfigError::validation_error(
				"RETRY_SWEEP_INTERVAL_MS must be greater than 0",
			));
		}
		if self.retry_batch_size == 0 {
			return Err(ConfigError::validation_error(
				"RETRY_BATCH_SIZE must be greater than 0",
			));
		}
		if self.delivery_claim_timeout <= self.webhook_timeout {
			return Err(ConfigError::validation_error(
				"DELIVERY_CLAIM_TIMEOUT_MS must exceed WEBHOOK_TIMEOUT_MS",
			));
		}
		if self.retry_base_delay > self.retry_max_delay {
			return Err(ConfigError::validation_error(
				"WEBHOOK_RETRY_BASE_MS must not exceed WEBHOOK_RETRY_MAX_MS",
			));
		}
		Ok(())
	}
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
	F: Fn(&str) -> Option<String>,
	T: FromStr,
	T::Err: std::fmt::Display,
{
	match lookup(key) {
		Some(raw) => raw
			.trim()
			.parse::<T>()
			.map_err(|e| ConfigError::parse_error(format!("{}={:?}: {}", key, raw, e))),
		None => Ok(default),
	}
}
