//! Retry mechanism for handling transient failures in async operations.
//!
//! Provides the exponential backoff used in two places: short in-process
//! retries around node requests ([`WithRetry`]) and the delay before a failed
//! webhook delivery becomes due again ([`RetryConfig::backoff_delay`]).

use std::time::Duration;

/// Configuration for retry behavior
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
	/// Maximum number of attempts before giving up
	pub max_retries: u32,

	/// Initial delay between retry attempts
	/// This delay is doubled with each retry
	pub initial_delay: Duration,

	/// Maximum delay between retry attempts
	/// The exponential backoff will not exceed this delay
	pub max_delay: Duration,
}

impl Default for RetryConfig {
	/// Creates a default retry configuration with:
	/// - 3 maximum attempts
	/// - 1 second initial delay
	/// - 8 seconds maximum delay
	fn default() -> Self {
		Self {
			max_retries: 3,
			initial_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(8),
		}
	}
}

impl RetryConfig {
	/// Delay after `retry_count` failures: `initial_delay * 2^retry_count`, capped
	/// at `max_delay`.
	///
	/// Saturates instead of overflowing for large retry counts.
	pub fn backoff_delay(&self, retry_count: u32) -> Duration {
		let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
		let base = self.initial_delay.as_millis().min(u64::MAX as u128) as u64;
		let millis = base.saturating_mul(factor);
		Duration::from_millis(millis).min(self.max_delay)
	}
}

/// Handler for retrying operations with exponential backoff
pub struct WithRetry {
	/// Configuration for retry behavior
	config: RetryConfig,
}

impl WithRetry {
	/// Creates a new retry handler with custom configuration
	pub fn new(config: RetryConfig) -> Self {
		Self { config }
	}

	/// Creates a new retry handler with default configuration
	pub fn with_default_config() -> Self {
		Self {
			config: RetryConfig::default(),
		}
	}

	/// Attempts an async operation with configured retry behavior
	///
	/// The operation runs at most `max_retries` times. Between attempts the
	/// handler sleeps for [`RetryConfig::backoff_delay`] of the failures so far.
	///
	/// # Returns
	/// * `Ok(T)` - If the operation succeeds
	/// * `Err(E)` - The last error once all attempts fail
	pub async fn attempt<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
	where
		F: Fn() -> Fut + Send + Sync,
		Fut: std::future::Future<Output = Result<T, E>> + Send,
		T: Send,
		E: std::fmt::Debug + Send,
	{
		let mut attempt = 0;
		loop {
			match operation().await {
				Ok(value) => return Ok(value),
				Err(e) => {
					attempt += 1;
					if attempt >= self.config.max_retries {
						return Err(e);
					}
					tokio::time::sleep(self.config.backoff_delay(attempt - 1)).await;
				}
			}
		}
	}
}
