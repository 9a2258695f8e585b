use std::time::Duration;

use crate::properties::strategies::delivery_error_strategy;

use chrono::Utc;
use evm_tx_watcher::{
	models::{DeliveryStatus, WebhookDelivery},
	services::delivery::record_failure,
	utils::RetryConfig,
};
use proptest::{prelude::*, test_runner::Config};
use uuid::Uuid;

fn backoff(initial_secs: u64, max_secs: u64) -> RetryConfig {
	RetryConfig {
		max_retries: 5,
		initial_delay: Duration::from_secs(initial_secs),
		max_delay: Duration::from_secs(initial_secs.max(max_secs)),
	}
}

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_backoff_doubles_until_capped(
		initial_secs in 1u64..120,
		max_secs in 1u64..86_400,
		retry_count in 0u32..64,
	) {
		let config = backoff(initial_secs, max_secs);
		let delay = config.backoff_delay(retry_count);
		let next = config.backoff_delay(retry_count + 1);

		prop_assert!(delay <= config.max_delay);
		prop_assert!(next >= delay);
		if next < config.max_delay {
			prop_assert_eq!(next, delay * 2);
		}
	}

	#[test]
	fn test_backoff_saturates_for_huge_counts(retry_count in 64u32..u32::MAX) {
		let config = backoff(30, 3_600);
		prop_assert_eq!(config.backoff_delay(retry_count), config.max_delay);
	}

	// Each failure adds exactly one retry until the budget is spent; the
	// delivery then stops being due and stays capped.
	#[test]
	fn test_failures_count_up_to_terminal(
		max_retries in 1u32..10,
		errors in prop::collection::vec(delivery_error_strategy(), 1..15),
	) {
		let config = backoff(30, 3_600);
		let mut delivery =
			WebhookDelivery::new(Uuid::new_v4(), Uuid::new_v4(), "{}".into(), max_retries);

		for error in &errors {
			let before = delivery.retry_count;
			let now = Utc::now();
			record_failure(&mut delivery, error, &config, now);

			prop_assert_eq!(delivery.retry_count, (before + 1).min(max_retries));
			prop_assert!(delivery.retry_count <= delivery.max_retries);
			prop_assert!(delivery.error_message.is_some());

			if delivery.retry_count >= max_retries {
				prop_assert_eq!(delivery.status, DeliveryStatus::MaxRetriesExceeded);
				prop_assert_eq!(delivery.next_retry_at, None);
				prop_assert!(!delivery.is_due(now + chrono::Duration::days(365)));
			} else {
				prop_assert_eq!(delivery.status, DeliveryStatus::Failed);
				let next = delivery.next_retry_at.unwrap();
				prop_assert!(next > now);
				prop_assert!(!delivery.is_due(now));
				prop_assert!(delivery.is_due(next));
			}
		}
	}
}
