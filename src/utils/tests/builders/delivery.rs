//! Test helper utilities for watched addresses and webhook deliveries
//!
//! - `WatchedAddressBuilder`: Builder for WatchedAddress instances
//! - `DeliveryBuilder`: Builder for WebhookDelivery instances in any state

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{DeliveryStatus, WatchedAddress, WebhookDelivery};

/// Builder for creating test WatchedAddress instances
pub struct WatchedAddressBuilder {
	address: WatchedAddress,
}

impl Default for WatchedAddressBuilder {
	fn default() -> Self {
		Self {
			address: WatchedAddress {
				id: Uuid::new_v4(),
				address: format!("0x{}", "22".repeat(20)),
				chain_id: 11155111,
				is_active: true,
				webhook_id: Uuid::new_v4(),
				webhook_url: "https://hooks.example/tx".to_string(),
			},
		}
	}
}

impl WatchedAddressBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn address(mut self, address: &str) -> Self {
		self.address.address = address.to_string();
		self
	}

	pub fn chain_id(mut self, chain_id: u64) -> Self {
		self.address.chain_id = chain_id;
		self
	}

	pub fn inactive(mut self) -> Self {
		self.address.is_active = false;
		self
	}

	pub fn webhook_id(mut self, webhook_id: Uuid) -> Self {
		self.address.webhook_id = webhook_id;
		self
	}

	pub fn webhook_url(mut self, url: &str) -> Self {
		self.address.webhook_url = url.to_string();
		self
	}

	pub fn build(self) -> WatchedAddress {
		self.address
	}
}

/// Builder for creating test WebhookDelivery instances
pub struct DeliveryBuilder {
	delivery: WebhookDelivery,
}

impl DeliveryBuilder {
	/// A fresh pending delivery with a budget of 5 attempts
	pub fn new(webhook_id: Uuid, transaction_id: Uuid) -> Self {
		Self {
			delivery: WebhookDelivery::new(webhook_id, transaction_id, "{}".to_string(), 5),
		}
	}

	pub fn payload(mut self, payload: &str) -> Self {
		self.delivery.payload = payload.to_string();
		self
	}

	pub fn max_retries(mut self, max_retries: u32) -> Self {
		self.delivery.max_retries = max_retries;
		self
	}

	/// Marks the delivery as failed after `retry_count` attempts, due at `next_retry_at`
	pub fn failed(mut self, retry_count: u32, next_retry_at: DateTime<Utc>) -> Self {
		self.delivery.status = DeliveryStatus::Failed;
		self.delivery.retry_count = retry_count;
		self.delivery.next_retry_at = Some(next_retry_at);
		self
	}

	pub fn delivered(mut self) -> Self {
		let now = Utc::now();
		self.delivery.status = DeliveryStatus::Delivered;
		self.delivery.http_status_code = Some(200);
		self.delivery.delivered_at = Some(now);
		self
	}

	pub fn build(self) -> WebhookDelivery {
		self.delivery
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_failed_delivery_is_due() {
		let now = Utc::now();
		let delivery = DeliveryBuilder::new(Uuid::new_v4(), Uuid::new_v4())
			.failed(1, now)
			.build();
		assert!(delivery.is_due(now));
	}

	#[test]
	fn test_watched_address_defaults() {
		let watched = WatchedAddressBuilder::new().inactive().chain_id(1).build();
		assert!(!watched.is_active);
		assert_eq!(watched.chain_id, 1);
	}
}
