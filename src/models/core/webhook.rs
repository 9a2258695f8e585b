//! Watched addresses, webhooks and delivery records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// An address registered for notifications on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedAddress {
	pub id: Uuid,
	/// Lower-case `0x` hex
	pub address: String,
	pub chain_id: u64,
	pub is_active: bool,
	pub webhook_id: Uuid,
	pub webhook_url: String,
}

/// Notification endpoint attached to a watched address.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Webhook {
	pub id: Uuid,
	pub address_id: Uuid,
	pub url: String,
	/// HMAC key used to sign request bodies
	pub secret: String,
}

impl fmt::Debug for Webhook {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Webhook")
			.field("id", &self.id)
			.field("address_id", &self.address_id)
			.field("url", &self.url)
			.field("secret", &"<redacted>")
			.finish()
	}
}

/// Lifecycle of a webhook delivery.
///
/// `Delivered` and `MaxRetriesExceeded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
	Pending,
	Delivered,
	Failed,
	MaxRetriesExceeded,
}

impl DeliveryStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Delivered => "delivered",
			Self::Failed => "failed",
			Self::MaxRetriesExceeded => "max_retries_exceeded",
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Delivered | Self::MaxRetriesExceeded)
	}
}

impl fmt::Display for DeliveryStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for DeliveryStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"pending" => Ok(Self::Pending),
			"delivered" => Ok(Self::Delivered),
			"failed" => Ok(Self::Failed),
			"max_retries_exceeded" => Ok(Self::MaxRetriesExceeded),
			other => Err(format!("unknown delivery status: {}", other)),
		}
	}
}

/// One attempt-tracking record per (webhook, transaction) notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDelivery {
	pub id: Uuid,
	pub webhook_id: Uuid,
	pub transaction_id: Uuid,
	/// Serialized JSON body sent to the endpoint
	pub payload: String,
	pub status: DeliveryStatus,
	pub http_status_code: Option<u16>,
	pub response_body: Option<String>,
	pub error_message: Option<String>,
	pub retry_count: u32,
	pub max_retries: u32,
	pub next_retry_at: Option<DateTime<Utc>>,
	pub delivered_at: Option<DateTime<Utc>>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl WebhookDelivery {
	/// Creates a fresh `pending` delivery.
	pub fn new(webhook_id: Uuid, transaction_id: Uuid, payload: String, max_retries: u32) -> Self {
		let now = Utc::now();
		Self {
			id: Uuid::new_v4(),
			webhook_id,
			transaction_id,
			payload,
			status: DeliveryStatus::Pending,
			http_status_code: None,
			response_body: None,
			error_message: None,
			retry_count: 0,
			max_retries,
			next_retry_at: None,
			delivered_at: None,
			created_at: now,
			updated_at: now,
		}
	}

	/// Whether the retry scheduler may pick this delivery up at `now`.
	pub fn is_due(&self, now: DateTime<Utc>) -> bool {
		self.status == DeliveryStatus::Failed
			&& self.retry_count < self.max_retries
			&& self.next_retry_at.is_none_or(|at| at <= now)
	}
}
