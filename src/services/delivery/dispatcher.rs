//! Webhook dispatcher workers.
//!
//! Each worker pops a delivery id from the shared queue, reloads the delivery,
//! posts its payload to the webhook and records the outcome. A failed attempt
//! either schedules the next one or, once the budget is spent, parks the
//! delivery in `max_retries_exceeded`.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest_middleware::ClientWithMiddleware;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
	models::{DeliveryStatus, Webhook, WebhookDelivery},
	repositories::{WatchedAddressRepositoryTrait, WebhookDeliveryRepositoryTrait},
	services::delivery::{error::DeliveryError, queue::DeliveryQueue, signing::sign_payload},
	utils::{
		create_retryable_http_client, metrics::WEBHOOK_DELIVERIES, HttpRetryConfig, RetryConfig,
		TransportErrorRetryStrategy,
	},
};

/// Longest response body or error message kept on a delivery
pub const MAX_STORED_TEXT_LEN: usize = 1024;

pub const SIGNATURE_HEADER: &str = "X-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Timestamp";
pub const DELIVERY_ID_HEADER: &str = "X-Delivery-Id";

/// Dispatcher tunables
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
	/// Total time allowed for one POST
	pub request_timeout: Duration,
	/// How long a worker blocks on an empty queue before re-checking shutdown
	pub dequeue_timeout: Duration,
	/// Delay schedule between failed attempts
	pub backoff: RetryConfig,
	/// Quick in-attempt retries for transport failures
	pub http_retry: HttpRetryConfig,
}

/// Sends queued deliveries and records their outcomes
pub struct WebhookDispatcher {
	deliveries: Arc<dyn WebhookDeliveryRepositoryTrait>,
	addresses: Arc<dyn WatchedAddressRepositoryTrait>,
	queue: Arc<dyn DeliveryQueue>,
	client: ClientWithMiddleware,
	settings: DispatcherSettings,
}

impl WebhookDispatcher {
	pub fn new(
		deliveries: Arc<dyn WebhookDeliveryRepositoryTrait>,
		addresses: Arc<dyn WatchedAddressRepositoryTrait>,
		queue: Arc<dyn DeliveryQueue>,
		settings: DispatcherSettings,
	) -> Result<Self, DeliveryError> {
		let base_client = reqwest::Client::builder()
			.pool_max_idle_per_host(10)
			.pool_idle_timeout(Some(Duration::from_secs(90)))
			.connect_timeout(Duration::from_secs(10))
			.timeout(settings.request_timeout)
			.build()
			.map_err(|e| DeliveryError::HttpClientBuild(e.to_string()))?;
		let client = create_retryable_http_client(
			&settings.http_retry,
			base_client,
			Some(TransportErrorRetryStrategy),
		);

		Ok(Self {
			deliveries,
			addresses,
			queue,
			client,
			settings,
		})
	}

	/// Pops and processes deliveries until shutdown.
	///
	/// Errors on individual deliveries are logged and never end the loop.
	pub async fn run_worker(
		self: Arc<Self>,
		worker_id: usize,
		mut shutdown: watch::Receiver<bool>,
	) {
		info!(worker_id, "Delivery worker started");
		loop {
			if *shutdown.borrow() {
				break;
			}

			let popped = tokio::select! {
				popped = self.queue.pop(self.settings.dequeue_timeout) => popped,
				_ = shutdown.changed() => break,
			};

			match popped {
				Ok(Some(delivery_id)) => {
					if let Err(e) = self.process(delivery_id).await {
						error!(
							worker_id,
							delivery_id = %delivery_id,
							error = %e,
							"Failed to process delivery"
						);
					}
				}
				Ok(None) => {}
				Err(e) => {
					warn!(worker_id, error = %e, "Failed to pop delivery queue");
					tokio::select! {
						_ = tokio::time::sleep(self.settings.dequeue_timeout) => {}
						_ = shutdown.changed() => break,
					}
				}
			}
		}
		info!(worker_id, "Delivery worker stopped");
	}

	/// Makes one attempt for the delivery and persists the result.
	///
	/// Returns the delivery's new status, or `None` when the delivery no longer
	/// exists or had already reached a terminal state.
	#[instrument(skip_all, fields(delivery_id = %delivery_id))]
	pub async fn process(
		&self,
		delivery_id: Uuid,
	) -> Result<Option<DeliveryStatus>, DeliveryError> {
		let Some(mut delivery) = self.deliveries.find_delivery(delivery_id).await? else {
			warn!("Queued delivery no longer exists");
			return Ok(None);
		};
		if delivery.status.is_terminal() {
			debug!(status = %delivery.status, "Skipping delivery in terminal state");
			return Ok(None);
		}

		let now = Utc::now();
		match self.addresses.find_webhook(delivery.webhook_id).await? {
			Some(webhook) => match self.send(&webhook, &delivery).await {
				Ok((status, body)) => record_success(&mut delivery, status, body, now),
				Err(e) => record_failure(&mut delivery, &e, &self.settings.backoff, now),
			},
			None => {
				let e =
					DeliveryError::Transport(format!("webhook {} not found", delivery.webhook_id));
				record_failure(&mut delivery, &e, &self.settings.backoff, now);
			}
		}

		self.deliveries.update_delivery(&delivery).await?;
		WEBHOOK_DELIVERIES
			.with_label_values(&[delivery.status.as_str()])
			.inc();

		match delivery.status {
			DeliveryStatus::Delivered => {
				info!(http_status = ?delivery.http_status_code, "Webhook delivered")
			}
			DeliveryStatus::MaxRetriesExceeded => error!(
				retry_count = delivery.retry_count,
				error = ?delivery.error_message,
				"Webhook delivery gave up after max retries"
			),
			_ => warn!(
				retry_count = delivery.retry_count,
				next_retry_at = ?delivery.next_retry_at,
				error = ?delivery.error_message,
				"Webhook delivery failed, retry scheduled"
			),
		}
		Ok(Some(delivery.status))
	}

	/// Posts the payload. `Ok` only for a 2xx response.
	async fn send(
		&self,
		webhook: &Webhook,
		delivery: &WebhookDelivery,
	) -> Result<(u16, String), DeliveryError> {
		let headers = build_headers(webhook, delivery, Utc::now())?;
		let response = self
			.client
			.post(webhook.url.as_str())
			.headers(headers)
			.body(delivery.payload.clone())
			.send()
			.await
			.map_err(|e| DeliveryError::Transport(e.to_string()))?;

		let status = response.status();
		let body = response.text().await.unwrap_or_default();
		if status.is_success() {
			Ok((status.as_u16(), body))
		} else {
			Err(DeliveryError::HttpStatus {
				status: status.as_u16(),
				body,
			})
		}
	}
}

/// Request headers for one attempt: content type, signature, timestamp and
/// delivery id.
pub fn build_headers(
	webhook: &Webhook,
	delivery: &WebhookDelivery,
	now: DateTime<Utc>,
) -> Result<HeaderMap, DeliveryError> {
	let signature = sign_payload(&webhook.secret, &delivery.payload)?;
	let mut headers = HeaderMap::new();
	headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
	for (name, value) in [
		(SIGNATURE_HEADER, signature),
		(TIMESTAMP_HEADER, now.timestamp_millis().to_string()),
		(DELIVERY_ID_HEADER, delivery.id.to_string()),
	] {
		let header_name = HeaderName::from_bytes(name.as_bytes())
			.map_err(|e| DeliveryError::Signing(format!("Invalid header name {}: {}", name, e)))?;
		let header_value = HeaderValue::from_str(&value)
			.map_err(|e| DeliveryError::Signing(format!("Invalid value for {}: {}", name, e)))?;
		headers.insert(header_name, header_value);
	}
	Ok(headers)
}

/// Marks the delivery delivered.
pub fn record_success(
	delivery: &mut WebhookDelivery,
	status: u16,
	body: String,
	now: DateTime<Utc>,
) {
	delivery.status = DeliveryStatus::Delivered;
	delivery.http_status_code = Some(status);
	delivery.response_body = Some(truncate(body));
	delivery.error_message = None;
	delivery.next_retry_at = None;
	delivery.delivered_at = Some(now);
	delivery.updated_at = now;
}

/// Counts a failed attempt and decides what happens next.
///
/// The retry count grows by exactly one. Reaching `max_retries` is terminal;
/// below it the delivery becomes due again after
/// `backoff.backoff_delay(retry_count)`.
pub fn record_failure(
	delivery: &mut WebhookDelivery,
	error: &DeliveryError,
	backoff: &RetryConfig,
	now: DateTime<Utc>,
) {
	match error {
		DeliveryError::HttpStatus { status, body } => {
			delivery.http_status_code = Some(*status);
			delivery.response_body = Some(truncate(body.clone()));
		}
		_ => {
			delivery.http_status_code = None;
			delivery.response_body = None;
		}
	}
	delivery.error_message = Some(truncate(error.to_string()));
	delivery.retry_count = delivery.retry_count.saturating_add(1).min(delivery.max_retries);
	delivery.updated_at = now;

	if delivery.retry_count >= delivery.max_retries {
		delivery.status = DeliveryStatus::MaxRetriesExceeded;
		delivery.next_retry_at = None;
	} else {
		delivery.status = DeliveryStatus::Failed;
		let delay = chrono::Duration::from_std(backoff.backoff_delay(delivery.retry_count))
			.unwrap_or_else(|_| chrono::Duration::days(365));
		delivery.next_retry_at = Some(now + delay);
	}
}

/// Cuts `text` to at most [`MAX_STORED_TEXT_LEN`] characters.
pub fn truncate(text: String) -> String {
	match text.char_indices().nth(MAX_STORED_TEXT_LEN) {
		Some((cut, _)) => text[..cut].to_string(),
		None => text,
	}
}
