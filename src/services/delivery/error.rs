//! Webhook delivery error types.

use thiserror::Error;

use crate::repositories::RepositoryError;

/// Errors raised while queueing, signing or sending a webhook delivery.
///
/// None of these stop the dispatcher; they drive the delivery's retry state.
#[derive(Debug, Error)]
pub enum DeliveryError {
	#[error("Webhook request failed: {0}")]
	Transport(String),

	#[error("Webhook returned status {status}")]
	HttpStatus { status: u16, body: String },

	#[error("Failed to sign webhook payload: {0}")]
	Signing(String),

	#[error("Delivery queue error: {0}")]
	Queue(String),

	#[error("Delivery store error: {0}")]
	Repository(#[from] RepositoryError),

	#[error("Failed to serialize webhook payload: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("Failed to build HTTP client: {0}")]
	HttpClientBuild(String),
}
