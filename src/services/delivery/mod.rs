//! Webhook delivery subsystem.
//!
//! Deliveries are created by the processor and queued by id. Dispatcher
//! workers make signed attempts; the retry scheduler re-enqueues failed
//! deliveries when their backoff has elapsed.

mod dispatcher;
mod error;
mod payload;
mod queue;
mod scheduler;
mod signing;

pub use dispatcher::{
	build_headers, record_failure, record_success, truncate, DispatcherSettings,
	WebhookDispatcher, DELIVERY_ID_HEADER, MAX_STORED_TEXT_LEN, SIGNATURE_HEADER,
	TIMESTAMP_HEADER,
};
pub use error::DeliveryError;
pub use payload::{TokenTransferPayload, WebhookPayload, TRANSACTION_EVENT};
pub use queue::{DeliveryQueue, SqliteDeliveryQueue};
pub use scheduler::RetryScheduler;
pub use signing::{sign_payload, verify_signature};
