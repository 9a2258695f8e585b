//! Utility modules for common functionality.
//!
//! This module provides various utility functions and types that are used across
//! the application. Currently includes:
//!
//! - http: Retrying HTTP client construction
//! - logging: Logging utilities
//! - metrics: Metrics utilities
//! - retry: Exponential backoff for node calls and webhook retries
//! - tests: Builders for test instances of models

mod http;
mod retry;

pub mod logging;
pub mod metrics;


pub use http::{create_retryable_http_client, HttpRetryConfig, TransportErrorRetryStrategy};
pub use retry::{RetryConfig, WithRetry};
