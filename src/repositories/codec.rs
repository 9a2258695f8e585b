//! Conversions between domain values and their column encodings.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::repositories::error::RepositoryError;

pub fn parse_uuid(value: &str) -> Result<Uuid, RepositoryError> {
	Uuid::parse_str(value)
		.map_err(|e| RepositoryError::decode_error(format!("invalid uuid {:?}: {}", value, e)))
}

/// Decimal string to `U256`, exact over the full 256-bit range.
pub fn parse_u256(value: &str) -> Result<U256, RepositoryError> {
	U256::from_str_radix(value, 10)
		.map_err(|e| RepositoryError::decode_error(format!("invalid amount {:?}: {}", value, e)))
}

pub fn to_millis(at: DateTime<Utc>) -> i64 {
	at.timestamp_millis()
}

pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, RepositoryError> {
	DateTime::<Utc>::from_timestamp_millis(millis)
		.ok_or_else(|| RepositoryError::decode_error(format!("invalid timestamp {}", millis)))
}

pub fn from_optional_millis(millis: Option<i64>) -> Result<Option<DateTime<Utc>>, RepositoryError> {
	millis.map(from_millis).transpose()
}
