//! Error types for repository operations.
//!
//! This module defines the error types that can occur while talking to the
//! SQLite store: connecting, migrating, querying and decoding rows back into
//! domain types.

use log::error;
use std::error::Error;
use std::fmt;

/// Errors that can occur during repository operations
#[derive(Debug)]
pub enum RepositoryError {
	/// The database could not be opened
	ConnectionError(String),

	/// Schema migrations failed
	MigrationError(String),

	/// A statement failed to execute
	QueryError(String),

	/// A stored value could not be decoded into its domain type
	DecodeError(String),

	/// The requested row does not exist
	NotFound(String),
}

impl RepositoryError {
	fn format_message(&self) -> String {
		match self {
			Self::ConnectionError(msg) => format!("Connection error: {}", msg),
			Self::MigrationError(msg) => format!("Migration error: {}", msg),
			Self::QueryError(msg) => format!("Query error: {}", msg),
			Self::DecodeError(msg) => format!("Decode error: {}", msg),
			Self::NotFound(msg) => format!("Not found: {}", msg),
		}
	}

	/// Create a new connection error with the given message
	///
	/// Also logs the error message at the error level.
	pub fn connection_error(msg: impl Into<String>) -> Self {
		let error = Self::ConnectionError(msg.into());
		error!("{}", error.format_message());
		error
	}

	/// Create a new migration error with the given message
	///
	/// Also logs the error message at the error level.
	pub fn migration_error(msg: impl Into<String>) -> Self {
		let error = Self::MigrationError(msg.into());
		error!("{}", error.format_message());
		error
	}

	/// Create a new query error with the given message
	///
	/// Also logs the error message at the error level.
	pub fn query_error(msg: impl Into<String>) -> Self {
		let error = Self::QueryError(msg.into());
		error!("{}", error.format_message());
		error
	}

	/// Create a new decode error with the given message
	///
	/// Also logs the error message at the error level.
	pub fn decode_error(msg: impl Into<String>) -> Self {
		let error = Self::DecodeError(msg.into());
		error!("{}", error.format_message());
		error
	}

	/// Create a new not-found error. Not logged, callers decide whether it matters.
	pub fn not_found(msg: impl Into<String>) -> Self {
		Self::NotFound(msg.into())
	}
}

impl fmt::Display for RepositoryError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.format_message())
	}
}

impl Error for RepositoryError {}

impl From<sqlx::Error> for RepositoryError {
	fn from(err: sqlx::Error) -> Self {
		match err {
			sqlx::Error::RowNotFound => Self::not_found("row not found"),
			sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
				Self::decode_error(err.to_string())
			}
			other => Self::query_error(other.to_string()),
		}
	}
}
