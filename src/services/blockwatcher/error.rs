//! Block watcher error types and handling.

use log::error;
use std::error::Error;
use std::fmt;

/// Represents errors that stop or prevent a network watcher
#[derive(Debug)]
pub enum BlockWatcherError {
	/// Talking to the node failed
	NetworkError(String),

	/// The processor side of the block channel is gone
	ChannelClosed(String),

	/// A watcher task could not be joined during shutdown
	ShutdownError(String),
}

impl BlockWatcherError {
	fn format_message(&self) -> String {
		match self {
			Self::NetworkError(msg) => format!("Network error: {}", msg),
			Self::ChannelClosed(msg) => format!("Channel closed: {}", msg),
			Self::ShutdownError(msg) => format!("Shutdown error: {}", msg),
		}
	}

	pub fn network_error(msg: impl Into<String>) -> Self {
		let error = Self::NetworkError(msg.into());
		error!("{}", error.format_message());
		error
	}

	pub fn channel_closed(msg: impl Into<String>) -> Self {
		let error = Self::ChannelClosed(msg.into());
		error!("{}", error.format_message());
		error
	}

	pub fn shutdown_error(msg: impl Into<String>) -> Self {
		let error = Self::ShutdownError(msg.into());
		error!("{}", error.format_message());
		error
	}
}

impl fmt::Display for BlockWatcherError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.format_message())
	}
}

impl Error for BlockWatcherError {}
