//! Block watching service and related components.
//!
//! Turns each network's new-head subscription into a stream of confirmed
//! blocks for the processor.

mod error;
mod pending;
mod service;
mod watcher;

pub use error::BlockWatcherError;
pub use pending::PendingHeaders;
pub use service::BlockWatcherService;
pub use watcher::{NetworkWatcher, WatcherSettings, WatcherState};
