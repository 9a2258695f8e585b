//! Configuration loading and validation.
//!
//! - Network definitions are JSON files under `config/networks/`
//! - Worker settings come from the environment, with defaults for every value

use std::path::Path;

mod error;
mod network_config;
mod worker_config;

pub use error::ConfigError;
pub use worker_config::WorkerConfig;

/// Common interface for loading configuration files
pub trait ConfigLoader: Sized {
	/// Loads every valid configuration file in `path`, keyed by file stem.
	fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>;

	fn load_from_path(path: &Path) -> Result<Self, ConfigError>;

	fn validate(&self) -> Result<(), String>;

	fn is_json_file(path: &Path) -> bool {
		path.extension()
			.map(|ext| ext.to_string_lossy().to_lowercase() == "json")
			.unwrap_or(false)
	}
}
