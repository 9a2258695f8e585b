use std::path::Path;

use tracing::warn;
use url::Url;

use crate::models::{ConfigLoader, Network};

use super::error::ConfigError;

/// Default location of network definitions, relative to the working directory
pub const DEFAULT_NETWORKS_DIR: &str = "config/networks";

impl ConfigLoader for Network {
	fn load_all<T>(path: Option<&Path>) -> Result<T, ConfigError>
	where
		T: FromIterator<(String, Self)>,
	{
		let network_dir = path.unwrap_or(Path::new(DEFAULT_NETWORKS_DIR));
		let mut pairs = Vec::new();

		if !network_dir.exists() {
			return Err(ConfigError::file_error(format!(
				"networks directory not found: {}",
				network_dir.display()
			)));
		}

		for entry in std::fs::read_dir(network_dir)? {
			let entry = entry?;
			let path = entry.path();

			if !Self::is_json_file(&path) {
				continue;
			}

			match Self::load_from_path(&path) {
				Ok(network) => pairs.push((network.slug.clone(), network)),
				Err(e) => warn!(path = %path.display(), error = %e, "Skipping network file"),
			}
		}

		Ok(T::from_iter(pairs))
	}

	fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
		let file = std::fs::File::open(path)?;
		let config: Network = serde_json::from_reader(file)?;

		if let Err(validation_error) = config.validate() {
			return Err(ConfigError::validation_error(validation_error));
		}

		Ok(config)
	}

	fn validate(&self) -> Result<(), String> {
		if self.slug.is_empty()
			|| !self
				.slug
				.chars()
				.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
		{
			return Err(
				"Slug must contain only lowercase letters, numbers, dashes and underscores"
					.to_string(),
			);
		}

		if self.name.trim().is_empty() {
			return Err("Name must not be empty".to_string());
		}

		if self.chain_id == 0 {
			return Err("chain_id must be greater than 0".to_string());
		}

		let url = Url::parse(&self.rpc_url).map_err(|e| format!("Invalid rpc_url: {}", e))?;
		if !matches!(url.scheme(), "ws" | "wss" | "http" | "https") {
			return Err("rpc_url must start with ws://, wss://, http:// or https://".to_string());
		}

		if self.confirmation_blocks == 0 {
			return Err("Confirmation blocks must be greater than 0".to_string());
		}

		Ok(())
	}
}
