//! EVM transaction watcher entry point.
//!
//! Loads the network definitions and worker settings, starts the watcher
//! tasks and runs until interrupted.
//!
//! # Flow
//! 1. Loads `.env`, applies CLI overrides and sets up logging
//! 2. Loads networks from the networks directory and settings from the environment
//! 3. Connects every network and starts watchers, processor and delivery workers
//! 4. Optionally serves `/metrics` and `/health`
//! 5. Handles graceful shutdown on Ctrl+C

use std::{
	env::{set_var, var},
	sync::Arc,
};

use clap::{Arg, Command};
use dotenvy::dotenv;
use tracing::{error, info};

use evm_tx_watcher::{
	bootstrap::{load_networks, Result, WorkerOrchestrator},
	models::WorkerConfig,
	services::blockchain::EvmClientFactory,
	utils::{logging::setup_logging, metrics::server::create_metrics_server},
};

/// Main entry point for the transaction watcher.
///
/// # Errors
/// Returns an error if configuration is invalid, no network can be watched,
/// or the database cannot be opened.
#[tokio::main]
async fn main() -> Result<()> {
	let matches = Command::new("evm-tx-watcher")
		.version(env!("CARGO_PKG_VERSION"))
		.about(
			"Watches EVM networks for confirmed transactions and notifies webhooks about \
			 activity on watched addresses.",
		)
		.arg(
			Arg::new("log-file")
				.long("log-file")
				.help("Write logs to file instead of stdout")
				.action(clap::ArgAction::SetTrue),
		)
		.arg(
			Arg::new("log-level")
				.long("log-level")
				.help("Set log level (trace, debug, info, warn, error)")
				.value_name("LEVEL"),
		)
		.arg(
			Arg::new("log-path")
				.long("log-path")
				.help("Path to store log files (default: logs/)")
				.value_name("PATH"),
		)
		.arg(
			Arg::new("networks-dir")
				.long("networks-dir")
				.help("Directory holding network JSON files (default: config/networks)")
				.value_name("PATH"),
		)
		.arg(
			Arg::new("metrics-address")
				.long("metrics-address")
				.help("Address to start the metrics server on (default: 127.0.0.1:8081)")
				.value_name("HOST:PORT"),
		)
		.arg(
			Arg::new("metrics")
				.long("metrics")
				.help("Enable metrics server")
				.action(clap::ArgAction::SetTrue),
		)
		.get_matches();

	// Load environment variables from .env file
	dotenv().ok();

	// Only apply CLI options if the corresponding environment variables are NOT already set
	if matches.get_flag("log-file") && var("LOG_MODE").is_err() {
		set_var("LOG_MODE", "file");
	}

	if let Some(level) = matches.get_one::<String>("log-level") {
		if var("LOG_LEVEL").is_err() {
			set_var("LOG_LEVEL", level);
		}
	}

	if let Some(path) = matches.get_one::<String>("log-path") {
		if var("LOG_DATA_DIR").is_err() {
			set_var("LOG_DATA_DIR", path);
		}
	}

	if let Some(dir) = matches.get_one::<String>("networks-dir") {
		if var("NETWORKS_CONFIG_DIR").is_err() {
			set_var("NETWORKS_CONFIG_DIR", dir);
		}
	}

	setup_logging().unwrap_or_else(|e| {
		eprintln!("Failed to setup logging: {}", e);
	});

	let config = WorkerConfig::from_env()?;
	let networks = load_networks(&config.networks_dir).map_err(|e| {
		anyhow::anyhow!(
			"Failed to load networks from {}: {}",
			config.networks_dir.display(),
			e
		)
	})?;
	info!(count = networks.len(), "Loaded network configurations");

	let metrics_enabled =
		matches.get_flag("metrics") || var("METRICS_ENABLED").map(|v| v == "true").unwrap_or(false);
	let metrics_address = matches
		.get_one::<String>("metrics-address")
		.cloned()
		.or_else(|| var("METRICS_PORT").ok().map(|port| format!("127.0.0.1:{}", port)))
		.unwrap_or_else(|| "127.0.0.1:8081".to_string());

	let metrics_server = if metrics_enabled {
		info!("Metrics server enabled, starting on {}", metrics_address);
		match create_metrics_server(metrics_address) {
			Ok(server) => Some(server),
			Err(e) => {
				error!("Failed to create metrics server: {}", e);
				None
			}
		}
	} else {
		info!("Metrics server disabled. Use --metrics flag or METRICS_ENABLED=true to enable");
		None
	};

	let orchestrator =
		WorkerOrchestrator::start(config, networks, Arc::new(EvmClientFactory)).await?;

	info!("Service started. Press Ctrl+C to shutdown");

	let ctrl_c = tokio::signal::ctrl_c();
	if let Some(metrics_future) = metrics_server {
		tokio::select! {
			result = ctrl_c => {
				if let Err(e) = result {
					error!("Error waiting for Ctrl+C: {}", e);
				}
				info!("Shutdown signal received, stopping services...");
			}
			result = metrics_future => {
				if let Err(e) = result {
					error!("Metrics server error: {}", e);
				}
				info!("Metrics server stopped, shutting down services...");
			}
		}
	} else {
		let _ = ctrl_c.await;
		info!("Shutdown signal received, stopping services...");
	}

	orchestrator.shutdown().await?;
	Ok(())
}
