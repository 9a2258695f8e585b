//! Logging utilities for the application
//!
//! Logs go to stdout by default. Setting `LOG_MODE=file` writes them to a
//! daily-rolling file under `LOG_DATA_DIR` (default `logs/`) instead.
//! `LOG_LEVEL` takes precedence over `RUST_LOG`; both default to `info`.
use std::env;
use tracing_appender::rolling::{Builder as RollingBuilder, Rotation};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Default directory for rolling log files
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Prefix of rolling log file names
const LOG_FILE_PREFIX: &str = "evm-tx-watcher";

/// Setup logging for the application according to `LOG_MODE`
pub fn setup_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
	if env::var("LOG_MODE").is_ok_and(|mode| mode.eq_ignore_ascii_case("file")) {
		let dir = env::var("LOG_DATA_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());
		let appender = RollingBuilder::new()
			.rotation(Rotation::DAILY)
			.filename_prefix(LOG_FILE_PREFIX)
			.filename_suffix("log")
			.build(&dir)?;
		setup_logging_with_writer(appender, false)
	} else {
		setup_logging_with_writer(std::io::stdout, true)
	}
}

/// Filter from `LOG_LEVEL`, then `RUST_LOG`, then `info`
pub fn log_filter() -> EnvFilter {
	match env::var("LOG_LEVEL") {
		Ok(level) => EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info")),
		Err(_) => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
	}
}

/// Setup logging for the application with a custom writer
pub fn setup_logging_with_writer<W>(
	writer: W,
	ansi: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>
where
	W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
	tracing_subscriber::registry()
		.with(log_filter())
		.with(
			fmt::layer()
				.with_writer(writer)
				.event_format(
					fmt::format()
						.with_level(true)
						.with_target(true)
						.with_thread_ids(false)
						.with_thread_names(false)
						.with_ansi(ansi)
						.compact(),
				)
				.fmt_fields(fmt::format::PrettyFields::new()),
		)
		.try_init()?;
	Ok(())
}
