//! Metrics module for the application.
//!
//! - This module contains the global Prometheus registry.
//! - Defines specific metrics for the application.

pub mod server;
use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use sysinfo::{Disks, System};

lazy_static! {
	// Global Prometheus registry.
	pub static ref REGISTRY: Registry = Registry::new();

	// Gauge for CPU usage percentage.
	pub static ref CPU_USAGE: Gauge = {
	  let gauge = Gauge::new("cpu_usage_percentage", "Current CPU usage percentage").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	// Gauge for memory usage percentage.
	pub static ref MEMORY_USAGE_PERCENT: Gauge = {
	  let gauge = Gauge::new("memory_usage_percentage", "Memory usage percentage").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	// Gauge for memory usage in bytes.
	pub static ref MEMORY_USAGE: Gauge = {
		let gauge = Gauge::new("memory_usage_bytes", "Memory usage in bytes").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	// Gauge for used disk space in bytes.
	pub static ref DISK_USAGE: Gauge = {
	  let gauge = Gauge::new("disk_usage_bytes", "Used disk space in bytes").unwrap();
	  REGISTRY.register(Box::new(gauge.clone())).unwrap();
	  gauge
	};

	// Number of networks with a running watcher
	pub static ref NETWORKS_WATCHED: Gauge = {
		let gauge =
			Gauge::new("networks_watched", "Number of networks with a running watcher").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	// Headers received from node subscriptions
	pub static ref HEADERS_RECEIVED: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("headers_received_total", "New-head notifications received"),
			&["network"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Headers waiting for confirmations
	pub static ref PENDING_HEADERS: GaugeVec = {
		let gauge = GaugeVec::new(
			Opts::new("pending_headers", "Headers waiting for confirmations"),
			&["network"]
		).unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};

	// Blocks handed to the processor after reaching confirmation depth
	pub static ref BLOCKS_CONFIRMED: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("blocks_confirmed_total", "Confirmed blocks handed to the processor"),
			&["network"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Confirmed blocks dropped because the processor channel was full
	pub static ref BLOCKS_DROPPED: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new(
				"blocks_dropped_total",
				"Confirmed blocks dropped on a full processor channel",
			),
			&["network"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Pending headers evicted without ever confirming
	pub static ref PENDING_EVICTED: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("pending_headers_evicted_total", "Pending headers evicted as stale"),
			&["network"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Blocks skipped because they carry undecodable transactions
	pub static ref UNSUPPORTED_BLOCKS: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new(
				"unsupported_blocks_total",
				"Blocks skipped for unsupported transaction types",
			),
			&["network"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Subscription re-establishments
	pub static ref WATCHER_RECONNECTS: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("watcher_reconnects_total", "Subscription re-establishments"),
			&["network"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Matched transactions persisted
	pub static ref TRANSACTIONS_STORED: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("transactions_stored_total", "Matched transactions persisted"),
			&["network"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Webhook delivery attempts by outcome
	pub static ref WEBHOOK_DELIVERIES: IntCounterVec = {
		let counter = IntCounterVec::new(
			Opts::new("webhook_deliveries_total", "Webhook delivery attempts by outcome"),
			&["outcome"]
		).unwrap();
		REGISTRY.register(Box::new(counter.clone())).unwrap();
		counter
	};

	// Deliveries waiting in the durable queue
	pub static ref DELIVERY_QUEUE_LENGTH: Gauge = {
		let gauge = Gauge::new("delivery_queue_length", "Deliveries waiting in the queue").unwrap();
		REGISTRY.register(Box::new(gauge.clone())).unwrap();
		gauge
	};
}

/// Gather all metrics and encode into the provided format.
pub fn gather_metrics() -> Result<Vec<u8>, Box<dyn std::error::Error>> {
	let encoder = TextEncoder::new();
	let metric_families = REGISTRY.gather();
	let mut buffer = Vec::new();
	encoder.encode(&metric_families, &mut buffer)?;
	Ok(buffer)
}

/// Updates the system metrics for CPU and memory usage.
pub fn update_system_metrics() {
	let mut sys = System::new_all();
	sys.refresh_all();

	CPU_USAGE.set(sys.global_cpu_usage() as f64);

	let total_memory = sys.total_memory();
	let memory_usage = sys.used_memory();
	MEMORY_USAGE.set(memory_usage as f64);

	let memory_percentage = if total_memory > 0 {
		(memory_usage as f64 / total_memory as f64) * 100.0
	} else {
		0.0
	};
	MEMORY_USAGE_PERCENT.set(memory_percentage);

	// Used disk space is total minus available, summed over all disks.
	let disks = Disks::new_with_refreshed_list();
	let used_disk_space: u64 = disks
		.list()
		.iter()
		.map(|disk| disk.total_space().saturating_sub(disk.available_space()))
		.sum();
	DISK_USAGE.set(used_disk_space as f64);
}
