//! EVM transaction watcher.
//!
//! Watches EVM networks over WebSocket, waits for blocks to reach a configured
//! confirmation depth, stores the transactions and ERC-20 transfers they carry,
//! and notifies registered webhooks about activity on watched addresses.
//!
//! - `bootstrap`: wiring of watchers, processor and delivery workers
//! - `models`: domain types and configuration
//! - `repositories`: SQLite-backed persistence
//! - `services`: chain clients, watchers, processor, cache and webhook delivery
//! - `utils`: logging, metrics, HTTP and backoff helpers

pub mod bootstrap;
pub mod models;
pub mod repositories;
pub mod services;
pub mod utils;
