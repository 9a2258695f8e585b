//! Core services implementing the watcher's business logic.
//!
//! - `blockchain`: node clients and the client factory
//! - `blockwatcher`: per-network head subscription and confirmation gating
//! - `cache`: watched-address and processed-block caching
//! - `delivery`: durable webhook queue, dispatcher workers and retry sweep
//! - `processor`: conversion and persistence of confirmed blocks

pub mod blockchain;
pub mod blockwatcher;
pub mod cache;
pub mod delivery;
pub mod processor;
