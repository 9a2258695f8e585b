//! Mock implementations for testing purposes.
//!
//! - `clients`: chain clients and the client factory
//! - `repositories`: repository traits
//! - `services`: delivery queue and cache

mod clients;
mod services;

#[allow(unused_imports)]
pub use clients::*;
#[allow(unused_imports)]
pub use repositories::*;
#[allow(unused_imports)]
pub use services::*;
