//! Persistence for transactions, watched addresses and webhook deliveries.
//!
//! All repositories share one [`SqliteStore`] pool. Each exposes an async trait
//! so services can be tested against mocks.

mod address;
mod codec;
mod delivery;
mod error;
mod store;
mod transaction;

pub use address::{WatchedAddressRepository, WatchedAddressRepositoryTrait};
pub use delivery::{WebhookDeliveryRepository, WebhookDeliveryRepositoryTrait};
pub use error::RepositoryError;
pub use store::SqliteStore;
pub use transaction::{StoreOutcome, TransactionRepository, TransactionRepositoryTrait};
