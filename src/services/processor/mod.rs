//! Block processing service.
//!
//! Turns confirmed blocks into stored transactions, token transfers and
//! webhook deliveries:
//! - `transfer`: ERC-20 `Transfer` log decoding
//! - `service`: the block consumer and watched-address matching

mod error;
mod service;
mod transfer;

pub use error::ProcessorError;
pub use service::{convert_transaction, match_watched_addresses, BlockProcessor, ProcessorSettings};
pub use transfer::{
	decode_transfer, extract_token_transfers, format_address, TRANSFER_EVENT_SIGNATURE,
};
