//! ERC-20 `Transfer` event extraction.

use alloy::primitives::{b256, Address, B256, U256};
use chrono::Utc;
use uuid::Uuid;

use crate::models::{ReceiptLog, TokenTransfer};

/// `keccak256("Transfer(address,address,uint256)")`
pub const TRANSFER_EVENT_SIGNATURE: B256 =
	b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// Decodes one log as an ERC-20 transfer.
///
/// Requires exactly three topics with the `Transfer` signature first and a
/// 32-byte data field. ERC-721 transfers (four topics, empty data) and any
/// other shape yield `None`.
pub fn decode_transfer(log: &ReceiptLog) -> Option<(Address, Address, U256)> {
	if log.topics.len() != 3 || log.topics[0] != TRANSFER_EVENT_SIGNATURE {
		return None;
	}
	if log.data.len() != 32 {
		return None;
	}
	let from = Address::from_word(log.topics[1]);
	let to = Address::from_word(log.topics[2]);
	let value = U256::from_be_slice(&log.data);
	Some((from, to, value))
}

/// Extracts every ERC-20 transfer from a receipt's logs, in log order.
pub fn extract_token_transfers(logs: &[ReceiptLog], transaction_id: Uuid) -> Vec<TokenTransfer> {
	let created_at = Utc::now();
	logs.iter()
		.filter_map(|log| {
			let (from, to, value) = decode_transfer(log)?;
			Some(TokenTransfer {
				id: Uuid::new_v4(),
				transaction_id,
				log_index: log.log_index,
				token_address: format_address(&log.address),
				from_address: format_address(&from),
				to_address: format_address(&to),
				value,
				token_decimals: None,
				token_symbol: None,
				token_name: None,
				created_at,
			})
		})
		.collect()
}

/// Lower-case `0x` hex form used for every stored address
pub fn format_address(address: &Address) -> String {
	format!("{:#x}", address)
}
