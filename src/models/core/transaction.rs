//! Stored transaction and token transfer records.

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Execution outcome recorded in the transaction receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
	Failed,
	Success,
}

impl TransactionStatus {
	pub fn as_i64(&self) -> i64 {
		match self {
			Self::Failed => 0,
			Self::Success => 1,
		}
	}

	pub fn from_i64(value: i64) -> Self {
		if value == 1 {
			Self::Success
		} else {
			Self::Failed
		}
	}
}

impl From<bool> for TransactionStatus {
	fn from(success: bool) -> Self {
		if success {
			Self::Success
		} else {
			Self::Failed
		}
	}
}

/// A transaction from a confirmed block, in storage form.
///
/// Addresses are lower-case `0x` hex. The natural key is `(chain_id, hash)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
	pub id: Uuid,
	pub hash: String,
	pub block_number: u64,
	pub block_hash: String,
	pub transaction_index: u64,
	pub chain_id: u64,
	pub from_address: String,
	/// `None` for contract creation
	pub to_address: Option<String>,
	pub value: U256,
	pub gas_used: u64,
	pub gas_price: U256,
	pub tx_type: u8,
	pub status: TransactionStatus,
	pub block_timestamp: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
	/// Transfers emitted by this transaction, in log order
	pub token_transfers: Vec<TokenTransfer>,
}

impl Transaction {
	/// Every address that took part in the transaction, including transfer parties.
	pub fn participants(&self) -> Vec<&str> {
		let mut addresses = vec![self.from_address.as_str()];
		if let Some(to) = &self.to_address {
			addresses.push(to.as_str());
		}
		for transfer in &self.token_transfers {
			addresses.push(transfer.from_address.as_str());
			addresses.push(transfer.to_address.as_str());
		}
		addresses.sort_unstable();
		addresses.dedup();
		addresses
	}
}

/// An ERC-20 `Transfer` event emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTransfer {
	pub id: Uuid,
	pub transaction_id: Uuid,
	pub log_index: u64,
	pub token_address: String,
	pub from_address: String,
	pub to_address: String,
	/// Raw token amount, not scaled by decimals
	pub value: U256,
	pub token_decimals: Option<u8>,
	pub token_symbol: Option<String>,
	pub token_name: Option<String>,
	pub created_at: DateTime<Utc>,
}
