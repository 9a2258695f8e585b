//! JSON body posted to webhook endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{TokenTransfer, Transaction, TransactionStatus};

pub const TRANSACTION_EVENT: &str = "transaction";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTransferPayload {
	pub log_index: u64,
	pub token_address: String,
	pub from: String,
	pub to: String,
	/// Raw token amount as a decimal string
	pub value: String,
}

impl From<&TokenTransfer> for TokenTransferPayload {
	fn from(transfer: &TokenTransfer) -> Self {
		Self {
			log_index: transfer.log_index,
			token_address: transfer.token_address.clone(),
			from: transfer.from_address.clone(),
			to: transfer.to_address.clone(),
			value: transfer.value.to_string(),
		}
	}
}

/// Notification that a watched address took part in a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookPayload {
	pub delivery_id: Uuid,
	pub event: String,
	pub network: String,
	pub chain_id: u64,
	pub transaction_hash: String,
	pub block_number: u64,
	pub block_hash: String,
	pub from: String,
	pub to: Option<String>,
	/// Wei amount as a decimal string
	pub value: String,
	pub status: TransactionStatus,
	pub watched_address: String,
	pub block_timestamp: DateTime<Utc>,
	pub token_transfers: Vec<TokenTransferPayload>,
}

impl WebhookPayload {
	pub fn new(
		delivery_id: Uuid,
		network: &str,
		transaction: &Transaction,
		watched_address: &str,
	) -> Self {
		Self {
			delivery_id,
			event: TRANSACTION_EVENT.to_string(),
			network: network.to_string(),
			chain_id: transaction.chain_id,
			transaction_hash: transaction.hash.clone(),
			block_number: transaction.block_number,
			block_hash: transaction.block_hash.clone(),
			from: transaction.from_address.clone(),
			to: transaction.to_address.clone(),
			value: transaction.value.to_string(),
			status: transaction.status,
			watched_address: watched_address.to_string(),
			block_timestamp: transaction.block_timestamp,
			token_transfers: transaction
				.token_transfers
				.iter()
				.map(TokenTransferPayload::from)
				.collect(),
		}
	}
}
