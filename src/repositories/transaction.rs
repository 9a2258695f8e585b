//! Transaction repository.
//!
//! A transaction, its token transfers and the deliveries it triggers are
//! written in a single database transaction. Re-processing a block is safe:
//! a transaction already stored under `(chain_id, hash)` leaves the store
//! untouched.

use alloy::primitives::U256;
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
	models::{TokenTransfer, Transaction, TransactionStatus, WebhookDelivery},
	repositories::{
		codec::{from_millis, parse_u256, parse_uuid, to_millis},
		delivery::insert_delivery,
		error::RepositoryError,
		store::SqliteStore,
	},
};

/// Result of storing a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
	/// Transaction, transfers and deliveries were written
	Inserted,
	/// A transaction with the same `(chain_id, hash)` already existed; nothing was written
	Duplicate,
}

#[async_trait]
pub trait TransactionRepositoryTrait: Send + Sync {
	/// Atomically stores `transaction`, its token transfers and `deliveries`.
	async fn store_transaction(
		&self,
		transaction: &Transaction,
		deliveries: &[WebhookDelivery],
	) -> Result<StoreOutcome, RepositoryError>;

	/// Looks a transaction up by its natural key, with its token transfers.
	async fn find_transaction_by_hash(
		&self,
		chain_id: u64,
		hash: &str,
	) -> Result<Option<Transaction>, RepositoryError>;

	async fn find_token_transfers(
		&self,
		transaction_id: Uuid,
	) -> Result<Vec<TokenTransfer>, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
	id: String,
	chain_id: i64,
	hash: String,
	block_number: i64,
	block_hash: String,
	transaction_index: i64,
	from_address: String,
	to_address: Option<String>,
	value: String,
	gas_used: i64,
	gas_price: String,
	tx_type: i64,
	status: i64,
	block_timestamp: i64,
	created_at: i64,
}

impl TransactionRow {
	fn into_transaction(
		self,
		token_transfers: Vec<TokenTransfer>,
	) -> Result<Transaction, RepositoryError> {
		Ok(Transaction {
			id: parse_uuid(&self.id)?,
			hash: self.hash,
			block_number: self.block_number as u64,
			block_hash: self.block_hash,
			transaction_index: self.transaction_index as u64,
			chain_id: self.chain_id as u64,
			from_address: self.from_address,
			to_address: self.to_address,
			value: parse_u256(&self.value)?,
			gas_used: self.gas_used as u64,
			gas_price: parse_u256(&self.gas_price)?,
			tx_type: self.tx_type as u8,
			status: TransactionStatus::from_i64(self.status),
			block_timestamp: from_millis(self.block_timestamp)?,
			created_at: from_millis(self.created_at)?,
			token_transfers,
		})
	}
}

#[derive(sqlx::FromRow)]
struct TokenTransferRow {
	id: String,
	transaction_id: String,
	log_index: i64,
	token_address: String,
	from_address: String,
	to_address: String,
	value: String,
	token_decimals: Option<i64>,
	token_symbol: Option<String>,
	token_name: Option<String>,
	created_at: i64,
}

impl TryFrom<TokenTransferRow> for TokenTransfer {
	type Error = RepositoryError;

	fn try_from(row: TokenTransferRow) -> Result<Self, Self::Error> {
		Ok(Self {
			id: parse_uuid(&row.id)?,
			transaction_id: parse_uuid(&row.transaction_id)?,
			log_index: row.log_index as u64,
			token_address: row.token_address,
			from_address: row.from_address,
			to_address: row.to_address,
			value: parse_u256(&row.value)?,
			token_decimals: row.token_decimals.map(|d| d as u8),
			token_symbol: row.token_symbol,
			token_name: row.token_name,
			created_at: from_millis(row.created_at)?,
		})
	}
}

fn amount(value: &U256) -> String {
	value.to_string()
}

/// SQLite implementation of [`TransactionRepositoryTrait`]
#[derive(Clone)]
pub struct TransactionRepository {
	pool: SqlitePool,
}

impl TransactionRepository {
	pub fn new(store: &SqliteStore) -> Self {
		Self {
			pool: store.pool().clone(),
		}
	}
}

#[async_trait]
impl TransactionRepositoryTrait for TransactionRepository {
	async fn store_transaction(
		&self,
		transaction: &Transaction,
		deliveries: &[WebhookDelivery],
	) -> Result<StoreOutcome, RepositoryError> {
		let mut tx = self.pool.begin().await?;

		let inserted = sqlx::query(
			"INSERT INTO transactions (id, chain_id, hash, block_number, block_hash, \
			 transaction_index, from_address, to_address, value, gas_used, gas_price, tx_type, \
			 status, block_timestamp, created_at) \
			 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
			 ON CONFLICT (chain_id, hash) DO NOTHING",
		)
		.bind(transaction.id.to_string())
		.bind(transaction.chain_id as i64)
		.bind(&transaction.hash)
		.bind(transaction.block_number as i64)
		.bind(&transaction.block_hash)
		.bind(transaction.transaction_index as i64)
		.bind(&transaction.from_address)
		.bind(&transaction.to_address)
		.bind(amount(&transaction.value))
		.bind(transaction.gas_used as i64)
		.bind(amount(&transaction.gas_price))
		.bind(i64::from(transaction.tx_type))
		.bind(transaction.status.as_i64())
		.bind(to_millis(transaction.block_timestamp))
		.bind(to_millis(transaction.created_at))
		.execute(&mut *tx)
		.await?;

		if inserted.rows_affected() == 0 {
			tx.rollback().await?;
			return Ok(StoreOutcome::Duplicate);
		}

		for transfer in &transaction.token_transfers {
			sqlx::query(
				"INSERT INTO token_transfers (id, transaction_id, log_index, token_address, \
				 from_address, to_address, value, token_decimals, token_symbol, token_name, \
				 created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
			)
			.bind(transfer.id.to_string())
			.bind(transfer.transaction_id.to_string())
			.bind(transfer.log_index as i64)
			.bind(&transfer.token_address)
			.bind(&transfer.from_address)
			.bind(&transfer.to_address)
			.bind(amount(&transfer.value))
			.bind(transfer.token_decimals.map(i64::from))
			.bind(&transfer.token_symbol)
			.bind(&transfer.token_name)
			.bind(to_millis(transfer.created_at))
			.execute(&mut *tx)
			.await?;
		}

		for delivery in deliveries {
			insert_delivery(&mut *tx, delivery).await?;
		}

		tx.commit().await?;
		Ok(StoreOutcome::Inserted)
	}

	async fn find_transaction_by_hash(
		&self,
		chain_id: u64,
		hash: &str,
	) -> Result<Option<Transaction>, RepositoryError> {
		let row: Option<TransactionRow> = sqlx::query_as(
			"SELECT id, chain_id, hash, block_number, block_hash, transaction_index, \
			 from_address, to_address, value, gas_used, gas_price, tx_type, status, \
			 block_timestamp, created_at FROM transactions WHERE chain_id = ? AND hash = ?",
		)
		.bind(chain_id as i64)
		.bind(hash)
		.fetch_optional(&self.pool)
		.await?;

		match row {
			Some(row) => {
				let transfers = self.find_token_transfers(parse_uuid(&row.id)?).await?;
				row.into_transaction(transfers).map(Some)
			}
			None => Ok(None),
		}
	}

	async fn find_token_transfers(
		&self,
		transaction_id: Uuid,
	) -> Result<Vec<TokenTransfer>, RepositoryError> {
		let rows: Vec<TokenTransferRow> = sqlx::query_as(
			"SELECT id, transaction_id, log_index, token_address, from_address, to_address, \
			 value, token_decimals, token_symbol, token_name, created_at \
			 FROM token_transfers WHERE transaction_id = ? ORDER BY log_index ASC",
		)
		.bind(transaction_id.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TokenTransfer::try_from).collect()
	}
}
