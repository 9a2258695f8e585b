//! Block processor service.
//!
//! Single consumer of the confirmed-block channel. Each transaction is
//! converted, stored together with its token transfers and the webhook
//! deliveries it triggers, and the new deliveries are queued.

use std::{sync::Arc, time::Duration};

use alloy::consensus::{transaction::SignerRecoverable, Transaction as _};
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
	models::{
		BlockTransaction, ConfirmedBlock, ProcessedBlock, Transaction, TransactionStatus,
		WatchedAddress, WebhookDelivery,
	},
	repositories::{
		StoreOutcome, TransactionRepositoryTrait, WatchedAddressRepositoryTrait,
		WebhookDeliveryRepositoryTrait,
	},
	services::{
		cache::CacheTrait,
		delivery::{DeliveryQueue, WebhookPayload},
		processor::{
			error::ProcessorError,
			transfer::{extract_token_transfers, format_address},
		},
	},
	utils::metrics::TRANSACTIONS_STORED,
};

/// Processor tunables
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
	/// Attempt budget given to every new delivery
	pub max_retries: u32,
	pub watched_address_ttl: Duration,
	pub processed_block_ttl: Duration,
}

/// Converts confirmed blocks into stored transactions and queued deliveries
pub struct BlockProcessor {
	transactions: Arc<dyn TransactionRepositoryTrait>,
	addresses: Arc<dyn WatchedAddressRepositoryTrait>,
	deliveries: Arc<dyn WebhookDeliveryRepositoryTrait>,
	cache: Arc<dyn CacheTrait>,
	queue: Arc<dyn DeliveryQueue>,
	settings: ProcessorSettings,
}

impl BlockProcessor {
	pub fn new(
		transactions: Arc<dyn TransactionRepositoryTrait>,
		addresses: Arc<dyn WatchedAddressRepositoryTrait>,
		deliveries: Arc<dyn WebhookDeliveryRepositoryTrait>,
		cache: Arc<dyn CacheTrait>,
		queue: Arc<dyn DeliveryQueue>,
		settings: ProcessorSettings,
	) -> Self {
		Self {
			transactions,
			addresses,
			deliveries,
			cache,
			queue,
			settings,
		}
	}

	/// Consumes blocks until every sender is dropped, then returns.
	pub async fn run(self: Arc<Self>, mut receiver: mpsc::Receiver<ConfirmedBlock>) {
		info!("Block processor started");
		while let Some(block) = receiver.recv().await {
			let network = block.network.clone();
			let number = block.number;
			if let Err(e) = self.handle_block(block).await {
				error!(network = %network, block = number, error = %e, "Failed to process block");
			}
		}
		info!("Block processor drained and stopped");
	}

	/// Processes one confirmed block.
	///
	/// Per-transaction failures are logged and counted as skipped. The block
	/// is marked processed afterwards, so a replay of the same block is a no-op.
	#[instrument(skip_all, fields(network = %block.network, block = block.number))]
	pub async fn handle_block(
		&self,
		block: ConfirmedBlock,
	) -> Result<ProcessedBlock, ProcessorError> {
		let mut summary = ProcessedBlock {
			network: block.network.clone(),
			block_number: block.number,
			..ProcessedBlock::default()
		};

		if self
			.cache
			.is_block_processed(&block.network, block.number)
			.await
		{
			debug!("Block already processed");
			summary.already_processed = true;
			return Ok(summary);
		}

		let watched = self.watched_addresses(block.chain_id).await?;

		for tx in &block.transactions {
			let transaction = match convert_transaction(&block, tx) {
				Ok(transaction) => transaction,
				Err(e) => {
					warn!(error = %e, "Skipping transaction");
					summary.transactions_skipped += 1;
					continue;
				}
			};

			match self.persist(&block.network, &transaction, &watched).await {
				Ok((StoreOutcome::Inserted, created)) => {
					summary.transactions_stored += 1;
					summary.token_transfers += transaction.token_transfers.len();
					summary.deliveries_created += created;
				}
				Ok((StoreOutcome::Duplicate, _)) => {
					debug!(tx = %transaction.hash, "Transaction already stored");
					summary.transactions_duplicate += 1;
				}
				Err(e) => {
					error!(error = %e, "Failed to persist transaction");
					summary.transactions_skipped += 1;
				}
			}
		}

		self.cache
			.mark_block_processed(&block.network, block.number, self.settings.processed_block_ttl)
			.await;
		TRANSACTIONS_STORED
			.with_label_values(&[&block.network])
			.inc_by(summary.transactions_stored as u64);
		info!(
			stored = summary.transactions_stored,
			duplicate = summary.transactions_duplicate,
			skipped = summary.transactions_skipped,
			transfers = summary.token_transfers,
			deliveries = summary.deliveries_created,
			"Processed block"
		);
		Ok(summary)
	}

	/// Active watched addresses for the chain, read through the cache
	async fn watched_addresses(
		&self,
		chain_id: u64,
	) -> Result<Vec<WatchedAddress>, ProcessorError> {
		if let Some(watched) = self.cache.get_watched_addresses(chain_id).await {
			return Ok(watched);
		}
		let watched = self
			.addresses
			.find_active_watched_addresses(chain_id)
			.await
			.map_err(ProcessorError::WatchedAddresses)?;
		self.cache
			.set_watched_addresses(chain_id, &watched, self.settings.watched_address_ttl)
			.await;
		Ok(watched)
	}

	/// Stores one transaction with its deliveries, then queues the deliveries.
	async fn persist(
		&self,
		network: &str,
		transaction: &Transaction,
		watched: &[WatchedAddress],
	) -> Result<(StoreOutcome, usize), ProcessorError> {
		let mut deliveries = Vec::new();
		for matched in match_watched_addresses(transaction, watched) {
			let mut delivery = WebhookDelivery::new(
				matched.webhook_id,
				transaction.id,
				String::new(),
				self.settings.max_retries,
			);
			let payload = WebhookPayload::new(delivery.id, network, transaction, &matched.address);
			delivery.payload = serde_json::to_string(&payload)?;
			deliveries.push(delivery);
		}

		let outcome = self
			.transactions
			.store_transaction(transaction, &deliveries)
			.await
			.map_err(|source| ProcessorError::Persistence {
				hash: transaction.hash.clone(),
				source,
			})?;

		if outcome == StoreOutcome::Inserted {
			for delivery in &deliveries {
				self.enqueue(delivery.id).await;
			}
		}
		Ok((outcome, deliveries.len()))
	}

	/// Pushes a committed delivery. When the queue refuses it, the delivery is
	/// left `failed` and immediately due so the retry sweep picks it up.
	async fn enqueue(&self, delivery_id: Uuid) {
		let Err(e) = self.queue.push(delivery_id).await else {
			return;
		};
		warn!(
			delivery_id = %delivery_id,
			error = %e,
			"Failed to enqueue delivery, handing it to the retry sweep"
		);
		if let Err(e) = self.deliveries.release_claim(delivery_id, Utc::now()).await {
			error!(delivery_id = %delivery_id, error = %e, "Failed to mark delivery for retry");
		}
	}
}

/// Builds the storage record for one block transaction.
///
/// The sender is always recovered from the signature. A transaction signed
/// for a different chain is rejected.
pub fn convert_transaction(
	block: &ConfirmedBlock,
	tx: &BlockTransaction,
) -> Result<Transaction, ProcessorError> {
	let envelope = &tx.envelope;
	let hash = format!("{:#x}", envelope.tx_hash());

	if let Some(chain_id) = envelope.chain_id() {
		if chain_id != block.chain_id {
			return Err(ProcessorError::conversion(
				hash,
				format!("signed for chain {} on chain {}", chain_id, block.chain_id),
			));
		}
	}

	let from = envelope
		.recover_signer()
		.map_err(|e| {
			ProcessorError::conversion(hash.clone(), format!("sender recovery failed: {}", e))
		})?;

	let id = Uuid::new_v4();
	Ok(Transaction {
		id,
		hash,
		block_number: block.number,
		block_hash: format!("{:#x}", block.hash),
		transaction_index: tx.receipt.transaction_index,
		chain_id: block.chain_id,
		from_address: format_address(&from),
		to_address: envelope.to().map(|to| format_address(&to)),
		value: envelope.value(),
		gas_used: tx.receipt.gas_used,
		gas_price: tx.gas_price(),
		tx_type: u8::from(envelope.tx_type()),
		status: TransactionStatus::from(tx.receipt.status),
		block_timestamp: block.timestamp_utc(),
		created_at: Utc::now(),
		token_transfers: extract_token_transfers(&tx.receipt.logs, id),
	})
}

/// Watched addresses the transaction touches, one per distinct webhook.
///
/// A transaction matches on its sender, its recipient and the parties of any
/// token transfer it emitted.
pub fn match_watched_addresses<'a>(
	transaction: &Transaction,
	watched: &'a [WatchedAddress],
) -> Vec<&'a WatchedAddress> {
	let participants = transaction.participants();
	let mut matched: Vec<&WatchedAddress> = Vec::new();
	for candidate in watched {
		if !candidate.is_active || candidate.chain_id != transaction.chain_id {
			continue;
		}
		let address = candidate.address.to_lowercase();
		if participants.binary_search(&address.as_str()).is_err() {
			continue;
		}
		if matched.iter().any(|m| m.webhook_id == candidate.webhook_id) {
			continue;
		}
		matched.push(candidate);
	}
	matched
}
