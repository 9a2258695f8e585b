//! Integration tests for the retry scheduler.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use evm_tx_watcher::{
	models::{DeliveryStatus, WebhookDelivery},
	repositories::{
		SqliteStore, TransactionRepository, TransactionRepositoryTrait, WatchedAddressRepository,
		WatchedAddressRepositoryTrait, WebhookDeliveryRepository, WebhookDeliveryRepositoryTrait,
	},
	services::delivery::{DeliveryError, DeliveryQueue, RetryScheduler, SqliteDeliveryQueue},
	utils::tests::builders::{delivery::DeliveryBuilder, transaction::TransactionBuilder},
};

use crate::integration::mocks::MockDeliveryQueue;

const CLAIM_TIMEOUT: Duration = Duration::from_millis(200);

struct Fixture {
	store: SqliteStore,
	deliveries: Arc<WebhookDeliveryRepository>,
	webhook_id: Uuid,
	transaction_id: Uuid,
}

async fn fixture() -> Fixture {
	let store = SqliteStore::in_memory().await.unwrap();
	let watched = WatchedAddressRepository::new(&store)
		.register_watched_address("0xbb", 11155111, "https://hooks.example", "secret")
		.await
		.unwrap();
	let transaction = TransactionBuilder::new().build();
	TransactionRepository::new(&store)
		.store_transaction(&transaction, &[])
		.await
		.unwrap();
	Fixture {
		deliveries: Arc::new(WebhookDeliveryRepository::new(&store)),
		store,
		webhook_id: watched.webhook_id,
		transaction_id: transaction.id,
	}
}

impl Fixture {
	async fn failed(&self, retry_count: u32, due_in: chrono::Duration) -> WebhookDelivery {
		let delivery = DeliveryBuilder::new(self.webhook_id, self.transaction_id)
			.max_retries(3)
			.failed(retry_count, Utc::now() + due_in)
			.build();
		self.deliveries.create_delivery(&delivery).await.unwrap();
		delivery
	}

	fn scheduler(
		&self,
		queue: Arc<dyn DeliveryQueue>,
		interval: Duration,
		batch_size: u32,
	) -> RetryScheduler {
		RetryScheduler::new(self.deliveries.clone(), queue, interval, batch_size, CLAIM_TIMEOUT)
	}

	async fn status(&self, id: Uuid) -> DeliveryStatus {
		self.deliveries.find_delivery(id).await.unwrap().unwrap().status
	}
}

#[tokio::test]
async fn test_sweep_enqueues_only_due_deliveries_once() {
	let fixture = fixture().await;
	let due = fixture.failed(1, chrono::Duration::seconds(-5)).await;
	let later = fixture.failed(1, chrono::Duration::minutes(10)).await;
	let exhausted = fixture.failed(3, chrono::Duration::seconds(-5)).await;

	let queue = Arc::new(SqliteDeliveryQueue::new(&fixture.store));
	let scheduler = fixture.scheduler(queue.clone(), Duration::from_secs(30), 100);

	assert_eq!(scheduler.sweep().await.unwrap(), 1);
	assert_eq!(fixture.status(due.id).await, DeliveryStatus::Pending);
	assert_eq!(fixture.status(later.id).await, DeliveryStatus::Failed);
	assert_eq!(fixture.status(exhausted.id).await, DeliveryStatus::Failed);
	assert_eq!(queue.pop(Duration::from_millis(10)).await.unwrap(), Some(due.id));

	// The claim moved it out of `failed`, so an overlapping sweep finds nothing
	assert_eq!(scheduler.sweep().await.unwrap(), 0);
	assert_eq!(queue.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_sweep_respects_batch_size() {
	let fixture = fixture().await;
	for _ in 0..5 {
		fixture.failed(1, chrono::Duration::seconds(-1)).await;
	}
	let queue = Arc::new(SqliteDeliveryQueue::new(&fixture.store));
	let scheduler = fixture.scheduler(queue.clone(), Duration::from_secs(30), 2);

	assert_eq!(scheduler.sweep().await.unwrap(), 2);
	assert_eq!(scheduler.sweep().await.unwrap(), 2);
	assert_eq!(scheduler.sweep().await.unwrap(), 1);
	assert_eq!(queue.len().await.unwrap(), 5);
}

#[tokio::test]
async fn test_failed_push_releases_claim() {
	let fixture = fixture().await;
	let due = fixture.failed(2, chrono::Duration::seconds(-5)).await;

	let mut queue = MockDeliveryQueue::new();
	queue
		.expect_push()
		.times(1)
		.returning(|_| Err(DeliveryError::Queue("database is locked".to_string())));
	let scheduler = fixture.scheduler(Arc::new(queue), Duration::from_secs(30), 100);

	assert_eq!(scheduler.sweep().await.unwrap(), 0);
	let stored = fixture.deliveries.find_delivery(due.id).await.unwrap().unwrap();
	assert_eq!(stored.status, DeliveryStatus::Failed);
	assert_eq!(stored.retry_count, 2);
	assert!(stored.is_due(Utc::now() + chrono::Duration::seconds(1)));
}

#[tokio::test]
async fn test_run_sweeps_at_startup_and_stops_on_shutdown() {
	let fixture = fixture().await;
	let due = fixture.failed(1, chrono::Duration::seconds(-5)).await;
	let queue = Arc::new(SqliteDeliveryQueue::new(&fixture.store));
	let scheduler = fixture.scheduler(queue.clone(), Duration::from_secs(3600), 100);

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let handle = tokio::spawn(scheduler.run(shutdown_rx));

	assert_eq!(queue.pop(Duration::from_secs(2)).await.unwrap(), Some(due.id));
	shutdown_tx.send(true).unwrap();
	tokio::time::timeout(Duration::from_secs(1), handle)
		.await
		.unwrap()
		.unwrap();
}

#[tokio::test]
async fn test_delivery_popped_without_outcome_is_requeued() {
	let fixture = fixture().await;
	let due = fixture.failed(1, chrono::Duration::seconds(-5)).await;
	let queue = Arc::new(SqliteDeliveryQueue::new(&fixture.store));
	let scheduler = fixture.scheduler(queue.clone(), Duration::from_secs(30), 100);

	assert_eq!(scheduler.sweep().await.unwrap(), 1);
	// A worker takes it and stops before recording an outcome
	assert_eq!(queue.pop(Duration::from_millis(10)).await.unwrap(), Some(due.id));

	// Still inside the claim timeout: treated as in flight
	assert_eq!(scheduler.sweep().await.unwrap(), 0);
	assert_eq!(queue.len().await.unwrap(), 0);

	tokio::time::sleep(CLAIM_TIMEOUT * 2).await;
	assert_eq!(scheduler.sweep().await.unwrap(), 1);
	assert_eq!(queue.pop(Duration::from_millis(10)).await.unwrap(), Some(due.id));

	let stored = fixture.deliveries.find_delivery(due.id).await.unwrap().unwrap();
	assert_eq!(stored.status, DeliveryStatus::Pending);
	assert_eq!(stored.retry_count, 1);
}

#[tokio::test]
async fn test_committed_but_unqueued_delivery_is_requeued() {
	let fixture = fixture().await;
	let delivery = DeliveryBuilder::new(fixture.webhook_id, fixture.transaction_id).build();
	fixture.deliveries.create_delivery(&delivery).await.unwrap();
	let queue = Arc::new(SqliteDeliveryQueue::new(&fixture.store));
	let scheduler = fixture.scheduler(queue.clone(), Duration::from_secs(30), 100);

	tokio::time::sleep(CLAIM_TIMEOUT * 2).await;
	assert_eq!(scheduler.sweep().await.unwrap(), 1);
	assert_eq!(queue.len().await.unwrap(), 1);

	// Queued again, so a later sweep leaves it alone
	tokio::time::sleep(CLAIM_TIMEOUT * 2).await;
	assert_eq!(scheduler.sweep().await.unwrap(), 0);
	assert_eq!(queue.pop(Duration::from_millis(10)).await.unwrap(), Some(delivery.id));
}

#[tokio::test]
async fn test_finished_delivery_is_never_reclaimed() {
	let fixture = fixture().await;
	let delivery = DeliveryBuilder::new(fixture.webhook_id, fixture.transaction_id)
		.delivered()
		.build();
	fixture.deliveries.create_delivery(&delivery).await.unwrap();
	let queue = Arc::new(SqliteDeliveryQueue::new(&fixture.store));
	let scheduler = fixture.scheduler(queue.clone(), Duration::from_secs(30), 100);

	tokio::time::sleep(CLAIM_TIMEOUT * 2).await;
	assert_eq!(scheduler.sweep().await.unwrap(), 0);
	assert_eq!(queue.len().await.unwrap(), 0);
}
