//! Integration tests for webhook dispatcher workers.
//!
//! Endpoints are served by `mockito`; deliveries live in an in-memory store.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use mockito::Matcher;
use tokio::sync::watch;
use uuid::Uuid;

use evm_tx_watcher::{
	models::{DeliveryStatus, Webhook, WebhookDelivery},
	repositories::{
		SqliteStore, TransactionRepository, TransactionRepositoryTrait, WatchedAddressRepository,
		WatchedAddressRepositoryTrait, WebhookDeliveryRepository, WebhookDeliveryRepositoryTrait,
	},
	services::delivery::{
		sign_payload, verify_signature, DeliveryQueue, DispatcherSettings, SqliteDeliveryQueue,
		WebhookDispatcher, DELIVERY_ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER,
	},
	utils::{
		tests::builders::{delivery::DeliveryBuilder, transaction::TransactionBuilder},
		HttpRetryConfig, RetryConfig,
	},
};

use crate::integration::mocks::{
	MockDeliveryQueue, MockWatchedAddressRepository, MockWebhookDeliveryRepository,
};

const SECRET: &str = "whsec_test";
const PAYLOAD: &str = r#"{"event":"transaction","hash":"0xabc"}"#;

fn settings() -> DispatcherSettings {
	DispatcherSettings {
		request_timeout: Duration::from_secs(2),
		dequeue_timeout: Duration::from_millis(50),
		backoff: RetryConfig {
			max_retries: 3,
			initial_delay: Duration::from_secs(30),
			max_delay: Duration::from_secs(3600),
		},
		http_retry: HttpRetryConfig {
			max_retries: 1,
			initial_backoff: Duration::from_millis(10),
			max_backoff: Duration::from_millis(20),
			..HttpRetryConfig::default()
		},
	}
}

struct Fixture {
	deliveries: Arc<WebhookDeliveryRepository>,
	queue: Arc<SqliteDeliveryQueue>,
	dispatcher: Arc<WebhookDispatcher>,
	delivery: WebhookDelivery,
}

async fn fixture(url: &str, max_retries: u32) -> Fixture {
	let store = SqliteStore::in_memory().await.unwrap();
	let addresses = Arc::new(WatchedAddressRepository::new(&store));
	let watched = addresses
		.register_watched_address("0xbb", 11155111, url, SECRET)
		.await
		.unwrap();
	let transaction = TransactionBuilder::new().build();
	TransactionRepository::new(&store)
		.store_transaction(&transaction, &[])
		.await
		.unwrap();

	let deliveries = Arc::new(WebhookDeliveryRepository::new(&store));
	let delivery = DeliveryBuilder::new(watched.webhook_id, transaction.id)
		.payload(PAYLOAD)
		.max_retries(max_retries)
		.build();
	deliveries.create_delivery(&delivery).await.unwrap();

	let queue = Arc::new(SqliteDeliveryQueue::new(&store));
	let dispatcher = Arc::new(
		WebhookDispatcher::new(deliveries.clone(), addresses, queue.clone(), settings()).unwrap(),
	);
	Fixture {
		deliveries,
		queue,
		dispatcher,
		delivery,
	}
}

#[tokio::test]
async fn test_successful_delivery_is_signed_and_recorded() {
	let mut server = mockito::Server::new_async().await;
	let signature = sign_payload(SECRET, PAYLOAD).unwrap();
	let fixture = fixture(&format!("{}/hook", server.url()), 3).await;

	let mock = server
		.mock("POST", "/hook")
		.match_header("content-type", "application/json")
		.match_header(SIGNATURE_HEADER, signature.as_str())
		.match_header(DELIVERY_ID_HEADER, fixture.delivery.id.to_string().as_str())
		.match_header(TIMESTAMP_HEADER, Matcher::Regex(r"^\d+$".to_string()))
		.match_body(PAYLOAD)
		.with_status(200)
		.with_body("ok")
		.expect(1)
		.create_async()
		.await;

	let status = fixture.dispatcher.process(fixture.delivery.id).await.unwrap();
	assert_eq!(status, Some(DeliveryStatus::Delivered));
	mock.assert_async().await;

	let stored = fixture
		.deliveries
		.find_delivery(fixture.delivery.id)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(stored.status, DeliveryStatus::Delivered);
	assert_eq!(stored.http_status_code, Some(200));
	assert_eq!(stored.response_body.as_deref(), Some("ok"));
	assert!(stored.delivered_at.is_some());
	assert_eq!(stored.retry_count, 0);
	assert!(verify_signature(SECRET, PAYLOAD, &signature));
}

#[tokio::test]
async fn test_three_failures_exhaust_the_budget() {
	let mut server = mockito::Server::new_async().await;
	let fixture = fixture(&format!("{}/hook", server.url()), 3).await;
	let mock = server
		.mock("POST", "/hook")
		.with_status(500)
		.with_body("internal error")
		.expect(3)
		.create_async()
		.await;

	let before = Utc::now();
	assert_eq!(
		fixture.dispatcher.process(fixture.delivery.id).await.unwrap(),
		Some(DeliveryStatus::Failed)
	);
	let first = fixture
		.deliveries
		.find_delivery(fixture.delivery.id)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(first.retry_count, 1);
	assert_eq!(first.http_status_code, Some(500));
	assert_eq!(first.response_body.as_deref(), Some("internal error"));
	let wait = first.next_retry_at.unwrap() - before;
	assert!(wait >= chrono::Duration::seconds(59) && wait <= chrono::Duration::seconds(61));

	assert_eq!(
		fixture.dispatcher.process(fixture.delivery.id).await.unwrap(),
		Some(DeliveryStatus::Failed)
	);
	assert_eq!(
		fixture.dispatcher.process(fixture.delivery.id).await.unwrap(),
		Some(DeliveryStatus::MaxRetriesExceeded)
	);
	mock.assert_async().await;

	let last = fixture
		.deliveries
		.find_delivery(fixture.delivery.id)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(last.status, DeliveryStatus::MaxRetriesExceeded);
	assert_eq!(last.retry_count, 3);
	assert!(last.next_retry_at.is_none());

	let far_future = Utc::now() + chrono::Duration::days(3650);
	assert!(fixture
		.deliveries
		.find_due_retries(far_future, 100)
		.await
		.unwrap()
		.is_empty());

	// A stale queue entry for an exhausted delivery is ignored
	assert_eq!(fixture.dispatcher.process(fixture.delivery.id).await.unwrap(), None);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_transport_failure() {
	let fixture = fixture("http://127.0.0.1:1/hook", 3).await;

	let status = fixture.dispatcher.process(fixture.delivery.id).await.unwrap();
	assert_eq!(status, Some(DeliveryStatus::Failed));

	let stored = fixture
		.deliveries
		.find_delivery(fixture.delivery.id)
		.await
		.unwrap()
		.unwrap();
	assert_eq!(stored.http_status_code, None);
	assert!(stored.error_message.is_some());
	assert_eq!(stored.retry_count, 1);
}

#[tokio::test]
async fn test_worker_delivers_queued_deliveries_until_shutdown() {
	let mut server = mockito::Server::new_async().await;
	let fixture = fixture(&format!("{}/hook", server.url()), 3).await;
	let mock = server
		.mock("POST", "/hook")
		.with_status(204)
		.expect(1)
		.create_async()
		.await;

	let (shutdown_tx, shutdown_rx) = watch::channel(false);
	let worker = tokio::spawn(fixture.dispatcher.clone().run_worker(0, shutdown_rx));
	fixture.queue.push(fixture.delivery.id).await.unwrap();

	let mut delivered = false;
	for _ in 0..100 {
		let stored = fixture
			.deliveries
			.find_delivery(fixture.delivery.id)
			.await
			.unwrap()
			.unwrap();
		if stored.status == DeliveryStatus::Delivered {
			delivered = true;
			break;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	assert!(delivered);
	mock.assert_async().await;

	shutdown_tx.send(true).unwrap();
	tokio::time::timeout(Duration::from_secs(1), worker)
		.await
		.unwrap()
		.unwrap();
}

#[tokio::test]
async fn test_missing_webhook_counts_as_failure() {
	let delivery = DeliveryBuilder::new(Uuid::new_v4(), Uuid::new_v4())
		.max_retries(3)
		.build();
	let id = delivery.id;

	let mut deliveries = MockWebhookDeliveryRepository::new();
	deliveries
		.expect_find_delivery()
		.returning(move |_| Ok(Some(delivery.clone())));
	deliveries
		.expect_update_delivery()
		.withf(|d| d.status == DeliveryStatus::Failed && d.retry_count == 1)
		.times(1)
		.returning(|_| Ok(()));
	let mut addresses = MockWatchedAddressRepository::new();
	addresses
		.expect_find_webhook()
		.returning(|_| Ok(None::<Webhook>));

	let dispatcher = WebhookDispatcher::new(
		Arc::new(deliveries),
		Arc::new(addresses),
		Arc::new(MockDeliveryQueue::new()),
		settings(),
	)
	.unwrap();
	assert_eq!(dispatcher.process(id).await.unwrap(), Some(DeliveryStatus::Failed));
}

#[tokio::test]
async fn test_terminal_delivery_is_not_attempted() {
	let delivery = DeliveryBuilder::new(Uuid::new_v4(), Uuid::new_v4())
		.delivered()
		.build();
	let id = delivery.id;

	let mut deliveries = MockWebhookDeliveryRepository::new();
	deliveries
		.expect_find_delivery()
		.returning(move |_| Ok(Some(delivery.clone())));
	deliveries.expect_update_delivery().never();
	let mut addresses = MockWatchedAddressRepository::new();
	addresses.expect_find_webhook().never();

	let dispatcher = WebhookDispatcher::new(
		Arc::new(deliveries),
		Arc::new(addresses),
		Arc::new(MockDeliveryQueue::new()),
		settings(),
	)
	.unwrap();
	assert_eq!(dispatcher.process(id).await.unwrap(), None);
}
