//! End-to-end tests for the worker orchestrator.
//!
//! A scripted chain client feeds headers, the real processor writes to an
//! in-memory store and a `mockito` server receives the webhook.

use std::{sync::Arc, time::Duration};

use alloy::{
	primitives::{Address, U256},
	signers::local::PrivateKeySigner,
};

use evm_tx_watcher::{
	bootstrap::{BootstrapError, WorkerOrchestrator},
	models::{DeliveryStatus, Network, WorkerConfig},
	repositories::{
		SqliteStore, WatchedAddressRepository, WatchedAddressRepositoryTrait,
		WebhookDeliveryRepository, WebhookDeliveryRepositoryTrait,
	},
	services::{
		blockchain::{BlockChainClient, BlockChainError},
		processor::format_address,
	},
	utils::tests::builders::{
		block::{receipt, signed_legacy_transaction, ConfirmedBlockBuilder},
		network::NetworkBuilder,
	},
};

use crate::integration::mocks::{header, MockClientFactory, ScriptedClient};

fn config() -> WorkerConfig {
	WorkerConfig {
		database_url: "sqlite::memory:".to_string(),
		reconnect_delay: Duration::from_millis(50),
		dispatcher_workers: 1,
		dequeue_timeout: Duration::from_millis(50),
		retry_sweep_interval: Duration::from_secs(3600),
		..WorkerConfig::default()
	}
}

fn networks() -> Vec<Network> {
	vec![
		NetworkBuilder::new().confirmation_blocks(2).build(),
		NetworkBuilder::new()
			.slug("base-sepolia")
			.name("Base Sepolia")
			.chain_id(84532)
			.build(),
	]
}

#[tokio::test]
async fn test_confirmed_transfer_reaches_webhook() {
	let mut server = mockito::Server::new_async().await;
	let mock = server
		.mock("POST", "/hook")
		.with_status(200)
		.expect(1)
		.create_async()
		.await;

	let store = SqliteStore::in_memory().await.unwrap();
	let recipient = Address::repeat_byte(0xbb);
	WatchedAddressRepository::new(&store)
		.register_watched_address(
			&format_address(&recipient),
			11155111,
			&format!("{}/hook", server.url()),
			"secret",
		)
		.await
		.unwrap();

	let [sepolia, _base]: [Network; 2] = networks().try_into().unwrap();
	let (client, headers) = ScriptedClient::new(sepolia.clone());
	let signer = PrivateKeySigner::random();
	client.with_block(
		ConfirmedBlockBuilder::new()
			.number(100)
			.transaction(
				signed_legacy_transaction(&signer, Some(11155111), recipient, U256::from(1u64), 0),
				receipt(true, vec![]),
			)
			.build(),
	);

	let mut factory = MockClientFactory::new();
	let connected = client.clone();
	factory.expect_connect().times(2).returning(move |network| {
		if network.slug == "ethereum-sepolia" {
			Ok(connected.clone() as Arc<dyn BlockChainClient>)
		} else {
			Err(BlockChainError::chain_mismatch(network.chain_id, 1))
		}
	});

	let orchestrator =
		WorkerOrchestrator::start_with_store(config(), networks(), Arc::new(factory), store.clone())
			.await
			.unwrap();
	assert_eq!(orchestrator.active_networks().await, vec![sepolia.slug.clone()]);

	for number in 100..=102 {
		headers.unbounded_send(header(number)).unwrap();
	}

	let deliveries = WebhookDeliveryRepository::new(&store);
	let mut delivered = 0;
	for _ in 0..200 {
		delivered = deliveries
			.count_by_status(DeliveryStatus::Delivered)
			.await
			.unwrap();
		if delivered == 1 {
			break;
		}
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
	assert_eq!(delivered, 1);
	mock.assert_async().await;

	orchestrator.shutdown().await.unwrap();
	assert!(client.is_closed());
}

#[tokio::test]
async fn test_no_connected_network_is_fatal() {
	let mut factory = MockClientFactory::new();
	factory
		.expect_connect()
		.times(2)
		.returning(|_| Err(BlockChainError::connection_error("connection refused")));

	let store = SqliteStore::in_memory().await.unwrap();
	let result =
		WorkerOrchestrator::start_with_store(config(), networks(), Arc::new(factory), store).await;
	assert!(matches!(result, Err(BootstrapError::NoNetworksConnected(2))));
}

#[tokio::test]
async fn test_empty_network_list_is_fatal() {
	let mut factory = MockClientFactory::new();
	factory.expect_connect().never();

	let result = WorkerOrchestrator::start(config(), vec![], Arc::new(factory)).await;
	assert!(matches!(result, Err(BootstrapError::NoNetworksConfigured)));
}

#[tokio::test]
async fn test_start_opens_and_migrates_database() {
	let (client, _headers) = ScriptedClient::new(NetworkBuilder::new().build());
	let mut factory = MockClientFactory::new();
	factory
		.expect_connect()
		.returning(move |_| Ok(client.clone() as Arc<dyn BlockChainClient>));

	let orchestrator = WorkerOrchestrator::start(
		config(),
		vec![NetworkBuilder::new().build()],
		Arc::new(factory),
	)
	.await
	.unwrap();
	let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_deliveries")
		.fetch_one(orchestrator.store().pool())
		.await
		.unwrap();
	assert_eq!(count, 0);
	orchestrator.shutdown().await.unwrap();
}
