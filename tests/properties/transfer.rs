use crate::properties::strategies::{arbitrary_log_strategy, transfer_log_strategy};

use alloy::primitives::U256;
use evm_tx_watcher::services::{
	delivery::TokenTransferPayload,
	processor::{decode_transfer, extract_token_transfers, format_address, TRANSFER_EVENT_SIGNATURE},
};
use proptest::{prelude::*, test_runner::Config};
use uuid::Uuid;

proptest! {
	#![proptest_config(Config {
		failure_persistence: None,
		..Config::default()
	})]

	#[test]
	fn test_decodes_every_well_formed_transfer(
		(log, from, to, value) in transfer_log_strategy(),
	) {
		prop_assert_eq!(decode_transfer(&log), Some((from, to, value)));
	}

	// Only logs with exactly three topics, the Transfer signature first and a
	// 32-byte data field are transfers.
	#[test]
	fn test_decode_accepts_only_transfer_shape(log in arbitrary_log_strategy()) {
		let is_transfer = log.topics.len() == 3
			&& log.topics[0] == TRANSFER_EVENT_SIGNATURE
			&& log.data.len() == 32;
		prop_assert_eq!(decode_transfer(&log).is_some(), is_transfer);
	}

	#[test]
	fn test_extraction_keeps_log_order_and_parties(
		logs in prop::collection::vec(arbitrary_log_strategy(), 0..10),
		transfers in prop::collection::vec(transfer_log_strategy(), 0..5),
	) {
		let mut all = logs;
		all.extend(transfers.into_iter().map(|(log, ..)| log));
		let transaction_id = Uuid::new_v4();

		let extracted = extract_token_transfers(&all, transaction_id);
		let expected: Vec<_> = all.iter().filter(|log| decode_transfer(log).is_some()).collect();
		prop_assert_eq!(extracted.len(), expected.len());

		for (transfer, log) in extracted.iter().zip(expected) {
			let (from, to, value) = decode_transfer(log).unwrap();
			prop_assert_eq!(transfer.transaction_id, transaction_id);
			prop_assert_eq!(transfer.log_index, log.log_index);
			prop_assert_eq!(&transfer.token_address, &format_address(&log.address));
			prop_assert_eq!(&transfer.from_address, &format_address(&from));
			prop_assert_eq!(&transfer.to_address, &format_address(&to));
			prop_assert_eq!(transfer.value, value);
		}
	}

	// Token amounts leave the process as decimal strings and must parse back
	// exactly, up to 2^256 - 1.
	#[test]
	fn test_transfer_value_survives_payload_encoding(
		(log, ..) in transfer_log_strategy(),
	) {
		let transfer = extract_token_transfers(&[log], Uuid::new_v4()).remove(0);
		let payload = TokenTransferPayload::from(&transfer);
		let json = serde_json::to_value(&payload).unwrap();
		let decoded = U256::from_str_radix(json["value"].as_str().unwrap(), 10).unwrap();
		prop_assert_eq!(decoded, transfer.value);
	}
}
