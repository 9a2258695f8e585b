//! Headers waiting for confirmation depth.
//!
//! Keyed by block number so a re-announced height (a reorg) replaces the
//! earlier header instead of producing a second entry.

use std::collections::BTreeMap;

use crate::models::BlockHeader;

/// Unconfirmed headers of one network
#[derive(Debug, Default)]
pub struct PendingHeaders {
	headers: BTreeMap<u64, BlockHeader>,
}

impl PendingHeaders {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a header, replacing any earlier header at the same height.
	///
	/// Returns the replaced header, if any.
	pub fn insert(&mut self, header: BlockHeader) -> Option<BlockHeader> {
		self.headers.insert(header.number, header)
	}

	/// Removes and returns every header with `number + confirmations <= head`,
	/// lowest number first.
	pub fn take_confirmed(&mut self, head: u64, confirmations: u64) -> Vec<BlockHeader> {
		let Some(threshold) = head.checked_sub(confirmations) else {
			return Vec::new();
		};
		let remaining = self.headers.split_off(&(threshold.saturating_add(1)));
		let confirmed = std::mem::replace(&mut self.headers, remaining);
		confirmed.into_values().collect()
	}

	/// Drops headers more than `window` blocks behind `head`.
	///
	/// Returns the evicted block numbers.
	pub fn evict_stale(&mut self, head: u64, window: u64) -> Vec<u64> {
		let Some(cutoff) = head.checked_sub(window) else {
			return Vec::new();
		};
		// number + window < head  <=>  number < head - window
		let remaining = self.headers.split_off(&cutoff);
		let evicted = std::mem::replace(&mut self.headers, remaining);
		evicted.into_keys().collect()
	}

	pub fn get(&self, number: u64) -> Option<&BlockHeader> {
		self.headers.get(&number)
	}

	pub fn len(&self) -> usize {
		self.headers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.headers.is_empty()
	}
}
