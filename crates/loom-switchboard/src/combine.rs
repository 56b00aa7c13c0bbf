// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Latest-value-per-source bookkeeping for streaming flags.

use loom_switchboard_core::SharedSource;

struct Contribution<V> {
	source: SharedSource,
	latest: Option<V>,
}

/// The most recent value seen from each participating source, in priority
/// order.
pub(crate) struct Contributions<V> {
	entries: Vec<Contribution<V>>,
}

impl<V> Contributions<V> {
	pub fn new() -> Self {
		Self {
			entries: Vec::new(),
		}
	}

	pub fn contains(&self, source_id: &str) -> bool {
		self.entries.iter().any(|e| e.source.id() == source_id)
	}

	/// Replaces the member list with `members`, in their order.
	///
	/// Retained sources keep their latest value, new ones start absent.
	/// Returns the ids of sources that are no longer members.
	pub fn sync(&mut self, members: Vec<SharedSource>) -> Vec<String> {
		let mut previous = std::mem::take(&mut self.entries);

		for source in members {
			let latest = previous
				.iter()
				.position(|e| e.source.id() == source.id())
				.and_then(|pos| previous.swap_remove(pos).latest);
			self.entries.push(Contribution { source, latest });
		}

		previous
			.into_iter()
			.map(|e| e.source.id().to_string())
			.collect()
	}

	/// Stores the latest value of a member. Returns false for non-members.
	pub fn record(&mut self, source_id: &str, value: Option<V>) -> bool {
		match self.entries.iter_mut().find(|e| e.source.id() == source_id) {
			Some(entry) => {
				entry.latest = value;
				true
			}
			None => false,
		}
	}

	/// Highest-priority source with a value.
	pub fn winner(&self) -> Option<(&SharedSource, &V)> {
		self.entries
			.iter()
			.find_map(|e| e.latest.as_ref().map(|v| (&e.source, v)))
	}
}
