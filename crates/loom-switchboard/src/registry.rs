// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ordered source and interceptor sets.
//!
//! Membership is keyed by id and ordered by insertion. Every membership
//! change bumps a revision number that live subscriptions watch to re-sync.

use loom_switchboard_core::{
	SharedInterceptor, SharedLogger, SharedSource, DEFAULT_SOURCE_ID, IMMUTABLE_SOURCE_ID,
};
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Default)]
struct RegistryState {
	sources: Vec<SharedSource>,
	interceptors: Vec<SharedInterceptor>,
	logger: Option<SharedLogger>,
}

/// Point-in-time copy of the registry used by one resolution.
#[derive(Clone, Default)]
pub(crate) struct Snapshot {
	pub sources: Vec<SharedSource>,
	pub interceptors: Vec<SharedInterceptor>,
	pub logger: Option<SharedLogger>,
}

pub(crate) struct Registry {
	state: RwLock<RegistryState>,
	revision: watch::Sender<u64>,
}

impl Registry {
	pub fn new() -> Self {
		let (revision, _) = watch::channel(0);
		Self {
			state: RwLock::new(RegistryState::default()),
			revision,
		}
	}

	pub fn add_source(&self, source: SharedSource) -> bool {
		if source.id() == DEFAULT_SOURCE_ID || source.id() == IMMUTABLE_SOURCE_ID {
			warn!(source_id = %source.id(), "refusing to register source with reserved id");
			return false;
		}

		let mut state = self.state.write();
		if state.sources.iter().any(|s| s.id() == source.id()) {
			return false;
		}
		debug!(source_id = %source.id(), priority = state.sources.len(), "source added");
		state.sources.push(source);
		drop(state);
		self.bump();
		true
	}

	pub fn remove_source(&self, id: &str) -> bool {
		let mut state = self.state.write();
		let before = state.sources.len();
		state.sources.retain(|s| s.id() != id);
		let changed = state.sources.len() != before;
		drop(state);
		if changed {
			debug!(source_id = %id, "source removed");
			self.bump();
		}
		changed
	}

	pub fn add_interceptor(&self, interceptor: SharedInterceptor) -> bool {
		let mut state = self.state.write();
		if state.interceptors.iter().any(|i| i.id() == interceptor.id()) {
			return false;
		}
		debug!(interceptor_id = %interceptor.id(), "interceptor added");
		state.interceptors.push(interceptor);
		drop(state);
		self.bump();
		true
	}

	pub fn remove_interceptor(&self, id: &str) -> bool {
		let mut state = self.state.write();
		let before = state.interceptors.len();
		state.interceptors.retain(|i| i.id() != id);
		let changed = state.interceptors.len() != before;
		drop(state);
		if changed {
			debug!(interceptor_id = %id, "interceptor removed");
			self.bump();
		}
		changed
	}

	pub fn sources(&self) -> Vec<SharedSource> {
		self.state.read().sources.clone()
	}

	pub fn interceptors(&self) -> Vec<SharedInterceptor> {
		self.state.read().interceptors.clone()
	}

	pub fn logger(&self) -> Option<SharedLogger> {
		self.state.read().logger.clone()
	}

	pub fn set_logger(&self, logger: Option<SharedLogger>) {
		self.state.write().logger = logger;
	}

	pub fn snapshot(&self) -> Snapshot {
		let state = self.state.read();
		Snapshot {
			sources: state.sources.clone(),
			interceptors: state.interceptors.clone(),
			logger: state.logger.clone(),
		}
	}

	/// Receiver notified on every membership change.
	pub fn revisions(&self) -> watch::Receiver<u64> {
		self.revision.subscribe()
	}

	fn bump(&self) {
		self.revision.send_modify(|rev| *rev += 1);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use loom_switchboard_core::{
		FlagInfo, Interceptor, Source, SourceError, Watch, DEFAULT_SOURCE,
	};
	use proptest::prelude::*;
	use serde_json::Value;
	use std::sync::Arc;

	struct NamedSource(String);

	#[async_trait]
	impl Source for NamedSource {
		fn id(&self) -> &str {
			&self.0
		}

		async fn fetch(&self, _flag: &FlagInfo) -> Result<Option<Value>, SourceError> {
			Ok(None)
		}

		fn watch(&self, _flag: &FlagInfo) -> Result<Watch, SourceError> {
			Ok(Watch::Unsupported)
		}
	}

	struct NamedInterceptor(String);

	impl Interceptor for NamedInterceptor {
		fn id(&self) -> &str {
			&self.0
		}
	}

	fn source(id: &str) -> SharedSource {
		Arc::new(NamedSource(id.to_string()))
	}

	fn ids(sources: &[SharedSource]) -> Vec<String> {
		sources.iter().map(|s| s.id().to_string()).collect()
	}

	#[test]
	fn add_source_twice_is_idempotent() {
		let registry = Registry::new();
		assert!(registry.add_source(source("remote")));
		assert!(!registry.add_source(source("remote")));
		assert_eq!(registry.sources().len(), 1);
	}

	#[test]
	fn reserved_id_is_rejected() {
		let registry = Registry::new();
		assert!(!registry.add_source(Arc::new(DEFAULT_SOURCE)));
		assert!(!registry.add_source(source(IMMUTABLE_SOURCE_ID)));
		assert!(registry.sources().is_empty());
	}

	#[test]
	fn removal_keeps_remaining_order() {
		let registry = Registry::new();
		for id in ["a", "b", "c"] {
			registry.add_source(source(id));
		}
		assert!(registry.remove_source("b"));
		assert!(!registry.remove_source("b"));
		assert_eq!(ids(&registry.sources()), vec!["a", "c"]);

		registry.add_source(source("b"));
		assert_eq!(ids(&registry.sources()), vec!["a", "c", "b"]);
	}

	#[test]
	fn interceptors_follow_set_semantics() {
		let registry = Registry::new();
		assert!(registry.add_interceptor(Arc::new(NamedInterceptor("x".to_string()))));
		assert!(!registry.add_interceptor(Arc::new(NamedInterceptor("x".to_string()))));
		assert!(registry.remove_interceptor("x"));
		assert!(registry.interceptors().is_empty());
	}

	#[test]
	fn only_membership_changes_bump_revision() {
		let registry = Registry::new();
		let revisions = registry.revisions();

		registry.add_source(source("a"));
		registry.add_source(source("a"));
		registry.remove_source("missing");
		registry.set_logger(None);
		assert_eq!(*revisions.borrow(), 1);

		registry.add_interceptor(Arc::new(NamedInterceptor("x".to_string())));
		registry.remove_source("a");
		assert_eq!(*revisions.borrow(), 3);
	}

	#[test]
	fn snapshot_is_detached_from_later_changes() {
		let registry = Registry::new();
		registry.add_source(source("a"));
		let snapshot = registry.snapshot();
		registry.add_source(source("b"));
		assert_eq!(ids(&snapshot.sources), vec!["a"]);
	}

	proptest! {
		#[test]
		fn membership_matches_first_occurrence_order(ops in prop::collection::vec((any::<bool>(), 0u8..5), 0..40)) {
			let registry = Registry::new();
			let mut model: Vec<String> = Vec::new();

			for (add, n) in ops {
				let id = format!("s{n}");
				if add {
					let expected = !model.contains(&id);
					prop_assert_eq!(registry.add_source(source(&id)), expected);
					if expected {
						model.push(id);
					}
				} else {
					let expected = model.contains(&id);
					prop_assert_eq!(registry.remove_source(&id), expected);
					model.retain(|m| m != &id);
				}
			}

			prop_assert_eq!(ids(&registry.sources()), model);
		}
	}
}
