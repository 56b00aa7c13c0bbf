// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Volatile in-memory source.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use loom_switchboard_core::{FlagInfo, MutableSource, Source, SourceError, UpdateFn, Watch};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Default id of a [`MemorySource`].
pub const MEMORY_SOURCE_ID: &str = "memory_source";

/// Stored value of one flag. `writer` orders updates to that flag only.
struct Entry {
	value: watch::Sender<Option<Value>>,
	writer: tokio::sync::Mutex<()>,
}

impl Entry {
	fn new() -> Arc<Self> {
		Arc::new(Self {
			value: watch::channel(None).0,
			writer: tokio::sync::Mutex::new(()),
		})
	}

	fn replace(&self, value: Option<Value>) {
		self.value.send_if_modified(|current| {
			if *current == value {
				return false;
			}
			*current = value;
			true
		});
	}
}

/// A [`MutableSource`] keeping values in process memory.
///
/// Values are lost when the source is dropped. Every flag gets its own
/// channel, so watchers only wake up when their flag changes. Writing the
/// value a flag already has does not notify watchers.
pub struct MemorySource {
	id: String,
	description: Option<String>,
	entries: Mutex<HashMap<String, Arc<Entry>>>,
}

impl MemorySource {
	pub fn new() -> Self {
		Self::with_id(MEMORY_SOURCE_ID)
	}

	pub fn with_id(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			description: Some("Stores flag values in volatile memory".to_string()),
			entries: Mutex::new(HashMap::new()),
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	/// Current value stored for `flag_id`.
	pub fn peek(&self, flag_id: &str) -> Option<Value> {
		self.entries
			.lock()
			.get(flag_id)
			.and_then(|entry| entry.value.borrow().clone())
	}

	fn entry(&self, flag_id: &str) -> Arc<Entry> {
		let mut entries = self.entries.lock();
		Arc::clone(entries.entry(flag_id.to_string()).or_insert_with(Entry::new))
	}
}

impl Default for MemorySource {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for MemorySource {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemorySource")
			.field("id", &self.id)
			.field("flags", &self.entries.lock().len())
			.finish()
	}
}

#[async_trait]
impl Source for MemorySource {
	fn id(&self) -> &str {
		&self.id
	}

	fn description(&self) -> Option<&str> {
		self.description.as_deref()
	}

	async fn fetch(&self, flag: &FlagInfo) -> Result<Option<Value>, SourceError> {
		Ok(self.peek(&flag.id))
	}

	fn watch(&self, flag: &FlagInfo) -> Result<Watch, SourceError> {
		let rx = self.entry(&flag.id).value.subscribe();
		Ok(Watch::Stream(WatchStream::new(rx).map(Ok).boxed()))
	}
}

#[async_trait]
impl MutableSource for MemorySource {
	async fn update(&self, flag: &FlagInfo, transform: UpdateFn) -> Result<(), SourceError> {
		let entry = self.entry(&flag.id);
		let _writer = entry.writer.lock().await;

		let current = entry.value.borrow().clone();
		let next = transform(current)?;
		entry.replace(Some(next));
		Ok(())
	}

	async fn remove(&self, flag: &FlagInfo) -> Result<(), SourceError> {
		let entry = self.entries.lock().get(&flag.id).cloned();
		if let Some(entry) = entry {
			let _writer = entry.writer.lock().await;
			entry.replace(None);
		}
		Ok(())
	}

	async fn clear(&self) -> Result<(), SourceError> {
		let entries: Vec<Arc<Entry>> = self.entries.lock().values().cloned().collect();
		for entry in entries {
			let _writer = entry.writer.lock().await;
			entry.replace(None);
		}
		Ok(())
	}
}
