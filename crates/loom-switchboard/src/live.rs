// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared live subscriptions for streaming flags.
//!
//! Each streaming flag id gets one aggregation task that watches every
//! supporting source, keeps the latest value per source and publishes the
//! intercepted winner. Every subscriber has its own ordered queue of published
//! values, seeded with the last one so late subscribers replay it first.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use loom_switchboard_core::{
	decode_value, FlagValue, Source, SourceError, SourceStream, StartPolicy, StreamingFlagSpec,
	Watch, DEFAULT_SOURCE,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::StreamMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::combine::Contributions;
use crate::error::{FlagsError, Result};
use crate::logger::{log_resolution, log_source_failure};
use crate::registry::Registry;
use crate::resolver::{fold_sourced, Stage};

/// Type-erased handle the resolver keeps per live flag id.
pub(crate) trait LiveFlag: Send + Sync {
	fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;

	fn value_type(&self) -> &'static str;

	/// Stops the aggregation for good and returns its task, if running.
	fn halt(&self) -> Option<JoinHandle<()>>;
}

struct Running {
	handle: JoinHandle<()>,
	cancel: CancellationToken,
}

struct LiveState<V> {
	listeners: HashMap<u64, mpsc::UnboundedSender<Result<V>>>,
	next_listener: u64,
	latest: Option<Result<V>>,
	task: Option<Running>,
	idle_timer: Option<JoinHandle<()>>,
	idle_generation: u64,
}

impl<V> Default for LiveState<V> {
	fn default() -> Self {
		Self {
			listeners: HashMap::new(),
			next_listener: 0,
			latest: None,
			task: None,
			idle_timer: None,
			idle_generation: 0,
		}
	}
}

pub(crate) struct SharedFlag<V: FlagValue> {
	spec: StreamingFlagSpec<V>,
	registry: Arc<Registry>,
	runtime: Handle,
	shutdown: CancellationToken,
	log_resolutions: bool,
	state: Mutex<LiveState<V>>,
}

impl<V: FlagValue> SharedFlag<V> {
	pub fn new(
		spec: StreamingFlagSpec<V>,
		registry: Arc<Registry>,
		runtime: Handle,
		shutdown: CancellationToken,
		log_resolutions: bool,
	) -> Self {
		Self {
			spec,
			registry,
			runtime,
			shutdown,
			log_resolutions,
			state: Mutex::new(LiveState::default()),
		}
	}

	/// Starts the aggregation if it is not already running.
	pub fn activate(self: &Arc<Self>) {
		let mut state = self.state.lock();
		self.ensure_running(&mut state);
	}

	pub fn attach(self: &Arc<Self>) -> Result<FlagSubscription<V>> {
		let mut state = self.state.lock();
		if self.shutdown.is_cancelled() {
			return Err(FlagsError::ResolverClosed);
		}

		let (tx, updates) = mpsc::unbounded_channel();
		if let Some(latest) = &state.latest {
			let _ = tx.send(latest.clone());
		}
		let listener = state.next_listener;
		state.next_listener += 1;
		state.listeners.insert(listener, tx);

		if let Some(timer) = state.idle_timer.take() {
			timer.abort();
		}
		self.ensure_running(&mut state);
		debug!(flag_id = %self.spec.id(), subscribers = state.listeners.len(), "subscriber attached");
		drop(state);

		Ok(FlagSubscription {
			flag: Arc::clone(self),
			listener,
			updates,
			shutdown: self.shutdown.clone(),
		})
	}

	fn detach(self: &Arc<Self>, listener: u64) {
		let mut state = self.state.lock();
		state.listeners.remove(&listener);
		debug!(flag_id = %self.spec.id(), subscribers = state.listeners.len(), "subscriber detached");
		if !state.listeners.is_empty() {
			return;
		}

		let StartPolicy::WhileSubscribed { stop_timeout } = self.spec.start_policy() else {
			return;
		};

		if stop_timeout.is_zero() {
			self.stop(&mut state);
			return;
		}

		state.idle_generation += 1;
		let generation = state.idle_generation;
		let flag = Arc::clone(self);
		state.idle_timer = Some(self.runtime.spawn(async move {
			tokio::time::sleep(stop_timeout).await;
			let mut state = flag.state.lock();
			if state.listeners.is_empty() && state.idle_generation == generation {
				state.idle_timer = None;
				flag.stop(&mut state);
			}
		}));
	}

	fn ensure_running(self: &Arc<Self>, state: &mut LiveState<V>) {
		if self.shutdown.is_cancelled() {
			return;
		}
		if let Some(running) = &state.task {
			if !running.handle.is_finished() {
				return;
			}
		}

		debug!(flag_id = %self.spec.id(), policy = ?self.spec.start_policy(), "starting aggregation");
		let cancel = self.shutdown.child_token();
		let handle = self
			.runtime
			.spawn(Arc::clone(self).aggregate(cancel.clone()));
		state.task = Some(Running { handle, cancel });
	}

	fn stop(&self, state: &mut LiveState<V>) {
		if let Some(running) = state.task.take() {
			debug!(flag_id = %self.spec.id(), "stopping idle aggregation");
			running.cancel.cancel();
		}
	}

	async fn aggregate(self: Arc<Self>, cancel: CancellationToken) {
		let mut revisions = self.registry.revisions();
		revisions.borrow_and_update();

		let mut contributions = Contributions::new();
		let mut streams: StreamMap<String, SourceStream> = StreamMap::new();
		let mut declined: HashSet<String> = HashSet::new();

		self.resync(&mut contributions, &mut streams, &mut declined);
		self.publish(&contributions, &cancel).await;

		loop {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => break,
				changed = revisions.changed() => {
					if changed.is_err() {
						break;
					}
					revisions.borrow_and_update();
					self.resync(&mut contributions, &mut streams, &mut declined);
					self.publish(&contributions, &cancel).await;
				}
				Some((source_id, item)) = streams.next(), if !streams.is_empty() => {
					let value = self.decode_item(&source_id, item);
					if contributions.record(&source_id, value) {
						self.publish(&contributions, &cancel).await;
					}
				}
			}
		}

		debug!(flag_id = %self.spec.id(), "aggregation stopped");
	}

	/// Aligns the member list with the registry. Sources that declined the
	/// flag are never asked again by this aggregation.
	fn resync(
		&self,
		contributions: &mut Contributions<V>,
		streams: &mut StreamMap<String, SourceStream>,
		declined: &mut HashSet<String>,
	) {
		let flag = self.spec.info();
		let mut members = Vec::new();

		for source in self.registry.sources() {
			let source_id = source.id().to_string();
			if declined.contains(&source_id) {
				continue;
			}
			if contributions.contains(&source_id) {
				members.push(source);
				continue;
			}

			match source.watch(flag) {
				Ok(Watch::Stream(stream)) => {
					streams.insert(source_id, stream);
					members.push(source);
				}
				Ok(Watch::Unsupported) => {
					debug!(flag_id = %flag.id, source_id = %source_id, "source does not support flag");
					declined.insert(source_id);
				}
				Err(e) => {
					log_source_failure(self.registry.logger().as_ref(), &flag.id, &source_id, &e);
					members.push(source);
				}
			}
		}

		for removed in contributions.sync(members) {
			streams.remove(&removed);
		}
	}

	fn decode_item(
		&self,
		source_id: &str,
		item: std::result::Result<Option<serde_json::Value>, SourceError>,
	) -> Option<V> {
		let flag_id = self.spec.id();
		let err = match item {
			Ok(None) => return None,
			Ok(Some(raw)) => match decode_value::<V>(raw) {
				Ok(value) => return Some(value),
				Err(e) => SourceError::Decode(e.to_string()),
			},
			Err(e) => e,
		};
		log_source_failure(self.registry.logger().as_ref(), flag_id, source_id, &err);
		None
	}

	/// Folds the current winner and hands it to every subscriber if it differs
	/// from the last published outcome. A stopped aggregation publishes nothing,
	/// even when its fold completes after a replacement has started.
	async fn publish(&self, contributions: &Contributions<V>, cancel: &CancellationToken) {
		let flag = self.spec.info();
		let interceptors = self.registry.interceptors();

		let (source, value): (&dyn Source, V) = match contributions.winner() {
			Some((source, value)) => (source.as_ref(), value.clone()),
			None => (&DEFAULT_SOURCE, self.spec.default_value().clone()),
		};
		let source_id = source.id().to_string();
		let outcome = fold_sourced(Stage::Streaming, flag, source, value, &interceptors).await;

		{
			let mut state = self.state.lock();
			if cancel.is_cancelled() || same_outcome(state.latest.as_ref(), &outcome) {
				return;
			}
			state.latest = Some(outcome.clone());
			state
				.listeners
				.retain(|_, listener| listener.send(outcome.clone()).is_ok());
		}

		match &outcome {
			Ok(value) => {
				let logger = self.registry.logger().filter(|_| self.log_resolutions);
				log_resolution(logger.as_ref(), &flag.id, &source_id, value);
			}
			Err(e) => error!(flag_id = %flag.id, error = %e, "streaming resolution failed"),
		}
	}
}

impl<V: FlagValue> LiveFlag for SharedFlag<V> {
	fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
		self
	}

	fn value_type(&self) -> &'static str {
		self.spec.info().value_type
	}

	fn halt(&self) -> Option<JoinHandle<()>> {
		let mut state = self.state.lock();
		if let Some(timer) = state.idle_timer.take() {
			timer.abort();
		}
		state.listeners.clear();
		state.task.take().map(|running| {
			running.cancel.cancel();
			running.handle
		})
	}
}

fn same_outcome<V: PartialEq>(current: Option<&Result<V>>, next: &Result<V>) -> bool {
	match (current, next) {
		(Some(Ok(a)), Ok(b)) => a == b,
		(Some(Err(a)), Err(b)) => a.to_string() == b.to_string(),
		_ => false,
	}
}

/// A live view of a streaming flag.
///
/// Yields the value current at subscription time, then every distinct value
/// the aggregation publishes, in order. Values are queued per subscription,
/// so a slow reader sees each of them. Dropping the subscription detaches it.
pub struct FlagSubscription<V: FlagValue> {
	flag: Arc<SharedFlag<V>>,
	listener: u64,
	updates: mpsc::UnboundedReceiver<Result<V>>,
	shutdown: CancellationToken,
}

impl<V: FlagValue> FlagSubscription<V> {
	/// Waits for the next value.
	///
	/// Returns `None` once the resolver shuts down. An `Err` item means the
	/// interceptor chain failed for the current source values; the
	/// subscription stays usable and yields again once the values change.
	pub async fn next(&mut self) -> Option<Result<V>> {
		tokio::select! {
			biased;
			_ = self.shutdown.cancelled() => None,
			item = self.updates.recv() => item,
		}
	}

	/// The most recently published value, if it resolved successfully.
	pub fn current(&self) -> Option<V> {
		match self.flag.state.lock().latest.as_ref() {
			Some(Ok(value)) => Some(value.clone()),
			_ => None,
		}
	}

	/// The flag this subscription observes.
	pub fn spec(&self) -> &StreamingFlagSpec<V> {
		&self.flag.spec
	}

	/// Converts the subscription into a stream of values.
	pub fn into_stream(self) -> BoxStream<'static, Result<V>> {
		stream::unfold(self, |mut subscription| async move {
			subscription.next().await.map(|item| (item, subscription))
		})
		.boxed()
	}
}

impl<V: FlagValue> Drop for FlagSubscription<V> {
	fn drop(&mut self) {
		self.flag.detach(self.listener);
	}
}

impl<V: FlagValue> std::fmt::Debug for FlagSubscription<V> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlagSubscription")
			.field("flag_id", &self.flag.spec.id())
			.field("current", &self.current())
			.finish()
	}
}
