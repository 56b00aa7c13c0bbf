// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared fixtures for resolver integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use loom_switchboard::{
	FlagInfo, FlagSubscription, FlagValue, Interceptor, InterceptorError, Logger, Result, Source,
	SourceError, Watch,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::UnboundedReceiverStream;

pub const STEP: Duration = Duration::from_secs(2);
pub const QUIET: Duration = Duration::from_millis(100);

pub fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "loom_switchboard=debug".into()),
		)
		.with_test_writer()
		.try_init();
}

/// How a [`CountingSource`] answers.
#[derive(Debug, Clone)]
pub enum Behavior {
	/// Answers with the given value, `None` meaning absent.
	Value(Option<Value>),
	/// Fails every call.
	Failing,
	/// Answers fetches with absent and declines to watch.
	Unsupported,
}

/// Source with a fixed answer that counts how often it is asked.
pub struct CountingSource {
	id: String,
	behavior: Behavior,
	fetches: AtomicUsize,
	watches: AtomicUsize,
}

impl CountingSource {
	pub fn new(id: &str, behavior: Behavior) -> Arc<Self> {
		Arc::new(Self {
			id: id.to_string(),
			behavior,
			fetches: AtomicUsize::new(0),
			watches: AtomicUsize::new(0),
		})
	}

	pub fn with_value(id: &str, value: impl Into<Value>) -> Arc<Self> {
		Self::new(id, Behavior::Value(Some(value.into())))
	}

	pub fn absent(id: &str) -> Arc<Self> {
		Self::new(id, Behavior::Value(None))
	}

	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}

	pub fn watches(&self) -> usize {
		self.watches.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Source for CountingSource {
	fn id(&self) -> &str {
		&self.id
	}

	async fn fetch(&self, _flag: &FlagInfo) -> std::result::Result<Option<Value>, SourceError> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		match &self.behavior {
			Behavior::Value(value) => Ok(value.clone()),
			Behavior::Failing => Err(SourceError::unavailable("connection refused")),
			Behavior::Unsupported => Ok(None),
		}
	}

	fn watch(&self, _flag: &FlagInfo) -> std::result::Result<Watch, SourceError> {
		self.watches.fetch_add(1, Ordering::SeqCst);
		match &self.behavior {
			Behavior::Value(value) => {
				let first = stream::once(futures::future::ready(Ok(value.clone())));
				Ok(Watch::Stream(first.chain(stream::pending()).boxed()))
			}
			Behavior::Failing => Err(SourceError::unavailable("connection refused")),
			Behavior::Unsupported => Ok(Watch::Unsupported),
		}
	}
}

/// Source whose fetch of one flag parks until released. Other flags are
/// absent and watching is declined.
pub struct GatedSource {
	id: String,
	flag_id: String,
	value: Value,
	entered: Notify,
	release: Notify,
}

impl GatedSource {
	pub fn new(id: &str, flag_id: &str, value: impl Into<Value>) -> Arc<Self> {
		Arc::new(Self {
			id: id.to_string(),
			flag_id: flag_id.to_string(),
			value: value.into(),
			entered: Notify::new(),
			release: Notify::new(),
		})
	}

	/// Resolves once a fetch of the gated flag is parked.
	pub async fn entered(&self) {
		self.entered.notified().await;
	}

	pub fn release(&self) {
		self.release.notify_one();
	}
}

#[async_trait]
impl Source for GatedSource {
	fn id(&self) -> &str {
		&self.id
	}

	async fn fetch(&self, flag: &FlagInfo) -> std::result::Result<Option<Value>, SourceError> {
		if flag.id != self.flag_id {
			return Ok(None);
		}
		self.entered.notify_one();
		self.release.notified().await;
		Ok(Some(self.value.clone()))
	}

	fn watch(&self, _flag: &FlagInfo) -> std::result::Result<Watch, SourceError> {
		Ok(Watch::Unsupported)
	}
}

/// Source whose single watch stream is fed by the test.
pub struct FeedSource {
	id: String,
	tx: mpsc::UnboundedSender<Option<Value>>,
	rx: Mutex<Option<mpsc::UnboundedReceiver<Option<Value>>>>,
}

impl FeedSource {
	pub fn new(id: &str) -> Arc<Self> {
		let (tx, rx) = mpsc::unbounded_channel();
		Arc::new(Self {
			id: id.to_string(),
			tx,
			rx: Mutex::new(Some(rx)),
		})
	}

	pub fn push(&self, value: impl Into<Value>) {
		let _ = self.tx.send(Some(value.into()));
	}

	pub fn push_absent(&self) {
		let _ = self.tx.send(None);
	}
}

#[async_trait]
impl Source for FeedSource {
	fn id(&self) -> &str {
		&self.id
	}

	async fn fetch(&self, _flag: &FlagInfo) -> std::result::Result<Option<Value>, SourceError> {
		Ok(None)
	}

	fn watch(&self, _flag: &FlagInfo) -> std::result::Result<Watch, SourceError> {
		match self.rx.lock().take() {
			Some(rx) => Ok(Watch::Stream(
				UnboundedReceiverStream::new(rx).map(Ok).boxed(),
			)),
			None => Err(SourceError::unavailable("feed already watched")),
		}
	}
}

/// Source whose watch stream replays a fixed script and then ends.
pub struct ScriptedSource {
	id: String,
	script: Vec<Option<Value>>,
}

impl ScriptedSource {
	pub fn new(id: &str, script: Vec<Option<Value>>) -> Arc<Self> {
		Arc::new(Self {
			id: id.to_string(),
			script,
		})
	}
}

#[async_trait]
impl Source for ScriptedSource {
	fn id(&self) -> &str {
		&self.id
	}

	async fn fetch(&self, _flag: &FlagInfo) -> std::result::Result<Option<Value>, SourceError> {
		Ok(self.script.last().cloned().flatten())
	}

	fn watch(&self, _flag: &FlagInfo) -> std::result::Result<Watch, SourceError> {
		let items: Vec<_> = self.script.iter().cloned().map(Ok).collect();
		Ok(Watch::Stream(stream::iter(items).boxed()))
	}
}

/// Appends `-<id>` to string values on every hook.
pub struct Append(pub &'static str);

impl Append {
	fn apply(&self, value: Value) -> std::result::Result<Value, InterceptorError> {
		match value {
			Value::String(s) => Ok(Value::from(format!("{s}-{}", self.0))),
			other => Err(InterceptorError::InvalidValueType {
				expected: "string".to_string(),
				actual: other.to_string(),
			}),
		}
	}
}

#[async_trait]
impl Interceptor for Append {
	fn id(&self) -> &str {
		self.0
	}

	fn intercept_immutable(
		&self,
		_flag: &FlagInfo,
		value: Value,
	) -> std::result::Result<Value, InterceptorError> {
		self.apply(value)
	}

	async fn intercept_mutable(
		&self,
		_flag: &FlagInfo,
		_source: &dyn Source,
		value: Value,
	) -> std::result::Result<Value, InterceptorError> {
		self.apply(value)
	}

	async fn intercept_streaming(
		&self,
		_flag: &FlagInfo,
		_source: &dyn Source,
		value: Value,
	) -> std::result::Result<Value, InterceptorError> {
		self.apply(value)
	}
}

/// Fails every mutable and streaming value.
pub struct Broken;

#[async_trait]
impl Interceptor for Broken {
	fn id(&self) -> &str {
		"broken"
	}

	async fn intercept_mutable(
		&self,
		_flag: &FlagInfo,
		_source: &dyn Source,
		_value: Value,
	) -> std::result::Result<Value, InterceptorError> {
		Err(InterceptorError::Failed("override store offline".to_string()))
	}

	async fn intercept_streaming(
		&self,
		_flag: &FlagInfo,
		_source: &dyn Source,
		_value: Value,
	) -> std::result::Result<Value, InterceptorError> {
		Err(InterceptorError::Failed("override store offline".to_string()))
	}
}

/// Logger keeping every message.
#[derive(Default)]
pub struct RecordingLogger {
	lines: Mutex<Vec<String>>,
}

impl RecordingLogger {
	pub fn lines(&self) -> Vec<String> {
		self.lines.lock().clone()
	}

	pub fn contains(&self, needle: &str) -> bool {
		self.lines.lock().iter().any(|line| line.contains(needle))
	}
}

impl Logger for RecordingLogger {
	fn info(&self, message: &str) {
		self.lines.lock().push(message.to_string());
	}
}

/// Waits for the next emission, failing the test if none arrives in time.
pub async fn expect_next<V: FlagValue>(subscription: &mut FlagSubscription<V>) -> Result<V> {
	match tokio::time::timeout(STEP, subscription.next()).await {
		Ok(Some(item)) => item,
		Ok(None) => panic!("subscription ended unexpectedly"),
		Err(_) => panic!("no emission within {STEP:?}"),
	}
}

/// Asserts that nothing is emitted for a short while.
pub async fn expect_silence<V: FlagValue>(subscription: &mut FlagSubscription<V>) {
	if let Ok(item) = tokio::time::timeout(QUIET, subscription.next()).await {
		panic!("unexpected emission: {item:?}");
	}
}

/// Collects emissions until the subscription stays quiet.
pub async fn drain<V: FlagValue>(subscription: &mut FlagSubscription<V>) -> Vec<Result<V>> {
	let mut items = Vec::new();
	while let Ok(Some(item)) = tokio::time::timeout(QUIET, subscription.next()).await {
		items.push(item);
	}
	items
}

/// Polls `condition` until it holds or the step timeout elapses.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
	let deadline = tokio::time::Instant::now() + STEP;
	while tokio::time::Instant::now() < deadline {
		if condition() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(10)).await;
	}
	condition()
}
