// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The flag resolver.
//!
//! [`FlagResolver`] owns the registered sources and interceptors and answers
//! point reads as well as live subscriptions. Every resolution works on a
//! snapshot of the registry taken when it starts.

use std::collections::HashMap;
use std::sync::Arc;

use loom_switchboard_core::{
	decode_value, encode_value, FlagInfo, FlagValue, ImmutableFlagSpec, MutableFlagSpec,
	SharedInterceptor, SharedLogger, SharedSource, Source, SourceError, StartPolicy,
	StreamingFlagSpec, DEFAULT_SOURCE, IMMUTABLE_SOURCE_ID,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::ResolverConfig;
use crate::error::{FlagsError, Result};
use crate::live::{FlagSubscription, LiveFlag, SharedFlag};
use crate::logger::{log_resolution, log_source_failure};
use crate::registry::{Registry, Snapshot};

/// A resolved value together with the source that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<V> {
	/// Id of the winning source. [`DEFAULT_SOURCE_ID`] marks the flag default
	/// and [`IMMUTABLE_SOURCE_ID`] the fixed value of an immutable flag.
	///
	/// [`DEFAULT_SOURCE_ID`]: loom_switchboard_core::DEFAULT_SOURCE_ID
	pub source_id: String,
	/// Value after all interceptors ran.
	pub value: V,
}

/// Which interceptor hook a fold runs.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Stage {
	Mutable,
	Streaming,
}

/// Folds the interceptors over a sourced value in registration order.
pub(crate) async fn fold_sourced<V: FlagValue>(
	stage: Stage,
	flag: &FlagInfo,
	source: &dyn Source,
	value: V,
	interceptors: &[SharedInterceptor],
) -> Result<V> {
	if interceptors.is_empty() {
		return Ok(value);
	}

	let mut raw = encode_value(&value).map_err(|e| FlagsError::codec(&flag.id, e))?;
	for interceptor in interceptors {
		let result = match stage {
			Stage::Mutable => interceptor.intercept_mutable(flag, source, raw).await,
			Stage::Streaming => interceptor.intercept_streaming(flag, source, raw).await,
		};
		raw = result.map_err(|e| FlagsError::InterceptorFailed {
			interceptor_id: interceptor.id().to_string(),
			flag_id: flag.id.clone(),
			source: e,
		})?;
	}
	decode_value(raw).map_err(|e| FlagsError::codec(&flag.id, e))
}

fn fold_immutable<V: FlagValue>(
	flag: &FlagInfo,
	value: V,
	interceptors: &[SharedInterceptor],
) -> Result<V> {
	if interceptors.is_empty() {
		return Ok(value);
	}

	let mut raw = encode_value(&value).map_err(|e| FlagsError::codec(&flag.id, e))?;
	for interceptor in interceptors {
		raw = interceptor
			.intercept_immutable(flag, raw)
			.map_err(|e| FlagsError::InterceptorFailed {
				interceptor_id: interceptor.id().to_string(),
				flag_id: flag.id.clone(),
				source: e,
			})?;
	}
	decode_value(raw).map_err(|e| FlagsError::codec(&flag.id, e))
}

struct ResolverInner {
	config: ResolverConfig,
	registry: Arc<Registry>,
	live: Mutex<HashMap<String, Arc<dyn LiveFlag>>>,
	runtime: Handle,
	shutdown: CancellationToken,
}

impl Drop for ResolverInner {
	fn drop(&mut self) {
		self.shutdown.cancel();
	}
}

/// Resolves flag values from prioritized sources and interceptors.
///
/// Cloning is cheap; clones share registries and live subscriptions.
#[derive(Clone)]
pub struct FlagResolver {
	inner: Arc<ResolverInner>,
}

impl FlagResolver {
	/// Creates a new builder.
	pub fn builder() -> FlagResolverBuilder {
		FlagResolverBuilder::default()
	}

	pub fn config(&self) -> &ResolverConfig {
		&self.inner.config
	}

	/// Returns true once [`shutdown`](Self::shutdown) has been called.
	pub fn is_closed(&self) -> bool {
		self.inner.shutdown.is_cancelled()
	}

	fn ensure_open(&self) -> Result<()> {
		if self.is_closed() {
			return Err(FlagsError::ResolverClosed);
		}
		Ok(())
	}

	fn resolution_logger(&self, snapshot: &Snapshot) -> Option<SharedLogger> {
		snapshot
			.logger
			.clone()
			.filter(|_| self.inner.config.log_resolutions)
	}

	/// Resolves an immutable flag. Sources are never consulted.
	pub fn get_immutable<V: FlagValue>(&self, spec: &ImmutableFlagSpec<V>) -> Result<V> {
		self.evaluate_immutable(spec).map(|resolved| resolved.value)
	}

	pub fn evaluate_immutable<V: FlagValue>(
		&self,
		spec: &ImmutableFlagSpec<V>,
	) -> Result<Resolved<V>> {
		self.ensure_open()?;
		let snapshot = self.inner.registry.snapshot();
		let flag = spec.info();

		let value = fold_immutable(flag, spec.value().clone(), &snapshot.interceptors)
			.map_err(|e| {
				error!(flag_id = %flag.id, error = %e, "immutable resolution failed");
				e
			})?;

		log_resolution(
			self.resolution_logger(&snapshot).as_ref(),
			&flag.id,
			IMMUTABLE_SOURCE_ID,
			&value,
		);
		Ok(Resolved {
			source_id: IMMUTABLE_SOURCE_ID.to_string(),
			value,
		})
	}

	/// Resolves a mutable flag against the current sources.
	pub async fn get<V: FlagValue>(&self, spec: &MutableFlagSpec<V>) -> Result<V> {
		self.evaluate(spec).await.map(|resolved| resolved.value)
	}

	/// Resolves a mutable flag, reporting which source won.
	///
	/// Sources are asked one at a time in priority order and the scan stops at
	/// the first value. Failing sources are logged and skipped.
	pub async fn evaluate<V: FlagValue>(&self, spec: &MutableFlagSpec<V>) -> Result<Resolved<V>> {
		self.ensure_open()?;
		let snapshot = self.inner.registry.snapshot();
		let flag = spec.info();

		let mut winner: Option<(&SharedSource, V)> = None;
		for source in &snapshot.sources {
			let err = match source.fetch(flag).await {
				Ok(None) => continue,
				Ok(Some(raw)) => match decode_value::<V>(raw) {
					Ok(value) => {
						winner = Some((source, value));
						break;
					}
					Err(e) => SourceError::Decode(e.to_string()),
				},
				Err(e) => e,
			};
			log_source_failure(snapshot.logger.as_ref(), &flag.id, source.id(), &err);
		}

		let (source, value): (&dyn Source, V) = match winner {
			Some((source, value)) => (source.as_ref(), value),
			None => (&DEFAULT_SOURCE, spec.default_value().clone()),
		};

		let value = fold_sourced(Stage::Mutable, flag, source, value, &snapshot.interceptors)
			.await
			.map_err(|e| {
				error!(flag_id = %flag.id, error = %e, "mutable resolution failed");
				e
			})?;

		log_resolution(
			self.resolution_logger(&snapshot).as_ref(),
			&flag.id,
			source.id(),
			&value,
		);
		Ok(Resolved {
			source_id: source.id().to_string(),
			value,
		})
	}

	fn live_flag<V: FlagValue>(&self, spec: &StreamingFlagSpec<V>) -> Result<Arc<SharedFlag<V>>> {
		let mut live = self.inner.live.lock();
		self.ensure_open()?;

		if let Some(existing) = live.get(spec.id()) {
			let existing_type = existing.value_type();
			return Arc::clone(existing)
				.as_any()
				.downcast::<SharedFlag<V>>()
				.map_err(|_| FlagsError::TypeMismatch {
					flag_id: spec.id().to_string(),
					existing: existing_type,
					requested: spec.info().value_type,
				});
		}

		let flag = Arc::new(SharedFlag::new(
			spec.clone(),
			Arc::clone(&self.inner.registry),
			self.inner.runtime.clone(),
			self.inner.shutdown.clone(),
			self.inner.config.log_resolutions,
		));
		live.insert(spec.id().to_string(), Arc::clone(&flag) as Arc<dyn LiveFlag>);
		Ok(flag)
	}

	/// Makes the resolver aware of a streaming flag.
	///
	/// Flags with [`StartPolicy::Eager`] start aggregating immediately.
	#[instrument(skip(self, spec), fields(flag_id = %spec.id()))]
	pub fn register_streaming<V: FlagValue>(&self, spec: &StreamingFlagSpec<V>) -> Result<()> {
		let flag = self.live_flag(spec)?;
		if spec.start_policy() == StartPolicy::Eager {
			flag.activate();
		}
		Ok(())
	}

	/// Subscribes to a streaming flag.
	///
	/// All subscriptions to the same flag id share one aggregation. The first
	/// spec seen for an id decides its default and start policy.
	#[instrument(skip(self, spec), fields(flag_id = %spec.id()))]
	pub fn subscribe<V: FlagValue>(&self, spec: &StreamingFlagSpec<V>) -> Result<FlagSubscription<V>> {
		self.live_flag(spec)?.attach()
	}

	/// Registers a source with the lowest priority. Returns false if a source
	/// with the same id is already registered.
	pub fn add_source(&self, source: SharedSource) -> bool {
		self.inner.registry.add_source(source)
	}

	/// Unregisters the source with the given id.
	pub fn remove_source(&self, id: &str) -> bool {
		self.inner.registry.remove_source(id)
	}

	/// Registered sources in priority order.
	pub fn all_sources(&self) -> Vec<SharedSource> {
		self.inner.registry.sources()
	}

	/// Appends an interceptor to the fold. Returns false if an interceptor
	/// with the same id is already registered.
	pub fn add_interceptor(&self, interceptor: SharedInterceptor) -> bool {
		self.inner.registry.add_interceptor(interceptor)
	}

	pub fn remove_interceptor(&self, id: &str) -> bool {
		self.inner.registry.remove_interceptor(id)
	}

	/// Registered interceptors in fold order.
	pub fn all_interceptors(&self) -> Vec<SharedInterceptor> {
		self.inner.registry.interceptors()
	}

	/// Replaces the resolution logger. `None` disables logging.
	pub fn set_logger(&self, logger: Option<SharedLogger>) {
		self.inner.registry.set_logger(logger);
	}

	/// Stops every live aggregation and closes the resolver.
	///
	/// Waits up to the configured shutdown timeout for aggregations to wind
	/// down. Open subscriptions end and later reads fail with
	/// [`FlagsError::ResolverClosed`].
	#[instrument(skip(self), fields(resolver = %self.inner.config.name))]
	pub async fn shutdown(&self) {
		let flags: Vec<Arc<dyn LiveFlag>> = {
			let mut live = self.inner.live.lock();
			if self.inner.shutdown.is_cancelled() {
				return;
			}
			self.inner.shutdown.cancel();
			live.drain().map(|(_, flag)| flag).collect()
		};

		let handles: Vec<_> = flags.iter().filter_map(|flag| flag.halt()).collect();
		let pending = handles.len();
		let joined = tokio::time::timeout(
			self.inner.config.shutdown_timeout,
			futures::future::join_all(handles),
		)
		.await;

		if joined.is_err() {
			warn!(pending, "timed out waiting for aggregations to stop");
		}
		info!("resolver shut down");
	}
}

impl std::fmt::Debug for FlagResolver {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlagResolver")
			.field("name", &self.inner.config.name)
			.field("sources", &self.inner.registry.sources().len())
			.field("interceptors", &self.inner.registry.interceptors().len())
			.field("closed", &self.is_closed())
			.finish()
	}
}

/// Builder for [`FlagResolver`].
#[derive(Default)]
pub struct FlagResolverBuilder {
	config: Option<ResolverConfig>,
	sources: Vec<SharedSource>,
	interceptors: Vec<SharedInterceptor>,
	logger: Option<SharedLogger>,
	runtime: Option<Handle>,
}

impl FlagResolverBuilder {
	pub fn config(mut self, config: ResolverConfig) -> Self {
		self.config = Some(config);
		self
	}

	/// Adds a source. Sources added earlier have higher priority.
	pub fn source(mut self, source: SharedSource) -> Self {
		self.sources.push(source);
		self
	}

	pub fn interceptor(mut self, interceptor: SharedInterceptor) -> Self {
		self.interceptors.push(interceptor);
		self
	}

	pub fn logger(mut self, logger: SharedLogger) -> Self {
		self.logger = Some(logger);
		self
	}

	/// Runtime driving live subscriptions. Defaults to the current runtime.
	pub fn runtime(mut self, runtime: Handle) -> Self {
		self.runtime = Some(runtime);
		self
	}

	/// Builds the resolver.
	///
	/// Duplicate sources or interceptors are dropped, keeping the first.
	pub fn build(self) -> Result<FlagResolver> {
		let runtime = match self.runtime {
			Some(runtime) => runtime,
			None => Handle::try_current().map_err(|_| FlagsError::NoRuntime)?,
		};
		let config = self.config.unwrap_or_default();

		let registry = Arc::new(Registry::new());
		for source in self.sources {
			if !registry.add_source(source) {
				warn!("ignoring duplicate source");
			}
		}
		for interceptor in self.interceptors {
			if !registry.add_interceptor(interceptor) {
				warn!("ignoring duplicate interceptor");
			}
		}
		registry.set_logger(self.logger);

		info!(
			resolver = %config.name,
			sources = registry.sources().len(),
			interceptors = registry.interceptors().len(),
			"flag resolver created"
		);

		Ok(FlagResolver {
			inner: Arc::new(ResolverInner {
				config,
				registry,
				live: Mutex::new(HashMap::new()),
				runtime,
				shutdown: CancellationToken::new(),
			}),
		})
	}
}
