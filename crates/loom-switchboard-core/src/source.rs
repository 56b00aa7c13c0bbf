// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag value sources.
//!
//! A source provides flag values to the engine, either point-in-time
//! ([`Source::fetch`]) or as a live stream ([`Source::watch`]). Sources are
//! registered in priority order; the first one with a value wins.
//!
//! Two "no value" signals are distinguished:
//!
//! | Signal | Meaning |
//! |--------|---------|
//! | `Ok(None)` / a `None` stream item | the source supports the flag but has no value right now |
//! | [`Watch::Unsupported`] | the source opts out of the flag and is left out of the merge |

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::SourceError;
use crate::spec::{FlagInfo, FlagSpec};
use crate::value::{decode_value, encode_value};

/// Live sequence of values for one flag. `None` items mean "absent".
pub type SourceStream = BoxStream<'static, Result<Option<Value>, SourceError>>;

/// Outcome of [`Source::watch`].
pub enum Watch {
	/// The source supports the flag. The stream must yield its current
	/// contribution (possibly `None`) before later updates.
	Stream(SourceStream),
	/// The source does not know about the flag.
	Unsupported,
}

impl std::fmt::Debug for Watch {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Watch::Stream(_) => f.write_str("Watch::Stream(..)"),
			Watch::Unsupported => f.write_str("Watch::Unsupported"),
		}
	}
}

/// A pluggable provider of flag values.
#[async_trait]
pub trait Source: Send + Sync + 'static {
	/// Unique source identifier.
	fn id(&self) -> &str;

	/// Human-readable purpose of this source.
	fn description(&self) -> Option<&str> {
		None
	}

	/// Returns the current value of a mutable flag, or `None` if absent.
	async fn fetch(&self, flag: &FlagInfo) -> Result<Option<Value>, SourceError>;

	/// Opens a live stream of values for a streaming flag.
	///
	/// Support is decided once per call: a source returning
	/// [`Watch::Unsupported`] is not asked again for the same subscription.
	fn watch(&self, flag: &FlagInfo) -> Result<Watch, SourceError>;
}

/// Type alias for a shared source.
pub type SharedSource = Arc<dyn Source>;

/// Identifier reserved for [`DefaultSource`].
pub const DEFAULT_SOURCE_ID: &str = "default_value";

/// Identifier reported for immutable flags, whose value comes from the spec
/// itself. No source may register under it.
pub const IMMUTABLE_SOURCE_ID: &str = "immutable_value";

/// Sentinel source reported when a flag resolved to its spec default.
///
/// Interceptors receive it instead of a real source so they can tell default
/// values apart from sourced ones. It never provides values itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSource;

/// The shared [`DefaultSource`] instance.
pub static DEFAULT_SOURCE: DefaultSource = DefaultSource;

impl DefaultSource {
	/// Returns true if `source` is the default-value sentinel.
	pub fn is(source: &dyn Source) -> bool {
		source.id() == DEFAULT_SOURCE_ID
	}
}

#[async_trait]
impl Source for DefaultSource {
	fn id(&self) -> &str {
		DEFAULT_SOURCE_ID
	}

	fn description(&self) -> Option<&str> {
		Some("Indicates that the default value of the flag spec is used")
	}

	async fn fetch(&self, _flag: &FlagInfo) -> Result<Option<Value>, SourceError> {
		Ok(None)
	}

	fn watch(&self, _flag: &FlagInfo) -> Result<Watch, SourceError> {
		Ok(Watch::Unsupported)
	}
}

/// Transform applied by [`MutableSource::update`] to the stored value.
pub type UpdateFn = Box<dyn FnOnce(Option<Value>) -> Result<Value, SourceError> + Send>;

/// A source that callers can write to.
///
/// Updates to the same flag on the same source are linearizable: a transform
/// always observes the result of the previous one.
#[async_trait]
pub trait MutableSource: Source {
	/// Replaces the stored value with `transform(current)`.
	async fn update(&self, flag: &FlagInfo, transform: UpdateFn) -> Result<(), SourceError>;

	/// Removes the stored value, making the flag absent in this source.
	async fn remove(&self, flag: &FlagInfo) -> Result<(), SourceError>;

	/// Removes every stored value.
	async fn clear(&self) -> Result<(), SourceError>;
}

/// Typed helpers over [`MutableSource`].
pub trait MutableSourceExt: MutableSource {
	/// Updates the flag's value with a typed transform.
	///
	/// A stored value that does not decode into the flag's type is passed to
	/// the transform as `None`.
	fn update_value<'a, S, F>(
		&'a self,
		spec: &'a S,
		transform: F,
	) -> BoxFuture<'a, Result<(), SourceError>>
	where
		S: FlagSpec,
		F: FnOnce(Option<S::Value>) -> S::Value + Send + 'static,
	{
		let typed: UpdateFn = Box::new(move |current| {
			let current = current.and_then(|raw| decode_value::<S::Value>(raw).ok());
			encode_value(&transform(current)).map_err(|e| SourceError::Encode(e.to_string()))
		});
		self.update(spec.info(), typed)
	}

	/// Stores `value` for the flag.
	fn set_value<'a, S>(
		&'a self,
		spec: &'a S,
		value: S::Value,
	) -> BoxFuture<'a, Result<(), SourceError>>
	where
		S: FlagSpec,
	{
		self.update_value(spec, move |_| value)
	}

	/// Removes the flag's value.
	fn remove_value<'a, S>(&'a self, spec: &'a S) -> BoxFuture<'a, Result<(), SourceError>>
	where
		S: FlagSpec,
	{
		self.remove(spec.info())
	}
}

impl<T: MutableSource + ?Sized> MutableSourceExt for T {}
