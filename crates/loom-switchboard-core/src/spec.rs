// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag specifications.
//!
//! A spec is the immutable declaration of a flag: its id, how its value is
//! produced and the value used when no source knows about it. Two specs with
//! the same id describe the same flag.

use std::hash::{Hash, Hasher};
use std::time::Duration;

use serde::Serialize;

use crate::value::FlagValue;

/// How a flag's value is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
	/// Value baked in at declaration; sources are never consulted.
	Immutable,
	/// Point-in-time reads against the registered sources.
	Mutable,
	/// Live subscription merging every source that supports the flag.
	Streaming,
}

impl std::fmt::Display for FlagKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			FlagKind::Immutable => write!(f, "immutable"),
			FlagKind::Mutable => write!(f, "mutable"),
			FlagKind::Streaming => write!(f, "streaming"),
		}
	}
}

/// Controls when the merged stream of a streaming flag is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPolicy {
	/// Start as soon as the engine first sees the flag and run until shutdown.
	Eager,
	/// Start with the first subscriber and run until shutdown.
	#[default]
	Lazy,
	/// Start with the first subscriber and stop `stop_timeout` after the last
	/// one detaches. The last value stays cached for late subscribers.
	WhileSubscribed {
		/// Grace period before an idle aggregation is torn down.
		stop_timeout: Duration,
	},
}

impl StartPolicy {
	/// `WhileSubscribed` without a grace period.
	pub fn while_subscribed() -> Self {
		StartPolicy::WhileSubscribed {
			stop_timeout: Duration::ZERO,
		}
	}
}

/// Type-erased description of a flag, handed to sources and interceptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagInfo {
	/// Unique flag identifier, e.g. `checkout.new_flow`.
	pub id: String,
	pub kind: FlagKind,
	/// Human-readable purpose of the flag.
	pub description: Option<String>,
	/// Rust type name of the flag's value.
	pub value_type: &'static str,
}

impl FlagInfo {
	fn new<V: FlagValue>(id: String, kind: FlagKind) -> Self {
		Self {
			id,
			kind,
			description: None,
			value_type: std::any::type_name::<V>(),
		}
	}
}

/// Common access to the three spec kinds.
pub trait FlagSpec: Send + Sync {
	/// Type of the flag's value.
	type Value: FlagValue;

	/// Type-erased descriptor.
	fn info(&self) -> &FlagInfo;

	/// The flag id.
	fn id(&self) -> &str {
		&self.info().id
	}
}

macro_rules! impl_identity {
	($spec:ident) => {
		impl<V> PartialEq for $spec<V> {
			fn eq(&self, other: &Self) -> bool {
				self.info.id == other.info.id
			}
		}

		impl<V> Eq for $spec<V> {}

		impl<V> Hash for $spec<V> {
			fn hash<H: Hasher>(&self, state: &mut H) {
				self.info.id.hash(state);
			}
		}

		impl<V: FlagValue> FlagSpec for $spec<V> {
			type Value = V;

			fn info(&self) -> &FlagInfo {
				&self.info
			}
		}
	};
}

/// A flag whose value is fixed at declaration.
///
/// Interceptors still run over the value so it can be overridden, e.g. from a
/// debug panel.
#[derive(Debug, Clone)]
pub struct ImmutableFlagSpec<V> {
	info: FlagInfo,
	value: V,
}

impl<V: FlagValue> ImmutableFlagSpec<V> {
	pub fn new(id: impl Into<String>, value: V) -> Self {
		Self {
			info: FlagInfo::new::<V>(id.into(), FlagKind::Immutable),
			value,
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.info.description = Some(description.into());
		self
	}

	pub fn info(&self) -> &FlagInfo {
		&self.info
	}

	pub fn id(&self) -> &str {
		&self.info.id
	}

	pub fn value(&self) -> &V {
		&self.value
	}
}

/// A flag read point-in-time from the registered sources.
#[derive(Debug, Clone)]
pub struct MutableFlagSpec<V> {
	info: FlagInfo,
	default_value: V,
}

impl<V: FlagValue> MutableFlagSpec<V> {
	pub fn new(id: impl Into<String>, default_value: V) -> Self {
		Self {
			info: FlagInfo::new::<V>(id.into(), FlagKind::Mutable),
			default_value,
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.info.description = Some(description.into());
		self
	}

	pub fn info(&self) -> &FlagInfo {
		&self.info
	}

	pub fn id(&self) -> &str {
		&self.info.id
	}

	pub fn default_value(&self) -> &V {
		&self.default_value
	}
}

/// A flag observed as a live stream merged from every supporting source.
#[derive(Debug, Clone)]
pub struct StreamingFlagSpec<V> {
	info: FlagInfo,
	default_value: V,
	start_policy: StartPolicy,
}

impl<V: FlagValue> StreamingFlagSpec<V> {
	pub fn new(id: impl Into<String>, default_value: V) -> Self {
		Self {
			info: FlagInfo::new::<V>(id.into(), FlagKind::Streaming),
			default_value,
			start_policy: StartPolicy::default(),
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.info.description = Some(description.into());
		self
	}

	pub fn with_start_policy(mut self, start_policy: StartPolicy) -> Self {
		self.start_policy = start_policy;
		self
	}

	pub fn info(&self) -> &FlagInfo {
		&self.info
	}

	pub fn id(&self) -> &str {
		&self.info.id
	}

	pub fn default_value(&self) -> &V {
		&self.default_value
	}

	pub fn start_policy(&self) -> StartPolicy {
		self.start_policy
	}
}

impl_identity!(ImmutableFlagSpec);
impl_identity!(MutableFlagSpec);
impl_identity!(StreamingFlagSpec);
