// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag spaces: grouped flag declarations with typed accessors.
//!
//! A [`FlagSpace`] is where an application declares its flags. Each
//! declaration returns a typed handle bound to the space's resolver, and ids
//! are unique within a space.
//!
//! ```ignore
//! let space = FlagSpace::new("checkout", resolver.clone());
//! let new_flow = space.mutable(MutableFlagSpec::new("checkout.new_flow", false))?;
//! let theme = space.streaming(StreamingFlagSpec::new("ui.theme", "light".to_string()))?;
//!
//! if new_flow.get().await? {
//!     // ...
//! }
//! let mut theme = theme.subscribe()?;
//! while let Some(Ok(value)) = theme.next().await {
//!     // ...
//! }
//! ```

use loom_switchboard_core::{
	FlagInfo, FlagValue, ImmutableFlagSpec, MutableFlagSpec, StreamingFlagSpec,
};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{FlagsError, Result};
use crate::live::FlagSubscription;
use crate::resolver::{FlagResolver, Resolved};

/// A named group of flag declarations.
pub struct FlagSpace {
	id: String,
	description: Option<String>,
	resolver: FlagResolver,
	declared: Mutex<Vec<FlagInfo>>,
}

impl FlagSpace {
	pub fn new(id: impl Into<String>, resolver: FlagResolver) -> Self {
		Self {
			id: id.into(),
			description: None,
			resolver,
			declared: Mutex::new(Vec::new()),
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn description(&self) -> Option<&str> {
		self.description.as_deref()
	}

	pub fn resolver(&self) -> &FlagResolver {
		&self.resolver
	}

	fn declare(&self, info: &FlagInfo) -> Result<()> {
		let mut declared = self.declared.lock();
		if declared.iter().any(|d| d.id == info.id) {
			return Err(FlagsError::DuplicateFlag {
				space_id: self.id.clone(),
				flag_id: info.id.clone(),
			});
		}
		debug!(space_id = %self.id, flag_id = %info.id, kind = %info.kind, "flag declared");
		declared.push(info.clone());
		Ok(())
	}

	pub fn immutable<V: FlagValue>(&self, spec: ImmutableFlagSpec<V>) -> Result<ImmutableFlag<V>> {
		self.declare(spec.info())?;
		Ok(ImmutableFlag {
			spec,
			resolver: self.resolver.clone(),
		})
	}

	pub fn mutable<V: FlagValue>(&self, spec: MutableFlagSpec<V>) -> Result<MutableFlag<V>> {
		self.declare(spec.info())?;
		Ok(MutableFlag {
			spec,
			resolver: self.resolver.clone(),
		})
	}

	/// Declares a streaming flag and registers it with the resolver, which
	/// starts eager flags right away.
	pub fn streaming<V: FlagValue>(&self, spec: StreamingFlagSpec<V>) -> Result<StreamingFlag<V>> {
		self.declare(spec.info())?;
		if let Err(e) = self.resolver.register_streaming(&spec) {
			self.declared.lock().retain(|d| d.id != spec.id());
			return Err(e);
		}
		Ok(StreamingFlag {
			spec,
			resolver: self.resolver.clone(),
		})
	}

	/// Every flag declared in this space, in declaration order.
	pub fn all_specs(&self) -> Vec<FlagInfo> {
		self.declared.lock().clone()
	}
}

impl std::fmt::Debug for FlagSpace {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlagSpace")
			.field("id", &self.id)
			.field("flags", &self.declared.lock().len())
			.finish()
	}
}

/// Typed handle to a declared immutable flag.
#[derive(Debug, Clone)]
pub struct ImmutableFlag<V> {
	spec: ImmutableFlagSpec<V>,
	resolver: FlagResolver,
}

impl<V: FlagValue> ImmutableFlag<V> {
	pub fn get(&self) -> Result<V> {
		self.resolver.get_immutable(&self.spec)
	}

	pub fn spec(&self) -> &ImmutableFlagSpec<V> {
		&self.spec
	}
}

/// Typed handle to a declared mutable flag.
#[derive(Debug, Clone)]
pub struct MutableFlag<V> {
	spec: MutableFlagSpec<V>,
	resolver: FlagResolver,
}

impl<V: FlagValue> MutableFlag<V> {
	pub async fn get(&self) -> Result<V> {
		self.resolver.get(&self.spec).await
	}

	pub async fn evaluate(&self) -> Result<Resolved<V>> {
		self.resolver.evaluate(&self.spec).await
	}

	pub fn spec(&self) -> &MutableFlagSpec<V> {
		&self.spec
	}
}

/// Typed handle to a declared streaming flag.
#[derive(Debug, Clone)]
pub struct StreamingFlag<V> {
	spec: StreamingFlagSpec<V>,
	resolver: FlagResolver,
}

impl<V: FlagValue> StreamingFlag<V> {
	pub fn subscribe(&self) -> Result<FlagSubscription<V>> {
		self.resolver.subscribe(&self.spec)
	}

	pub fn spec(&self) -> &StreamingFlagSpec<V> {
		&self.spec
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_switchboard_core::FlagKind;

	#[tokio::test]
	async fn declarations_are_unique_per_space() {
		let resolver = FlagResolver::builder().build().unwrap();
		let space = FlagSpace::new("checkout", resolver.clone());

		space
			.mutable(MutableFlagSpec::new("checkout.new_flow", false))
			.unwrap();
		let err = space
			.immutable(ImmutableFlagSpec::new("checkout.new_flow", true))
			.unwrap_err();
		assert!(matches!(
			err,
			FlagsError::DuplicateFlag { ref space_id, ref flag_id }
				if space_id == "checkout" && flag_id == "checkout.new_flow"
		));

		let other = FlagSpace::new("search", resolver);
		assert!(other
			.mutable(MutableFlagSpec::new("checkout.new_flow", false))
			.is_ok());
	}

	#[tokio::test]
	async fn all_specs_lists_declarations_in_order() {
		let resolver = FlagResolver::builder().build().unwrap();
		let space = FlagSpace::new("app", resolver).with_description("Application flags");

		space
			.immutable(ImmutableFlagSpec::new("build.debug_menu", false))
			.unwrap();
		space
			.mutable(MutableFlagSpec::new("search.limit", 20i64))
			.unwrap();
		space
			.streaming(StreamingFlagSpec::new("ui.theme", "light".to_string()))
			.unwrap();

		let specs = space.all_specs();
		let kinds: Vec<_> = specs.iter().map(|s| (s.id.as_str(), s.kind)).collect();
		assert_eq!(
			kinds,
			vec![
				("build.debug_menu", FlagKind::Immutable),
				("search.limit", FlagKind::Mutable),
				("ui.theme", FlagKind::Streaming),
			]
		);
		assert_eq!(space.description(), Some("Application flags"));
	}

	#[tokio::test]
	async fn handles_resolve_through_the_resolver() {
		let resolver = FlagResolver::builder().build().unwrap();
		let space = FlagSpace::new("app", resolver);

		let debug_menu = space
			.immutable(ImmutableFlagSpec::new("build.debug_menu", true))
			.unwrap();
		let limit = space
			.mutable(MutableFlagSpec::new("search.limit", 20i64))
			.unwrap();
		let theme = space
			.streaming(StreamingFlagSpec::new("ui.theme", "light".to_string()))
			.unwrap();

		assert!(debug_menu.get().unwrap());
		assert_eq!(limit.get().await.unwrap(), 20);

		let mut subscription = theme.subscribe().unwrap();
		assert_eq!(subscription.next().await.unwrap().unwrap(), "light");
	}

	#[tokio::test]
	async fn failed_registration_is_not_declared() {
		let resolver = FlagResolver::builder().build().unwrap();
		let space = FlagSpace::new("app", resolver.clone());
		resolver.shutdown().await;

		assert!(space
			.streaming(StreamingFlagSpec::new("ui.theme", 0u8))
			.is_err());
		assert!(space.all_specs().is_empty());
	}
}
