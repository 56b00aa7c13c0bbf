// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Feature flag resolution engine for Loom.
//!
//! This crate resolves the current value of a flag by combining its default,
//! any number of prioritized sources and a chain of interceptors. Values can be
//! read point-in-time or observed through live subscriptions.
//!
//! # Features
//!
//! - **Prioritized sources**: the first source with a value wins, otherwise the flag default
//! - **Interceptors**: transforms folded over every resolved value in registration order
//! - **Live subscriptions**: one shared aggregation per flag, replaying the latest value
//! - **Start policies**: eager, lazy or while-subscribed aggregation lifetimes
//! - **Flag spaces**: grouped declarations with typed handles
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use loom_switchboard::{FlagResolver, MemorySource, MutableFlagSpec, MutableSourceExt, StreamingFlagSpec};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let overrides = Arc::new(MemorySource::new());
//!     let resolver = FlagResolver::builder()
//!         .source(overrides.clone())
//!         .build()?;
//!
//!     let limit = MutableFlagSpec::new("search.limit", 20i64);
//!     assert_eq!(resolver.get(&limit).await?, 20);
//!
//!     overrides.set_value(&limit, 50).await?;
//!     assert_eq!(resolver.get(&limit).await?, 50);
//!
//!     let theme = StreamingFlagSpec::new("ui.theme", "light".to_string());
//!     let mut updates = resolver.subscribe(&theme)?;
//!     while let Some(value) = updates.next().await {
//!         println!("theme is now {}", value?);
//!     }
//!
//!     resolver.shutdown().await;
//!     Ok(())
//! }
//! ```

mod combine;
mod config;
mod error;
mod live;
mod logger;
mod memory;
mod registry;
mod resolver;
mod space;

pub use config::{load_config, load_config_with_file, ResolverConfig, ResolverConfigLayer};
pub use error::{ConfigError, FlagsError, Result};
pub use live::FlagSubscription;
pub use logger::TracingLogger;
pub use memory::{MemorySource, MEMORY_SOURCE_ID};
pub use resolver::{FlagResolver, FlagResolverBuilder, Resolved};
pub use space::{FlagSpace, ImmutableFlag, MutableFlag, StreamingFlag};

// Re-export core types for convenience
pub use loom_switchboard_core::{
	decode_value, encode_value, DefaultSource, FlagInfo, FlagKind, FlagSpec, FlagValue,
	ImmutableFlagSpec, Interceptor, InterceptorError, Logger, MutableFlagSpec, MutableSource,
	MutableSourceExt, SharedInterceptor, SharedLogger, SharedSource, Source, SourceError,
	SourceStream, StartPolicy, StreamingFlagSpec, UpdateFn, Watch, DEFAULT_SOURCE,
	DEFAULT_SOURCE_ID, IMMUTABLE_SOURCE_ID,
};
