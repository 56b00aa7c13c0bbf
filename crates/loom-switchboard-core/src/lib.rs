// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom switchboard.
//!
//! This crate defines the vocabulary shared by the resolution engine
//! (`loom-switchboard`) and anything that plugs into it:
//!
//! - **Flag specs**: immutable descriptors for immutable, mutable and streaming flags
//! - **Sources**: prioritized providers of flag values, point-in-time and live
//! - **Interceptors**: value transforms folded over the resolved value
//! - **Loggers**: side-channel observers of resolutions
//!
//! Sources and interceptors are object-safe and exchange values as
//! [`serde_json::Value`]; flags themselves are generic over their value type.
//!
//! # Example
//!
//! ```
//! use loom_switchboard_core::{FlagKind, MutableFlagSpec, StartPolicy, StreamingFlagSpec};
//!
//! let checkout = MutableFlagSpec::new("checkout.new_flow", false)
//!     .with_description("Routes users through the redesigned checkout");
//! assert_eq!(checkout.info().kind, FlagKind::Mutable);
//!
//! let theme = StreamingFlagSpec::new("ui.theme", "light".to_string())
//!     .with_start_policy(StartPolicy::Eager);
//! assert_eq!(theme.start_policy(), StartPolicy::Eager);
//! ```

pub mod error;
pub mod interceptor;
pub mod logger;
pub mod source;
pub mod spec;
pub mod value;

pub use error::{InterceptorError, SourceError};
pub use interceptor::{Interceptor, SharedInterceptor};
pub use logger::{Logger, SharedLogger};
pub use source::{
	DefaultSource, MutableSource, MutableSourceExt, SharedSource, Source, SourceStream, UpdateFn,
	Watch, DEFAULT_SOURCE, DEFAULT_SOURCE_ID, IMMUTABLE_SOURCE_ID,
};
pub use spec::{
	FlagInfo, FlagKind, FlagSpec, ImmutableFlagSpec, MutableFlagSpec, StartPolicy,
	StreamingFlagSpec,
};
pub use value::{decode_value, encode_value, FlagValue};
