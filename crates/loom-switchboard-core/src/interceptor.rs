// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Interceptors transform a flag's value after it has been resolved.
//!
//! Interceptors are folded over the resolved value in registration order: each
//! one receives the output of the previous one. They are used for debug
//! overrides, experiment bucketing and similar runtime adjustments.
//!
//! The engine may re-run the fold whenever any upstream value changes, so an
//! interceptor must return the same output for the same input.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::InterceptorError;
use crate::source::Source;
use crate::spec::FlagInfo;

/// A value transform applied after source resolution.
///
/// Every method defaults to passing the value through unchanged, so
/// implementations only override the flag kinds they care about.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
	/// Unique interceptor identifier.
	fn id(&self) -> &str;

	/// Human-readable purpose of this interceptor.
	fn description(&self) -> Option<&str> {
		None
	}

	/// Transforms the value of an immutable flag.
	fn intercept_immutable(&self, flag: &FlagInfo, value: Value) -> Result<Value, InterceptorError> {
		let _ = flag;
		Ok(value)
	}

	/// Transforms the value of a mutable flag.
	///
	/// `source` is the source that produced the value, or
	/// [`DefaultSource`](crate::DefaultSource) if the flag default was used.
	async fn intercept_mutable(
		&self,
		flag: &FlagInfo,
		source: &dyn Source,
		value: Value,
	) -> Result<Value, InterceptorError> {
		let _ = (flag, source);
		Ok(value)
	}

	/// Transforms one value of a streaming flag.
	async fn intercept_streaming(
		&self,
		flag: &FlagInfo,
		source: &dyn Source,
		value: Value,
	) -> Result<Value, InterceptorError> {
		let _ = (flag, source);
		Ok(value)
	}
}

/// Type alias for a shared interceptor.
pub type SharedInterceptor = Arc<dyn Interceptor>;
