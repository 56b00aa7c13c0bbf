// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Errors raised by sources and interceptors.

use thiserror::Error;

/// Errors a [`Source`](crate::Source) can report.
///
/// The engine never fails a resolution because of a source: every variant is
/// recovered as "absent" for the offending source and reported to the logger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
	/// The backing store could not be reached or failed to answer.
	#[error("Source unavailable: {0}")]
	Unavailable(String),

	/// A stored value could not be decoded into the flag's value type.
	#[error("Failed to decode value: {0}")]
	Decode(String),

	/// A value could not be encoded for storage.
	#[error("Failed to encode value: {0}")]
	Encode(String),
}

impl SourceError {
	/// Creates an [`SourceError::Unavailable`] from any displayable error.
	pub fn unavailable(err: impl std::fmt::Display) -> Self {
		SourceError::Unavailable(err.to_string())
	}
}

/// Errors an [`Interceptor`](crate::Interceptor) can report.
///
/// Unlike source errors these are propagated to the caller: a broken transform
/// chain means the resolved value can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InterceptorError {
	/// The interceptor failed while transforming the value.
	#[error("{0}")]
	Failed(String),

	/// The interceptor received a value of a type it cannot handle.
	#[error("Invalid flag value type: expected {expected}, got {actual}")]
	InvalidValueType {
		/// Expected type.
		expected: String,
		/// Actual type.
		actual: String,
	},
}
