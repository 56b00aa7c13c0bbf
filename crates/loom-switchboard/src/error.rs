// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the resolution engine.

use std::path::PathBuf;

use loom_switchboard_core::InterceptorError;
use thiserror::Error;

/// Errors returned by flag resolution.
///
/// Source failures never surface here: they are recovered as "absent" and
/// logged. Only a broken interceptor chain or misuse of the engine fails a
/// resolution.
#[derive(Debug, Clone, Error)]
pub enum FlagsError {
	#[error("interceptor '{interceptor_id}' failed on flag '{flag_id}': {source}")]
	InterceptorFailed {
		interceptor_id: String,
		flag_id: String,
		#[source]
		source: InterceptorError,
	},

	/// A value could not be converted between its typed and exchanged forms.
	#[error("codec error on flag '{flag_id}': {message}")]
	Codec { flag_id: String, message: String },

	/// A streaming flag is already live with a different value type.
	#[error("flag '{flag_id}' is live as {existing}, requested as {requested}")]
	TypeMismatch {
		flag_id: String,
		existing: &'static str,
		requested: &'static str,
	},

	#[error("flag '{flag_id}' is already declared in space '{space_id}'")]
	DuplicateFlag { space_id: String, flag_id: String },

	#[error("no tokio runtime available to drive subscriptions")]
	NoRuntime,

	#[error("resolver has been shut down")]
	ResolverClosed,
}

impl FlagsError {
	pub(crate) fn codec(flag_id: &str, err: impl std::fmt::Display) -> Self {
		FlagsError::Codec {
			flag_id: flag_id.to_string(),
			message: err.to_string(),
		}
	}
}

/// Result type for resolution operations.
pub type Result<T> = std::result::Result<T, FlagsError>;

/// Errors raised while loading resolver configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to parse config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },
}
