// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolution logging.

use std::fmt::Debug;

use loom_switchboard_core::{Logger, SharedLogger, SourceError};
use tracing::warn;

/// [`Logger`] forwarding every message to `tracing` at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
	fn info(&self, message: &str) {
		tracing::info!(target: "loom_switchboard::resolution", "{message}");
	}
}

pub(crate) fn log_resolution<V: Debug>(
	logger: Option<&SharedLogger>,
	flag_id: &str,
	source_id: &str,
	value: &V,
) {
	tracing::debug!(flag_id = %flag_id, source_id = %source_id, value = ?value, "flag resolved");
	if let Some(logger) = logger {
		logger.info(&format!(
			"flag '{flag_id}' resolved to {value:?} by source '{source_id}'"
		));
	}
}

/// Reports a source failure. The source is treated as absent by the caller.
pub(crate) fn log_source_failure(
	logger: Option<&SharedLogger>,
	flag_id: &str,
	source_id: &str,
	error: &SourceError,
) {
	warn!(flag_id = %flag_id, source_id = %source_id, error = %error, "source failed, treating as absent");
	if let Some(logger) = logger {
		logger.info(&format!(
			"source '{source_id}' failed for flag '{flag_id}': {error}"
		));
	}
}
