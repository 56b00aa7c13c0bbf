// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolver configuration.
//!
//! Configuration is layered from built-in defaults, an optional TOML file and
//! environment variables (`LOOM_SWITCHBOARD_*`), later layers overriding
//! earlier ones.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::ConfigError;

const DEFAULT_NAME: &str = "switchboard";
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Partially specified configuration as read from a single source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResolverConfigLayer {
	pub name: Option<String>,
	pub log_resolutions: Option<bool>,
	pub shutdown_timeout_ms: Option<u64>,
}

impl ResolverConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.name.is_some() {
			self.name = other.name;
		}
		if other.log_resolutions.is_some() {
			self.log_resolutions = other.log_resolutions;
		}
		if other.shutdown_timeout_ms.is_some() {
			self.shutdown_timeout_ms = other.shutdown_timeout_ms;
		}
	}

	pub fn finalize(self) -> ResolverConfig {
		ResolverConfig {
			name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
			log_resolutions: self.log_resolutions.unwrap_or(true),
			shutdown_timeout: Duration::from_millis(
				self.shutdown_timeout_ms.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_MS),
			),
		}
	}

	/// Reads a layer from a TOML file. A missing file yields an empty layer.
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		if !path.exists() {
			debug!(path = %path.display(), "config file not found, skipping");
			return Ok(Self::default());
		}

		debug!(path = %path.display(), "loading config file");
		let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
			path: path.to_path_buf(),
			source: e,
		})?;

		let layer: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: path.to_path_buf(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}

	/// Reads a layer from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads a layer through an arbitrary variable lookup.
	///
	/// Convention: LOOM_SWITCHBOARD_<FIELD>
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let var = |name: &str| lookup(name).filter(|s| !s.is_empty());

		let shutdown_timeout_ms = match var("LOOM_SWITCHBOARD_SHUTDOWN_TIMEOUT_MS") {
			Some(v) => Some(v.parse().map_err(|_| ConfigError::InvalidValue {
				key: "LOOM_SWITCHBOARD_SHUTDOWN_TIMEOUT_MS".to_string(),
				message: format!("invalid u64 value '{v}'"),
			})?),
			None => None,
		};

		Ok(Self {
			name: var("LOOM_SWITCHBOARD_NAME"),
			log_resolutions: var("LOOM_SWITCHBOARD_LOG_RESOLUTIONS")
				.map(|v| v.eq_ignore_ascii_case("true") || v == "1"),
			shutdown_timeout_ms,
		})
	}
}

/// Fully resolved resolver configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
	/// Name used in log output to tell resolvers apart.
	pub name: String,
	/// Whether successful resolutions are reported to the [`Logger`](loom_switchboard_core::Logger).
	pub log_resolutions: bool,
	/// Grace period for live subscriptions to wind down on shutdown.
	pub shutdown_timeout: Duration,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		ResolverConfigLayer::default().finalize()
	}
}

/// Loads configuration from defaults and the environment.
pub fn load_config() -> Result<ResolverConfig, ConfigError> {
	let mut merged = ResolverConfigLayer::default();
	merged.merge(ResolverConfigLayer::from_env()?);
	Ok(merged.finalize())
}

/// Loads configuration from defaults, a TOML file and the environment.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`LOOM_SWITCHBOARD_*`)
/// 2. Config file
/// 3. Built-in defaults
pub fn load_config_with_file(path: impl Into<PathBuf>) -> Result<ResolverConfig, ConfigError> {
	let path = path.into();
	let mut merged = ResolverConfigLayer::default();
	merged.merge(ResolverConfigLayer::from_file(&path)?);
	merged.merge(ResolverConfigLayer::from_env()?);
	Ok(merged.finalize())
}
