//! Bridge configuration.
//!
//! Loaded from an optional JSON file, then overridden by environment
//! variables, then by whatever the host sets explicitly.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`Config::poll_wait_ms`].
pub const POLL_MS_ENV: &str = "WSBRIDGE_POLL_MS";

const DEFAULT_POLL_WAIT_MS: u64 = 100;
const DEFAULT_LOG_LIMIT: usize = 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config {path}: {source}")]
	Read {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {path}: {source}")]
	Parse {
		path: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("invalid value for {var}: '{value}'")]
	Env { var: &'static str, value: String },
}

/// Top-level bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Upper bound on how long one poll tick may wait for activity.
	pub poll_wait_ms: u64,
	/// Listener relay behaviour.
	pub relay: RelayConfig,
}

/// How a listener relays traffic between its peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RelayConfig {
	/// Prefix relayed frames with the sending peer's address.
	pub tag_with_address: bool,
	/// Tell peers when someone joins or leaves.
	pub announce_membership: bool,
	/// Maximum number of entries kept in a listener's receive log.
	pub log_limit: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			poll_wait_ms: DEFAULT_POLL_WAIT_MS,
			relay: RelayConfig::default(),
		}
	}
}

impl Default for RelayConfig {
	fn default() -> Self {
		Self {
			tag_with_address: true,
			announce_membership: false,
			log_limit: DEFAULT_LOG_LIMIT,
		}
	}
}

impl Config {
	/// Reads a JSON config file. Missing keys fall back to defaults.
	pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
		let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.display().to_string(),
			source,
		})?;
		serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
			path: path.display().to_string(),
			source,
		})
	}

	/// Applies `WSBRIDGE_POLL_MS` if set.
	pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
		self.with_overrides_from(|var| std::env::var(var).ok())
	}

	fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(value) = lookup(POLL_MS_ENV) {
			self.poll_wait_ms = value.trim().parse().map_err(|_| ConfigError::Env {
				var: POLL_MS_ENV,
				value,
			})?;
		}
		Ok(self)
	}

	pub fn poll_wait(&self) -> Duration {
		Duration::from_millis(self.poll_wait_ms)
	}
}
