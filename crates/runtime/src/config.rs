use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the event-loop manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
	/// Worker threads of the background tokio runtime.
	pub worker_threads: usize,
	/// Turn SIGINT/SIGTERM (ctrl-c elsewhere) into "shutdown requested".
	pub handle_signals: bool,
	/// Upper bound on an outbound TCP/TLS/WebSocket handshake.
	pub connect_timeout_ms: u64,
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			worker_threads: 2,
			handle_signals: true,
			connect_timeout_ms: 10_000,
		}
	}
}

impl RuntimeConfig {
	pub fn connect_timeout(&self) -> Duration {
		Duration::from_millis(self.connect_timeout_ms)
	}
}
