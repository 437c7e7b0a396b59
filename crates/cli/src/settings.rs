//! Resolves bridge and event-loop settings from file, environment and flags.

use wsbridge::{Config, ConfigError};
use wsbridge_runtime::RuntimeConfig;

use crate::cli::{Cli, Commands};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
	pub bridge: Config,
	pub runtime: RuntimeConfig,
}

impl Settings {
	/// Flags win over `WSBRIDGE_*` variables, which win over the file.
	pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
		let bridge = match &cli.config {
			Some(path) => Config::from_file(path)?,
			None => Config::default(),
		};
		Ok(Self::from_parts(bridge.with_env_overrides()?, cli))
	}

	fn from_parts(mut bridge: Config, cli: &Cli) -> Self {
		if let Some(ms) = cli.poll_ms {
			bridge.poll_wait_ms = ms;
		}
		if let Commands::Listen(args) = &cli.command {
			if args.announce {
				bridge.relay.announce_membership = true;
			}
			if args.no_tag {
				bridge.relay.tag_with_address = false;
			}
		}

		let mut runtime = RuntimeConfig::default();
		if let Some(workers) = cli.workers {
			runtime.worker_threads = workers;
		}
		Self { bridge, runtime }
	}
}
