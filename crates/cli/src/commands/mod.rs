//! Subcommands. Each one drives a [`Bridge`] until it is done or the
//! process is interrupted, then the bridge is shut down here.

mod connect;
mod listen;
mod repl;

use anyhow::Context;
use tracing::debug;
use wsbridge::Bridge;
use wsbridge_runtime::TokioTransport;

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::settings::Settings;

pub fn dispatch(cli: Cli) -> anyhow::Result<()> {
	let settings = Settings::resolve(&cli).context("loading configuration")?;
	debug!(target = "wsbridge.cli", ?settings, "resolved settings");

	let transport = TokioTransport::start(&settings.runtime).map_err(CliError::Runtime)?;
	let mut bridge = Bridge::init(transport, settings.bridge);

	let outcome = match cli.command {
		Commands::Connect(args) => connect::run(&mut bridge, &args, &mut std::io::stdout().lock()),
		Commands::Listen(args) => listen::run(&mut bridge, &args, &mut std::io::stdout().lock()),
		Commands::Repl => repl::run(
			&mut bridge,
			std::io::stdin().lock(),
			&mut std::io::stdout().lock(),
		),
	};

	bridge.shutdown();
	Ok(outcome?)
}
