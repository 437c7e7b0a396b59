mod cli;
mod commands;
mod error;
mod logging;
mod settings;

use clap::Parser;

use crate::cli::Cli;

// Not `#[tokio::main]`: the event loop lives inside the transport, and the
// bridge blocks on it from this thread.
fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	if let Err(err) = commands::dispatch(cli) {
		eprintln!("error: {err:#}");
		std::process::exit(1);
	}
}
