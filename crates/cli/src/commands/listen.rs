use std::io::Write;

use tracing::info;
use wsbridge::{Bridge, Transport};

use crate::cli::ListenArgs;
use crate::error::{CliError, Result};

/// Runs a relay listener, printing every frame peers send until the
/// listener closes or the process is interrupted.
pub fn run<T: Transport>(bridge: &mut Bridge<T>, args: &ListenArgs, out: &mut impl Write) -> Result<()> {
	let handle = bridge
		.listen(&args.address)
		.map_err(|e| CliError::call("listen", &e))?;
	let bound = bridge
		.session(handle)
		.and_then(|s| s.transport())
		.and_then(|conn| bridge.transport().peer_addr(conn))
		.unwrap_or_else(|| args.address.clone());
	info!(target = "wsbridge.cli", %handle, address = %bound, "listening");

	while !bridge.tick() {
		match bridge.drain_log(handle) {
			Ok(lines) => {
				for line in &lines {
					writeln!(out, "{line}")?;
				}
				if !lines.is_empty() {
					out.flush()?;
				}
			}
			Err(err) if err.is_closed() => {
				info!(target = "wsbridge.cli", %handle, "listener closed");
				break;
			}
			Err(err) => return Err(CliError::call("log", &err)),
		}
	}
	Ok(())
}
