use std::io::Write;

use tracing::info;
use wsbridge::{Bridge, State, Transport};

use crate::cli::ConnectArgs;
use crate::error::{CliError, Result};

/// Connects, sends the queued messages, and prints each received batch on
/// its own line until the peer closes, `--count` is reached, or ctrl-c.
pub fn run<T: Transport>(
	bridge: &mut Bridge<T>,
	args: &ConnectArgs,
	out: &mut impl Write,
) -> Result<()> {
	let handle = bridge
		.create(&args.url, args.protocol.as_deref())
		.map_err(|e| CliError::call("create", &e))?;
	// Sent before the handshake, so these go out together as the first frame.
	for message in &args.messages {
		bridge
			.send(handle, message)
			.map_err(|e| CliError::call("send", &e))?;
	}
	info!(target = "wsbridge.cli", %handle, url = %args.url, "connecting");

	let mut opened = false;
	let mut batches = 0;
	while !bridge.tick() {
		if !opened && bridge.session(handle).is_some_and(|s| s.state() == State::Open) {
			opened = true;
			info!(target = "wsbridge.cli", %handle, "connected");
		}
		match bridge.receive(handle) {
			Ok(text) if text.is_empty() => {}
			Ok(text) => {
				writeln!(out, "{text}")?;
				out.flush()?;
				batches += 1;
				if args.count.is_some_and(|n| batches >= n) {
					break;
				}
			}
			Err(err) if err.is_closed() => {
				if !opened {
					return Err(CliError::NeverOpened {
						url: args.url.clone(),
					});
				}
				info!(target = "wsbridge.cli", %handle, "connection closed");
				break;
			}
			Err(err) => return Err(CliError::call("receive", &err)),
		}
	}
	Ok(())
}
