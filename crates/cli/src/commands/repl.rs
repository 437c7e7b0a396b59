use std::io::{BufRead, Write};

use tracing::debug;
use wsbridge::{Bridge, Call, Reply, Transport};

use crate::error::Result;

/// Reads one host call per line and answers each with `ok <value>` or
/// `err <message>`. Stops at end of input or `quit`. Once a shutdown has
/// been observed, the next call is answered `err Shutdown requested` and
/// the loop ends.
pub fn run<T: Transport>(bridge: &mut Bridge<T>, input: impl BufRead, out: &mut impl Write) -> Result<()> {
	for line in input.lines() {
		let line = line?;
		let line = line.trim_end_matches('\r');
		match line.trim() {
			"" => continue,
			"quit" | "exit" => break,
			_ => {}
		}

		if let Err(err) = bridge.ensure_running() {
			writeln!(out, "{}", Reply::from(Err::<(), _>(err)))?;
			out.flush()?;
			break;
		}

		let reply = match Call::parse(line) {
			Ok(call) => {
				debug!(target = "wsbridge.cli", ?call, "host call");
				bridge.call(call)
			}
			Err(err) => Reply::failure(err.to_string()),
		};
		writeln!(out, "{reply}")?;
		out.flush()?;
	}
	Ok(())
}
