use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Args, Parser, Subcommand};


/// Help colours in the style of cargo.
fn styles() -> Styles {
	Styles::styled()
		.header(AnsiColor::Green.on_default().bold())
		.usage(AnsiColor::Green.on_default().bold())
		.literal(AnsiColor::Cyan.on_default())
		.placeholder(AnsiColor::Cyan.on_default())
}

#[derive(Parser, Debug)]
#[command(name = "wsbridge")]
#[command(about = "Handle-based WebSocket client and relay server")]
#[command(version)]
#[command(styles = styles())]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// JSON config file
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Maximum wait per poll tick, in milliseconds
	#[arg(long, global = true, value_name = "MS")]
	pub poll_ms: Option<u64>,

	/// Worker threads for the event loop
	#[arg(long, global = true, value_name = "N")]
	pub workers: Option<usize>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Connect to a WebSocket server and print what it sends
	Connect(ConnectArgs),
	/// Run a relay server and print what peers send
	Listen(ListenArgs),
	/// Read host calls from stdin, one per line
	Repl,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
	/// ws:// or wss:// url
	pub url: String,

	/// Subprotocol to request
	#[arg(short, long)]
	pub protocol: Option<String>,

	/// Message to send once connected (repeatable)
	#[arg(short, long = "message", value_name = "TEXT")]
	pub messages: Vec<String>,

	/// Exit after this many received batches
	#[arg(long, value_name = "N")]
	pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
	/// Port, host:port, or http:// / ws:// url
	pub address: String,

	/// Announce peers joining and leaving
	#[arg(long)]
	pub announce: bool,

	/// Relay frames without the sender's address
	#[arg(long)]
	pub no_tag: bool,
}
