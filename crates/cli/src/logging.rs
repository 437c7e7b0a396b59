use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Installs the global subscriber. `RUST_LOG` beats `-v`.
pub fn init_logging(verbosity: u8) {
	// 0 = errors only, stdout stays clean for received frames
	// 1 (-v) = session lifecycle, websocket internals kept at warn
	// 2+ (-vv) = everything
	let filter = match verbosity {
		0 => "error",
		1 => "info,tungstenite=warn,tokio_tungstenite=warn",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
