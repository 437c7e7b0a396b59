use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("failed to start event loop: {0}")]
	Runtime(#[source] std::io::Error),

	#[error("{operation}: {message}")]
	Call {
		operation: &'static str,
		message: &'static str,
	},

	#[error("connection to {url} closed before the handshake completed")]
	NeverOpened { url: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl CliError {
	/// Wraps a bridge failure with the host-facing message.
	pub fn call(operation: &'static str, err: &wsbridge::Error) -> Self {
		Self::Call {
			operation,
			message: err.host_message(),
		}
	}
}
