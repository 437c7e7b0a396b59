//! Error types for the session core.
//!
//! Every error ends up in front of the host as a `(ok, message)` pair, so
//! each variant also knows the short message the host sees. See
//! [`Error::host_message`].

use thiserror::Error;

use crate::session::Handle;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the external I/O manager.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// The url could not be turned into a WebSocket request.
	#[error("invalid url '{url}': {reason}")]
	InvalidUrl { url: String, reason: String },

	/// The manager refused to start an outbound connection.
	#[error("connection refused: {0}")]
	Refused(String),

	/// Binding a listener failed.
	#[error("failed to listen on '{address}': {reason}")]
	Bind { address: String, reason: String },

	/// Queueing an outbound frame failed (connection gone or unknown).
	#[error("send failed: {0}")]
	Send(String),
}

/// Errors surfaced by the host API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
	/// The handle was never allocated, or its session was already destroyed.
	#[error("unknown connection handle {0}")]
	InvalidHandle(Handle),

	/// The session reached `Closed`; it is destroyed as this error is returned.
	#[error("connection {0} is closed")]
	ConnectionClosed(Handle),

	/// Transport failure at creation or while writing a frame.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Every handle has been handed out once.
	#[error("connection handles exhausted")]
	HandlesExhausted,

	/// The process received an interrupt and the host should stop.
	#[error("shutdown requested")]
	ShutdownRequested,
}

impl Error {
	/// Message reported to the embedding host.
	pub fn host_message(&self) -> &'static str {
		match self {
			Error::InvalidHandle(_) => "Invalid connection identifier",
			Error::ConnectionClosed(_) => "Connection closed",
			Error::Transport(TransportError::InvalidUrl { .. }) => "Invalid url",
			Error::Transport(TransportError::Refused(_)) => "Connection failed",
			Error::Transport(TransportError::Bind { .. }) => "Listen failed",
			Error::Transport(TransportError::Send(_)) => "Send failed",
			Error::HandlesExhausted => "Too many connections",
			Error::ShutdownRequested => "Shutdown requested",
		}
	}

	/// Returns true for lookup failures (unknown or already destroyed handle).
	pub fn is_lookup(&self) -> bool {
		matches!(self, Error::InvalidHandle(_))
	}

	/// Returns true when the operation hit a closed session.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::ConnectionClosed(_))
	}
}
