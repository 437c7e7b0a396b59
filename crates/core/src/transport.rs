//! Contract between the session core and the event-loop manager.
//!
//! The manager owns every socket. The core only ever holds [`ConnId`]s and
//! learns about asynchronous progress through [`Event`]s returned from
//! [`Transport::poll`]. All calls happen on the host thread, so the trait
//! takes `&mut self` and needs no `Send`/`Sync` bounds.

use std::fmt;
use std::time::Duration;

use crate::error::TransportError;

/// Opaque, process-unique identifier for a manager-owned connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "conn#{}", self.0)
	}
}

/// Something that happened inside the manager since the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	/// TCP (and TLS) stage of an outbound connection finished.
	Connected {
		conn: ConnId,
		status: Result<(), String>,
	},
	/// WebSocket handshake of an outbound connection completed.
	Opened { conn: ConnId },
	/// A text frame arrived on `conn`.
	Message { conn: ConnId, text: String },
	/// `listener` accepted and upgraded a new peer connection.
	Accepted {
		listener: ConnId,
		peer: ConnId,
		addr: String,
	},
	/// `conn` is gone. Delivered exactly once per connection.
	Closed { conn: ConnId },
	/// `conn` failed; a `Closed` for it may or may not follow.
	Failed { conn: ConnId, reason: String },
	/// End of one poll tick. Not tied to any connection.
	Tick { shutdown_requested: bool },
}

impl Event {
	/// Connection the event refers to, if any.
	pub fn conn(&self) -> Option<ConnId> {
		match self {
			Event::Connected { conn, .. }
			| Event::Opened { conn }
			| Event::Message { conn, .. }
			| Event::Closed { conn }
			| Event::Failed { conn, .. } => Some(*conn),
			Event::Accepted { listener, .. } => Some(*listener),
			Event::Tick { .. } => None,
		}
	}

	/// Short name used in log fields.
	pub fn kind(&self) -> &'static str {
		match self {
			Event::Connected { .. } => "connect",
			Event::Opened { .. } => "open",
			Event::Message { .. } => "message",
			Event::Accepted { .. } => "accept",
			Event::Closed { .. } => "close",
			Event::Failed { .. } => "error",
			Event::Tick { .. } => "poll",
		}
	}
}

/// The non-blocking I/O manager the session core drives.
pub trait Transport {
	/// Begin an outbound WebSocket connection.
	///
	/// Returns as soon as the attempt is underway; success or failure of the
	/// handshake is reported later through [`Event::Opened`] or
	/// [`Event::Failed`].
	fn connect(&mut self, url: &str, protocol: Option<&str>) -> Result<ConnId, TransportError>;

	/// Bind a listener that upgrades incoming HTTP requests to WebSocket.
	fn listen(&mut self, address: &str) -> Result<ConnId, TransportError>;

	/// Queue one text frame on `conn`.
	fn send_text(&mut self, conn: ConnId, text: &str) -> Result<(), TransportError>;

	/// Flag `conn` as closing. The matching [`Event::Closed`] arrives on a
	/// later poll.
	fn mark_closing(&mut self, conn: ConnId);

	/// Remote address of `conn`, when known.
	fn peer_addr(&self, conn: ConnId) -> Option<String>;

	/// Wait up to `max_wait` for activity and return everything that is
	/// ready. The last element is always [`Event::Tick`].
	fn poll(&mut self, max_wait: Duration) -> Vec<Event>;

	/// Release every connection and stop the event loop.
	fn shutdown(&mut self);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_event_conn() {
		let accepted = Event::Accepted {
			listener: ConnId(1),
			peer: ConnId(7),
			addr: "127.0.0.1:5000".into(),
		};
		assert_eq!(accepted.conn(), Some(ConnId(1)));
		assert_eq!(accepted.kind(), "accept");
		assert_eq!(Event::Tick { shutdown_requested: false }.conn(), None);
	}

	#[test]
	fn test_conn_id_display() {
		assert_eq!(ConnId(42).to_string(), "conn#42");
	}
}
