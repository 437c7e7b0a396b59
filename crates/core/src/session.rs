//! Per-connection state record and its state machine.
//!
//! ```text
//!            bind ok (listen)
//!   Init ──────────────────────────► Open(Server)
//!    │  handshake event (create)          │
//!    ├─────────────────────► Open(Client) │
//!    │                            │       │
//!    └──── error / close event ───┴───────┴──► Closed (terminal)
//! ```

use std::collections::VecDeque;
use std::fmt;

use tracing::debug;

use crate::broadcast::BroadcastGroup;
use crate::transport::ConnId;


/// Separator placed between buffered inbound messages.
pub const INBOUND_SEPARATOR: char = '|';

/// Host-visible session identifier. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u32);

impl fmt::Display for Handle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
	Unset,
	Client,
	Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
	Init,
	Open,
	Closed,
}

#[derive(Debug)]
pub struct Session {
	handle: Handle,
	role: Role,
	state: State,
	transport: Option<ConnId>,
	outbound_pending: String,
	inbound: String,
	peers: BroadcastGroup,
	log: VecDeque<String>,
}

impl Session {
	pub fn new(handle: Handle) -> Self {
		Self {
			handle,
			role: Role::Unset,
			state: State::Init,
			transport: None,
			outbound_pending: String::new(),
			inbound: String::new(),
			peers: BroadcastGroup::new(),
			log: VecDeque::new(),
		}
	}

	pub fn handle(&self) -> Handle {
		self.handle
	}

	pub fn role(&self) -> Role {
		self.role
	}

	pub fn state(&self) -> State {
		self.state
	}

	/// Manager connection backing this session. Only meaningful until the
	/// session reaches `Closed`.
	pub fn transport(&self) -> Option<ConnId> {
		self.transport
	}

	pub fn is_closed(&self) -> bool {
		self.state == State::Closed
	}

	pub fn peers(&self) -> &BroadcastGroup {
		&self.peers
	}

	pub(crate) fn peers_mut(&mut self) -> &mut BroadcastGroup {
		&mut self.peers
	}

	pub fn outbound_pending(&self) -> &str {
		&self.outbound_pending
	}

	/// Attaches an outbound connection. The session stays in `Init` until
	/// the handshake completes.
	pub(crate) fn bind_client(&mut self, conn: ConnId) {
		debug_assert_eq!(self.role, Role::Unset, "role is assigned once");
		self.role = Role::Client;
		self.transport = Some(conn);
	}

	/// Attaches a bound listener. Listeners need no handshake and open at once.
	pub(crate) fn bind_server(&mut self, conn: ConnId) {
		debug_assert_eq!(self.role, Role::Unset, "role is assigned once");
		self.role = Role::Server;
		self.transport = Some(conn);
		self.state = State::Open;
		debug!(target = "wsbridge", handle = %self.handle, %conn, "listener open");
	}

	/// Handshake finished: `Init -> Open(Client)`.
	///
	/// Returns the text queued while connecting, if any, which must go out
	/// as a single frame.
	pub(crate) fn complete_handshake(&mut self) -> Option<String> {
		if self.role != Role::Client || self.state != State::Init {
			return None;
		}
		self.state = State::Open;
		debug!(
			target = "wsbridge",
			handle = %self.handle,
			pending = self.outbound_pending.len(),
			"client open"
		);
		if self.outbound_pending.is_empty() {
			None
		} else {
			Some(std::mem::take(&mut self.outbound_pending))
		}
	}

	/// Moves to `Closed`. Returns false if the session was already closed.
	pub(crate) fn mark_closed(&mut self) -> bool {
		if self.state == State::Closed {
			return false;
		}
		debug!(target = "wsbridge", handle = %self.handle, from = ?self.state, "session closed");
		self.state = State::Closed;
		true
	}

	/// Appends to the text held back until the handshake completes.
	/// Messages are concatenated as-is.
	pub(crate) fn queue_outbound(&mut self, message: &str) {
		self.outbound_pending.push_str(message);
	}

	/// Buffers an inbound frame for the next `receive`.
	///
	/// The newest frame goes in front: `newest|older`.
	pub(crate) fn push_inbound(&mut self, text: &str) {
		if self.inbound.is_empty() {
			self.inbound.push_str(text);
		} else {
			let mut merged = String::with_capacity(text.len() + 1 + self.inbound.len());
			merged.push_str(text);
			merged.push(INBOUND_SEPARATOR);
			merged.push_str(&self.inbound);
			self.inbound = merged;
		}
	}

	pub(crate) fn take_inbound(&mut self) -> String {
		std::mem::take(&mut self.inbound)
	}

	/// Records a frame received by a listener, dropping the oldest entries
	/// beyond `limit`.
	pub(crate) fn record(&mut self, entry: String, limit: usize) {
		if limit == 0 {
			return;
		}
		while self.log.len() >= limit {
			self.log.pop_front();
		}
		self.log.push_back(entry);
	}

	pub(crate) fn drain_log(&mut self) -> Vec<String> {
		self.log.drain(..).collect()
	}
}
