//! In-memory transport for exercising the session core without sockets.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use crate::error::TransportError;
use crate::transport::{ConnId, Event, Transport};

/// Records everything the core asks for and replays queued events on poll.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
	next_conn: u64,
	queued: VecDeque<Event>,
	addrs: HashMap<ConnId, String>,
	failing: HashSet<ConnId>,
	refuse_connect: bool,
	refuse_listen: bool,
	shutdown_requested: bool,
	/// Every frame written, in order.
	pub frames: Vec<(ConnId, String)>,
	/// Connections flagged as closing, in order.
	pub closing: Vec<ConnId>,
	/// `(url, protocol)` of each accepted connect call.
	pub connects: Vec<(String, Option<String>)>,
	/// Waits requested by each poll.
	pub waits: Vec<Duration>,
	pub shut_down: bool,
}

impl ScriptedTransport {
	pub fn new() -> Self {
		Self::default()
	}

	fn alloc(&mut self) -> ConnId {
		self.next_conn += 1;
		ConnId(self.next_conn)
	}

	/// Queues an event for the next poll.
	pub fn push(&mut self, event: Event) {
		self.queued.push_back(event);
	}

	/// Allocates a connection id for a peer the listener will "accept".
	pub fn new_peer(&mut self, addr: &str) -> ConnId {
		let conn = self.alloc();
		self.addrs.insert(conn, addr.to_string());
		conn
	}

	pub fn refuse_connect(&mut self) {
		self.refuse_connect = true;
	}

	pub fn refuse_listen(&mut self) {
		self.refuse_listen = true;
	}

	/// Makes every later write to `conn` fail.
	pub fn fail_writes_to(&mut self, conn: ConnId) {
		self.failing.insert(conn);
	}

	pub fn request_shutdown(&mut self) {
		self.shutdown_requested = true;
	}

	/// Frames written to `conn`, in order.
	pub fn frames_to(&self, conn: ConnId) -> Vec<&str> {
		self.frames
			.iter()
			.filter(|(c, _)| *c == conn)
			.map(|(_, text)| text.as_str())
			.collect()
	}
}

impl Transport for ScriptedTransport {
	fn connect(&mut self, url: &str, protocol: Option<&str>) -> Result<ConnId, TransportError> {
		if !(url.starts_with("ws://") || url.starts_with("wss://")) {
			return Err(TransportError::InvalidUrl {
				url: url.to_string(),
				reason: "expected ws:// or wss://".to_string(),
			});
		}
		if self.refuse_connect {
			return Err(TransportError::Refused(url.to_string()));
		}
		self.connects
			.push((url.to_string(), protocol.map(str::to_string)));
		Ok(self.alloc())
	}

	fn listen(&mut self, address: &str) -> Result<ConnId, TransportError> {
		if self.refuse_listen {
			return Err(TransportError::Bind {
				address: address.to_string(),
				reason: "address in use".to_string(),
			});
		}
		Ok(self.alloc())
	}

	fn send_text(&mut self, conn: ConnId, text: &str) -> Result<(), TransportError> {
		if self.failing.contains(&conn) {
			return Err(TransportError::Send(format!("{conn} is broken")));
		}
		self.frames.push((conn, text.to_string()));
		Ok(())
	}

	fn mark_closing(&mut self, conn: ConnId) {
		self.closing.push(conn);
	}

	fn peer_addr(&self, conn: ConnId) -> Option<String> {
		self.addrs.get(&conn).cloned()
	}

	fn poll(&mut self, max_wait: Duration) -> Vec<Event> {
		self.waits.push(max_wait);
		let mut events: Vec<Event> = self.queued.drain(..).collect();
		events.push(Event::Tick {
			shutdown_requested: self.shutdown_requested,
		});
		events
	}

	fn shutdown(&mut self) {
		self.shut_down = true;
	}
}
