//! Fan-out to the peers accepted by a listener.

use tracing::warn;

use crate::transport::{ConnId, Transport};


/// One accepted peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
	pub conn: ConnId,
	pub addr: String,
}

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
	pub delivered: usize,
	pub failed: usize,
}

/// Peers currently attached to a listener, in accept order.
#[derive(Debug, Default)]
pub struct BroadcastGroup {
	peers: Vec<Peer>,
}

impl BroadcastGroup {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds a peer. Returns false if `conn` was already a member.
	pub fn add(&mut self, conn: ConnId, addr: impl Into<String>) -> bool {
		if self.contains(conn) {
			return false;
		}
		self.peers.push(Peer {
			conn,
			addr: addr.into(),
		});
		true
	}

	pub fn remove(&mut self, conn: ConnId) -> Option<Peer> {
		let idx = self.peers.iter().position(|p| p.conn == conn)?;
		Some(self.peers.remove(idx))
	}

	pub fn contains(&self, conn: ConnId) -> bool {
		self.peers.iter().any(|p| p.conn == conn)
	}

	pub fn addr_of(&self, conn: ConnId) -> Option<&str> {
		self.peers
			.iter()
			.find(|p| p.conn == conn)
			.map(|p| p.addr.as_str())
	}

	pub fn len(&self) -> usize {
		self.peers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.peers.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Peer> {
		self.peers.iter()
	}

	/// Empties the group, returning every member.
	pub fn drain(&mut self) -> Vec<Peer> {
		std::mem::take(&mut self.peers)
	}

	/// Writes `text` to every member except `except`.
	///
	/// Best effort: a failed write is logged and the remaining peers still
	/// get the frame.
	pub fn fan_out<T>(&self, transport: &mut T, text: &str, except: Option<ConnId>) -> Delivery
	where
		T: Transport + ?Sized,
	{
		let mut delivery = Delivery::default();
		for peer in self.peers.iter().filter(|p| Some(p.conn) != except) {
			match transport.send_text(peer.conn, text) {
				Ok(()) => delivery.delivered += 1,
				Err(err) => {
					delivery.failed += 1;
					warn!(
						target = "wsbridge",
						peer = %peer.conn,
						addr = %peer.addr,
						error = %err,
						"broadcast write failed"
					);
				}
			}
		}
		delivery
	}
}
