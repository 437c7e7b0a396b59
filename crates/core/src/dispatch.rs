//! Routes manager events to session state changes.

use tracing::{debug, info, trace, warn};

use crate::config::RelayConfig;
use crate::registry::{Owner, Registry};
use crate::session::{Handle, Role};
use crate::transport::{ConnId, Event, Transport};

/// Borrowed view over the bridge for the duration of one event.
pub(crate) struct Dispatcher<'a, T: ?Sized> {
	pub registry: &'a mut Registry,
	pub transport: &'a mut T,
	pub relay: &'a RelayConfig,
}

impl<T> Dispatcher<'_, T>
where
	T: Transport + ?Sized,
{
	/// Applies one event. Returns `Some(shutdown_requested)` for tick events.
	pub fn dispatch(&mut self, event: Event) -> Option<bool> {
		trace!(target = "wsbridge", kind = event.kind(), conn = ?event.conn(), "event");
		match event {
			Event::Tick { shutdown_requested } => return Some(shutdown_requested),
			Event::Connected { conn, status } => {
				if let Err(reason) = status {
					self.on_failure(conn, &reason);
				}
			}
			Event::Opened { conn } => self.on_open(conn),
			Event::Message { conn, text } => self.on_message(conn, &text),
			Event::Accepted {
				listener,
				peer,
				addr,
			} => self.on_accept(listener, peer, addr),
			Event::Closed { conn } => self.on_close(conn),
			Event::Failed { conn, reason } => self.on_failure(conn, &reason),
		}
		None
	}

	fn on_open(&mut self, conn: ConnId) {
		let Some(Owner::Session(handle)) = self.registry.owner(conn) else {
			trace!(target = "wsbridge", %conn, "open for unknown connection");
			return;
		};
		let Some(session) = self.registry.get_mut(handle) else {
			return;
		};
		if let Some(pending) = session.complete_handshake() {
			if let Err(err) = self.transport.send_text(conn, &pending) {
				warn!(target = "wsbridge", %handle, error = %err, "flushing pending frame failed");
			}
		}
	}

	fn on_message(&mut self, conn: ConnId, text: &str) {
		match self.registry.owner(conn) {
			Some(Owner::Session(handle)) => {
				let Some(session) = self.registry.get_mut(handle) else {
					return;
				};
				if session.role() == Role::Client && !session.is_closed() {
					session.push_inbound(text);
				}
			}
			Some(Owner::Peer { listener }) => self.relay_from_peer(listener, conn, text),
			None => trace!(target = "wsbridge", %conn, "message for unknown connection"),
		}
	}

	/// A peer spoke: log it on the listener and pass it on to everyone else.
	fn relay_from_peer(&mut self, listener: Handle, peer: ConnId, text: &str) {
		let Some(session) = self.registry.get_mut(listener) else {
			return;
		};
		if session.is_closed() {
			return;
		}
		let entry = match (self.relay.tag_with_address, session.peers().addr_of(peer)) {
			(true, Some(addr)) => format!("{addr} {text}"),
			_ => text.to_string(),
		};
		let delivery = session
			.peers()
			.fan_out(&mut *self.transport, &entry, Some(peer));
		debug!(
			target = "wsbridge",
			handle = %listener,
			%peer,
			delivered = delivery.delivered,
			failed = delivery.failed,
			"relayed peer frame"
		);
		session.record(entry, self.relay.log_limit);
	}

	fn on_accept(&mut self, listener: ConnId, peer: ConnId, addr: String) {
		let open_listener = match self.registry.owner(listener) {
			Some(Owner::Session(handle)) => self
				.registry
				.get(handle)
				.filter(|s| s.role() == Role::Server && !s.is_closed())
				.map(|_| handle),
			_ => None,
		};
		let Some(handle) = open_listener else {
			debug!(target = "wsbridge", %listener, %peer, "rejecting peer of inactive listener");
			self.transport.mark_closing(peer);
			return;
		};

		self.registry
			.associate(peer, Owner::Peer { listener: handle });
		let Some(session) = self.registry.get_mut(handle) else {
			return;
		};
		info!(target = "wsbridge", %handle, %peer, %addr, "peer joined");
		if self.relay.announce_membership {
			let notice = format!("{addr} ++ joined");
			session.peers().fan_out(&mut *self.transport, &notice, None);
		}
		session.peers_mut().add(peer, addr);
	}

	fn on_close(&mut self, conn: ConnId) {
		match self.registry.owner(conn) {
			Some(Owner::Peer { listener }) => self.drop_peer(listener, conn),
			Some(Owner::Session(handle)) => self.close_session(handle),
			None => trace!(target = "wsbridge", %conn, "close for unknown connection"),
		}
	}

	fn on_failure(&mut self, conn: ConnId, reason: &str) {
		match self.registry.owner(conn) {
			Some(Owner::Peer { listener }) => {
				warn!(target = "wsbridge", handle = %listener, peer = %conn, reason, "peer failed");
				self.drop_peer(listener, conn);
			}
			Some(Owner::Session(handle)) => {
				warn!(target = "wsbridge", %handle, %conn, reason, "connection failed");
				self.close_session(handle);
			}
			None => trace!(target = "wsbridge", %conn, reason, "failure for unknown connection"),
		}
	}

	/// One peer left; the listener itself stays open.
	fn drop_peer(&mut self, listener: Handle, peer: ConnId) {
		self.registry.dissociate(peer);
		let Some(session) = self.registry.get_mut(listener) else {
			return;
		};
		let Some(gone) = session.peers_mut().remove(peer) else {
			return;
		};
		info!(target = "wsbridge", handle = %listener, %peer, addr = %gone.addr, "peer left");
		if self.relay.announce_membership && !session.is_closed() {
			let notice = format!("{} -- left", gone.addr);
			session.peers().fan_out(&mut *self.transport, &notice, None);
		}
	}

	/// Terminal transition. A closing listener takes its peers with it.
	fn close_session(&mut self, handle: Handle) {
		let Some(session) = self.registry.get_mut(handle) else {
			return;
		};
		if !session.mark_closed() {
			return;
		}
		let peers = session.peers_mut().drain();
		for peer in peers {
			self.transport.mark_closing(peer.conn);
			self.registry.dissociate(peer.conn);
		}
	}
}
