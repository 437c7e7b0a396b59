//! The process-wide context behind the host API.
//!
//! One [`Bridge`] owns the event-loop manager and the session registry.
//! Host calls mutate sessions synchronously; everything asynchronous
//! (handshakes, inbound frames, disconnects) is only observed inside
//! [`Bridge::poll`].

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::{Error, Result};
use crate::registry::{Owner, Registry};
use crate::session::{Handle, Role, Session, State};
use crate::transport::Transport;


pub struct Bridge<T: Transport> {
	transport: T,
	registry: Registry,
	config: Config,
	shutdown_requested: bool,
}

impl<T: Transport> Bridge<T> {
	pub fn init(transport: T, config: Config) -> Self {
		info!(target = "wsbridge", poll_wait_ms = config.poll_wait_ms, "bridge initialised");
		Self {
			transport,
			registry: Registry::new(),
			config,
			shutdown_requested: false,
		}
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn transport(&self) -> &T {
		&self.transport
	}

	pub fn transport_mut(&mut self) -> &mut T {
		&mut self.transport
	}

	/// Read-only view of a session, tombstones included.
	pub fn session(&self, handle: Handle) -> Option<&Session> {
		self.registry.get(handle)
	}

	pub fn session_count(&self) -> usize {
		self.registry.len()
	}

	/// Starts an outbound connection.
	///
	/// The handle is valid immediately; the session opens once the
	/// handshake event arrives on a later poll.
	pub fn create(&mut self, url: &str, protocol: Option<&str>) -> Result<Handle> {
		let handle = self.registry.allocate()?;
		let conn = match self.transport.connect(url, protocol) {
			Ok(conn) => conn,
			Err(err) => {
				warn!(target = "wsbridge", %handle, url, error = %err, "connect refused");
				self.registry.remove(handle);
				return Err(err.into());
			}
		};
		self.registry.associate(conn, Owner::Session(handle));
		if let Some(session) = self.registry.get_mut(handle) {
			session.bind_client(conn);
		}
		debug!(target = "wsbridge", %handle, %conn, url, "connecting");
		Ok(handle)
	}

	/// Binds a listener. The returned session is already open.
	pub fn listen(&mut self, address: &str) -> Result<Handle> {
		let handle = self.registry.allocate()?;
		let conn = match self.transport.listen(address) {
			Ok(conn) => conn,
			Err(err) => {
				warn!(target = "wsbridge", %handle, address, error = %err, "listen failed");
				self.registry.remove(handle);
				return Err(err.into());
			}
		};
		self.registry.associate(conn, Owner::Session(handle));
		if let Some(session) = self.registry.get_mut(handle) {
			session.bind_server(conn);
		}
		info!(target = "wsbridge", %handle, %conn, address, "listening");
		Ok(handle)
	}

	/// Sends text on a session.
	///
	/// A connecting client queues it; an open client writes one frame; a
	/// listener broadcasts to every accepted peer.
	pub fn send(&mut self, handle: Handle, message: &str) -> Result<()> {
		let session = self.registry.lookup(handle)?;
		match (session.role(), session.state()) {
			(Role::Server, _) => {
				let delivery = session.peers().fan_out(&mut self.transport, message, None);
				debug!(
					target = "wsbridge",
					%handle,
					delivered = delivery.delivered,
					failed = delivery.failed,
					"broadcast"
				);
				Ok(())
			}
			(_, State::Init) => {
				session.queue_outbound(message);
				Ok(())
			}
			(_, State::Open) => {
				let conn = session.transport().ok_or(Error::ConnectionClosed(handle))?;
				self.transport.send_text(conn, message)?;
				Ok(())
			}
			(_, State::Closed) => Err(Error::ConnectionClosed(handle)),
		}
	}

	/// Takes everything buffered on a client since the last call.
	/// Listeners always return an empty string.
	pub fn receive(&mut self, handle: Handle) -> Result<String> {
		let session = self.registry.lookup(handle)?;
		match session.role() {
			Role::Client => Ok(session.take_inbound()),
			Role::Server | Role::Unset => Ok(String::new()),
		}
	}

	/// Liveness: not closed and no shutdown requested.
	pub fn open(&mut self, handle: Handle) -> Result<bool> {
		let shutdown_requested = self.shutdown_requested;
		let session = self.registry.lookup(handle)?;
		Ok(!session.is_closed() && !shutdown_requested)
	}

	/// Asks the manager to close the connection.
	///
	/// The session keeps its state until the close event is delivered.
	pub fn close(&mut self, handle: Handle) -> Result<()> {
		let session = self.registry.lookup(handle)?;
		if let Some(conn) = session.transport() {
			debug!(target = "wsbridge", %handle, %conn, "close requested");
			self.transport.mark_closing(conn);
		}
		Ok(())
	}

	/// Frames received by a listener since the last call, oldest first.
	pub fn drain_log(&mut self, handle: Handle) -> Result<Vec<String>> {
		Ok(self.registry.lookup(handle)?.drain_log())
	}

	/// Runs one manager tick, waiting at most `max_wait`.
	///
	/// Returns true once a shutdown has been requested.
	pub fn poll(&mut self, max_wait: Duration) -> bool {
		let events = self.transport.poll(max_wait);
		let mut dispatcher = Dispatcher {
			registry: &mut self.registry,
			transport: &mut self.transport,
			relay: &self.config.relay,
		};
		for event in events {
			if dispatcher.dispatch(event) == Some(true) {
				self.shutdown_requested = true;
			}
		}
		if self.shutdown_requested {
			debug!(target = "wsbridge", "shutdown requested");
		}
		self.shutdown_requested
	}

	/// [`Bridge::poll`] with the configured wait.
	pub fn tick(&mut self) -> bool {
		let wait = self.config.poll_wait();
		self.poll(wait)
	}

	pub fn shutdown_requested(&self) -> bool {
		self.shutdown_requested
	}

	/// Fails with [`Error::ShutdownRequested`] once an interrupt was observed.
	pub fn ensure_running(&self) -> Result<()> {
		if self.shutdown_requested {
			Err(Error::ShutdownRequested)
		} else {
			Ok(())
		}
	}

	/// Force-removes every session and stops the manager.
	pub fn shutdown(mut self) -> T {
		let sessions = self.registry.drain();
		info!(target = "wsbridge", sessions = sessions.len(), "bridge shutting down");
		for mut session in sessions {
			for peer in session.peers_mut().drain() {
				self.transport.mark_closing(peer.conn);
			}
			if let (Some(conn), false) = (session.transport(), session.is_closed()) {
				self.transport.mark_closing(conn);
			}
		}
		self.transport.shutdown();
		self.transport
	}
}
