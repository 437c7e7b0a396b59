//! [`Transport`] implementation backed by a private tokio runtime.
//!
//! Connection tasks run on the runtime's worker threads and only ever talk
//! to the host through the event channel. The host thread blocks on that
//! channel inside [`Transport::poll`], for at most the requested wait.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};
use wsbridge::{ConnId, Event, Transport, TransportError};

use crate::address::resolve_listen_address;
use crate::client;
use crate::config::RuntimeConfig;
use crate::link::{Outbound, Shared};
use crate::server::{self, Listener};
use crate::signal::watch_signals;

#[cfg(test)]
mod tests;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);
/// Time given to writer tasks to put close frames on the wire.
const CLOSE_FLUSH: Duration = Duration::from_millis(50);

pub struct TokioTransport {
	runtime: Option<Runtime>,
	shared: Arc<Shared>,
	events: mpsc::UnboundedReceiver<Event>,
	listeners: HashMap<ConnId, Listener>,
	connect_timeout: Duration,
}

impl TokioTransport {
	/// Starts the background runtime.
	pub fn start(config: &RuntimeConfig) -> std::io::Result<Self> {
		let runtime = Builder::new_multi_thread()
			.worker_threads(config.worker_threads.max(1))
			.thread_name("wsbridge-io")
			.enable_all()
			.build()?;
		let (tx, events) = mpsc::unbounded_channel();
		let shared = Arc::new(Shared::new(tx));
		if config.handle_signals {
			watch_signals(&runtime, Arc::clone(&shared));
		}
		info!(
			target = "wsbridge.runtime",
			workers = config.worker_threads,
			signals = config.handle_signals,
			"event loop started"
		);
		Ok(Self {
			runtime: Some(runtime),
			shared,
			events,
			listeners: HashMap::new(),
			connect_timeout: config.connect_timeout(),
		})
	}

	/// Address a listener actually bound, useful after binding port 0.
	pub fn local_addr(&self, listener: ConnId) -> Option<SocketAddr> {
		self.listeners.get(&listener).map(|l| l.local_addr)
	}

	/// Flags a shutdown as if a signal had arrived.
	pub fn request_shutdown(&self) {
		self.shared.shutdown_requested.store(true, Ordering::SeqCst);
	}
}

impl Transport for TokioTransport {
	fn connect(&mut self, url: &str, protocol: Option<&str>) -> Result<ConnId, TransportError> {
		let request = client::build_request(url, protocol)?;
		let Some(runtime) = self.runtime.as_ref() else {
			return Err(TransportError::Refused("event loop is shut down".to_string()));
		};
		let conn = self.shared.alloc();
		let rx = self.shared.open_link(conn, None);
		runtime.spawn(client::run(
			Arc::clone(&self.shared),
			conn,
			request,
			rx,
			self.connect_timeout,
		));
		debug!(target = "wsbridge.runtime", %conn, url, "connect started");
		Ok(conn)
	}

	fn listen(&mut self, address: &str) -> Result<ConnId, TransportError> {
		let bind_error = |reason: String| TransportError::Bind {
			address: address.to_string(),
			reason,
		};
		let Some(runtime) = self.runtime.as_ref() else {
			return Err(bind_error("event loop is shut down".to_string()));
		};
		let addr = resolve_listen_address(address).map_err(bind_error)?;
		let conn = self.shared.alloc();
		let listener = server::bind(runtime, Arc::clone(&self.shared), conn, addr)
			.map_err(|e| bind_error(e.to_string()))?;
		self.listeners.insert(conn, listener);
		Ok(conn)
	}

	fn send_text(&mut self, conn: ConnId, text: &str) -> Result<(), TransportError> {
		let link = self
			.shared
			.links
			.get(&conn)
			.ok_or_else(|| TransportError::Send(format!("{conn} is not connected")))?;
		link.tx
			.send(Outbound::Text(text.to_string()))
			.map_err(|_| TransportError::Send(format!("{conn} writer has stopped")))
	}

	fn mark_closing(&mut self, conn: ConnId) {
		if let Some(listener) = self.listeners.get_mut(&conn) {
			listener.stop();
			return;
		}
		match self.shared.links.get(&conn) {
			Some(link) => {
				let _ = link.tx.send(Outbound::Close);
			}
			None => trace!(target = "wsbridge.runtime", %conn, "close for unknown connection"),
		}
	}

	fn peer_addr(&self, conn: ConnId) -> Option<String> {
		if let Some(listener) = self.listeners.get(&conn) {
			return Some(listener.local_addr.to_string());
		}
		self.shared.links.get(&conn).and_then(|l| l.addr.clone())
	}

	fn poll(&mut self, max_wait: Duration) -> Vec<Event> {
		let mut events = Vec::new();
		if let Some(runtime) = self.runtime.as_ref() {
			let rx = &mut self.events;
			let first = runtime.block_on(async { tokio::time::timeout(max_wait, rx.recv()).await });
			if let Ok(Some(event)) = first {
				events.push(event);
			}
		}
		while let Ok(event) = self.events.try_recv() {
			events.push(event);
		}
		for event in &events {
			if let Event::Closed { conn } = event {
				self.listeners.remove(conn);
			}
		}
		events.push(Event::Tick {
			shutdown_requested: self.shared.shutdown_requested.load(Ordering::SeqCst),
		});
		events
	}

	fn shutdown(&mut self) {
		for listener in self.listeners.values_mut() {
			listener.stop();
		}
		self.listeners.clear();
		for link in self.shared.links.iter() {
			let _ = link.tx.send(Outbound::Close);
		}
		if let Some(runtime) = self.runtime.take() {
			runtime.block_on(tokio::time::sleep(CLOSE_FLUSH));
			runtime.shutdown_timeout(SHUTDOWN_GRACE);
		}
		info!(target = "wsbridge.runtime", "event loop stopped");
	}
}

impl Drop for TokioTransport {
	fn drop(&mut self) {
		if let Some(runtime) = self.runtime.take() {
			runtime.shutdown_background();
		}
	}
}
