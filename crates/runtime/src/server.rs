//! Listeners: an axum app that upgrades every request path to WebSocket
//! and reports each upgraded peer to the session core.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::http::header::SEC_WEBSOCKET_PROTOCOL;
use axum::response::Response;
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::runtime::Runtime;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, info, warn};
use wsbridge::{ConnId, Event};

use crate::link::{Inbound, Shared, read_loop, write_loop};

/// Host-side handle on a running listener.
pub(crate) struct Listener {
	pub local_addr: SocketAddr,
	stop: Option<oneshot::Sender<()>>,
}

impl Listener {
	/// Stops accepting. The listener's `Closed` event follows.
	pub fn stop(&mut self) {
		if let Some(stop) = self.stop.take() {
			let _ = stop.send(());
		}
	}
}

#[derive(Clone)]
struct ListenerState {
	shared: Arc<Shared>,
	listener: ConnId,
}

/// Binds synchronously so bind failures reach the host at `listen` time.
pub(crate) fn bind(
	runtime: &Runtime,
	shared: Arc<Shared>,
	conn: ConnId,
	addr: SocketAddr,
) -> std::io::Result<Listener> {
	let std_listener = std::net::TcpListener::bind(addr)?;
	std_listener.set_nonblocking(true)?;
	let local_addr = std_listener.local_addr()?;
	let listener = {
		let _guard = runtime.enter();
		TcpListener::from_std(std_listener)?
	};

	let app = Router::new().fallback(upgrade).with_state(ListenerState {
		shared: Arc::clone(&shared),
		listener: conn,
	});
	let (stop_tx, stop_rx) = oneshot::channel();

	runtime.spawn(async move {
		let server =
			axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>());
		tokio::select! {
			result = async move { server.await } => {
				if let Err(err) = result {
					warn!(target = "wsbridge.runtime", %conn, error = %err, "listener failed");
					shared.emit(Event::Failed {
						conn,
						reason: err.to_string(),
					});
				}
			}
			_ = stop_rx => {
				debug!(target = "wsbridge.runtime", %conn, "listener stopped");
			}
		}
		shared.emit(Event::Closed { conn });
	});

	info!(target = "wsbridge.runtime", %conn, %local_addr, "listener bound");
	Ok(Listener {
		local_addr,
		stop: Some(stop_tx),
	})
}

async fn upgrade(
	State(state): State<ListenerState>,
	ConnectInfo(remote): ConnectInfo<SocketAddr>,
	headers: HeaderMap,
	ws: WebSocketUpgrade,
) -> Response {
	// Clients insist on getting one of their subprotocols back; agree to the first.
	let ws = match requested_protocol(&headers) {
		Some(protocol) => ws.protocols([protocol]),
		None => ws,
	};
	ws.on_upgrade(move |socket| handle_peer_socket(socket, state, remote))
}

fn requested_protocol(headers: &HeaderMap) -> Option<String> {
	let value = headers.get(SEC_WEBSOCKET_PROTOCOL)?.to_str().ok()?;
	let first = value.split(',').next()?.trim();
	(!first.is_empty()).then(|| first.to_string())
}

async fn handle_peer_socket(socket: WebSocket, state: ListenerState, remote: SocketAddr) {
	let ListenerState { shared, listener } = state;
	let peer = shared.alloc();
	let addr = remote.to_string();
	let rx = shared.open_link(peer, Some(addr.clone()));
	info!(target = "wsbridge.runtime", %listener, %peer, %addr, "peer connected");
	shared.emit(Event::Accepted {
		listener,
		peer,
		addr,
	});

	let (sink, source) = socket.split();
	let closing = Arc::new(Notify::new());
	let send_task = tokio::spawn(write_loop(
		sink,
		rx,
		Arc::clone(&closing),
		|text| Message::Text(text.into()),
		|| Message::Close(None),
	));

	read_loop(&shared, peer, source, closing, classify).await;

	send_task.abort();
	shared.finish(peer);
	info!(target = "wsbridge.runtime", %listener, %peer, "peer disconnected");
}

fn classify(msg: Message) -> Inbound {
	match msg {
		Message::Text(text) => Inbound::Text(text.as_str().to_owned()),
		Message::Binary(data) => Inbound::Text(String::from_utf8_lossy(&data).into_owned()),
		Message::Close(_) => Inbound::Close,
		Message::Ping(_) | Message::Pong(_) => Inbound::Ignore,
	}
}

#[cfg(test)]
mod tests {
	use axum::http::HeaderValue;

	use super::*;

	#[test]
	fn test_requested_protocol_takes_first_offer() {
		let mut headers = HeaderMap::new();
		assert_eq!(requested_protocol(&headers), None);

		headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static("chat, superchat"));
		assert_eq!(requested_protocol(&headers).as_deref(), Some("chat"));

		headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(" "));
		assert_eq!(requested_protocol(&headers), None);
	}
}
