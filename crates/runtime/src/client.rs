//! Outbound connections over tokio-tungstenite.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Notify, mpsc};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tracing::{debug, info};
use wsbridge::{ConnId, Event, TransportError};

use crate::link::{Inbound, Outbound, Shared, read_loop, write_loop};

/// Builds the handshake request, rejecting anything that is not ws/wss.
pub(crate) fn build_request(url: &str, protocol: Option<&str>) -> Result<Request, TransportError> {
	let invalid = |reason: String| TransportError::InvalidUrl {
		url: url.to_string(),
		reason,
	};

	let scheme = url.split_once("://").map(|(scheme, _)| scheme);
	if !matches!(scheme, Some("ws" | "wss")) {
		return Err(invalid("expected a ws:// or wss:// url".to_string()));
	}

	let mut request = url
		.into_client_request()
		.map_err(|e| invalid(e.to_string()))?;
	if let Some(protocol) = protocol {
		let value = HeaderValue::from_str(protocol).map_err(|e| invalid(e.to_string()))?;
		request.headers_mut().insert("Sec-WebSocket-Protocol", value);
	}
	Ok(request)
}

/// Drives one outbound connection from handshake to close.
///
/// The handshake is bounded by `connect_timeout` and abandoned as soon as a
/// close is requested. Either way the connection still ends with exactly
/// one `Closed`.
pub(crate) async fn run(
	shared: Arc<Shared>,
	conn: ConnId,
	request: Request,
	mut rx: mpsc::UnboundedReceiver<Outbound>,
	connect_timeout: Duration,
) {
	let uri = request.uri().to_string();
	let mut early = Vec::new();
	let outcome = tokio::select! {
		result = tokio::time::timeout(connect_timeout, connect_async(request)) => result,
		() = close_requested(&mut rx, &mut early) => {
			debug!(target = "wsbridge.runtime", %conn, %uri, "close requested during handshake");
			shared.finish(conn);
			return;
		}
	};

	let handshake = match outcome {
		Ok(Ok((stream, response))) => {
			info!(target = "wsbridge.runtime", %conn, %uri, status = %response.status(), "connected");
			Ok(stream)
		}
		Ok(Err(err)) => Err(err.to_string()),
		Err(_) => Err(format!("handshake timed out after {}ms", connect_timeout.as_millis())),
	};
	let stream = match handshake {
		Ok(stream) => stream,
		Err(reason) => {
			debug!(target = "wsbridge.runtime", %conn, %uri, %reason, "connect failed");
			shared.emit(Event::Connected {
				conn,
				status: Err(reason),
			});
			shared.finish(conn);
			return;
		}
	};
	shared.emit(Event::Connected {
		conn,
		status: Ok(()),
	});
	shared.emit(Event::Opened { conn });

	let (mut sink, source) = stream.split();
	for text in early {
		if sink.send(Message::Text(text)).await.is_err() {
			break;
		}
	}
	let closing = Arc::new(Notify::new());
	let send_task = tokio::spawn(write_loop(
		sink,
		rx,
		Arc::clone(&closing),
		Message::Text,
		|| Message::Close(None),
	));

	read_loop(&shared, conn, source, closing, classify).await;

	send_task.abort();
	shared.finish(conn);
	debug!(target = "wsbridge.runtime", %conn, "client connection finished");
}

/// Resolves once `Outbound::Close` is queued. Text queued before the
/// handshake completes is kept in `early`, in order.
async fn close_requested(rx: &mut mpsc::UnboundedReceiver<Outbound>, early: &mut Vec<String>) {
	while let Some(out) = rx.recv().await {
		match out {
			Outbound::Text(text) => early.push(text),
			Outbound::Close => return,
		}
	}
	// The link outlives this task, so a closed channel means nobody can
	// ask for a close any more.
	std::future::pending::<()>().await
}

fn classify(msg: Message) -> Inbound {
	match msg {
		Message::Text(text) => Inbound::Text(text),
		Message::Binary(data) => Inbound::Text(String::from_utf8_lossy(&data).into_owned()),
		Message::Close(_) => Inbound::Close,
		Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Inbound::Ignore,
	}
}
