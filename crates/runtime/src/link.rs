//! State shared between the host thread and connection tasks, and the
//! per-socket read/write loops used by both clients and accepted peers.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, trace, warn};
use wsbridge::{ConnId, Event};

/// How long a closing socket waits for the peer's close reply.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Work queued for a socket's writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
	Text(String),
	Close,
}

/// What a reader makes of one incoming frame.
pub(crate) enum Inbound {
	Text(String),
	Close,
	Ignore,
}

/// Writer side of a live socket.
pub(crate) struct Link {
	pub tx: mpsc::UnboundedSender<Outbound>,
	pub addr: Option<String>,
}

pub(crate) struct Shared {
	next_conn: AtomicU64,
	pub links: DashMap<ConnId, Link>,
	events: mpsc::UnboundedSender<Event>,
	pub shutdown_requested: AtomicBool,
}

impl Shared {
	pub fn new(events: mpsc::UnboundedSender<Event>) -> Self {
		Self {
			next_conn: AtomicU64::new(1),
			links: DashMap::new(),
			events,
			shutdown_requested: AtomicBool::new(false),
		}
	}

	pub fn alloc(&self) -> ConnId {
		ConnId(self.next_conn.fetch_add(1, Ordering::Relaxed))
	}

	/// Registers a writer for `conn` and returns the receiving end.
	pub fn open_link(
		&self,
		conn: ConnId,
		addr: Option<String>,
	) -> mpsc::UnboundedReceiver<Outbound> {
		let (tx, rx) = mpsc::unbounded_channel();
		self.links.insert(conn, Link { tx, addr });
		rx
	}

	pub fn emit(&self, event: Event) {
		if self.events.send(event).is_err() {
			trace!(target = "wsbridge.runtime", "event dropped; manager gone");
		}
	}

	/// Forgets `conn` and reports it closed. Called once per connection.
	pub fn finish(&self, conn: ConnId) {
		self.links.remove(&conn);
		self.emit(Event::Closed { conn });
	}
}

/// Drains `rx` into `sink` until a close is requested or the socket breaks.
pub(crate) async fn write_loop<K, M>(
	mut sink: K,
	rx: mpsc::UnboundedReceiver<Outbound>,
	closing: Arc<Notify>,
	text: fn(String) -> M,
	close: fn() -> M,
) where
	K: Sink<M> + Unpin,
{
	let mut rx = UnboundedReceiverStream::new(rx);
	while let Some(out) = rx.next().await {
		match out {
			Outbound::Text(body) => {
				if sink.send(text(body)).await.is_err() {
					break;
				}
			}
			Outbound::Close => {
				let _ = sink.send(close()).await;
				break;
			}
		}
	}
	closing.notify_one();
}

/// Reads frames from `source` and emits them as events for `conn`.
///
/// Once the writer side signals `closing`, keeps reading for at most
/// [`CLOSE_TIMEOUT`] so the close handshake can complete.
pub(crate) async fn read_loop<S, M, E, F>(
	shared: &Shared,
	conn: ConnId,
	mut source: S,
	closing: Arc<Notify>,
	classify: F,
) where
	S: Stream<Item = Result<M, E>> + Unpin,
	E: Display,
	F: Fn(M) -> Inbound,
{
	loop {
		tokio::select! {
			next = source.next() => {
				if !handle_frame(shared, conn, next, &classify) {
					return;
				}
			}
			_ = closing.notified() => break,
		}
	}

	let drain = async {
		while handle_frame(shared, conn, source.next().await, &classify) {}
	};
	if tokio::time::timeout(CLOSE_TIMEOUT, drain).await.is_err() {
		debug!(target = "wsbridge.runtime", %conn, "close handshake timed out");
	}
}

/// Returns false once the socket is done.
fn handle_frame<M, E, F>(
	shared: &Shared,
	conn: ConnId,
	next: Option<Result<M, E>>,
	classify: &F,
) -> bool
where
	E: Display,
	F: Fn(M) -> Inbound,
{
	match next {
		Some(Ok(msg)) => match classify(msg) {
			Inbound::Text(text) => {
				shared.emit(Event::Message { conn, text });
				true
			}
			Inbound::Close => false,
			Inbound::Ignore => true,
		},
		Some(Err(err)) => {
			warn!(target = "wsbridge.runtime", %conn, error = %err, "websocket error");
			shared.emit(Event::Failed {
				conn,
				reason: err.to_string(),
			});
			false
		}
		None => false,
	}
}
