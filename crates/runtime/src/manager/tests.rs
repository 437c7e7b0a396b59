use std::time::Instant;

use super::*;

const DEADLINE: Duration = Duration::from_secs(10);
const TICK: Duration = Duration::from_millis(50);

fn transport() -> TokioTransport {
	TokioTransport::start(&RuntimeConfig {
		worker_threads: 2,
		handle_signals: false,
		..RuntimeConfig::default()
	})
	.unwrap()
}

/// Polls until `pred` matches an event, returning everything seen so far.
fn poll_until<F>(transport: &mut TokioTransport, pred: F) -> Vec<Event>
where
	F: Fn(&Event) -> bool,
{
	let start = Instant::now();
	let mut seen = Vec::new();
	while start.elapsed() < DEADLINE {
		let events = transport.poll(TICK);
		let done = events.iter().any(&pred);
		seen.extend(events);
		if done {
			return seen;
		}
	}
	panic!("condition not met within {DEADLINE:?}; saw {seen:?}");
}

/// Binds a loopback listener and connects one client to it.
fn connected_pair(transport: &mut TokioTransport) -> (ConnId, ConnId, ConnId) {
	let listener = transport.listen("127.0.0.1:0").unwrap();
	let addr = transport.local_addr(listener).unwrap();
	let client = transport
		.connect(&format!("ws://{addr}/chat"), None)
		.unwrap();

	let mut peer = None;
	let mut opened = false;
	let start = Instant::now();
	while start.elapsed() < DEADLINE && (peer.is_none() || !opened) {
		for event in transport.poll(TICK) {
			match event {
				Event::Accepted {
					listener: l, peer: p, ..
				} if l == listener => peer = Some(p),
				Event::Opened { conn } if conn == client => opened = true,
				_ => {}
			}
		}
	}
	assert!(opened, "client never opened");
	(listener, client, peer.expect("listener never accepted"))
}

#[test]
fn test_poll_ends_with_tick() {
	let mut transport = transport();
	let events = transport.poll(Duration::from_millis(1));
	assert_eq!(
		events,
		vec![Event::Tick {
			shutdown_requested: false
		}]
	);
}

#[test]
fn test_request_shutdown_is_reported() {
	let mut transport = transport();
	transport.request_shutdown();
	let events = transport.poll(Duration::from_millis(1));
	assert_eq!(
		events.last(),
		Some(&Event::Tick {
			shutdown_requested: true
		})
	);
}

#[test]
fn test_client_and_peer_exchange_frames() {
	let mut transport = transport();
	let (_listener, client, peer) = connected_pair(&mut transport);

	assert!(transport.peer_addr(peer).unwrap().starts_with("127.0.0.1:"));

	transport.send_text(client, "ping").unwrap();
	let seen = poll_until(&mut transport, |e| {
		matches!(e, Event::Message { conn, text } if *conn == peer && text == "ping")
	});
	assert!(!seen.iter().any(|e| matches!(e, Event::Failed { .. })));

	transport.send_text(peer, "pong").unwrap();
	poll_until(&mut transport, |e| {
		matches!(e, Event::Message { conn, text } if *conn == client && text == "pong")
	});
}

#[test]
fn test_close_reaches_both_ends() {
	let mut transport = transport();
	let (_listener, client, peer) = connected_pair(&mut transport);

	transport.mark_closing(client);
	let seen = poll_until(&mut transport, |e| *e == Event::Closed { conn: client });
	if !seen.contains(&Event::Closed { conn: peer }) {
		poll_until(&mut transport, |e| *e == Event::Closed { conn: peer });
	}

	assert!(matches!(
		transport.send_text(client, "late"),
		Err(TransportError::Send(_))
	));
}

#[test]
fn test_stopping_listener_reports_close() {
	let mut transport = transport();
	let listener = transport.listen("127.0.0.1:0").unwrap();
	transport.mark_closing(listener);
	poll_until(&mut transport, |e| *e == Event::Closed { conn: listener });
	assert!(transport.local_addr(listener).is_none());
}

#[test]
fn test_connect_failure_is_reported_once() {
	let mut transport = transport();
	// Grab a free port, then release it so nothing is listening there.
	let port = std::net::TcpListener::bind("127.0.0.1:0")
		.unwrap()
		.local_addr()
		.unwrap()
		.port();

	let conn = transport
		.connect(&format!("ws://127.0.0.1:{port}/"), None)
		.unwrap();
	let seen = poll_until(&mut transport, |e| *e == Event::Closed { conn });

	assert!(seen.iter().any(|e| matches!(
		e,
		Event::Connected { conn: c, status: Err(_) } if *c == conn
	)));
	assert!(!seen.iter().any(|e| *e == Event::Opened { conn }));
}

#[test]
fn test_invalid_url_fails_synchronously() {
	let mut transport = transport();
	assert!(matches!(
		transport.connect("http://127.0.0.1:1/", None),
		Err(TransportError::InvalidUrl { .. })
	));
	assert!(matches!(
		transport.connect("not a url", None),
		Err(TransportError::InvalidUrl { .. })
	));
}

#[test]
fn test_bind_conflict_fails_synchronously() {
	let mut transport = transport();
	let first = transport.listen("127.0.0.1:0").unwrap();
	let taken = transport.local_addr(first).unwrap();

	let err = transport.listen(&taken.to_string()).unwrap_err();
	assert!(matches!(err, TransportError::Bind { .. }));
	assert!(matches!(
		transport.listen("nowhere"),
		Err(TransportError::Bind { .. })
	));
}

#[test]
fn test_shutdown_refuses_new_work() {
	let mut transport = transport();
	transport.shutdown();
	assert!(matches!(
		transport.connect("ws://127.0.0.1:1/", None),
		Err(TransportError::Refused(_))
	));
	assert!(matches!(
		transport.listen("127.0.0.1:0"),
		Err(TransportError::Bind { .. })
	));
	assert!(matches!(
		transport.poll(Duration::from_millis(1)).last(),
		Some(Event::Tick { .. })
	));
}

/// A TCP endpoint that completes the connect but never answers the upgrade.
fn silent_endpoint() -> (std::net::TcpListener, String) {
	let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let url = format!("ws://{}/", listener.local_addr().unwrap());
	(listener, url)
}

#[test]
fn test_close_during_handshake_is_reported() {
	let mut transport = transport();
	let (_silent, url) = silent_endpoint();

	let conn = transport.connect(&url, None).unwrap();
	transport.poll(TICK);
	transport.mark_closing(conn);

	let start = Instant::now();
	let seen = poll_until(&mut transport, |e| *e == Event::Closed { conn });
	// Well inside the default handshake timeout.
	assert!(start.elapsed() < Duration::from_secs(5));
	assert!(!seen.iter().any(|e| *e == Event::Opened { conn }));
	assert!(
		transport.poll(TICK).iter().all(|e| e.conn() != Some(conn)),
		"connection reported after its close"
	);
}

#[test]
fn test_stalled_handshake_times_out() {
	let mut transport = TokioTransport::start(&RuntimeConfig {
		worker_threads: 1,
		handle_signals: false,
		connect_timeout_ms: 200,
	})
	.unwrap();
	let (_silent, url) = silent_endpoint();

	let conn = transport.connect(&url, None).unwrap();
	let seen = poll_until(&mut transport, |e| *e == Event::Closed { conn });

	assert!(seen.iter().any(|e| matches!(
		e,
		Event::Connected { conn: c, status: Err(reason) } if *c == conn && reason.contains("timed out")
	)));
	assert!(!seen.iter().any(|e| *e == Event::Opened { conn }));
}
