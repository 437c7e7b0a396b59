//! End-to-end: the session core driving real sockets on loopback.

use std::time::{Duration, Instant};

use wsbridge::{Bridge, Config, Handle, Role, State};
use wsbridge_runtime::{RuntimeConfig, TokioTransport};

const DEADLINE: Duration = Duration::from_secs(10);
const TICK: Duration = Duration::from_millis(20);

fn bridge() -> Bridge<TokioTransport> {
	let transport = TokioTransport::start(&RuntimeConfig {
		worker_threads: 2,
		handle_signals: false,
		..RuntimeConfig::default()
	})
	.unwrap();
	Bridge::init(transport, Config::default())
}

fn wait_for<F>(bridge: &mut Bridge<TokioTransport>, mut cond: F)
where
	F: FnMut(&mut Bridge<TokioTransport>) -> bool,
{
	let start = Instant::now();
	while start.elapsed() < DEADLINE {
		bridge.poll(TICK);
		if cond(bridge) {
			return;
		}
	}
	panic!("condition not met within {DEADLINE:?}");
}

fn listen_url(bridge: &Bridge<TokioTransport>, handle: Handle) -> String {
	let conn = bridge.session(handle).unwrap().transport().unwrap();
	let addr = bridge.transport().local_addr(conn).unwrap();
	format!("ws://{addr}/")
}

fn peers(bridge: &Bridge<TokioTransport>, handle: Handle) -> usize {
	bridge.session(handle).map_or(0, |s| s.peers().len())
}

/// Collects everything a client receives until `expected` shows up.
fn receive_until(bridge: &mut Bridge<TokioTransport>, handle: Handle, expected: &str) -> String {
	let mut got = String::new();
	wait_for(bridge, |b| {
		got.push_str(&b.receive(handle).unwrap());
		got.contains(expected)
	});
	got
}

#[test]
fn test_client_listener_round_trip() {
	let mut bridge = bridge();
	let server = bridge.listen("127.0.0.1:0").unwrap();
	assert!(bridge.open(server).unwrap());
	let url = listen_url(&bridge, server);

	let client = bridge.create(&url, None).unwrap();
	assert!(server < client);
	assert_eq!(bridge.session(client).unwrap().state(), State::Init);

	// Queued while connecting, flushed as a single frame once open.
	bridge.send(client, "A").unwrap();
	bridge.send(client, "B").unwrap();
	wait_for(&mut bridge, |b| {
		b.session(client).unwrap().state() == State::Open && peers(b, server) == 1
	});

	let mut log = Vec::new();
	wait_for(&mut bridge, |b| {
		log.extend(b.drain_log(server).unwrap());
		!log.is_empty()
	});
	assert_eq!(log.len(), 1);
	assert!(log[0].ends_with(" AB"), "unexpected log entry {:?}", log[0]);

	bridge.send(server, "hi").unwrap();
	assert_eq!(receive_until(&mut bridge, client, "hi"), "hi");
	assert_eq!(bridge.receive(server).unwrap(), "");

	let transport = bridge.shutdown();
	drop(transport);
}

#[test]
fn test_broadcast_and_relay_between_clients() {
	let mut bridge = bridge();
	let server = bridge.listen("127.0.0.1:0").unwrap();
	let url = listen_url(&bridge, server);

	let alice = bridge.create(&url, None).unwrap();
	let bob = bridge.create(&url, Some("chat")).unwrap();
	wait_for(&mut bridge, |b| {
		peers(b, server) == 2
			&& b.session(alice).unwrap().state() == State::Open
			&& b.session(bob).unwrap().state() == State::Open
	});
	assert_eq!(bridge.session(server).unwrap().role(), Role::Server);

	bridge.send(server, "everyone").unwrap();
	assert_eq!(receive_until(&mut bridge, alice, "everyone"), "everyone");
	assert_eq!(receive_until(&mut bridge, bob, "everyone"), "everyone");

	// A frame from one client is relayed to the other, tagged with its address.
	bridge.send(alice, "from alice").unwrap();
	let relayed = receive_until(&mut bridge, bob, "from alice");
	assert!(relayed.starts_with("127.0.0.1:"), "untagged relay: {relayed:?}");
	bridge.poll(TICK);
	assert_eq!(bridge.receive(alice).unwrap(), "");

	bridge.shutdown();
}

#[test]
fn test_close_is_observed_on_a_later_tick() {
	let mut bridge = bridge();
	let server = bridge.listen("127.0.0.1:0").unwrap();
	let url = listen_url(&bridge, server);
	let client = bridge.create(&url, None).unwrap();
	wait_for(&mut bridge, |b| {
		b.session(client).unwrap().state() == State::Open && peers(b, server) == 1
	});

	bridge.close(client).unwrap();
	assert!(bridge.open(client).unwrap());

	wait_for(&mut bridge, |b| {
		b.session(client).unwrap().is_closed() && peers(b, server) == 0
	});
	assert!(bridge.open(server).unwrap());

	assert_eq!(
		bridge.send(client, "late").unwrap_err().host_message(),
		"Connection closed"
	);
	assert_eq!(
		bridge.send(client, "later").unwrap_err().host_message(),
		"Invalid connection identifier"
	);

	bridge.shutdown();
}

#[test]
fn test_unreachable_server_closes_client() {
	let mut bridge = bridge();
	let port = std::net::TcpListener::bind("127.0.0.1:0")
		.unwrap()
		.local_addr()
		.unwrap()
		.port();

	let client = bridge
		.create(&format!("ws://127.0.0.1:{port}/"), None)
		.unwrap();
	wait_for(&mut bridge, |b| b.session(client).unwrap().is_closed());
	assert!(bridge.open(client).unwrap_err().is_closed());

	bridge.shutdown();
}

#[test]
fn test_synchronous_failures() {
	let mut bridge = bridge();
	assert_eq!(
		bridge.create("http://127.0.0.1/", None).unwrap_err().host_message(),
		"Invalid url"
	);
	let server = bridge.listen("127.0.0.1:0").unwrap();
	let conn = bridge.session(server).unwrap().transport().unwrap();
	let taken = bridge.transport().local_addr(conn).unwrap();
	assert_eq!(
		bridge.listen(&taken.to_string()).unwrap_err().host_message(),
		"Listen failed"
	);

	bridge.shutdown();
}

#[test]
fn test_close_while_connecting_releases_session() {
	let mut bridge = bridge();
	let silent = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
	let url = format!("ws://{}/", silent.local_addr().unwrap());

	let client = bridge.create(&url, None).unwrap();
	bridge.poll(TICK);
	bridge.close(client).unwrap();
	assert!(bridge.open(client).unwrap());

	wait_for(&mut bridge, |b| b.session(client).unwrap().is_closed());
	assert!(bridge.open(client).unwrap_err().is_closed());
	assert!(bridge.open(client).unwrap_err().is_lookup());

	drop(silent);
	bridge.shutdown();
}
