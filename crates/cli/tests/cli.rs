//! Runs the `wsbridge` binary the way a host script would.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

fn wsbridge_binary() -> PathBuf {
	PathBuf::from(env!("CARGO_BIN_EXE_wsbridge"))
}

fn run_with_stdin(args: &[&str], stdin: &str) -> Output {
	let mut child = Command::new(wsbridge_binary())
		.args(args)
		.env_remove("WSBRIDGE_POLL_MS")
		.env_remove("RUST_LOG")
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.expect("failed to execute wsbridge");
	child
		.stdin
		.take()
		.unwrap()
		.write_all(stdin.as_bytes())
		.unwrap();
	child.wait_with_output().unwrap()
}

#[test]
fn repl_answers_each_line() {
	let output = run_with_stdin(
		&["repl"],
		"listen 127.0.0.1:0\nsend 1 hello everyone\nreceive 2\nlog 1\npoll 5\n",
	);
	assert!(output.status.success());

	let stdout = String::from_utf8_lossy(&output.stdout);
	let replies: Vec<&str> = stdout.lines().collect();
	assert_eq!(
		replies,
		vec!["ok 1", "ok 1", "err Invalid connection identifier", "ok", "ok 0"]
	);
}

#[test]
fn connect_rejects_non_websocket_url() {
	let output = run_with_stdin(&["connect", "http://127.0.0.1:1/"], "");
	assert!(!output.status.success());

	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(
		stderr.contains("create: Invalid url"),
		"unexpected stderr: {stderr}"
	);
}

#[test]
fn unreadable_config_fails_before_starting() {
	let dir = tempfile::tempdir().unwrap();
	let config = dir.path().join("bridge.json");
	std::fs::write(&config, "{ not json").unwrap();

	let output = run_with_stdin(&["--config", config.to_str().unwrap(), "repl"], "");
	assert!(!output.status.success());

	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("loading configuration"), "unexpected stderr: {stderr}");
	assert!(stderr.contains("invalid config"), "unexpected stderr: {stderr}");
}

#[test]
fn bad_poll_env_is_rejected() {
	let output = Command::new(wsbridge_binary())
		.arg("repl")
		.env("WSBRIDGE_POLL_MS", "soon")
		.stdin(Stdio::null())
		.output()
		.unwrap();
	assert!(!output.status.success());
	assert!(String::from_utf8_lossy(&output.stderr).contains("WSBRIDGE_POLL_MS"));
}
