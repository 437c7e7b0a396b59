//! Marshaling boundary for embedding hosts.
//!
//! Hosts only deal in handles, text and booleans, and never see errors as
//! such: every call produces a [`Reply`] carrying a success flag and either
//! the return value or the failure message.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::bridge::Bridge;
use crate::error::Result;
use crate::session::Handle;
use crate::transport::Transport;

/// One host API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	Create {
		url: String,
		protocol: Option<String>,
	},
	Listen {
		address: String,
	},
	Send {
		handle: Handle,
		message: String,
	},
	Receive {
		handle: Handle,
	},
	Open {
		handle: Handle,
	},
	Close {
		handle: Handle,
	},
	/// One manager tick; `None` uses the configured wait.
	Poll {
		wait_ms: Option<u64>,
	},
	DrainLog {
		handle: Handle,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
	#[error("empty call")]
	Empty,

	#[error("unknown call '{0}'")]
	Unknown(String),

	#[error("{call}: missing argument '{arg}'")]
	MissingArgument {
		call: &'static str,
		arg: &'static str,
	},

	#[error("{call}: '{value}' is not a number")]
	NotANumber { call: &'static str, value: String },
}

impl Call {
	/// Parses `name arg...`. Names are case-insensitive. For `send`, the
	/// message is everything after the handle, spaces included.
	pub fn parse(line: &str) -> std::result::Result<Self, CallError> {
		let line = line.trim_start();
		let (name, rest) = split_word(line);
		if name.is_empty() {
			return Err(CallError::Empty);
		}
		match name.to_ascii_lowercase().as_str() {
			"create" => {
				let (url, rest) = split_word(rest);
				let (protocol, _) = split_word(rest);
				Ok(Call::Create {
					url: required("create", "url", url)?.to_string(),
					protocol: (!protocol.is_empty()).then(|| protocol.to_string()),
				})
			}
			"listen" => {
				let (address, _) = split_word(rest);
				Ok(Call::Listen {
					address: required("listen", "address", address)?.to_string(),
				})
			}
			"send" => {
				let (handle, rest) = split_word(rest);
				let message = rest.strip_prefix(' ').unwrap_or(rest);
				Ok(Call::Send {
					handle: parse_handle("send", handle)?,
					message: message.to_string(),
				})
			}
			"receive" => Ok(Call::Receive {
				handle: parse_handle("receive", split_word(rest).0)?,
			}),
			"open" => Ok(Call::Open {
				handle: parse_handle("open", split_word(rest).0)?,
			}),
			"close" => Ok(Call::Close {
				handle: parse_handle("close", split_word(rest).0)?,
			}),
			"poll" => {
				let (wait, _) = split_word(rest);
				let wait_ms = if wait.is_empty() {
					None
				} else {
					Some(wait.parse().map_err(|_| CallError::NotANumber {
						call: "poll",
						value: wait.to_string(),
					})?)
				};
				Ok(Call::Poll { wait_ms })
			}
			"log" | "drain_log" => Ok(Call::DrainLog {
				handle: parse_handle("log", split_word(rest).0)?,
			}),
			other => Err(CallError::Unknown(other.to_string())),
		}
	}
}

fn split_word(s: &str) -> (&str, &str) {
	let s = s.trim_start();
	match s.find(char::is_whitespace) {
		Some(idx) => (&s[..idx], &s[idx..]),
		None => (s, ""),
	}
}

fn required<'a>(
	call: &'static str,
	arg: &'static str,
	value: &'a str,
) -> std::result::Result<&'a str, CallError> {
	if value.is_empty() {
		Err(CallError::MissingArgument { call, arg })
	} else {
		Ok(value)
	}
}

fn parse_handle(call: &'static str, value: &str) -> std::result::Result<Handle, CallError> {
	let value = required(call, "handle", value)?;
	value
		.parse()
		.map(Handle)
		.map_err(|_| CallError::NotANumber {
			call,
			value: value.to_string(),
		})
}

/// The `(success, value)` pair handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
	pub ok: bool,
	pub value: String,
}

impl Reply {
	pub fn success(value: impl Into<String>) -> Self {
		Self {
			ok: true,
			value: value.into(),
		}
	}

	pub fn failure(message: impl Into<String>) -> Self {
		Self {
			ok: false,
			value: message.into(),
		}
	}

	fn flag(value: bool) -> Self {
		Self::success(if value { "1" } else { "0" })
	}
}

impl<V: Into<Reply>> From<Result<V>> for Reply {
	fn from(result: Result<V>) -> Self {
		match result {
			Ok(value) => value.into(),
			Err(err) => Reply::failure(err.host_message()),
		}
	}
}

impl From<Handle> for Reply {
	fn from(handle: Handle) -> Self {
		Reply::success(handle.to_string())
	}
}

impl From<String> for Reply {
	fn from(text: String) -> Self {
		Reply::success(text)
	}
}

impl From<bool> for Reply {
	fn from(value: bool) -> Self {
		Reply::flag(value)
	}
}

impl From<()> for Reply {
	fn from(_: ()) -> Self {
		Reply::flag(true)
	}
}

impl From<Vec<String>> for Reply {
	fn from(lines: Vec<String>) -> Self {
		Reply::success(lines.join("\n"))
	}
}

impl fmt::Display for Reply {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tag = if self.ok { "ok" } else { "err" };
		if self.value.is_empty() {
			write!(f, "{tag}")
		} else {
			write!(f, "{tag} {}", self.value)
		}
	}
}

impl<T: Transport> Bridge<T> {
	/// Executes a host call and marshals the outcome.
	pub fn call(&mut self, call: Call) -> Reply {
		match call {
			Call::Create { url, protocol } => self.create(&url, protocol.as_deref()).into(),
			Call::Listen { address } => self.listen(&address).into(),
			Call::Send { handle, message } => self.send(handle, &message).into(),
			Call::Receive { handle } => self.receive(handle).into(),
			Call::Open { handle } => self.open(handle).into(),
			Call::Close { handle } => self.close(handle).into(),
			Call::Poll { wait_ms } => {
				let wait = wait_ms.map_or_else(|| self.config().poll_wait(), Duration::from_millis);
				Reply::flag(self.poll(wait))
			}
			Call::DrainLog { handle } => self.drain_log(handle).into(),
		}
	}
}
