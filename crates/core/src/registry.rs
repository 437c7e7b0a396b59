//! Handle allocation, lookup and deferred destruction of sessions.
//!
//! Sessions that reach `Closed` stay in the table as tombstones until the
//! host touches the handle again. Event callbacks that still reference the
//! handle therefore never observe it disappearing mid-dispatch.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::{Error, Result};
use crate::session::{Handle, Session};
use crate::transport::ConnId;


/// What a manager connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
	/// The connection is the session's own socket (client or listener).
	Session(Handle),
	/// The connection is a peer accepted by the listener session.
	Peer { listener: Handle },
}

impl Owner {
	pub fn handle(self) -> Handle {
		match self {
			Owner::Session(handle) | Owner::Peer { listener: handle } => handle,
		}
	}
}

#[derive(Debug)]
pub struct Registry {
	sessions: BTreeMap<Handle, Session>,
	owners: HashMap<ConnId, Owner>,
	next_handle: u32,
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

impl Registry {
	pub fn new() -> Self {
		Self {
			sessions: BTreeMap::new(),
			owners: HashMap::new(),
			next_handle: 1,
		}
	}

	/// Inserts a fresh `Unset`/`Init` session under the next handle.
	///
	/// Fails once the handle space is used up; handles are never recycled.
	pub fn allocate(&mut self) -> Result<Handle> {
		let handle = Handle(self.next_handle);
		self.next_handle = self
			.next_handle
			.checked_add(1)
			.ok_or(Error::HandlesExhausted)?;
		self.sessions.insert(handle, Session::new(handle));
		Ok(handle)
	}

	/// Host-side lookup.
	///
	/// A session found in `Closed` is destroyed before returning
	/// [`Error::ConnectionClosed`]; every later lookup of that handle fails
	/// with [`Error::InvalidHandle`].
	pub fn lookup(&mut self, handle: Handle) -> Result<&mut Session> {
		let closed = match self.sessions.get(&handle) {
			None => return Err(Error::InvalidHandle(handle)),
			Some(session) => session.is_closed(),
		};
		if closed {
			self.remove(handle);
			return Err(Error::ConnectionClosed(handle));
		}
		self.sessions
			.get_mut(&handle)
			.ok_or(Error::InvalidHandle(handle))
	}

	/// Event-side access. Never destroys anything.
	pub fn get(&self, handle: Handle) -> Option<&Session> {
		self.sessions.get(&handle)
	}

	pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Session> {
		self.sessions.get_mut(&handle)
	}

	/// Routes events on `conn` to `owner`.
	pub fn associate(&mut self, conn: ConnId, owner: Owner) {
		self.owners.insert(conn, owner);
	}

	pub fn dissociate(&mut self, conn: ConnId) -> Option<Owner> {
		self.owners.remove(&conn)
	}

	pub fn owner(&self, conn: ConnId) -> Option<Owner> {
		self.owners.get(&conn).copied()
	}

	/// Destroys a session and forgets every connection routed to it.
	pub fn remove(&mut self, handle: Handle) -> Option<Session> {
		let session = self.sessions.remove(&handle)?;
		self.owners.retain(|_, owner| owner.handle() != handle);
		debug!(target = "wsbridge", %handle, state = ?session.state(), "session destroyed");
		Some(session)
	}

	/// Removes every session regardless of state.
	pub fn drain(&mut self) -> Vec<Session> {
		self.owners.clear();
		std::mem::take(&mut self.sessions).into_values().collect()
	}

	pub fn len(&self) -> usize {
		self.sessions.len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.is_empty()
	}
}
