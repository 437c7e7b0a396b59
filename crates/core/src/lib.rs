//! wsbridge - handle-based WebSocket sessions for embedding hosts
//!
//! A host (a scripting runtime, a plugin loader, a CLI) creates outbound
//! connections and listeners, exchanges text through integer handles, and
//! pumps an event loop with a bounded wait per tick. This crate is the
//! session core between the two:
//!
//! - **Session**: per-connection state machine, role and buffers
//! - **Registry**: handle allocation and deferred destruction
//! - **Broadcast group**: listener fan-out to accepted peers
//! - **Dispatcher**: turns manager events into session transitions
//! - **Bridge / host**: the host-facing operations and `(ok, value)` replies
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  Call / Reply
//! │     host     │───────────────┐
//! └──────────────┘               │
//!                         ┌──────▼──────┐
//!                         │   Bridge    │  Registry + Sessions
//!                         └──────┬──────┘
//!             Transport trait    │   ▲  Event (per poll tick)
//!                         ┌──────▼───┴──┐
//!                         │   manager   │  wsbridge-runtime
//!                         └─────────────┘
//! ```
//!
//! Everything runs on the host thread. The manager only reports progress
//! from inside [`Bridge::poll`], so sessions need no locking.

pub mod bridge;
pub mod broadcast;
pub mod config;
mod dispatch;
pub mod error;
pub mod host;
pub mod registry;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::Bridge;
pub use broadcast::{BroadcastGroup, Delivery, Peer};
pub use config::{Config, ConfigError, RelayConfig};
pub use error::{Error, Result, TransportError};
pub use host::{Call, CallError, Reply};
pub use registry::{Owner, Registry};
pub use session::{Handle, Role, Session, State};
pub use transport::{ConnId, Event, Transport};
