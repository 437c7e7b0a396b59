//! wsbridge runtime - the event-loop manager behind [`wsbridge::Bridge`]
//!
//! Owns every socket on a private tokio runtime:
//!
//! - **Clients**: tokio-tungstenite handshakes (`ws://`, `wss://` via rustls)
//! - **Listeners**: an axum app upgrading any request path to WebSocket
//! - **Signals**: SIGINT/SIGTERM become "shutdown requested" on the next tick
//!
//! Progress is queued on a channel and handed to the session core one tick
//! at a time through [`wsbridge::Transport::poll`].

pub mod address;
mod client;
pub mod config;
mod link;
pub mod manager;
mod server;
mod signal;

pub use address::resolve_listen_address;
pub use config::RuntimeConfig;
pub use manager::TokioTransport;
