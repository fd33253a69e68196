//! Home Assistant Runtime - Session, correlation, and subscriptions
//!
//! This crate provides the connection machinery for talking to a Home
//! Assistant instance over its WebSocket API:
//!
//! - **Transport**: Duplex text messages over WebSocket or in-process channels
//! - **Connection**: Request/reply correlation and event subscription routing
//! - **Session**: Handshake, heartbeat, reconnect with backoff, subscription replay
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   hass-ws    │  Typed command facade, flow helpers
//! └──────┬───────┘
//!        │ Session::request / subscribe
//! ┌──────▼───────┐
//! │ hass-runtime │  This crate
//! │  ┌─────────┐ │
//! │  │ Session │ │  Lifecycle, heartbeat, recovery
//! │  └─────────┘ │
//! │  ┌─────────┐ │
//! │  │ Conn    │ │  Correlation + subscription tables
//! │  └─────────┘ │
//! │  ┌─────────┐ │
//! │  │ Trans   │ │  WebSocket / memory transport
//! │  └─────────┘ │
//! └──────────────┘
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod session;
pub mod transport;

// Re-export key types at crate root
pub use config::SessionConfig;
pub use connection::{EventCallback, ReplayDescriptor};
pub use error::{Error, Result};
pub use session::{ReconnectHook, Session, SessionBuilder, SessionState};
pub use transport::{
	Connector, MemoryConnector, MemoryListener, MemoryPeer, TransportParts, TransportReceiver,
	TransportSender, WebSocketConnector,
};
