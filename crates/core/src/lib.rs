//! Async Home Assistant WebSocket client.
//!
//! [`Client`] wraps a multiplexed [`Session`]: one authenticated connection
//! carrying concurrent requests and event subscriptions, kept alive with a
//! heartbeat and re-established with backoff when it drops. Subscriptions are
//! replayed on the new connection with their original callbacks.
//!
//! # Example
//!
//! ```ignore
//! use hass::{Client, ServiceCall, SessionConfig};
//! use serde_json::json;
//!
//! let client = Client::connect("http://homeassistant.local:8123", &token, SessionConfig::default()).await?;
//!
//! client
//!     .subscribe_events(Some("state_changed"), |event| {
//!         println!("{}", event["data"]["entity_id"]);
//!     })
//!     .await?;
//!
//! client
//!     .call_service(ServiceCall::new("light", "toggle").target(json!({"entity_id": "light.kitchen"})))
//!     .await?;
//!
//! client.close().await;
//! ```
//!
//! # Crates
//!
//! - `hass-protocol`: wire frames and codec, re-exported as [`protocol`]
//! - `hass-runtime`: transport, correlation, session lifecycle, re-exported as [`runtime`]

mod client;
pub mod flow;

pub use client::{Client, DEFAULT_TOKEN_LIFESPAN_DAYS, ServiceCall};
pub use flow::{FlowProgress, wait_for_event, wait_for_flow_progress};
pub use hass_protocol as protocol;
pub use hass_protocol::Command;
pub use hass_runtime as runtime;
pub use hass_runtime::{
	Connector, Error, MemoryConnector, Result, Session, SessionBuilder, SessionConfig, SessionState,
	WebSocketConnector,
};
