//! Transport layer: duplex text-message connections.
//!
//! A [`Connector`] opens a connection and hands back [`TransportParts`]: a
//! sender owned by the session's outbound section and a receiver owned by the
//! receive loop. Two implementations ship with the crate:
//!
//! - [`WebSocketConnector`] - `ws://` / `wss://` via `tokio-tungstenite`
//! - [`MemoryConnector`] - in-process channels, for tests and embedding

use std::future::Future;
use std::pin::Pin;

use crate::error::Result;

mod memory;
mod websocket;

pub use memory::{MemoryConnector, MemoryListener, MemoryPeer};
pub use websocket::{WebSocketConnector, WebSocketReceiver, WebSocketSender};

/// Writing half of a connection.
pub trait TransportSender: Send {
	/// Sends one text message.
	fn send(&mut self, text: String) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

	/// Closes the connection. Later sends fail.
	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Reading half of a connection.
pub trait TransportReceiver: Send {
	/// Waits for the next text message.
	///
	/// Returns `None` once the peer has closed the connection.
	fn recv(&mut self) -> Pin<Box<dyn Future<Output = Option<Result<String>>> + Send + '_>>;
}

/// Both halves of an open connection.
pub struct TransportParts {
	pub sender: Box<dyn TransportSender>,
	pub receiver: Box<dyn TransportReceiver>,
}

/// Opens connections to an endpoint.
pub trait Connector: Send + Sync {
	fn connect<'a>(
		&'a self,
		url: &'a str,
	) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>>;
}
