//! Error types for the session runtime.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the server.
#[derive(Debug, Error)]
pub enum Error {
	/// The server rejected the credential. Never retried automatically.
	#[error("Authentication failed: {0}")]
	Auth(String),

	/// The transport dropped while the request was outstanding.
	#[error("Connection lost: {0}")]
	ConnectionLost(String),

	/// The session was closed explicitly.
	#[error("Session closed")]
	Closed,

	/// The server answered `success: false`.
	#[error("Request failed: {error}")]
	Request {
		/// Server-supplied error payload, usually `{"code", "message"}`.
		error: Value,
	},

	/// No reply within the configured window. The server may still act on it.
	#[error("Timeout after {}ms waiting for reply to request {id}", .after.as_millis())]
	Timeout { id: u64, after: Duration },

	/// The server broke the protocol (handshake order, reply shape).
	#[error("Protocol error: {0}")]
	Protocol(String),

	/// Transport-level failure (connect, read or write).
	#[error("Transport error: {0}")]
	Transport(String),

	/// The base address could not be turned into a WebSocket endpoint.
	#[error("Invalid URL: {0}")]
	InvalidUrl(String),

	/// A completion handle was registered twice under the same id.
	#[error("Request id {0} is already in flight")]
	DuplicateId(u64),
}

impl Error {
	/// True for failures tied to the connection rather than the request.
	pub fn is_connection_error(&self) -> bool {
		matches!(
			self,
			Error::ConnectionLost(_) | Error::Closed | Error::Timeout { .. } | Error::Transport(_)
		)
	}

	/// Returns true if this is a timeout error.
	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout { .. })
	}

	/// Returns true if the credential was rejected.
	pub fn is_auth_failure(&self) -> bool {
		matches!(self, Error::Auth(_))
	}

	/// The server's error code, for request failures that carry one.
	pub fn error_code(&self) -> Option<&str> {
		match self {
			Error::Request { error } => error.get("code").and_then(Value::as_str),
			_ => None,
		}
	}

	/// The server's error message, for request failures that carry one.
	pub fn error_message(&self) -> Option<&str> {
		match self {
			Error::Request { error } => error.get("message").and_then(Value::as_str),
			_ => None,
		}
	}
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
	fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
		Error::Transport(err.to_string())
	}
}
