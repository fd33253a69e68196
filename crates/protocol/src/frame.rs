//! Inbound frame types.
//!
//! Every message from the server carries a `type` discriminator. The known
//! discriminators map to [`InboundFrame`] variants; anything else is kept
//! verbatim in [`InboundFrame::Unknown`] so callers can log it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frame sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundFrame {
	/// First frame of every connection; the client must answer with `auth`.
	AuthRequired {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		ha_version: Option<String>,
	},
	/// Credential accepted.
	AuthOk {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		ha_version: Option<String>,
	},
	/// Credential rejected.
	AuthInvalid {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		message: Option<String>,
	},
	/// Reply to an id-bearing command.
	Result(ResultFrame),
	/// Push for an active subscription.
	Event(EventFrame),
	/// Reply to a `ping` command.
	Pong { id: u64 },
	/// Well-formed JSON object this client does not understand.
	#[serde(skip)]
	Unknown(Value),
	/// Text that was not valid JSON.
	#[serde(skip)]
	Raw(String),
}

impl InboundFrame {
	/// Correlation id carried by the frame, if any.
	pub fn id(&self) -> Option<u64> {
		match self {
			Self::Result(result) => Some(result.id),
			Self::Event(event) => Some(event.id),
			Self::Pong { id } => Some(*id),
			_ => None,
		}
	}

	/// Wire name of the frame type, for logging.
	pub fn type_name(&self) -> &'static str {
		match self {
			Self::AuthRequired { .. } => "auth_required",
			Self::AuthOk { .. } => "auth_ok",
			Self::AuthInvalid { .. } => "auth_invalid",
			Self::Result(_) => "result",
			Self::Event(_) => "event",
			Self::Pong { .. } => "pong",
			Self::Unknown(_) => "unknown",
			Self::Raw(_) => "raw",
		}
	}

	/// Whether this frame only has meaning during the authentication phase.
	pub fn is_handshake(&self) -> bool {
		matches!(
			self,
			Self::AuthRequired { .. } | Self::AuthOk { .. } | Self::AuthInvalid { .. }
		)
	}
}

/// Payload of a `result` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFrame {
	/// Id of the command this answers.
	pub id: u64,
	/// Whether the command succeeded.
	pub success: bool,
	/// Result payload when `success` is true.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	/// Server error payload (usually `{"code", "message"}`) when `success` is false.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<Value>,
}

/// Payload of an `event` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
	/// Id of the subscribe command that opened the stream.
	pub id: u64,
	/// Event body handed to the subscription callback.
	#[serde(default)]
	pub event: Value,
}

/// Frame type a pending request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
	/// A `result` frame.
	Result,
	/// A `pong` frame.
	Pong,
}

impl ReplyKind {
	/// Whether `frame` is the reply shape this kind expects.
	pub fn accepts(self, frame: &InboundFrame) -> bool {
		matches!(
			(self, frame),
			(Self::Result, InboundFrame::Result(_)) | (Self::Pong, InboundFrame::Pong { .. })
		)
	}
}
