//! Text codec for frames.
//!
//! Encoding is infallible: every outbound frame is a JSON object built from
//! owned values. Decoding never fails either. Text that is not JSON becomes
//! [`InboundFrame::Raw`], objects with an unfamiliar or broken shape become
//! [`InboundFrame::Unknown`], and a JSON array (coalesced delivery) becomes a
//! [`Decoded::Batch`] whose members are decoded one by one.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::command::Command;
use crate::frame::InboundFrame;

/// Id reserved for the `supported_features` command.
pub const FEATURES_ID: u64 = 1;

/// Result of decoding one text message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
	/// The message held a single frame.
	Single(InboundFrame),
	/// The message held an array of frames, in receipt order.
	Batch(Vec<InboundFrame>),
}

impl Decoded {
	/// Number of frames carried.
	pub fn len(&self) -> usize {
		match self {
			Self::Single(_) => 1,
			Self::Batch(frames) => frames.len(),
		}
	}

	/// True for an empty batch.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl IntoIterator for Decoded {
	type Item = InboundFrame;
	type IntoIter = std::vec::IntoIter<InboundFrame>;

	fn into_iter(self) -> Self::IntoIter {
		match self {
			Self::Single(frame) => vec![frame].into_iter(),
			Self::Batch(frames) => frames.into_iter(),
		}
	}
}

/// Decodes one text message.
pub fn decode(text: &str) -> Decoded {
	match serde_json::from_str::<Value>(text) {
		Ok(Value::Array(items)) => Decoded::Batch(items.into_iter().map(decode_value).collect()),
		Ok(value) => Decoded::Single(decode_value(value)),
		Err(_) => Decoded::Single(InboundFrame::Raw(text.to_string())),
	}
}

fn decode_value(value: Value) -> InboundFrame {
	if !value.is_object() {
		return InboundFrame::Unknown(value);
	}
	InboundFrame::deserialize(&value).unwrap_or(InboundFrame::Unknown(value))
}

/// Encodes `command` with correlation id `id`.
pub fn encode_command(id: u64, command: &Command) -> String {
	command.to_frame(id).to_string()
}

/// Encodes the id-less `auth` frame.
pub fn encode_auth(access_token: &str) -> String {
	json!({"type": "auth", "access_token": access_token}).to_string()
}

/// Encodes the pinned feature-negotiation command enabling coalesced delivery.
pub fn encode_supported_features() -> String {
	json!({
		"id": FEATURES_ID,
		"type": "supported_features",
		"features": {"coalesce_messages": 1},
	})
	.to_string()
}
