//! Outbound commands.

use serde_json::{Map, Value};

/// An id-less outbound command: the `type` discriminator plus its fields.
///
/// The session attaches the correlation id at send time, so the same
/// [`Command`] can be reissued on a later connection (subscription replay).
///
/// ```ignore
/// let cmd = Command::new("subscribe_events").with("event_type", "state_changed");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
	kind: String,
	fields: Map<String, Value>,
}

impl Command {
	/// Creates a command with no fields.
	pub fn new(kind: impl Into<String>) -> Self {
		Self {
			kind: kind.into(),
			fields: Map::new(),
		}
	}

	/// Adds a field. `id` and `type` are reserved and get overwritten on encode.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		self.fields.insert(key.into(), value.into());
		self
	}

	/// Adds a field only when `value` is present.
	pub fn with_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
		match value {
			Some(value) => self.with(key, value),
			None => self,
		}
	}

	/// The `type` discriminator.
	pub fn kind(&self) -> &str {
		&self.kind
	}

	/// Looks up a field by name.
	pub fn field(&self, key: &str) -> Option<&Value> {
		self.fields.get(key)
	}

	/// All fields except `id` and `type`.
	pub fn fields(&self) -> &Map<String, Value> {
		&self.fields
	}

	/// Builds the wire object for this command under `id`.
	pub fn to_frame(&self, id: u64) -> Value {
		let mut object = self.fields.clone();
		object.insert("id".to_string(), Value::from(id));
		object.insert("type".to_string(), Value::from(self.kind.as_str()));
		Value::Object(object)
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn optional_fields_are_omitted() {
		let cmd = Command::new("subscribe_events").with_opt("event_type", None::<&str>);
		assert!(cmd.fields().is_empty());

		let cmd = Command::new("subscribe_events").with_opt("event_type", Some("state_changed"));
		assert_eq!(cmd.field("event_type"), Some(&json!("state_changed")));
	}

	#[test]
	fn reserved_keys_cannot_be_spoofed() {
		let frame = Command::new("get_states")
			.with("id", 99)
			.with("type", "other")
			.to_frame(2);
		assert_eq!(frame, json!({"id": 2, "type": "get_states"}));
	}
}
