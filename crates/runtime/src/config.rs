//! Session configuration.
//!
//! Durations serialize as integer milliseconds so a config file reads
//! `{"heartbeat_interval_ms": 20000}`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for one [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
	/// Pause between heartbeat pings.
	#[serde(rename = "heartbeat_interval_ms", with = "millis")]
	pub heartbeat_interval: Duration,
	/// How long a request waits for its reply.
	#[serde(rename = "request_timeout_ms", with = "millis")]
	pub request_timeout: Duration,
	/// Bound on transport open plus authentication.
	#[serde(rename = "connect_timeout_ms", with = "millis")]
	pub connect_timeout: Duration,
	/// Reconnect after the connection drops.
	pub auto_reconnect: bool,
	/// First reconnect delay.
	#[serde(rename = "reconnect_initial_delay_ms", with = "millis")]
	pub reconnect_initial_delay: Duration,
	/// Growth factor applied to the delay after each failed attempt.
	pub reconnect_multiplier: f64,
	/// Upper bound for the reconnect delay.
	#[serde(rename = "reconnect_max_delay_ms", with = "millis")]
	pub reconnect_max_delay: Duration,
	/// Send `supported_features` to enable coalesced delivery.
	pub negotiate_features: bool,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			heartbeat_interval: Duration::from_secs(20),
			request_timeout: Duration::from_secs(15),
			connect_timeout: Duration::from_secs(15),
			auto_reconnect: true,
			reconnect_initial_delay: Duration::from_secs(1),
			reconnect_multiplier: 1.5,
			reconnect_max_delay: Duration::from_secs(60),
			negotiate_features: true,
		}
	}
}

impl SessionConfig {
	pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
		self.heartbeat_interval = interval;
		self
	}

	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;
		self
	}

	pub fn auto_reconnect(mut self, enabled: bool) -> Self {
		self.auto_reconnect = enabled;
		self
	}

	/// Sets the backoff schedule: `initial * multiplier^n`, capped at `max`.
	pub fn reconnect_backoff(mut self, initial: Duration, multiplier: f64, max: Duration) -> Self {
		self.reconnect_initial_delay = initial;
		self.reconnect_multiplier = multiplier;
		self.reconnect_max_delay = max;
		self
	}

	pub fn negotiate_features(mut self, enabled: bool) -> Self {
		self.negotiate_features = enabled;
		self
	}
}

mod millis {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u64(value.as_millis() as u64)
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
