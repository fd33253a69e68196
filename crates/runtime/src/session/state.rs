/// Lifecycle of a [`Session`](crate::Session).
///
/// ```text
/// Disconnected → Connecting → Authenticating → NegotiatingFeatures → Ready
///      ↑                                                              │
///      └──────────────────────── connection lost ─────────────────────┘
/// any state ── close() ──→ Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
	Disconnected,
	Connecting,
	Authenticating,
	NegotiatingFeatures,
	Ready,
	/// Terminal; no further reconnects.
	Closed,
}

impl SessionState {
	pub fn is_ready(self) -> bool {
		self == Self::Ready
	}

	pub fn is_closed(self) -> bool {
		self == Self::Closed
	}
}

impl std::fmt::Display for SessionState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::Disconnected => "disconnected",
			Self::Connecting => "connecting",
			Self::Authenticating => "authenticating",
			Self::NegotiatingFeatures => "negotiating_features",
			Self::Ready => "ready",
			Self::Closed => "closed",
		};
		f.write_str(name)
	}
}
