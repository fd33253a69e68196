//! Endpoint derivation.

/// Path of the WebSocket API on every Home Assistant instance.
pub const WEBSOCKET_PATH: &str = "/api/websocket";

/// Derives the WebSocket endpoint from a base address.
///
/// `ws://` and `wss://` bases are used as-is, `http://` and `https://` are
/// mapped to their WebSocket counterparts, and bare hosts default to `wss://`.
/// Returns `None` for an empty base or an unsupported scheme.
///
/// ```ignore
/// assert_eq!(websocket_url("ws://10.0.0.2:8123/").unwrap(), "ws://10.0.0.2:8123/api/websocket");
/// ```
pub fn websocket_url(base: &str) -> Option<String> {
	let base = base.trim().trim_end_matches('/');
	if base.is_empty() {
		return None;
	}

	let (scheme, rest) = match base.split_once("://") {
		Some(("ws", rest)) | Some(("http", rest)) => ("ws", rest),
		Some(("wss", rest)) | Some(("https", rest)) => ("wss", rest),
		Some(_) => return None,
		None => ("wss", base),
	};
	if rest.is_empty() {
		return None;
	}
	if rest.ends_with(WEBSOCKET_PATH) {
		return Some(format!("{scheme}://{rest}"));
	}
	Some(format!("{scheme}://{rest}{WEBSOCKET_PATH}"))
}
