//! One-shot event waits.
//!
//! Both helpers follow the same shape: subscribe to an event stream, resolve on
//! the first matching event, bound the wait with a timeout, and unsubscribe
//! whatever the outcome. Dropping the returned future early still unsubscribes,
//! from a spawned task.

use std::sync::Arc;
use std::time::Duration;

use hass_runtime::{Error, Result, SessionState};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::Client;

/// Event fired whenever a config, options or repair flow advances.
pub const FLOW_PROGRESSED_EVENT: &str = "data_entry_flow_progressed";

/// `data` of a [`FLOW_PROGRESSED_EVENT`] event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FlowProgress {
	/// Integration domain driving the flow, e.g. `"xiaomi_home"`.
	pub handler: String,
	pub flow_id: String,
}

/// Waits for the first `event_type` event for which `extract` returns a value.
///
/// Fails with [`Error::Timeout`] (carrying the subscription id) when nothing
/// matches within `timeout`.
pub async fn wait_for_event<T, F>(
	client: &Client,
	event_type: &str,
	extract: F,
	timeout: Duration,
) -> Result<T>
where
	T: Send + 'static,
	F: Fn(&Value) -> Option<T> + Send + Sync + 'static,
{
	let (tx, rx) = oneshot::channel();
	let slot = Arc::new(Mutex::new(Some(tx)));
	let callback = move |event: Value| {
		let mut slot = slot.lock();
		if slot.is_none() {
			return;
		}
		if let Some(found) = extract(&event) {
			if let Some(tx) = slot.take() {
				let _ = tx.send(found);
			}
		}
	};

	let subscription_id = client.subscribe_events(Some(event_type), callback).await?;
	let cleanup = Unsubscribe {
		client: Some(client.clone()),
		subscription_id,
	};
	tracing::debug!(subscription_id, event_type, "Waiting for event");

	let outcome = tokio::time::timeout(timeout, rx).await;
	cleanup.run().await;

	match outcome {
		Ok(Ok(found)) => Ok(found),
		Ok(Err(_)) if client.state() == SessionState::Closed => Err(Error::Closed),
		Ok(Err(_)) => Err(Error::ConnectionLost(format!(
			"subscription to {event_type} ended before a matching event"
		))),
		Err(_) => Err(Error::Timeout {
			id: subscription_id,
			after: timeout,
		}),
	}
}

/// Waits until a data-entry flow run by `handler` progresses and returns its
/// `flow_id`.
///
/// Typical use is an OAuth-style config flow where the user finishes a step in
/// a browser and the integration then advances the flow on its own.
pub async fn wait_for_flow_progress(client: &Client, handler: &str, timeout: Duration) -> Result<String> {
	let handler = handler.to_string();
	wait_for_event(
		client,
		FLOW_PROGRESSED_EVENT,
		move |event| {
			let progress = FlowProgress::deserialize(event.get("data")?).ok()?;
			(progress.handler == handler).then_some(progress.flow_id)
		},
		timeout,
	)
	.await
}

/// Unsubscribes on drop unless [`run`](Self::run) already did.
struct Unsubscribe {
	client: Option<Client>,
	subscription_id: u64,
}

impl Unsubscribe {
	async fn run(mut self) {
		if let Some(client) = self.client.take() {
			unsubscribe(client, self.subscription_id).await;
		}
	}
}

impl Drop for Unsubscribe {
	fn drop(&mut self) {
		let Some(client) = self.client.take() else {
			return;
		};
		if let Ok(handle) = tokio::runtime::Handle::try_current() {
			handle.spawn(unsubscribe(client, self.subscription_id));
		}
	}
}

async fn unsubscribe(client: Client, subscription_id: u64) {
	if let Err(e) = client.unsubscribe_events(subscription_id).await {
		tracing::debug!(subscription_id, error = %e, "Unsubscribe after wait failed");
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn flow_progress_reads_event_data() {
		let event = json!({
			"event_type": FLOW_PROGRESSED_EVENT,
			"data": {"handler": "xiaomi_home", "flow_id": "abc123", "refresh": true},
		});
		let progress = FlowProgress::deserialize(&event["data"]).unwrap();
		assert_eq!(
			progress,
			FlowProgress {
				handler: "xiaomi_home".to_string(),
				flow_id: "abc123".to_string(),
			}
		);
	}
}
