//! Subscription registry: stable handle → callback plus replay descriptor.

use std::collections::{BTreeMap, HashMap};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hass_protocol::Command;
use parking_lot::Mutex;
use serde_json::Value;

/// Handler invoked with the `event` body of each pushed event.
pub type EventCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// What it takes to reissue a subscribe command on a new connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayDescriptor {
	command: Command,
}

impl ReplayDescriptor {
	pub fn new(command: Command) -> Self {
		Self { command }
	}

	/// The original subscribe command (kind and arguments, no id).
	pub fn command(&self) -> &Command {
		&self.command
	}

	pub fn kind(&self) -> &str {
		self.command.kind()
	}
}

/// A live event stream: the callback stored together with its replay descriptor.
#[derive(Clone)]
pub struct Subscription {
	pub callback: EventCallback,
	pub replay: ReplayDescriptor,
}

impl Subscription {
	pub fn new(callback: EventCallback, replay: ReplayDescriptor) -> Self {
		Self { callback, replay }
	}
}

impl std::fmt::Debug for Subscription {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Subscription")
			.field("replay", &self.replay)
			.finish_non_exhaustive()
	}
}

/// Where a subscription stands on the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
	/// First subscribe command sent, not yet acknowledged.
	Pending(u64),
	/// Acknowledged and streaming under this wire id.
	Live(u64),
	/// Reissued on a new connection, not yet acknowledged.
	Replaying(u64),
	/// No stream on the current connection; waiting for replay.
	Unbound,
}

impl Binding {
	fn wire_id(self) -> Option<u64> {
		match self {
			Binding::Pending(id) | Binding::Live(id) | Binding::Replaying(id) => Some(id),
			Binding::Unbound => None,
		}
	}
}

struct Entry {
	token: u64,
	binding: Binding,
	subscription: Subscription,
}

/// A subscription taken out of the registry by [`SubscriptionRegistry::remove`].
#[derive(Debug)]
pub struct Removed {
	/// Id of the server-side stream on the current connection, if one exists.
	pub wire_id: Option<u64>,
	pub subscription: Subscription,
}

#[derive(Default)]
struct Inner {
	/// Keyed by handle: the wire id of the subscribe command that created it.
	active: BTreeMap<u64, Entry>,
	/// Current wire id → handle.
	routes: HashMap<u64, u64>,
}

impl Inner {
	fn unroute(&mut self, binding: Binding) {
		if let Some(wire_id) = binding.wire_id() {
			self.routes.remove(&wire_id);
		}
	}
}

/// Registry of event subscriptions for one session.
///
/// A subscription is known to callers by its handle, the id of the subscribe
/// command that created it. Handles survive reconnects; events are routed from
/// whatever wire id the stream currently has. Request ids are never reused
/// within a session, so a handle never collides with a later wire id.
///
/// Handles are allocated in increasing order, so iteration order of the map is
/// creation order. Callbacks run on the receive loop, one frame at a time.
#[derive(Default)]
pub struct SubscriptionRegistry {
	inner: Mutex<Inner>,
	tokens: AtomicU64,
}

impl SubscriptionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `subscription` under the handle `id` ahead of the server's
	/// acknowledgement.
	///
	/// Returns a token identifying this registration for [`discard`](Self::discard).
	pub fn add(&self, id: u64, subscription: Subscription) -> u64 {
		let token = self.tokens.fetch_add(1, Ordering::Relaxed);
		let mut inner = self.inner.lock();
		let replaced = inner.active.insert(
			id,
			Entry {
				token,
				binding: Binding::Pending(id),
				subscription,
			},
		);
		if let Some(old) = replaced {
			tracing::warn!(id, kind = old.subscription.replay.kind(), "Subscription id reused, replacing");
			inner.unroute(old.binding);
		}
		inner.routes.insert(id, id);
		token
	}

	/// Marks the stream on `wire_id` as acknowledged, making it eligible for replay.
	pub fn confirm(&self, wire_id: u64) {
		let mut inner = self.inner.lock();
		let Some(handle) = inner.routes.get(&wire_id).copied() else {
			return;
		};
		if let Some(entry) = inner.active.get_mut(&handle) {
			entry.binding = Binding::Live(wire_id);
		}
	}

	/// Removes the subscription with handle `id`.
	pub fn remove(&self, id: u64) -> Option<Removed> {
		let mut inner = self.inner.lock();
		let entry = inner.active.remove(&id)?;
		inner.unroute(entry.binding);
		Some(Removed {
			wire_id: entry.binding.wire_id(),
			subscription: entry.subscription,
		})
	}

	/// Removes `id` only if it still holds the registration identified by `token`.
	pub fn discard(&self, id: u64, token: u64) -> bool {
		let mut inner = self.inner.lock();
		if !inner.active.get(&id).is_some_and(|entry| entry.token == token) {
			return false;
		}
		if let Some(entry) = inner.active.remove(&id) {
			inner.unroute(entry.binding);
		}
		true
	}

	/// Runs the callback of the stream on `wire_id` with `payload`.
	///
	/// Returns false when no subscription streams on that id. A panicking
	/// callback is logged and does not propagate.
	pub fn invoke(&self, wire_id: u64, payload: Value) -> bool {
		let callback = {
			let inner = self.inner.lock();
			let entry = inner
				.routes
				.get(&wire_id)
				.and_then(|handle| inner.active.get(handle));
			match entry {
				Some(entry) => Arc::clone(&entry.subscription.callback),
				None => return false,
			}
		};

		if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
			tracing::error!(id = wire_id, "Event callback panicked");
		}
		true
	}

	/// Replay descriptors of all live subscriptions, in creation order.
	pub fn snapshot(&self) -> Vec<ReplayDescriptor> {
		self.inner
			.lock()
			.active
			.values()
			.map(|entry| entry.subscription.replay.clone())
			.collect()
	}

	/// Unbinds every subscription from the old connection and returns the ones
	/// to reissue, as `(handle, subscription)` in creation order.
	///
	/// Subscriptions whose first subscribe was never acknowledged are dropped:
	/// that call has already failed with the connection. Everything else stays
	/// registered under its handle until [`rebind`](Self::rebind) gives it a
	/// new wire id.
	pub fn take_for_replay(&self) -> Vec<(u64, Subscription)> {
		let mut inner = self.inner.lock();
		inner.routes.clear();
		inner
			.active
			.retain(|_, entry| !matches!(entry.binding, Binding::Pending(_)));
		inner
			.active
			.iter_mut()
			.map(|(&handle, entry)| {
				entry.binding = Binding::Unbound;
				(handle, entry.subscription.clone())
			})
			.collect()
	}

	/// Routes events on `wire_id` to the subscription `handle`.
	///
	/// Returns false if the subscription was removed in the meantime.
	pub fn rebind(&self, handle: u64, wire_id: u64) -> bool {
		let mut inner = self.inner.lock();
		let Some(entry) = inner.active.get_mut(&handle) else {
			return false;
		};
		let previous = std::mem::replace(&mut entry.binding, Binding::Replaying(wire_id));
		inner.unroute(previous);
		inner.routes.insert(wire_id, handle);
		true
	}

	/// Undoes [`rebind`](Self::rebind) after a failed replay, keeping the
	/// subscription for the next connection.
	pub fn unbind(&self, handle: u64) {
		let mut inner = self.inner.lock();
		let Some(entry) = inner.active.get_mut(&handle) else {
			return;
		};
		if let Binding::Replaying(wire_id) = entry.binding {
			entry.binding = Binding::Unbound;
			inner.routes.remove(&wire_id);
		}
	}

	/// Current wire id of the subscription `handle`.
	pub fn wire_id(&self, handle: u64) -> Option<u64> {
		self.inner
			.lock()
			.active
			.get(&handle)
			.and_then(|entry| entry.binding.wire_id())
	}

	pub fn clear(&self) {
		let mut inner = self.inner.lock();
		inner.active.clear();
		inner.routes.clear();
	}

	pub fn contains(&self, id: u64) -> bool {
		self.inner.lock().active.contains_key(&id)
	}

	pub fn len(&self) -> usize {
		self.inner.lock().active.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}
