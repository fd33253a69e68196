//! Session state machine.
//!
//! A [`Session`] owns one logical connection to the server. It drives the
//! `auth_required → auth → auth_ok` handshake, optionally enables coalesced
//! delivery, and then runs two tasks per connection:
//!
//! - a **receive loop** that decodes every inbound message and settles
//!   pending requests or invokes subscription callbacks in arrival order
//! - a **heartbeat loop** that pings the server every interval
//!
//! When either loop detects a dead connection, exactly one recovery task is
//! started (guarded by a connection generation counter). It fails all pending
//! requests, reconnects with exponential backoff, runs the post-reconnect hook
//! and replays every confirmed subscription under a fresh id. Callers keep
//! the subscription id they were handed; events on the new wire id are routed
//! back to it.
//!
//! # Send Path
//!
//! Id allocation, completion-handle registration and the socket write happen
//! inside one async critical section, so ids hit the wire in strictly
//! increasing order and no reply can race ahead of its registration. Ids are
//! never reused within a session, across reconnects included.

mod backoff;
mod state;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use hass_protocol::{
	Command, EventFrame, FEATURES_ID, InboundFrame, ReplyKind, ResultFrame, decode, encode_auth,
	encode_command, encode_supported_features, websocket_url,
};
use serde_json::Value;
use tokio::sync::{Mutex as TokioMutex, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

use self::backoff::Backoff;
pub use self::state::SessionState;
use crate::config::SessionConfig;
use crate::connection::{
	Disconnect, EventCallback, PendingRequests, Removed, ReplayDescriptor, ReplyFuture,
	Subscription, SubscriptionRegistry,
};
use crate::error::{Error, Result};
use crate::transport::{
	Connector, TransportParts, TransportReceiver, TransportSender, WebSocketConnector,
};

/// Async hook run after a reconnect, before subscriptions are replayed.
pub type ReconnectHook = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Upper bound on a graceful transport close.
const TRANSPORT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Configures and creates a [`Session`].
pub struct SessionBuilder {
	base: String,
	credential: String,
	config: SessionConfig,
	connector: Option<Arc<dyn Connector>>,
	on_reconnect: Option<ReconnectHook>,
	span: Option<Span>,
}

impl SessionBuilder {
	pub fn config(mut self, config: SessionConfig) -> Self {
		self.config = config;
		self
	}

	/// Replaces the default [`WebSocketConnector`].
	pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
		self.connector = Some(Arc::new(connector));
		self
	}

	/// Runs `hook` after every successful reconnect.
	pub fn on_reconnect<F, Fut>(mut self, hook: F) -> Self
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		self.on_reconnect = Some(Arc::new(
			move || -> Pin<Box<dyn Future<Output = ()> + Send>> { Box::pin(hook()) },
		));
		self
	}

	/// Span that instruments every task of the session.
	///
	/// Defaults to an `info` span named `hass_session` carrying the endpoint.
	pub fn span(mut self, span: Span) -> Self {
		self.span = Some(span);
		self
	}

	/// Validates the endpoint and creates a disconnected session.
	pub fn build(self) -> Result<Session> {
		let url = websocket_url(&self.base).ok_or_else(|| Error::InvalidUrl(self.base.clone()))?;
		let span = self
			.span
			.unwrap_or_else(|| tracing::info_span!("hass_session", url = %url));
		let (state, _) = watch::channel(SessionState::Disconnected);

		Ok(Session {
			shared: Arc::new(Shared {
				url,
				credential: self.credential,
				config: self.config,
				connector: self.connector.unwrap_or_else(|| Arc::new(WebSocketConnector)),
				on_reconnect: self.on_reconnect,
				span,
				outbound: TokioMutex::new(Outbound {
					sender: None,
					next_id: FEATURES_ID,
				}),
				pending: PendingRequests::new(),
				subscriptions: SubscriptionRegistry::new(),
				state,
				generation: AtomicU64::new(0),
				started: AtomicBool::new(false),
				closed: AtomicBool::new(false),
				tasks: parking_lot::Mutex::new(Tasks::default()),
			}),
		})
	}

	/// Builds the session and performs the initial connect.
	pub async fn connect(self) -> Result<Session> {
		let session = self.build()?;
		session.connect().await?;
		Ok(session)
	}
}

/// Persistent, multiplexed connection to a Home Assistant instance.
///
/// Cheap to clone; clones share the connection. Call [`close`](Self::close)
/// when done, background tasks keep the session alive until then.
#[derive(Clone)]
pub struct Session {
	shared: Arc<Shared>,
}

impl Session {
	/// Starts building a session for `base` (host, `http(s)://` or `ws(s)://`
	/// address) authenticated with the bearer `credential`.
	pub fn builder(base: impl Into<String>, credential: impl Into<String>) -> SessionBuilder {
		SessionBuilder {
			base: base.into(),
			credential: credential.into(),
			config: SessionConfig::default(),
			connector: None,
			on_reconnect: None,
			span: None,
		}
	}

	/// Opens the connection and completes the handshake.
	///
	/// Failures propagate and are not retried; background reconnects only
	/// start once a connection has been established. Calling this again
	/// waits for the session to be ready.
	pub async fn connect(&self) -> Result<()> {
		let shared = &self.shared;
		if shared.closed.load(Ordering::Acquire) {
			return Err(Error::Closed);
		}
		if shared.started.swap(true, Ordering::AcqRel) {
			return self.wait_ready(shared.config.connect_timeout).await;
		}

		let result = shared
			.establish(false)
			.instrument(shared.span.clone())
			.await;
		if result.is_err() {
			shared.started.store(false, Ordering::Release);
		}
		result
	}

	/// Sends `command` and returns the `result` payload.
	pub async fn request(&self, command: Command) -> Result<Value> {
		self.shared.request(&command).await
	}

	/// Sends `command` without waiting for a reply. Returns the id used.
	pub async fn send(&self, command: Command) -> Result<u64> {
		let (id, ()) = self.shared.write_with(&command, |_| Ok(())).await?;
		Ok(id)
	}

	/// Opens an event stream with `command`; `callback` receives each event body.
	///
	/// Returns the subscription id: the id of the subscribe command. It stays
	/// valid across reconnects, even though the server streams the replayed
	/// subscription under a new id.
	pub async fn subscribe<F>(&self, command: Command, callback: F) -> Result<u64>
	where
		F: Fn(Value) + Send + Sync + 'static,
	{
		self.shared.subscribe(command, Arc::new(callback)).await
	}

	/// Cancels the subscription `subscription_id`.
	///
	/// The local callback is removed first, so no further events are delivered
	/// and the subscription is not replayed. The server is then told with an
	/// `unsubscribe_events` command sent under its own fresh id.
	pub async fn unsubscribe(&self, subscription_id: u64) -> Result<()> {
		self.shared.unsubscribe(subscription_id).await
	}

	/// Round-trips a `ping`.
	pub async fn ping(&self) -> Result<()> {
		self.shared.ping().await
	}

	/// Closes the session for good. Idempotent.
	pub async fn close(&self) {
		self.shared
			.shutdown(true)
			.instrument(self.shared.span.clone())
			.await;
	}

	pub fn state(&self) -> SessionState {
		*self.shared.state.borrow()
	}

	/// Receiver observing every state transition.
	pub fn watch_state(&self) -> watch::Receiver<SessionState> {
		self.shared.state.subscribe()
	}

	/// Waits until the session is [`Ready`](SessionState::Ready).
	pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
		let mut rx = self.shared.state.subscribe();
		let waited =
			tokio::time::timeout(timeout, rx.wait_for(|s| s.is_ready() || s.is_closed())).await;
		match waited {
			Ok(Ok(state)) if state.is_ready() => Ok(()),
			Ok(_) => Err(Error::Closed),
			Err(_) => Err(Error::ConnectionLost(format!(
				"session not ready after {}ms",
				timeout.as_millis()
			))),
		}
	}

	pub fn is_connected(&self) -> bool {
		self.state().is_ready()
	}

	/// The WebSocket endpoint derived from the base address.
	pub fn url(&self) -> &str {
		&self.shared.url
	}

	pub fn config(&self) -> &SessionConfig {
		&self.shared.config
	}

	/// Number of requests awaiting a reply.
	pub fn pending_requests(&self) -> usize {
		self.shared.pending.len()
	}

	/// Replay descriptors of the live subscriptions, in creation order.
	pub fn subscriptions(&self) -> Vec<ReplayDescriptor> {
		self.shared.subscriptions.snapshot()
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("url", &self.shared.url)
			.field("state", &self.state())
			.finish_non_exhaustive()
	}
}

/// Writer half plus the id counter, guarded together.
struct Outbound {
	sender: Option<Box<dyn TransportSender>>,
	next_id: u64,
}

#[derive(Default)]
struct Tasks {
	receive: Option<JoinHandle<()>>,
	heartbeat: Option<JoinHandle<()>>,
	recovery: Option<JoinHandle<()>>,
}

impl Tasks {
	fn abort_loops(&mut self) {
		for handle in [self.receive.take(), self.heartbeat.take()].into_iter().flatten() {
			handle.abort();
		}
	}
}

struct Shared {
	url: String,
	credential: String,
	config: SessionConfig,
	connector: Arc<dyn Connector>,
	on_reconnect: Option<ReconnectHook>,
	span: Span,
	outbound: TokioMutex<Outbound>,
	pending: PendingRequests,
	subscriptions: SubscriptionRegistry,
	state: watch::Sender<SessionState>,
	/// Bumped per connection and on loss/close; loops of older generations are stale.
	generation: AtomicU64,
	started: AtomicBool,
	closed: AtomicBool,
	tasks: parking_lot::Mutex<Tasks>,
}

/// Subscription registered ahead of its acknowledgement; discarded on drop
/// unless confirmed.
struct PendingSubscription<'a> {
	registry: &'a SubscriptionRegistry,
	id: u64,
	token: u64,
	armed: bool,
}

impl PendingSubscription<'_> {
	fn confirm(mut self) {
		self.registry.confirm(self.id);
		self.armed = false;
	}
}

impl Drop for PendingSubscription<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.registry.discard(self.id, self.token);
		}
	}
}

impl Shared {
	fn set_state(&self, next: SessionState) {
		self.state.send_if_modified(|current| {
			if *current == SessionState::Closed || *current == next {
				return false;
			}
			tracing::debug!(from = %current, to = %next, "Session state");
			*current = next;
			true
		});
	}

	fn is_current(&self, generation: u64) -> bool {
		self.generation.load(Ordering::Acquire) == generation
	}

	/// Connects, authenticates, negotiates and starts the loops.
	async fn establish(self: &Arc<Self>, reconnect: bool) -> Result<()> {
		self.set_state(SessionState::Connecting);
		let timeout = self.config.connect_timeout;
		let parts = match tokio::time::timeout(timeout, self.open_and_authenticate()).await {
			Ok(Ok(parts)) => parts,
			Ok(Err(e)) => {
				self.set_state(SessionState::Disconnected);
				return Err(e);
			}
			Err(_) => {
				self.set_state(SessionState::Disconnected);
				return Err(Error::Transport(format!(
					"connect timed out after {}ms",
					timeout.as_millis()
				)));
			}
		};

		let TransportParts { sender, receiver } = parts;
		let (generation, replay) = match self.install(sender, reconnect).await {
			Ok(installed) => installed,
			Err(e) => {
				self.set_state(SessionState::Disconnected);
				return Err(e);
			}
		};

		let receive = tokio::spawn(
			Arc::clone(self)
				.receive_loop(receiver, generation)
				.instrument(self.span.clone()),
		);
		let heartbeat = tokio::spawn(
			Arc::clone(self)
				.heartbeat_loop(generation)
				.instrument(self.span.clone()),
		);
		{
			let mut tasks = self.tasks.lock();
			tasks.abort_loops();
			tasks.receive = Some(receive);
			tasks.heartbeat = Some(heartbeat);
		}
		if self.closed.load(Ordering::Acquire) {
			self.tasks.lock().abort_loops();
			return Err(Error::Closed);
		}

		if reconnect {
			if let Some(hook) = &self.on_reconnect {
				hook().await;
			}
			self.restore_subscriptions(generation, replay).await;
		}

		if self.is_current(generation) {
			self.set_state(SessionState::Ready);
			tracing::info!(generation, reconnect, "Session ready");
		}
		Ok(())
	}

	async fn open_and_authenticate(&self) -> Result<TransportParts> {
		tracing::info!(url = %self.url, "Connecting");
		let mut parts = self.connector.connect(&self.url).await?;
		self.set_state(SessionState::Authenticating);

		match next_handshake_frame(parts.receiver.as_mut()).await? {
			InboundFrame::AuthRequired { ha_version } => {
				tracing::debug!(?ha_version, "Server requested authentication");
			}
			other => {
				return Err(Error::Protocol(format!(
					"expected auth_required, got {}",
					other.type_name()
				)));
			}
		}

		parts.sender.send(encode_auth(&self.credential)).await?;

		match next_handshake_frame(parts.receiver.as_mut()).await? {
			InboundFrame::AuthOk { ha_version } => {
				tracing::info!(ha_version = ha_version.as_deref().unwrap_or("unknown"), "Authenticated");
				Ok(parts)
			}
			InboundFrame::AuthInvalid { message } => Err(Error::Auth(
				message.unwrap_or_else(|| "access token rejected".to_string()),
			)),
			other => Err(Error::Protocol(format!(
				"unexpected {} during authentication",
				other.type_name()
			))),
		}
	}

	/// Installs the writer for a fresh connection.
	///
	/// Returns the connection generation and, on reconnect, the subscriptions
	/// to replay. The replay set is taken before the writer becomes visible, so
	/// subscriptions made on the new connection are never part of it.
	async fn install(
		&self,
		mut sender: Box<dyn TransportSender>,
		reconnect: bool,
	) -> Result<(u64, Vec<(u64, Subscription)>)> {
		let mut outbound = self.outbound.lock().await;
		if self.closed.load(Ordering::Acquire) {
			drop(outbound);
			let _ = tokio::time::timeout(TRANSPORT_CLOSE_TIMEOUT, sender.close()).await;
			return Err(Error::Closed);
		}

		if self.config.negotiate_features {
			self.set_state(SessionState::NegotiatingFeatures);
			sender
				.send(encode_supported_features())
				.await
				.map_err(|e| Error::ConnectionLost(format!("feature negotiation failed: {e}")))?;
			// The features command is pinned to the first id of the connection
			outbound.next_id = outbound.next_id.max(FEATURES_ID + 1);
			tracing::debug!("Enabled coalesced delivery");
		}

		let replay = if reconnect {
			self.subscriptions.take_for_replay()
		} else {
			Vec::new()
		};
		outbound.sender = Some(sender);
		Ok((self.generation.fetch_add(1, Ordering::AcqRel) + 1, replay))
	}

	/// Allocates an id, runs `register` with it and writes the command, all
	/// under the outbound lock.
	async fn write_with<T>(
		&self,
		command: &Command,
		register: impl FnOnce(u64) -> Result<T>,
	) -> Result<(u64, T)> {
		let mut outbound = self.outbound.lock().await;
		let Outbound { sender, next_id } = &mut *outbound;
		let Some(sender) = sender.as_mut() else {
			return Err(if self.closed.load(Ordering::Acquire) {
				Error::Closed
			} else {
				Error::ConnectionLost("not connected".to_string())
			});
		};

		let id = *next_id;
		*next_id += 1;
		let registration = register(id)?;

		tracing::trace!(id, kind = command.kind(), "Sending command");
		sender
			.send(encode_command(id, command))
			.await
			.map_err(|e| Error::ConnectionLost(format!("write failed: {e}")))?;
		Ok((id, registration))
	}

	async fn await_reply(&self, reply: ReplyFuture) -> Result<InboundFrame> {
		let id = reply.id();
		let after = self.config.request_timeout;
		match tokio::time::timeout(after, reply).await {
			Ok(Ok(frame)) => Ok(frame),
			Ok(Err(Disconnect::Lost)) => Err(Error::ConnectionLost(format!(
				"connection lost before reply to request {id}"
			))),
			Ok(Err(Disconnect::Closed)) => Err(Error::Closed),
			Err(_) => Err(Error::Timeout { id, after }),
		}
	}

	async fn request(&self, command: &Command) -> Result<Value> {
		let (_, reply) = self
			.write_with(command, |id| self.pending.register(id, ReplyKind::Result))
			.await?;
		into_result(self.await_reply(reply).await?)
	}

	/// Round-trips a ping. A write stuck behind a stalled connection counts
	/// against the request timeout too.
	async fn ping(&self) -> Result<()> {
		let after = self.config.request_timeout;
		let written = tokio::time::timeout(
			after,
			self.write_with(&Command::new("ping"), |id| {
				self.pending.register(id, ReplyKind::Pong)
			}),
		)
		.await
		.map_err(|_| {
			Error::ConnectionLost(format!("ping not written within {}ms", after.as_millis()))
		})?;
		let (_, reply) = written?;
		// Any reply proves the connection is alive
		self.await_reply(reply).await.map(|_| ())
	}

	async fn subscribe(&self, command: Command, callback: EventCallback) -> Result<u64> {
		let replay = ReplayDescriptor::new(command.clone());
		let (id, (reply, registration)) = self
			.write_with(&command, |id| {
				let reply = self.pending.register(id, ReplyKind::Result)?;
				let token = self
					.subscriptions
					.add(id, Subscription::new(callback, replay));
				let registration = PendingSubscription {
					registry: &self.subscriptions,
					id,
					token,
					armed: true,
				};
				Ok((reply, registration))
			})
			.await?;

		into_result(self.await_reply(reply).await?)?;
		registration.confirm();
		tracing::debug!(id, kind = command.kind(), "Subscribed");
		Ok(id)
	}

	/// Reissues a replayed subscription on the current connection and routes
	/// its events back to `handle`.
	///
	/// Returns `None` if the caller unsubscribed while the replay was in
	/// flight; the stream it opened is cancelled again.
	async fn resubscribe(&self, handle: u64, subscription: &Subscription) -> Result<Option<u64>> {
		let written = self
			.write_with(subscription.replay.command(), |id| {
				let reply = self.pending.register(id, ReplyKind::Result)?;
				Ok((reply, self.subscriptions.rebind(handle, id)))
			})
			.await;
		let (id, (reply, bound)) = match written {
			Ok(written) => written,
			Err(e) => {
				self.subscriptions.unbind(handle);
				return Err(e);
			}
		};

		if let Err(e) = self.await_reply(reply).await.and_then(into_result) {
			self.subscriptions.unbind(handle);
			return Err(e);
		}
		if !bound {
			let command = Command::new("unsubscribe_events").with("subscription", id);
			if let Err(e) = self.request(&command).await {
				tracing::debug!(handle, id, error = %e, "Cancelling orphaned stream failed");
			}
			return Ok(None);
		}
		self.subscriptions.confirm(id);
		Ok(Some(id))
	}

	async fn unsubscribe(&self, subscription_id: u64) -> Result<()> {
		let removed = self.subscriptions.remove(subscription_id);
		let wire_id = match &removed {
			Some(Removed {
				wire_id: Some(wire_id),
				..
			}) => *wire_id,
			Some(_) => {
				tracing::debug!(subscription_id, "Subscription has no stream on this connection");
				return Ok(());
			}
			None => {
				tracing::debug!(subscription_id, "Unsubscribing an id with no local subscription");
				subscription_id
			}
		};

		let command = Command::new("unsubscribe_events").with("subscription", wire_id);
		match self.request(&command).await {
			Ok(_) => Ok(()),
			// The server-side stream died with the connection
			Err(Error::ConnectionLost(_) | Error::Closed) if removed.is_some() => Ok(()),
			Err(e) => Err(e),
		}
	}

	async fn receive_loop(self: Arc<Self>, mut receiver: Box<dyn TransportReceiver>, generation: u64) {
		let reason = loop {
			match receiver.recv().await {
				Some(Ok(text)) => {
					for frame in decode(&text) {
						self.dispatch(frame);
					}
				}
				Some(Err(e)) => break e.to_string(),
				None => break "connection closed by server".to_string(),
			}
		};
		tracing::debug!(generation, %reason, "Receive loop exited");
		self.connection_lost(generation, reason);
	}

	fn dispatch(&self, frame: InboundFrame) {
		if frame.is_handshake() {
			tracing::debug!(kind = frame.type_name(), "Ignoring handshake frame after authentication");
			return;
		}
		match frame {
			InboundFrame::Event(EventFrame { id, event }) => {
				if !self.subscriptions.invoke(id, event) {
					tracing::debug!(id, "Event for unknown subscription dropped");
				}
			}
			InboundFrame::Unknown(value) => {
				tracing::debug!(%value, "Unhandled frame");
			}
			InboundFrame::Raw(text) => {
				tracing::warn!(len = text.len(), "Dropping malformed frame");
			}
			reply => {
				if let Some(id) = reply.id() {
					self.pending.resolve(id, reply);
				}
			}
		}
	}

	async fn heartbeat_loop(self: Arc<Self>, generation: u64) {
		let interval = self.config.heartbeat_interval;
		loop {
			tokio::time::sleep(interval).await;
			if !self.is_current(generation) {
				return;
			}
			if let Err(e) = self.ping().await {
				tracing::info!(error = %e, "Heartbeat failed");
				self.connection_lost(generation, format!("heartbeat failed: {e}"));
				return;
			}
			tracing::trace!("Heartbeat ok");
		}
	}

	/// Starts recovery for `generation` unless another loop already did.
	fn connection_lost(self: &Arc<Self>, generation: u64, reason: String) {
		if self.closed.load(Ordering::Acquire) {
			return;
		}
		if self
			.generation
			.compare_exchange(generation, generation + 1, Ordering::AcqRel, Ordering::Acquire)
			.is_err()
		{
			tracing::debug!(generation, "Connection loss already handled");
			return;
		}

		tracing::warn!(%reason, "Connection lost");
		let shared = Arc::clone(self);
		let recovery = tokio::spawn(shared.recover().instrument(self.span.clone()));
		self.tasks.lock().recovery = Some(recovery);
	}

	async fn recover(self: Arc<Self>) {
		self.tasks.lock().abort_loops();
		self.drop_transport().await;
		let failed = self.pending.fail_all(Disconnect::Lost);
		if failed > 0 {
			tracing::info!(failed, "Failed pending requests after connection loss");
		}
		self.set_state(SessionState::Disconnected);

		if !self.config.auto_reconnect {
			tracing::info!("Auto-reconnect disabled, staying disconnected");
			return;
		}

		let mut backoff = Backoff::new(&self.config);
		loop {
			if self.closed.load(Ordering::Acquire) {
				return;
			}
			match self.establish(true).await {
				Ok(()) | Err(Error::Closed) => return,
				Err(Error::Auth(message)) => {
					tracing::error!(%message, "Credential rejected during reconnect, closing session");
					self.shutdown(false).await;
					return;
				}
				Err(e) => {
					let delay = backoff.next_delay();
					tracing::warn!(
						attempt = backoff.attempt(),
						delay_ms = delay.as_millis() as u64,
						error = %e,
						"Reconnect failed"
					);
					tokio::time::sleep(delay).await;
				}
			}
		}
	}

	async fn restore_subscriptions(&self, generation: u64, replay: Vec<(u64, Subscription)>) {
		if replay.is_empty() {
			return;
		}
		tracing::info!(count = replay.len(), "Restoring subscriptions");

		for (handle, subscription) in replay {
			if self.closed.load(Ordering::Acquire) {
				return;
			}
			if !self.is_current(generation) {
				// Connection dropped again; the rest stay unbound for the next recovery
				return;
			}

			let kind = subscription.replay.kind();
			match self.resubscribe(handle, &subscription).await {
				Ok(Some(id)) => tracing::info!(%kind, handle, id, "Resubscribed"),
				Ok(None) => tracing::debug!(%kind, handle, "Unsubscribed during replay"),
				Err(e) if e.is_connection_error() => {
					tracing::warn!(%kind, handle, error = %e, "Resubscribe interrupted, keeping for next attempt");
				}
				Err(e) => {
					tracing::warn!(%kind, handle, error = %e, "Server refused to restore subscription, dropping it");
					self.subscriptions.remove(handle);
				}
			}
		}
	}

	async fn drop_transport(&self) {
		let sender = self.outbound.lock().await.sender.take();
		if let Some(mut sender) = sender {
			match tokio::time::timeout(TRANSPORT_CLOSE_TIMEOUT, sender.close()).await {
				Ok(Ok(())) => {}
				Ok(Err(e)) => tracing::debug!(error = %e, "Transport close failed"),
				Err(_) => tracing::debug!("Transport close timed out"),
			}
		}
	}

	/// Final teardown. Returns false if the session was already closed.
	async fn shutdown(&self, abort_recovery: bool) -> bool {
		if self.closed.swap(true, Ordering::AcqRel) {
			return false;
		}
		self.generation.fetch_add(1, Ordering::AcqRel);

		let mut tasks = std::mem::take(&mut *self.tasks.lock());
		tasks.abort_loops();
		if abort_recovery {
			if let Some(recovery) = tasks.recovery.take() {
				recovery.abort();
			}
		}

		self.drop_transport().await;
		let failed = self.pending.fail_all(Disconnect::Closed);
		self.subscriptions.clear();
		self.state.send_replace(SessionState::Closed);
		tracing::info!(failed, "Session closed");
		true
	}
}

async fn next_handshake_frame(receiver: &mut dyn TransportReceiver) -> Result<InboundFrame> {
	let text = receiver
		.recv()
		.await
		.ok_or_else(|| Error::ConnectionLost("connection closed during handshake".to_string()))??;
	let mut frames: Vec<InboundFrame> = decode(&text).into_iter().collect();
	if frames.len() != 1 {
		return Err(Error::Protocol(format!(
			"expected a single handshake frame, got {}",
			frames.len()
		)));
	}
	Ok(frames.remove(0))
}

fn into_result(frame: InboundFrame) -> Result<Value> {
	match frame {
		InboundFrame::Result(ResultFrame {
			success: true,
			result,
			..
		}) => Ok(result.unwrap_or(Value::Null)),
		InboundFrame::Result(ResultFrame { error, .. }) => Err(Error::Request {
			error: error.unwrap_or(Value::Null),
		}),
		other => Err(Error::Protocol(format!(
			"expected result, got {}",
			other.type_name()
		))),
	}
}
