//! Typed command facade over a [`Session`].

use hass_protocol::Command;
use hass_runtime::{Error, Result, Session, SessionBuilder, SessionConfig, SessionState};
use serde_json::Value;

/// Lifespan, in days, of tokens created by [`Client::create_long_lived_token`]
/// when the caller has no preference.
pub const DEFAULT_TOKEN_LIFESPAN_DAYS: u32 = 3650;

/// Home Assistant client.
///
/// Every method maps to one outbound command and its reply. Failures share the
/// session's semantics: `success: false` surfaces as [`Error::Request`] with the
/// server's payload, a missing reply as [`Error::Timeout`], and a dropped
/// connection as [`Error::ConnectionLost`].
///
/// Subscriptions survive reconnects: the callback is rebound to a new
/// subscription id, so treat returned ids as connection-scoped.
///
/// # Example
///
/// ```ignore
/// let client = Client::connect("homeassistant.local:8123", token, SessionConfig::default()).await?;
/// let states = client.get_states().await?;
/// client
///     .subscribe_events(Some("state_changed"), |event| println!("{event}"))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Client {
	session: Session,
}

impl Client {
	/// Connects to `base` with the long-lived access `token`.
	pub async fn connect(base: &str, token: &str, config: SessionConfig) -> Result<Self> {
		let session = Session::builder(base, token).config(config).connect().await?;
		Ok(Self::from_session(session))
	}

	/// Session builder for connectors, reconnect hooks or a custom span.
	///
	/// Wrap the connected session with [`Client::from_session`].
	pub fn builder(base: &str, token: &str) -> SessionBuilder {
		Session::builder(base, token)
	}

	pub fn from_session(session: Session) -> Self {
		Self { session }
	}

	/// The underlying session.
	pub fn session(&self) -> &Session {
		&self.session
	}

	pub async fn close(&self) {
		self.session.close().await;
	}

	pub fn state(&self) -> SessionState {
		self.session.state()
	}

	pub fn is_connected(&self) -> bool {
		self.session.is_connected()
	}

	/// Sends an arbitrary command and returns its `result` payload.
	pub async fn command(&self, command: Command) -> Result<Value> {
		self.session.request(command).await
	}

	/// Subscribes with an arbitrary subscribe command.
	pub async fn subscribe<F>(&self, command: Command, callback: F) -> Result<u64>
	where
		F: Fn(Value) + Send + Sync + 'static,
	{
		self.session.subscribe(command, callback).await
	}

	/// Subscribes to the event bus, optionally filtered to one event type.
	pub async fn subscribe_events<F>(&self, event_type: Option<&str>, callback: F) -> Result<u64>
	where
		F: Fn(Value) + Send + Sync + 'static,
	{
		let command = Command::new("subscribe_events")
			.with_opt("event_type", event_type.filter(|t| !t.is_empty()));
		self.subscribe(command, callback).await
	}

	/// Subscribes to an automation trigger (one trigger object or a list).
	pub async fn subscribe_trigger<F>(&self, trigger: Value, callback: F) -> Result<u64>
	where
		F: Fn(Value) + Send + Sync + 'static,
	{
		let command = Command::new("subscribe_trigger").with("trigger", trigger);
		self.subscribe(command, callback).await
	}

	/// Subscribes to config entry changes. An empty `type_filter` means all types.
	pub async fn subscribe_config_entries<F>(&self, type_filter: &[&str], callback: F) -> Result<u64>
	where
		F: Fn(Value) + Send + Sync + 'static,
	{
		let filter = (!type_filter.is_empty()).then(|| type_filter.to_vec());
		let command = Command::new("config_entries/subscribe").with_opt("type_filter", filter);
		self.subscribe(command, callback).await
	}

	/// Cancels a subscription by the id returned when it was created.
	pub async fn unsubscribe_events(&self, subscription_id: u64) -> Result<()> {
		self.session.unsubscribe(subscription_id).await
	}

	pub async fn fire_event(&self, event_type: &str, event_data: Option<Value>) -> Result<Value> {
		let command = Command::new("fire_event")
			.with("event_type", event_type)
			.with_opt("event_data", event_data.filter(|data| !is_empty_object(data)));
		self.command(command).await
	}

	pub async fn call_service(&self, call: ServiceCall) -> Result<Value> {
		self.command(call.into_command()).await
	}

	pub async fn get_states(&self) -> Result<Value> {
		self.command(Command::new("get_states")).await
	}

	pub async fn get_config(&self) -> Result<Value> {
		self.command(Command::new("get_config")).await
	}

	pub async fn get_services(&self) -> Result<Value> {
		self.command(Command::new("get_services")).await
	}

	pub async fn get_panels(&self) -> Result<Value> {
		self.command(Command::new("get_panels")).await
	}

	/// Validates automation snippets. Omitted parts are not sent.
	pub async fn validate_config(
		&self,
		trigger: Option<Value>,
		condition: Option<Value>,
		action: Option<Value>,
	) -> Result<Value> {
		let command = Command::new("validate_config")
			.with_opt("trigger", trigger)
			.with_opt("condition", condition)
			.with_opt("action", action);
		self.command(command).await
	}

	/// Resolves a service target into entities, devices and areas.
	pub async fn extract_from_target(&self, target: Value, expand_group: bool) -> Result<Value> {
		let command = Command::new("extract_from_target")
			.with("target", target)
			.with("expand_group", expand_group);
		self.command(command).await
	}

	pub async fn current_user(&self) -> Result<Value> {
		self.command(Command::new("auth/current_user")).await
	}

	/// Refresh tokens of the authenticated user.
	pub async fn refresh_tokens(&self) -> Result<Value> {
		self.command(Command::new("auth/refresh_tokens")).await
	}

	/// Creates a long-lived access token; the reply is the token string.
	pub async fn create_long_lived_token(&self, client_name: &str, lifespan_days: u32) -> Result<Value> {
		let command = Command::new("auth/long_lived_access_token")
			.with("client_name", client_name)
			.with("lifespan", lifespan_days);
		self.command(command).await
	}

	pub async fn delete_refresh_token(&self, refresh_token_id: &str) -> Result<()> {
		let command =
			Command::new("auth/delete_refresh_token").with("refresh_token_id", refresh_token_id);
		self.command(command).await.map(|_| ())
	}

	/// Sets a user's password. Targets the authenticated user when `user_id` is `None`.
	pub async fn admin_change_password(&self, password: &str, user_id: Option<&str>) -> Result<()> {
		let user_id = match user_id {
			Some(id) => id.to_string(),
			None => {
				let user = self.current_user().await?;
				user.get("id")
					.and_then(Value::as_str)
					.map(str::to_string)
					.ok_or_else(|| Error::Protocol("auth/current_user reply has no id".to_string()))?
			}
		};

		let command = Command::new("config/auth_provider/homeassistant/admin_change_password")
			.with("user_id", user_id)
			.with("password", password);
		self.command(command).await.map(|_| ())
	}

	/// Round-trips a `ping`.
	pub async fn ping(&self) -> Result<()> {
		self.session.ping().await
	}
}

impl From<Session> for Client {
	fn from(session: Session) -> Self {
		Self::from_session(session)
	}
}

fn is_empty_object(value: &Value) -> bool {
	value.as_object().is_some_and(|map| map.is_empty())
}

/// Arguments of a `call_service` command.
///
/// ```ignore
/// let call = ServiceCall::new("light", "turn_on")
///     .target(json!({"entity_id": "light.kitchen"}))
///     .data(json!({"brightness_pct": 40}));
/// client.call_service(call).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCall {
	domain: String,
	service: String,
	data: Option<Value>,
	target: Option<Value>,
	return_response: bool,
}

impl ServiceCall {
	pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
		Self {
			domain: domain.into(),
			service: service.into(),
			data: None,
			target: None,
			return_response: false,
		}
	}

	/// Service data (`service_data`). An empty object is not sent.
	pub fn data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}

	/// Entity, device or area target.
	pub fn target(mut self, target: Value) -> Self {
		self.target = Some(target);
		self
	}

	/// Ask the service to return its response data.
	pub fn return_response(mut self, enabled: bool) -> Self {
		self.return_response = enabled;
		self
	}

	pub fn into_command(self) -> Command {
		Command::new("call_service")
			.with("domain", self.domain)
			.with("service", self.service)
			.with("return_response", self.return_response)
			.with_opt("service_data", self.data.filter(|d| !is_empty_object(d)))
			.with_opt("target", self.target.filter(|t| !is_empty_object(t)))
	}
}
