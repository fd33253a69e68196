// Client integration tests
//
// Drive the facade against a scripted server over a real localhost WebSocket.

mod test_server;

use std::time::Duration;

use hass::{Client, Command, Error, ServiceCall, SessionConfig, SessionState};
use serde_json::{Value, json};
use test_server::{TOKEN, TestServer};
use tokio::sync::mpsc;

fn config() -> SessionConfig {
	SessionConfig::default()
		.request_timeout(Duration::from_secs(2))
		.connect_timeout(Duration::from_secs(2))
		.reconnect_backoff(Duration::from_millis(20), 2.0, Duration::from_millis(200))
}

async fn setup() -> (Client, TestServer) {
	let server = TestServer::start().await;
	let client = Client::connect(&server.url(), TOKEN, config())
		.await
		.expect("Failed to connect");
	(client, server)
}

async fn recv_event(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
	tokio::time::timeout(Duration::from_secs(2), rx.recv())
		.await
		.expect("no event within 2s")
		.expect("callback dropped")
}

#[tokio::test]
async fn test_get_states() {
	let (client, server) = setup().await;
	assert_eq!(client.state(), SessionState::Ready);

	let states = client.get_states().await.unwrap();
	let ids: Vec<&str> = states
		.as_array()
		.unwrap()
		.iter()
		.filter_map(|s| s["entity_id"].as_str())
		.collect();
	assert_eq!(ids, vec!["light.kitchen", "sun.sun"]);

	// Feature negotiation owns id 1
	let commands = server.commands();
	assert_eq!(commands[0]["type"], "supported_features");
	assert_eq!(commands[0]["id"], 1);
	assert_eq!(commands[1]["type"], "get_states");
	assert_eq!(commands[1]["id"], 2);

	client.close().await;
	server.shutdown();
}

#[tokio::test]
async fn test_wrong_token_is_auth_error() {
	let server = TestServer::start().await;
	let err = Client::connect(&server.url(), "stale-token", config())
		.await
		.unwrap_err();

	assert!(err.is_auth_failure(), "got {err:?}");
	assert_eq!(server.authenticated(), 0);
	server.shutdown();
}

#[tokio::test]
async fn test_call_service_failure_carries_code() {
	let (client, server) = setup().await;

	let ok = client
		.call_service(
			ServiceCall::new("light", "turn_on").target(json!({"entity_id": "light.kitchen"})),
		)
		.await
		.unwrap();
	assert_eq!(ok["context"]["id"], "ctx-2");

	let err = client
		.call_service(ServiceCall::new("missing", "nothing"))
		.await
		.unwrap_err();
	assert!(matches!(err, Error::Request { .. }));
	assert_eq!(err.error_code(), Some("not_found"));
	// A failed request leaves the connection usable
	client.ping().await.unwrap();

	client.close().await;
	server.shutdown();
}

#[tokio::test]
async fn test_fired_event_reaches_subscriber() {
	let (client, server) = setup().await;
	let (tx, mut rx) = mpsc::unbounded_channel();

	client
		.subscribe_events(Some("test_event"), move |event| {
			let _ = tx.send(event);
		})
		.await
		.unwrap();

	client
		.fire_event("test_event", Some(json!({"v": 1})))
		.await
		.unwrap();
	let event = recv_event(&mut rx).await;
	assert_eq!(event["event_type"], "test_event");
	assert_eq!(event["data"], json!({"v": 1}));

	let fired = server.commands_of("fire_event");
	assert_eq!(fired[0]["event_data"], json!({"v": 1}));

	client.close().await;
	server.shutdown();
}

#[tokio::test]
async fn test_subscription_survives_server_restart() {
	let (client, server) = setup().await;
	let (tx, mut rx) = mpsc::unbounded_channel();

	let first_id = client
		.subscribe_events(Some("state_changed"), move |event| {
			let _ = tx.send(event);
		})
		.await
		.unwrap();
	server.push_event("state_changed", json!({"entity_id": "light.kitchen"}));
	assert_eq!(recv_event(&mut rx).await["data"]["entity_id"], "light.kitchen");

	server.drop_connections();
	server.wait_for_authenticated(2).await;
	server.wait_for_subscriber("state_changed").await;

	let mut watch = client.session().watch_state();
	tokio::time::timeout(Duration::from_secs(2), watch.wait_for(|s| s.is_ready()))
		.await
		.unwrap()
		.unwrap();

	server.push_event("state_changed", json!({"entity_id": "sun.sun"}));
	assert_eq!(recv_event(&mut rx).await["data"]["entity_id"], "sun.sun");

	// Replayed under a fresh id on the new connection
	let subscribes = server.commands_of("subscribe_events");
	assert_eq!(subscribes.len(), 2);
	assert_eq!(subscribes[0]["id"], first_id);
	assert_eq!(subscribes[1]["event_type"], "state_changed");

	client.close().await;
	server.shutdown();
}

#[tokio::test]
async fn test_unsubscribe_references_original_id() {
	let (client, server) = setup().await;

	let id = client
		.subscribe_events(Some("state_changed"), |_| {})
		.await
		.unwrap();
	assert_eq!(server.subscriber_count("state_changed"), 1);

	client.unsubscribe_events(id).await.unwrap();
	assert_eq!(server.subscriber_count("state_changed"), 0);

	let unsubscribe = &server.commands_of("unsubscribe_events")[0];
	assert_eq!(unsubscribe["subscription"], id);
	assert!(unsubscribe["id"].as_u64().unwrap() > id);
	assert!(client.session().subscriptions().is_empty());

	client.close().await;
	server.shutdown();
}

#[tokio::test]
async fn test_admin_change_password_defaults_to_current_user() {
	let (client, server) = setup().await;

	client.admin_change_password("hunter2", None).await.unwrap();
	client
		.admin_change_password("hunter3", Some("user-9"))
		.await
		.unwrap();

	let changes = server.commands_of("config/auth_provider/homeassistant/admin_change_password");
	assert_eq!(changes[0]["user_id"], "user-1");
	assert_eq!(changes[0]["password"], "hunter2");
	assert_eq!(changes[1]["user_id"], "user-9");
	assert_eq!(server.commands_of("auth/current_user").len(), 1);

	client.close().await;
	server.shutdown();
}

#[tokio::test]
async fn test_token_lifecycle_commands() {
	let (client, server) = setup().await;

	let token = client
		.create_long_lived_token("ci", hass::DEFAULT_TOKEN_LIFESPAN_DAYS)
		.await
		.unwrap();
	assert_eq!(token, "llat-token");
	client.delete_refresh_token("rt-1").await.unwrap();
	client.refresh_tokens().await.unwrap();

	let created = &server.commands_of("auth/long_lived_access_token")[0];
	assert_eq!(created["client_name"], "ci");
	assert_eq!(created["lifespan"], 3650);
	let deleted = &server.commands_of("auth/delete_refresh_token")[0];
	assert_eq!(deleted["refresh_token_id"], "rt-1");

	client.close().await;
	server.shutdown();
}

#[tokio::test]
async fn test_generic_command_and_validate_config() {
	let (client, server) = setup().await;

	let config = client
		.command(Command::new("get_config"))
		.await
		.unwrap();
	assert_eq!(config["location_name"], "Test Home");

	client
		.validate_config(Some(json!({"platform": "sun", "event": "sunset"})), None, None)
		.await
		.unwrap();
	let validate = &server.commands_of("validate_config")[0];
	assert!(validate.get("trigger").is_some());
	assert!(validate.get("condition").is_none());
	assert!(validate.get("action").is_none());

	client.close().await;
	server.shutdown();
}

#[tokio::test]
async fn test_requests_fail_after_close() {
	let (client, server) = setup().await;

	client.close().await;
	client.close().await;

	assert_eq!(client.state(), SessionState::Closed);
	assert!(matches!(client.get_states().await, Err(Error::Closed)));
	server.shutdown();
}
