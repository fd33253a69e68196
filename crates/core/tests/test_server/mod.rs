// Scripted Home Assistant server for integration tests.
//
// Speaks the WebSocket API over a real localhost socket: handshake, a handful
// of commands, and event fan-out to subscribers.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const TOKEN: &str = "test-token";

struct Subscriber {
	conn: u64,
	id: u64,
	event_type: Option<String>,
	tx: mpsc::UnboundedSender<String>,
}

struct State {
	token: String,
	commands: Mutex<Vec<Value>>,
	subscribers: Mutex<Vec<Subscriber>>,
	kick: broadcast::Sender<()>,
	authenticated: AtomicUsize,
	next_conn: AtomicU64,
}

pub struct TestServer {
	addr: std::net::SocketAddr,
	state: Arc<State>,
	accept_task: JoinHandle<()>,
}

impl TestServer {
	pub async fn start() -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let addr = listener.local_addr().unwrap();
		let (kick, _) = broadcast::channel(4);
		let state = Arc::new(State {
			token: TOKEN.to_string(),
			commands: Mutex::new(Vec::new()),
			subscribers: Mutex::new(Vec::new()),
			kick,
			authenticated: AtomicUsize::new(0),
			next_conn: AtomicU64::new(0),
		});

		let accept_task = tokio::spawn({
			let state = Arc::clone(&state);
			async move {
				while let Ok((stream, _)) = listener.accept().await {
					tokio::spawn(serve(stream, Arc::clone(&state)));
				}
			}
		});

		Self {
			addr,
			state,
			accept_task,
		}
	}

	/// Base address in the `http://` form users usually copy from a browser.
	pub fn url(&self) -> String {
		format!("http://{}", self.addr)
	}

	/// Every id-bearing command received so far, in order.
	pub fn commands(&self) -> Vec<Value> {
		self.state.commands.lock().clone()
	}

	pub fn commands_of(&self, kind: &str) -> Vec<Value> {
		self.commands()
			.into_iter()
			.filter(|c| c["type"] == kind)
			.collect()
	}

	/// Number of connections that passed authentication.
	pub fn authenticated(&self) -> usize {
		self.state.authenticated.load(Ordering::SeqCst)
	}

	pub fn subscriber_count(&self, event_type: &str) -> usize {
		self.state
			.subscribers
			.lock()
			.iter()
			.filter(|s| s.event_type.as_deref() == Some(event_type))
			.count()
	}

	pub async fn wait_for_subscriber(&self, event_type: &str) {
		for _ in 0..200 {
			if self.subscriber_count(event_type) > 0 {
				return;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("no subscriber for {event_type}");
	}

	pub async fn wait_for_authenticated(&self, count: usize) {
		for _ in 0..200 {
			if self.authenticated() >= count {
				return;
			}
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
		panic!("fewer than {count} authenticated connections");
	}

	/// Pushes an event to every matching subscriber. Returns how many got it.
	pub fn push_event(&self, event_type: &str, data: Value) -> usize {
		push_event(&self.state, event_type, data)
	}

	/// Drops every open connection from the server side.
	pub fn drop_connections(&self) {
		let _ = self.state.kick.send(());
	}

	pub fn shutdown(self) {
		self.accept_task.abort();
		self.drop_connections();
	}
}

fn push_event(state: &State, event_type: &str, data: Value) -> usize {
	let subscribers = state.subscribers.lock();
	let mut delivered = 0;
	for sub in subscribers.iter() {
		let matches = sub.event_type.as_deref().is_none_or(|t| t == event_type);
		if !matches {
			continue;
		}
		let frame = json!({
			"id": sub.id,
			"type": "event",
			"event": {"event_type": event_type, "data": data, "origin": "LOCAL"},
		});
		if sub.tx.send(frame.to_string()).is_ok() {
			delivered += 1;
		}
	}
	delivered
}

async fn serve(stream: TcpStream, state: Arc<State>) {
	let Ok(ws) = accept_async(stream).await else {
		return;
	};
	let (mut sink, mut source) = ws.split();
	let conn = state.next_conn.fetch_add(1, Ordering::SeqCst);
	let mut kick = state.kick.subscribe();

	let hello = json!({"type": "auth_required", "ha_version": "2024.6.0"});
	if sink.send(Message::Text(hello.to_string())).await.is_err() {
		return;
	}
	let auth = match source.next().await {
		Some(Ok(Message::Text(text))) => serde_json::from_str::<Value>(&text).unwrap_or_default(),
		_ => return,
	};
	if auth["type"] != "auth" || auth["access_token"] != state.token.as_str() {
		let reply = json!({"type": "auth_invalid", "message": "Invalid access token or password"});
		let _ = sink.send(Message::Text(reply.to_string())).await;
		let _ = sink.close().await;
		return;
	}
	let ok = json!({"type": "auth_ok", "ha_version": "2024.6.0"});
	if sink.send(Message::Text(ok.to_string())).await.is_err() {
		return;
	}
	state.authenticated.fetch_add(1, Ordering::SeqCst);

	let (tx, mut rx) = mpsc::unbounded_channel::<String>();
	loop {
		tokio::select! {
			Some(text) = rx.recv() => {
				if sink.send(Message::Text(text)).await.is_err() {
					break;
				}
			}
			message = source.next() => match message {
				Some(Ok(Message::Text(text))) => {
					if let Ok(command) = serde_json::from_str::<Value>(&text) {
						handle(&state, conn, &tx, command);
					}
				}
				Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
				Some(Ok(_)) => {}
			},
			_ = kick.recv() => break,
		}
	}

	state.subscribers.lock().retain(|s| s.conn != conn);
	let _ = sink.close().await;
}

fn handle(state: &State, conn: u64, tx: &mpsc::UnboundedSender<String>, command: Value) {
	state.commands.lock().push(command.clone());
	let id = command["id"].clone();
	let success = |result: Value| json!({"id": id, "type": "result", "success": true, "result": result});

	let reply = match command["type"].as_str().unwrap_or_default() {
		"supported_features" => return,
		"ping" => json!({"id": id, "type": "pong"}),
		"get_states" => success(json!([
			{"entity_id": "light.kitchen", "state": "on", "attributes": {}},
			{"entity_id": "sun.sun", "state": "above_horizon", "attributes": {}},
		])),
		"get_config" => success(json!({"location_name": "Test Home", "version": "2024.6.0"})),
		"subscribe_events" => {
			state.subscribers.lock().push(Subscriber {
				conn,
				id: command["id"].as_u64().unwrap_or_default(),
				event_type: command["event_type"].as_str().map(str::to_string),
				tx: tx.clone(),
			});
			success(Value::Null)
		}
		"unsubscribe_events" => {
			let target = command["subscription"].as_u64();
			let mut subscribers = state.subscribers.lock();
			let before = subscribers.len();
			subscribers.retain(|s| !(s.conn == conn && Some(s.id) == target));
			if subscribers.len() == before {
				json!({
					"id": id,
					"type": "result",
					"success": false,
					"error": {"code": "not_found", "message": "Subscription not found."},
				})
			} else {
				success(Value::Null)
			}
		}
		"fire_event" => {
			let event_type = command["event_type"].as_str().unwrap_or_default().to_string();
			let data = command.get("event_data").cloned().unwrap_or_else(|| json!({}));
			// Reply first, then fan out, like the real server's event loop
			let _ = tx.send(success(json!({"context": {"id": "ctx-1"}})).to_string());
			push_event(state, &event_type, data);
			return;
		}
		"call_service" if command["domain"] == "missing" => json!({
			"id": id,
			"type": "result",
			"success": false,
			"error": {"code": "not_found", "message": "Service not found."},
		}),
		"call_service" => success(json!({"context": {"id": "ctx-2"}, "response": null})),
		"auth/current_user" => success(json!({"id": "user-1", "name": "Owner", "is_admin": true})),
		"auth/long_lived_access_token" => success(json!("llat-token")),
		_ => success(Value::Null),
	};
	let _ = tx.send(reply.to_string());
}
