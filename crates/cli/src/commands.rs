use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use hass::{Client, ServiceCall, SessionState};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::cli::{CallServiceArgs, Cli, Commands};
use crate::config::Settings;

/// Connects, runs one command and closes the session.
pub async fn dispatch(cli: Cli) -> Result<()> {
	let settings = Settings::resolve(&cli)?;
	let client = Client::connect(&settings.url, &settings.token, settings.session)
		.await
		.with_context(|| format!("failed to connect to {}", settings.url))?;
	tracing::info!(url = client.session().url(), "Connected");

	let output = Output {
		compact: cli.compact,
	};
	let result = run(&client, cli.command, output).await;
	client.close().await;
	result
}

async fn run(client: &Client, command: Commands, output: Output) -> Result<()> {
	match command {
		Commands::Ping => {
			let started = Instant::now();
			client.ping().await?;
			output.print(&json!({
				"pong": true,
				"elapsed_ms": started.elapsed().as_millis() as u64,
			}));
		}
		Commands::States { entity_id } => {
			let states = client.get_states().await?;
			match entity_id {
				Some(entity_id) => {
					let state = find_state(&states, &entity_id)
						.with_context(|| format!("no entity named {entity_id}"))?;
					output.print(state);
				}
				None => output.print(&states),
			}
		}
		Commands::Config => output.print(&client.get_config().await?),
		Commands::Services => output.print(&client.get_services().await?),
		Commands::CallService(args) => {
			let call = service_call(args)?;
			output.print(&client.call_service(call).await?);
		}
		Commands::FireEvent { event_type, data } => {
			let data = data.map(|text| parse_object("--data", &text)).transpose()?;
			output.print(&client.fire_event(&event_type, data).await?);
		}
		Commands::Watch { event_type, count } => watch(client, event_type.as_deref(), count).await?,
		Commands::WaitFlow { handler, timeout } => {
			let flow_id =
				hass::wait_for_flow_progress(client, &handler, Duration::from_secs(timeout)).await?;
			output.print(&json!({"handler": handler, "flow_id": flow_id}));
		}
	}
	Ok(())
}

/// Streams events to stdout until `count` is reached or Ctrl-C.
async fn watch(client: &Client, event_type: Option<&str>, count: Option<usize>) -> Result<()> {
	let (tx, mut rx) = mpsc::unbounded_channel();
	let subscription_id = client
		.subscribe_events(event_type, move |event| {
			let _ = tx.send(event);
		})
		.await?;
	tracing::info!(subscription_id, event_type = ?event_type, "Watching events");

	let mut seen = 0;
	loop {
		tokio::select! {
			event = rx.recv() => {
				let Some(event) = event else {
					break;
				};
				println!("{event}");
				seen += 1;
				if count.is_some_and(|limit| seen >= limit) {
					break;
				}
			}
			_ = tokio::signal::ctrl_c() => break,
		}
	}

	if client.state() == SessionState::Closed {
		bail!("session closed while watching events");
	}
	if let Err(e) = client.unsubscribe_events(subscription_id).await {
		tracing::warn!(error = %e, "Unsubscribe failed");
	}
	Ok(())
}

fn find_state<'a>(states: &'a Value, entity_id: &str) -> Option<&'a Value> {
	states
		.as_array()?
		.iter()
		.find(|state| state["entity_id"] == entity_id)
}

fn service_call(args: CallServiceArgs) -> Result<ServiceCall> {
	let mut call = ServiceCall::new(args.domain, args.service).return_response(args.return_response);
	if let Some(data) = args.data {
		call = call.data(parse_object("--data", &data)?);
	}
	if let Some(target) = args.target {
		call = call.target(parse_object("--target", &target)?);
	}
	if let Some(entity_id) = args.entity {
		call = call.target(json!({"entity_id": entity_id}));
	}
	Ok(call)
}

fn parse_object(flag: &str, text: &str) -> Result<Value> {
	let value: Value =
		serde_json::from_str(text).with_context(|| format!("{flag} is not valid JSON"))?;
	if !value.is_object() {
		bail!("{flag} must be a JSON object, got {value}");
	}
	Ok(value)
}

#[derive(Debug, Clone, Copy)]
struct Output {
	compact: bool,
}

impl Output {
	fn print(&self, value: &Value) {
		if self.compact {
			println!("{value}");
		} else {
			println!("{value:#}");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn call_args(data: Option<&str>, target: Option<&str>, entity: Option<&str>) -> CallServiceArgs {
		CallServiceArgs {
			domain: "light".into(),
			service: "turn_on".into(),
			data: data.map(str::to_string),
			target: target.map(str::to_string),
			entity: entity.map(str::to_string),
			return_response: false,
		}
	}

	#[test]
	fn entity_shorthand_becomes_target() {
		let command = service_call(call_args(None, None, Some("light.kitchen")))
			.unwrap()
			.into_command();
		assert_eq!(
			command.field("target"),
			Some(&json!({"entity_id": "light.kitchen"}))
		);
	}

	#[test]
	fn non_object_data_is_rejected() {
		let err = service_call(call_args(Some("[1, 2]"), None, None)).unwrap_err();
		assert!(err.to_string().contains("--data must be a JSON object"));

		let err = service_call(call_args(Some("{oops"), None, None)).unwrap_err();
		assert!(err.to_string().contains("not valid JSON"));
	}

	#[test]
	fn find_state_by_entity_id() {
		let states = json!([
			{"entity_id": "light.kitchen", "state": "on"},
			{"entity_id": "sun.sun", "state": "below_horizon"},
		]);
		assert_eq!(find_state(&states, "sun.sun").unwrap()["state"], "below_horizon");
		assert!(find_state(&states, "switch.none").is_none());
	}
}
