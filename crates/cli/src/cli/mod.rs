use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "hass")]
#[command(about = "Home Assistant WebSocket client")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Home Assistant address: host[:port], http(s):// or ws(s)://
	#[arg(long, global = true, env = "HASS_URL", value_name = "URL")]
	pub url: Option<String>,

	/// Long-lived access token
	#[arg(long, global = true, env = "HASS_TOKEN", value_name = "TOKEN", hide_env_values = true)]
	pub token: Option<String>,

	/// JSON config file with `url`, `token` and `session` settings
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Print compact single-line JSON
	#[arg(long, global = true)]
	pub compact: bool,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Round-trip a ping
	Ping,

	/// List entity states, or show one entity
	States {
		/// Only this entity, e.g. `light.kitchen`
		entity_id: Option<String>,
	},

	/// Show the server configuration
	Config,

	/// List available services
	Services,

	/// Call a service
	#[command(name = "call")]
	CallService(CallServiceArgs),

	/// Fire an event on the event bus
	#[command(name = "fire")]
	FireEvent {
		event_type: String,

		/// Event data as a JSON object
		#[arg(long, value_name = "JSON")]
		data: Option<String>,
	},

	/// Print events as they arrive, one JSON document per line
	Watch {
		/// Only events of this type
		event_type: Option<String>,

		/// Exit after this many events
		#[arg(short = 'n', long)]
		count: Option<usize>,
	},

	/// Wait until a config flow of an integration progresses and print its flow id
	WaitFlow {
		/// Integration domain, e.g. `xiaomi_home`
		handler: String,

		/// Give up after this many seconds
		#[arg(long, default_value_t = 120)]
		timeout: u64,
	},
}

#[derive(Args, Debug)]
pub struct CallServiceArgs {
	/// Service domain, e.g. `light`
	pub domain: String,

	/// Service name, e.g. `turn_on`
	pub service: String,

	/// Service data as a JSON object
	#[arg(long, value_name = "JSON")]
	pub data: Option<String>,

	/// Target as a JSON object, e.g. `{"entity_id": "light.kitchen"}`
	#[arg(long, value_name = "JSON")]
	pub target: Option<String>,

	/// Shorthand for `--target '{"entity_id": ...}'`
	#[arg(long, conflicts_with = "target")]
	pub entity: Option<String>,

	/// Ask the service for response data
	#[arg(long)]
	pub return_response: bool,
}

#[cfg(test)]
mod tests;
