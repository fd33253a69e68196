use std::path::PathBuf;

use clap::Parser;

use super::*;

#[test]
fn parse_call_service_command() {
	let args = vec![
		"hass",
		"--url",
		"http://hass.local:8123",
		"--token",
		"abc",
		"call",
		"light",
		"turn_on",
		"--entity",
		"light.kitchen",
		"--data",
		r#"{"brightness_pct": 40}"#,
	];
	let cli = Cli::try_parse_from(args).unwrap();

	assert_eq!(cli.url.as_deref(), Some("http://hass.local:8123"));
	assert_eq!(cli.token.as_deref(), Some("abc"));
	match cli.command {
		Commands::CallService(args) => {
			assert_eq!(args.domain, "light");
			assert_eq!(args.service, "turn_on");
			assert_eq!(args.entity.as_deref(), Some("light.kitchen"));
			assert_eq!(args.data.as_deref(), Some(r#"{"brightness_pct": 40}"#));
			assert!(!args.return_response);
		}
		_ => panic!("Expected CallService command"),
	}
}

#[test]
fn entity_conflicts_with_target() {
	let args = vec![
		"hass",
		"call",
		"light",
		"turn_on",
		"--entity",
		"light.kitchen",
		"--target",
		"{}",
	];
	assert!(Cli::try_parse_from(args).is_err());
}

#[test]
fn parse_watch_with_count() {
	let args = vec!["hass", "watch", "state_changed", "-n", "3", "-vv"];
	let cli = Cli::try_parse_from(args).unwrap();

	assert_eq!(cli.verbose, 2);
	match cli.command {
		Commands::Watch { event_type, count } => {
			assert_eq!(event_type.as_deref(), Some("state_changed"));
			assert_eq!(count, Some(3));
		}
		_ => panic!("Expected Watch command"),
	}
}

#[test]
fn parse_global_config_after_subcommand() {
	let args = vec!["hass", "states", "sun.sun", "--config", "/etc/hass.json"];
	let cli = Cli::try_parse_from(args).unwrap();

	assert_eq!(cli.config, Some(PathBuf::from("/etc/hass.json")));
	match cli.command {
		Commands::States { entity_id } => assert_eq!(entity_id.as_deref(), Some("sun.sun")),
		_ => panic!("Expected States command"),
	}
}

#[test]
fn wait_flow_defaults_timeout() {
	let cli = Cli::try_parse_from(vec!["hass", "wait-flow", "xiaomi_home"]).unwrap();
	match cli.command {
		Commands::WaitFlow { handler, timeout } => {
			assert_eq!(handler, "xiaomi_home");
			assert_eq!(timeout, 120);
		}
		_ => panic!("Expected WaitFlow command"),
	}
}
