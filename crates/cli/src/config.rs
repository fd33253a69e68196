//! Connection settings: command line and environment first, then the config file.

use std::path::Path;

use anyhow::{Context, Result};
use hass::SessionConfig;
use serde::Deserialize;

use crate::cli::Cli;

/// Contents of a `--config` file.
///
/// ```json
/// {"url": "http://homeassistant.local:8123", "token": "...", "session": {"request_timeout_ms": 5000}}
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
	pub url: Option<String>,
	pub token: Option<String>,
	pub session: SessionConfig,
}

impl FileConfig {
	pub fn load(path: &Path) -> Result<Self> {
		let text = std::fs::read_to_string(path)
			.with_context(|| format!("failed to read config file {}", path.display()))?;
		Self::from_json(&text).with_context(|| format!("invalid config file {}", path.display()))
	}

	pub fn from_json(text: &str) -> serde_json::Result<Self> {
		serde_json::from_str(text)
	}
}

/// Everything needed to open a session.
#[derive(Debug)]
pub struct Settings {
	pub url: String,
	pub token: String,
	pub session: SessionConfig,
}

impl Settings {
	pub fn resolve(cli: &Cli) -> Result<Self> {
		let file = match &cli.config {
			Some(path) => FileConfig::load(path)?,
			None => FileConfig::default(),
		};
		Self::merge(cli.url.clone(), cli.token.clone(), file)
	}

	fn merge(url: Option<String>, token: Option<String>, file: FileConfig) -> Result<Self> {
		let url = url
			.or(file.url)
			.context("no Home Assistant address: pass --url, set HASS_URL or add `url` to the config file")?;
		let token = token
			.or(file.token)
			.context("no access token: pass --token, set HASS_TOKEN or add `token` to the config file")?;
		Ok(Self {
			url,
			token,
			session: file.session,
		})
	}
}

#[cfg(test)]
mod tests {
	use std::time::Duration;

	use super::*;

	#[test]
	fn command_line_wins_over_file() {
		let file = FileConfig::from_json(
			r#"{"url": "http://file.local:8123", "token": "file-token", "session": {"heartbeat_interval_ms": 5000}}"#,
		)
		.unwrap();

		let settings = Settings::merge(Some("ws://cli.local".into()), None, file).unwrap();
		assert_eq!(settings.url, "ws://cli.local");
		assert_eq!(settings.token, "file-token");
		assert_eq!(settings.session.heartbeat_interval, Duration::from_secs(5));
		assert_eq!(settings.session.request_timeout, Duration::from_secs(15));
	}

	#[test]
	fn missing_token_is_reported() {
		let err = Settings::merge(Some("hass.local".into()), None, FileConfig::default()).unwrap_err();
		assert!(err.to_string().contains("HASS_TOKEN"));
	}

	#[test]
	fn unknown_keys_are_rejected() {
		assert!(FileConfig::from_json(r#"{"uri": "typo"}"#).is_err());
	}
}
