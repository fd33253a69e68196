use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub fn init_logging(verbosity: u8) {
	// 0 = only errors (reconnect noise stays quiet)
	// 1 (-v) = info for the client, session lifecycle included
	// 2+ (-vv) = debug/trace for everything, frames included
	let filter = match verbosity {
		0 => "error",
		1 => "warn,hass=info,hass_runtime=info,hass_cli=info",
		_ => "debug,hass_runtime=trace",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	// stdout carries command output only
	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}
