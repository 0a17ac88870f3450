//! Tracing subscriber setup

use anyhow::anyhow;
use pingsync_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Filter directive for the configured level raised by `-v` flags
pub fn filter_directive(config: &LoggingConfig, verbose: u8) -> &str {
    match verbose {
        0 => config.level.as_str(),
        1 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over both the config and `-v`. Output goes to stderr so
/// that `pingsyncd run` can write progress frames to stdout.
pub fn init(config: &LoggingConfig, verbose: u8) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config, verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    result.map_err(|e| anyhow!("Failed to initialise logging: {e}"))
}
