//! Process-wide `tracing` setup for the CLI.
//!
//! Logs go to stderr so stdout stays clean for text and JSON output.
//! `RUST_LOG` overrides the verbosity flag entirely.

use tracing_subscriber::EnvFilter;

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Directives used when `RUST_LOG` is unset: dependencies stay at `warn`,
/// this crate follows `-v`.
pub fn default_directives(verbosity: u8) -> String {
    format!("warn,tradegate={}", level_for(verbosity))
}

pub fn init_logging(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
