//! Logging initialization: human-readable lines on stderr, plus a plain-text copy in
//! `<outputs>/debate_<stamp>.log`.
//!
//! `RUST_LOG` sets the level filter (default `info`). With `--json` the stderr layer is
//! limited to warnings so stdout stays machine-readable.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber. Keep the guard alive until exit or buffered file lines
/// are lost.
pub fn init(outputs: &Path, stamp: &str, quiet: bool) -> WorkerGuard {
    let appender = tracing_appender::rolling::never(outputs, format!("debate_{}.log", stamp));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_filter(filter("info,hyper_util=off"));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(if quiet { EnvFilter::new("warn") } else { filter("info,hyper_util=off") });

    if let Err(e) = tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
    {
        eprintln!("logging already initialized: {}", e);
    }
    guard
}
