//! Structured logging setup.
//!
//! Installs a `tracing-subscriber` registry once at process startup. Verbosity
//! is controlled by `-v`/`-q` (mapped to a default filter) and can be
//! overridden with the `TESTME_LOG` environment variable. `--log-format json`
//! switches to newline-delimited JSON events for CI consumption; the default
//! is a human-readable compact format on stderr.
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Install the global tracing subscriber.
///
/// `verbose` and `quiet` select a default filter level when `TESTME_LOG` is
/// unset; `TESTME_LOG` (standard `EnvFilter` syntax) always wins when present.
pub fn init(verbose: bool, quiet: bool, format: LogFormat) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_env("TESTME_LOG")
        .unwrap_or_else(|_| EnvFilter::new(format!("testme={default_level}")));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => {
            let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
            registry.with(layer).init();
        }
        LogFormat::Json => {
            let layer = fmt::layer().json().with_writer(std::io::stderr);
            registry.with(layer).init();
        }
    }
}
