use std::fmt;
use std::io;
use tracing::info;
use tracing_subscriber::{fmt as subscriber_fmt, EnvFilter};

/// Fixed prefix carried by every operation line a [`Logger`] emits.
pub const LOG_PREFIX: &str = "json-cache:";

/// Initialize tracing subscriber with sensible defaults and stdout writer.
/// - Respects `RUST_LOG` if set
/// - Falls back to `info,json_cache=info`
/// - Writes to stdout so cache operation lines land next to program output
pub fn init_logging_default() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,json_cache=info"));
    let _ = subscriber_fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(io::stdout)
        .try_init();
}

/// Initialize tracing subscriber with JSON structured output.
/// - Respects `RUST_LOG` if set, defaults to `info`
/// - Emits structured JSON logs for better machine parsing
pub fn init_logging_json() {
    // cache::debounce logs swallowed write errors at debug; RUST_LOG=info,cache=debug shows them
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = subscriber_fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .json()
        .with_writer(io::stdout)
        .try_init();
}

/// Conditionally-enabled operation logger handed to each cache instance.
///
/// A disabled logger accepts every call and does nothing. An enabled one
/// emits a single INFO line under the `json_cache` target; the line is only
/// visible once the host installs a subscriber (e.g. [`init_logging_default`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Logger {
    enabled: bool,
}

/// Build a logger; `enabled == false` yields a no-op.
pub fn make_logger(enabled: bool) -> Logger {
    Logger { enabled }
}

impl Logger {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Emit `json-cache: <op> <args>`; `args` may be empty.
    pub fn log(&self, op: &str, args: fmt::Arguments<'_>) {
        if !self.enabled {
            return;
        }
        let detail = args.to_string();
        if detail.is_empty() {
            info!(target: "json_cache", "{} {}", LOG_PREFIX, op);
        } else {
            info!(target: "json_cache", "{} {} {}", LOG_PREFIX, op, detail);
        }
    }
}
