//! Structured logging setup.
//!
//! Initializes a `tracing` subscriber with `RUST_LOG` filter support
//! (default: `songmark=info`), JSON output when `RUST_LOG_FORMAT=json`,
//! and a bridge so `log` macro callsites land in the same subscriber.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Call once at program startup. Safe to call multiple times
/// (subsequent calls are no-ops).
pub fn init() {
    // `log` records from the worker and db layers flow into tracing.
    let _ = tracing_log::LogTracer::init();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("songmark=info"));

    let is_json = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    if is_json {
        let _ = subscriber.json().try_init();
    } else {
        let _ = subscriber.try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }

    #[test]
    fn test_default_filter_parses() {
        let filter = EnvFilter::new("songmark=debug");
        assert!(format!("{filter:?}").contains("songmark"));
    }
}
