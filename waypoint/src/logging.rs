//! Diagnostics for the `waypoint` binary.
//!
//! Tracing events go to stderr only: `waypoint serve` answers requests on
//! stdout, one JSON reply per line, and nothing else may be interleaved.
//! Journey history lives in the audit trail under `.waypoint/audit/`, which is
//! written whatever `RUST_LOG` says.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset or unparsable. Degraded persistence
/// is reported at `warn`, so it stays visible by default.
pub const DEFAULT_FILTER: &str = "warn";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Call once, before any command runs.
///
/// `RUST_LOG=waypoint=debug waypoint serve < requests.jsonl` shows
/// declaration loads and every journey transition.
pub fn init() {
    tracing_subscriber::registry()
        .with(filter())
        .with(fmt::layer().with_writer(std::io::stderr).without_time().compact())
        .init();
}
