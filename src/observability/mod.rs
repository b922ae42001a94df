// src/observability/mod.rs
//! Logging and metrics setup
//!
//! Writers and backends emit `tracing` events at lifecycle edges (leases,
//! invalidation, epoch shifts, rotations) and bump `metrics` counters; the
//! host application installs whatever recorder and subscriber it wants.
//! [`init_tracing`] is provided for binaries and tests that have none.

use crate::utils::errors::{RecorderError, Result};
use metrics::{describe_counter, Unit};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const EVENTS_COMMITTED: &str = "recorder_events_committed_total";
pub const BYTES_COMMITTED: &str = "recorder_bytes_committed_total";
pub const EVENTS_DROPPED: &str = "recorder_events_dropped_total";
pub const EVENT_RETRIES: &str = "recorder_event_retries_total";
pub const EPOCH_SHIFTS: &str = "recorder_epoch_shifts_total";
pub const LEASES_GRANTED: &str = "recorder_oversized_leases_total";
pub const STAGED_DROPPED: &str = "recorder_staged_dropped_total";

/// Environment variable selecting JSON log output
pub const LOG_FORMAT_ENV: &str = "SENTRA_RECORDER_LOG_FORMAT";

/// Install a global `tracing` subscriber filtered by `RUST_LOG`
/// (default `info`). Set `SENTRA_RECORDER_LOG_FORMAT=json` for JSON lines.
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(|| fmt::layer()))
        .try_init()
        .map_err(|e| RecorderError::ObservabilityError(e.to_string()))
}

/// Register descriptions for every counter the recorder emits
pub fn describe_metrics() {
    describe_counter!(EVENTS_COMMITTED, Unit::Count, "Events committed to the recording");
    describe_counter!(BYTES_COMMITTED, Unit::Bytes, "Encoded event bytes committed");
    describe_counter!(
        EVENTS_DROPPED,
        Unit::Count,
        "Events dropped at end_event, labelled by reason"
    );
    describe_counter!(
        EVENT_RETRIES,
        Unit::Count,
        "Events the caller was asked to rewrite, labelled by reason"
    );
    describe_counter!(EPOCH_SHIFTS, Unit::Count, "Commits that found their lease retired");
    describe_counter!(LEASES_GRANTED, Unit::Count, "One-off oversized leases handed out");
    describe_counter!(STAGED_DROPPED, Unit::Count, "Staged events lost to a full queue");
}
