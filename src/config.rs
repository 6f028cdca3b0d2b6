//! Engine-wide constants and tuning knobs.

pub const ENGINE_NAME: &str = "Peduli";
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default country calling code for phone normalization (Indonesia).
pub const DEFAULT_COUNTRY_CODE: &str = "62";

/// TTL for cached patient context snapshots, in seconds.
pub const CONTEXT_CACHE_TTL_SECS: u64 = 300;

/// Context snapshot window limits.
pub const MAX_RECENT_NOTES: usize = 5;
pub const MAX_ACTIVE_VARIABLES: usize = 10;
pub const MAX_RECENT_MESSAGES: usize = 20;
pub const MAX_RECENT_THREADS: usize = 5;

/// Classification confidence below this triggers a low-confidence escalation.
/// Scale is 0.0–1.0, matching the classification payload contract.
pub const LOW_CONFIDENCE_THRESHOLD: f32 = 0.4;

/// Percent confidence below this makes a low-confidence escalation High
/// priority instead of Medium.
pub const HIGH_PRIORITY_CONFIDENCE_PERCENT: f32 = 30.0;

/// Default tracing filter when RUST_LOG is unset.
pub fn default_log_filter() -> &'static str {
    "info,peduli=debug"
}
