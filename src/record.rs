//! Persisted profile record
//!
//! One JSON object per finalized request, appended as a single line to
//! the shared per-session log. The field layout is the contract consumed
//! by the external listing tools; the `runtime` keys keep their
//! historical names.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Per-layer wall-clock accounting, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeBreakdown {
    /// Whole-request wall clock
    pub total: f64,
    /// Host-framework time
    pub wordpress: f64,
    /// Active theme time
    pub theme: f64,
    /// Time across all plugins
    pub plugins: f64,
    /// The profiler's own overhead
    pub profile: f64,
    /// Plugin time grouped by plugin identity
    pub breakdown: HashMap<String, f64>,
}

/// One finalized request profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    /// Request URL
    pub url: String,
    /// Client address
    pub ip: String,
    /// Host process id
    pub pid: u32,
    /// ISO 8601 UTC timestamp of finalization
    pub date: String,
    pub runtime: RuntimeBreakdown,
    /// Peak memory usage in bytes
    pub memory: u64,
    /// Number of plugin attribution samples recorded
    pub stack_switches: u64,
    /// Data-store queries issued by the request
    pub queries: u64,
}

/// ISO 8601 UTC timestamp without a date-time dependency.
pub fn iso8601_utc(time: SystemTime) -> String {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year,
        month,
        day,
        rem / 3_600,
        (rem % 3_600) / 60,
        rem % 60
    )
}

/// Days-since-epoch to proleptic Gregorian date (Howard Hinnant's
/// `civil_from_days`).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
