//! Profiling enablement flag
//!
//! Profiling is opt-in per client: a small JSON flag file names the
//! profiling session and the client IP pattern it applies to. The flag is
//! read once, when the profiler is constructed. A missing, unreadable, or
//! malformed flag simply leaves profiling disabled; it is never an error.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Contents of the enablement flag file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnablementFlag {
    /// Client IP pattern: tried as a regex, degrading to a substring
    /// match when the pattern does not compile
    pub ip: String,
    /// Session identifier; names the per-session profile log
    pub name: String,
}

impl EnablementFlag {
    /// Load the flag file. `None` means profiling stays disabled.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(flag) => Some(flag),
            Err(err) => {
                debug!(path = %path.display(), %err, "ignoring unparsable enablement flag");
                None
            }
        }
    }

    /// Whether the flag applies to this client.
    pub fn matches_ip(&self, client_ip: &str) -> bool {
        match Regex::new(&self.ip) {
            Ok(re) => re.is_match(client_ip),
            Err(_) => client_ip.contains(&self.ip),
        }
    }

    /// Path of the per-session profile log under `profiles_dir`.
    pub fn profile_output_path(&self, profiles_dir: &Path) -> PathBuf {
        profiles_dir.join(format!("{}.json", sanitize_session_name(&self.name)))
    }
}

/// Keep `[A-Za-z0-9._-]`; everything else becomes `_`. The flag file is
/// host-writable input, so the session name must not be able to name a
/// file outside the profiles directory.
fn sanitize_session_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "profile".to_string()
    } else {
        cleaned
    }
}
