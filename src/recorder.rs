//! Profile finalization and crash-safe persistence
//!
//! Builds the end-of-request summary record and appends it to the shared
//! per-session log. Many independent processes converge on that one log
//! file, so the append is guarded by an exclusive advisory lock acquired
//! with a bounded retry budget. A writer that cannot get the lock in time
//! drops its record: losing one profile beats blocking the response path
//! or corrupting the shared file.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

use nix::fcntl::{Flock, FlockArg};
use thiserror::Error;
use tracing::warn;

use crate::aggregator::RuntimeTotals;
use crate::classifier::PathClassifier;
use crate::context::RequestContext;
use crate::record::{ProfileRecord, RuntimeBreakdown};

/// Lock acquisition attempts before a record is dropped.
const LOCK_RETRY_ATTEMPTS: u32 = 20;
/// Spacing between lock attempts. 20 x 150ms bounds the worst case at 3s.
const LOCK_RETRY_DELAY: Duration = Duration::from_millis(150);

/// Failures while appending a record to the profile log.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("failed to serialize profile record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What happened to a record handed to [`persist`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Appended to the log
    Written,
    /// Lock budget exhausted; dropped without writing
    Dropped,
}

/// What the entry script itself is, for the whole-script overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Ordinary host entry point
    Host,
    /// The entry script is a theme file
    Theme,
    /// The entry script is a plugin file
    Plugin(String),
}

impl EntryKind {
    pub fn of(classifier: &mut PathClassifier, entry_script: &Path) -> Self {
        if classifier.is_plugin_file(entry_script) {
            let id = classifier
                .resolve_plugin_id(entry_script)
                .unwrap_or_else(|| "unknown".to_string());
            EntryKind::Plugin(id)
        } else if classifier.is_theme_file(entry_script) {
            EntryKind::Theme
        } else {
            EntryKind::Host
        }
    }
}

/// Fold the accumulated runtime into the final record.
///
/// When the whole execution *is* a single plugin or theme invocation (the
/// entry script lies in a plugin/theme directory, meaning no host
/// bootstrap ran), per-tick classification would misattribute
/// bootstrap-adjacent time, so the record is overridden to bill the
/// entire non-overhead span to that one layer. Otherwise the accumulated
/// totals are used as-is.
#[allow(clippy::too_many_arguments)]
pub fn build_record(
    ctx: &RequestContext,
    totals: RuntimeTotals,
    grouped: HashMap<String, Duration>,
    sample_count: u64,
    total: Duration,
    entry_kind: EntryKind,
    memory_peak_bytes: u64,
    query_count: u64,
    date: String,
) -> ProfileRecord {
    let overhead = totals.profiler_overhead.as_secs_f64();
    let attributed = total
        .saturating_sub(totals.profiler_overhead)
        .as_secs_f64();

    let runtime = match entry_kind {
        EntryKind::Plugin(id) => RuntimeBreakdown {
            total: total.as_secs_f64(),
            wordpress: 0.0,
            theme: 0.0,
            plugins: attributed,
            profile: overhead,
            breakdown: HashMap::from([(id, attributed)]),
        },
        EntryKind::Theme => RuntimeBreakdown {
            total: total.as_secs_f64(),
            wordpress: 0.0,
            theme: attributed,
            plugins: 0.0,
            profile: overhead,
            breakdown: HashMap::new(),
        },
        EntryKind::Host => RuntimeBreakdown {
            total: total.as_secs_f64(),
            wordpress: totals.core.as_secs_f64(),
            theme: totals.theme.as_secs_f64(),
            plugins: totals.plugin_total.as_secs_f64(),
            profile: overhead,
            breakdown: grouped
                .into_iter()
                .map(|(id, duration)| (id, duration.as_secs_f64()))
                .collect(),
        },
    };

    ProfileRecord {
        url: ctx.url.clone(),
        ip: ctx.client_ip.clone(),
        pid: ctx.pid,
        date,
        runtime,
        memory: memory_peak_bytes,
        stack_switches: sample_count,
        queries: query_count,
    }
}

/// Append one record to the shared log as a single JSON line.
///
/// The whole line is serialized before the file is touched, so a failure
/// can never leave a partial record behind. The advisory lock is released
/// when the handle drops.
pub fn persist(record: &ProfileRecord, target: &Path) -> Result<PersistOutcome, PersistError> {
    let line = serde_json::to_string(record)?;

    let file = OpenOptions::new().create(true).append(true).open(target)?;
    let Some(mut locked) = acquire_lock(file) else {
        warn!(target_file = %target.display(), "profile log busy, dropping record");
        return Ok(PersistOutcome::Dropped);
    };
    locked.write_all(line.as_bytes())?;
    locked.write_all(b"\n")?;
    locked.flush()?;
    Ok(PersistOutcome::Written)
}

fn acquire_lock(mut file: File) -> Option<Flock<File>> {
    for attempt in 0..LOCK_RETRY_ATTEMPTS {
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => return Some(lock),
            Err((returned, _errno)) => {
                file = returned;
                if attempt + 1 < LOCK_RETRY_ATTEMPTS {
                    thread::sleep(LOCK_RETRY_DELAY);
                }
            }
        }
    }
    None
}
