//! Runtime accumulation of per-category elapsed time
//!
//! Owns the per-request totals and the ordered list of plugin samples.
//! Totals only ever grow for the life of one request; plugin samples are
//! appended, never mutated. Per-plugin grouping is deferred to
//! finalization because plugin attribution is the rare path and the
//! grouped view is only needed once.

use std::collections::HashMap;
use std::time::Duration;

use crate::stack::ExecutionCategory;

/// Identity recorded when a frame matched a plugin root but no identity
/// could be resolved from its path.
const UNRESOLVED_PLUGIN_ID: &str = "unknown";

/// Per-category wall-clock totals for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeTotals {
    /// Host-framework time
    pub core: Duration,
    /// Theme time
    pub theme: Duration,
    /// Time across all plugins
    pub plugin_total: Duration,
    /// The profiler's own cost
    pub profiler_overhead: Duration,
}

impl RuntimeTotals {
    /// Sum of all four buckets. Every billed interval lands in exactly
    /// one bucket, so this tracks the wall-clock span covered so far.
    pub fn accounted(&self) -> Duration {
        self.core + self.theme + self.plugin_total + self.profiler_overhead
    }
}

/// One interval attributed to a plugin.
#[derive(Debug, Clone)]
pub struct PluginSample {
    pub plugin_id: String,
    pub duration: Duration,
}

/// Accumulates billed intervals into totals and plugin samples.
#[derive(Debug, Default)]
pub struct RuntimeAggregator {
    totals: RuntimeTotals,
    samples: Vec<PluginSample>,
}

impl RuntimeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bill one elapsed interval against a category. Plugin intervals
    /// additionally append a sample carrying the plugin's identity.
    pub fn bill(&mut self, category: ExecutionCategory, elapsed: Duration, plugin_id: Option<&str>) {
        match category {
            ExecutionCategory::Core => self.totals.core += elapsed,
            ExecutionCategory::Theme => self.totals.theme += elapsed,
            ExecutionCategory::Plugin => {
                self.totals.plugin_total += elapsed;
                self.samples.push(PluginSample {
                    plugin_id: plugin_id.unwrap_or(UNRESOLVED_PLUGIN_ID).to_string(),
                    duration: elapsed,
                });
            }
        }
    }

    /// Bill time spent inside the profiler itself.
    pub fn bill_overhead(&mut self, elapsed: Duration) {
        self.totals.profiler_overhead += elapsed;
    }

    pub fn snapshot(&self) -> RuntimeTotals {
        self.totals
    }

    /// Number of plugin samples recorded (the stack-switch count).
    pub fn sample_count(&self) -> u64 {
        self.samples.len() as u64
    }

    /// Per-plugin duration sums. Computed once, at finalization; the raw
    /// sample list is discarded with the aggregator afterwards.
    pub fn grouped_plugin_totals(&self) -> HashMap<String, Duration> {
        let mut grouped: HashMap<String, Duration> = HashMap::new();
        for sample in &self.samples {
            *grouped.entry(sample.plugin_id.clone()).or_default() += sample.duration;
        }
        grouped
    }
}
