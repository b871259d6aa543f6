//! Tick-driven sampling with lag-one attribution
//!
//! A call's category is only knowable once the sampler can see *into* it
//! (the stack at the moment execution is interrupted), but its duration
//! is only knowable once it *ends* (visible at the next interruption).
//! Attribution is therefore always one tick behind: each tick bills the
//! interval that just ended against the category chosen at the previous
//! tick, then classifies the new stack to decide what the next interval
//! belongs to. The final pending interval must be flushed explicitly at
//! finalization or it is silently lost.

use std::time::Instant;

use tracing::trace;

use crate::aggregator::RuntimeAggregator;
use crate::context::{ExecutionFlags, HostProbe};
use crate::stack::{ExecutionCategory, StackCategorizer};

/// Stacks at or below this depth are not further distinguished; they
/// default to core unless a plugin frame already matched.
pub const SHALLOW_STACK_FRAMES: usize = 2;

/// Decides whether an interruption point is worth classifying at all.
///
/// The exact condition set depends on the host's execution modes, so the
/// predicate is pluggable; the intent is fixed: time spent in invocations
/// that cannot belong to a theme or plugin is accounted as profiler
/// overhead without paying the classification cost.
pub trait RelevanceGate {
    fn is_relevant(&self, flags: &ExecutionFlags, entry_is_plugin: bool) -> bool;
}

/// Relevant when a themed render, background job, or admin screen is in
/// flight, or when the entry script itself is a plugin file.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGate;

impl RelevanceGate for DefaultGate {
    fn is_relevant(&self, flags: &ExecutionFlags, entry_is_plugin: bool) -> bool {
        flags.themed_render || flags.background_job || flags.admin || entry_is_plugin
    }
}

/// The category chosen at the previous tick, held until this tick
/// supplies its elapsed duration.
#[derive(Debug, Clone)]
struct PendingSample {
    category: ExecutionCategory,
    plugin_id: Option<String>,
}

/// Drives the per-interruption sampling loop.
#[derive(Debug)]
pub struct SampleScheduler {
    last_call_start: Instant,
    pending: Option<PendingSample>,
}

impl SampleScheduler {
    /// Sampling starts attributed to core: whatever runs before the
    /// first interruption is host bootstrap code.
    pub fn new(start: Instant) -> Self {
        Self {
            last_call_start: start,
            pending: Some(PendingSample {
                category: ExecutionCategory::Core,
                plugin_id: None,
            }),
        }
    }

    /// One interruption point.
    ///
    /// Bills the interval that just ended against the pending category,
    /// classifies the new stack to form the next pending sample, and
    /// accounts the scheduler's own time as profiler overhead. When the
    /// gate rejects the context, classification is skipped outright and
    /// the whole interval lands in the overhead bucket; the pending
    /// sample is left untouched for a later relevant tick to bill.
    pub fn tick(
        &mut self,
        probe: &dyn HostProbe,
        gate: &dyn RelevanceGate,
        entry_is_plugin: bool,
        categorizer: &mut StackCategorizer,
        aggregator: &mut RuntimeAggregator,
    ) {
        let entered = probe.now();
        let elapsed = entered.duration_since(self.last_call_start);

        let flags = probe.execution_flags();
        if !gate.is_relevant(&flags, entry_is_plugin) {
            let exited = probe.now();
            aggregator.bill_overhead(exited.duration_since(self.last_call_start));
            self.last_call_start = exited;
            return;
        }

        if let Some(pending) = self.pending.take() {
            aggregator.bill(pending.category, elapsed, pending.plugin_id.as_deref());
        }

        let frames = probe.call_stack();
        let (category, plugin_id) = categorizer.classify(&frames);
        let (category, plugin_id) =
            if frames.len() <= SHALLOW_STACK_FRAMES && category != ExecutionCategory::Plugin {
                (ExecutionCategory::Core, None)
            } else {
                (category, plugin_id)
            };
        trace!(?category, depth = frames.len(), "sample");
        self.pending = Some(PendingSample {
            category,
            plugin_id,
        });

        // The sampler's own work belongs to the overhead bucket, not to
        // the interval that begins now.
        let exited = probe.now();
        aggregator.bill_overhead(exited.duration_since(entered));
        self.last_call_start = exited;
    }

    /// Bill the final pending interval. Called exactly once when the
    /// request finalizes; this is the tail the lag-one protocol cannot
    /// see from inside the tick loop.
    pub fn flush(&mut self, now: Instant, aggregator: &mut RuntimeAggregator) {
        let elapsed = now.duration_since(self.last_call_start);
        match self.pending.take() {
            Some(pending) => {
                aggregator.bill(pending.category, elapsed, pending.plugin_id.as_deref())
            }
            None => aggregator.bill_overhead(elapsed),
        }
        self.last_call_start = now;
    }
}
