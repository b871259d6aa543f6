//! Profiler lifecycle and host-facing hooks
//!
//! The host constructs one [`Profiler`] per request, registers its
//! `tick` callback at every interruption point, and calls `finalize`
//! exactly once when the request ends. Whether profiling actually runs is
//! decided here, once, from the enablement flag: a disabled profiler
//! keeps its hooks as near-zero-cost no-ops and owns no classifier or
//! caches at all.
//!
//! The profiler observes; it must never be able to abort or alter the
//! request it is observing. Every failure on the finalization path is
//! logged and swallowed.

use std::path::PathBuf;
use std::time::{Instant, SystemTime};

use tracing::{debug, warn};

use crate::aggregator::RuntimeAggregator;
use crate::classifier::{ClassifierConfig, PathClassifier};
use crate::context::{HostProbe, RequestContext};
use crate::enablement::EnablementFlag;
use crate::record::{iso8601_utc, ProfileRecord};
use crate::recorder::{build_record, persist, EntryKind, PersistOutcome};
use crate::scheduler::{RelevanceGate, SampleScheduler};
use crate::stack::StackCategorizer;

/// Lifecycle state; hooks are inert outside `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerState {
    /// Enablement flag absent or not matching this client
    Disabled,
    /// Sampling in progress
    Active,
    /// Record built (and persisted best-effort); hooks inert again
    Finalized,
}

/// Filesystem configuration for one profiler instance.
#[derive(Debug, Clone)]
pub struct ProfilerConfig {
    /// Enablement flag file consulted once at construction
    pub flag_path: PathBuf,
    /// Directory receiving per-session profile logs
    pub profiles_dir: PathBuf,
    /// Classification roots
    pub classifier: ClassifierConfig,
}

/// Everything that only exists while sampling is in progress.
struct Engine {
    categorizer: StackCategorizer,
    aggregator: RuntimeAggregator,
    scheduler: SampleScheduler,
    started_at: Instant,
    entry_kind: EntryKind,
    entry_is_plugin: bool,
    output_path: PathBuf,
}

/// Per-request execution profiler.
pub struct Profiler {
    state: ProfilerState,
    ctx: RequestContext,
    probe: Box<dyn HostProbe>,
    gate: Box<dyn RelevanceGate>,
    engine: Option<Engine>,
}

impl Profiler {
    /// Consult the enablement flag and construct either an active
    /// profiler or an inert one. Absence of the flag, a parse failure,
    /// or a client IP that does not match the flag's pattern all yield
    /// `Disabled`; none of them is an error.
    pub fn new(
        ctx: RequestContext,
        config: ProfilerConfig,
        probe: Box<dyn HostProbe>,
        gate: Box<dyn RelevanceGate>,
    ) -> Self {
        let Some(flag) = EnablementFlag::load(&config.flag_path) else {
            debug!("profiling disabled: no readable enablement flag");
            return Self::disabled(ctx, probe, gate);
        };
        if !flag.matches_ip(&ctx.client_ip) {
            debug!(
                client_ip = %ctx.client_ip,
                "profiling disabled: client does not match enablement pattern"
            );
            return Self::disabled(ctx, probe, gate);
        }

        let output_path = flag.profile_output_path(&config.profiles_dir);
        let mut classifier = PathClassifier::new(config.classifier);
        let entry_kind = EntryKind::of(&mut classifier, &ctx.entry_script);
        let entry_is_plugin = matches!(entry_kind, EntryKind::Plugin(_));
        let started_at = probe.now();

        debug!(
            session = %output_path.display(),
            ?entry_kind,
            "profiling active"
        );
        Self {
            state: ProfilerState::Active,
            ctx,
            probe,
            gate,
            engine: Some(Engine {
                categorizer: StackCategorizer::new(classifier),
                aggregator: RuntimeAggregator::new(),
                scheduler: SampleScheduler::new(started_at),
                started_at,
                entry_kind,
                entry_is_plugin,
                output_path,
            }),
        }
    }

    fn disabled(
        ctx: RequestContext,
        probe: Box<dyn HostProbe>,
        gate: Box<dyn RelevanceGate>,
    ) -> Self {
        Self {
            state: ProfilerState::Disabled,
            ctx,
            probe,
            gate,
            engine: None,
        }
    }

    pub fn state(&self) -> ProfilerState {
        self.state
    }

    /// Whether hooks are worth installing at all.
    pub fn is_active(&self) -> bool {
        self.state == ProfilerState::Active
    }

    /// Per-interruption hook. No-op unless active.
    pub fn tick(&mut self) {
        if self.state != ProfilerState::Active {
            return;
        }
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        let entry_is_plugin = engine.entry_is_plugin;
        engine.scheduler.tick(
            self.probe.as_ref(),
            self.gate.as_ref(),
            entry_is_plugin,
            &mut engine.categorizer,
            &mut engine.aggregator,
        );
    }

    /// End-of-request hook: flushes the pending tail, builds the summary
    /// record, appends it to the session log best-effort, and renders the
    /// profiler inert. Returns the record for hosts that want it; `None`
    /// when profiling never started or was already finalized.
    pub fn finalize(&mut self) -> Option<ProfileRecord> {
        if self.state != ProfilerState::Active {
            return None;
        }
        let engine = self.engine.as_mut()?;

        let now = self.probe.now();
        engine.scheduler.flush(now, &mut engine.aggregator);
        let total = now.duration_since(engine.started_at);

        let record = build_record(
            &self.ctx,
            engine.aggregator.snapshot(),
            engine.aggregator.grouped_plugin_totals(),
            engine.aggregator.sample_count(),
            total,
            engine.entry_kind.clone(),
            self.probe.memory_peak_bytes(),
            self.probe.query_count(),
            iso8601_utc(SystemTime::now()),
        );

        match persist(&record, &engine.output_path) {
            Ok(PersistOutcome::Written) => {
                debug!(target_file = %engine.output_path.display(), "profile record appended")
            }
            // The dropped case already logged inside persist.
            Ok(PersistOutcome::Dropped) => {}
            Err(err) => warn!(%err, "failed to persist profile record"),
        }

        self.state = ProfilerState::Finalized;
        self.engine = None;
        Some(record)
    }
}
