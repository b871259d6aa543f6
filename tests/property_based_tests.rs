//! Property-based tests for attribution invariants
//!
//! Core properties checked under random tick sequences:
//! 1. Every billed interval lands in exactly one bucket, so the four
//!    buckets always sum to the wall-clock span from start to finalize.
//! 2. Classification priority: any stack containing a plugin frame is a
//!    plugin stack, whatever else it contains.
//! 3. The per-plugin breakdown always sums to the plugins bucket.

mod utils;

use std::fs;
use std::time::Duration;

use proptest::prelude::*;

use desglose::classifier::{ClassifierConfig, PathClassifier};
use desglose::context::{ExecutionFlags, RequestContext};
use desglose::profiler::{Profiler, ProfilerConfig};
use desglose::scheduler::DefaultGate;
use desglose::stack::{ExecutionCategory, StackCategorizer, StackFrame};

use utils::ScriptedProbe;

const CONTENT_DIR: &str = "/srv/app/wp-content";

/// One scripted interruption: how long the interval ran and what the
/// profiler sees when it fires.
#[derive(Debug, Clone)]
enum Tick {
    Core(u64),
    Theme(u64),
    Plugin(u64, &'static str),
    Gated(u64),
}

impl Tick {
    fn elapsed_ms(&self) -> u64 {
        match *self {
            Tick::Core(ms) | Tick::Theme(ms) | Tick::Plugin(ms, _) | Tick::Gated(ms) => ms,
        }
    }
}

fn tick_strategy() -> impl Strategy<Value = Tick> {
    prop_oneof![
        (1u64..50).prop_map(Tick::Core),
        (1u64..50).prop_map(Tick::Theme),
        (1u64..50, prop_oneof![Just("alpha"), Just("beta"), Just("gamma")])
            .prop_map(|(ms, slug)| Tick::Plugin(ms, slug)),
        (1u64..50).prop_map(Tick::Gated),
    ]
}

fn stack_for(tick: &Tick) -> Vec<StackFrame> {
    match tick {
        Tick::Core(_) | Tick::Gated(_) => vec![
            StackFrame::new("/srv/app/wp-includes/query.php"),
            StackFrame::new("/srv/app/wp-includes/template-loader.php"),
            StackFrame::new("/srv/app/index.php"),
        ],
        Tick::Theme(_) => vec![
            StackFrame::new(format!("{CONTENT_DIR}/themes/minimal/single.php")),
            StackFrame::new("/srv/app/wp-includes/template.php"),
            StackFrame::new("/srv/app/index.php"),
        ],
        Tick::Plugin(_, slug) => vec![
            StackFrame::new(format!("{CONTENT_DIR}/plugins/{slug}/{slug}.php")),
            StackFrame::new("/srv/app/wp-includes/class-wp-hook.php"),
            StackFrame::new("/srv/app/index.php"),
        ],
    }
}

fn run_request(ticks: &[Tick], tail_ms: u64) -> desglose::record::ProfileRecord {
    let dir = tempfile::tempdir().unwrap();
    let flag_path = dir.path().join(".profiling_enabled");
    fs::write(&flag_path, r#"{"ip": ".*", "name": "prop"}"#).unwrap();
    let profiles_dir = dir.path().join("profiles");
    fs::create_dir_all(&profiles_dir).unwrap();

    let probe = ScriptedProbe::new();
    let mut profiler = Profiler::new(
        RequestContext {
            url: "/".to_string(),
            client_ip: "203.0.113.9".to_string(),
            entry_script: "/srv/app/index.php".into(),
            pid: 1,
        },
        ProfilerConfig {
            flag_path,
            profiles_dir,
            classifier: ClassifierConfig::from_content_dir(CONTENT_DIR),
        },
        Box::new(probe.clone()),
        Box::new(DefaultGate),
    );

    for tick in ticks {
        probe.advance(Duration::from_millis(tick.elapsed_ms()));
        probe.set_stack(stack_for(tick));
        let gated = matches!(tick, Tick::Gated(_));
        probe.set_flags(if gated {
            ExecutionFlags::default()
        } else {
            ExecutionFlags {
                themed_render: true,
                ..ExecutionFlags::default()
            }
        });
        profiler.tick();
    }
    probe.set_flags(ExecutionFlags {
        themed_render: true,
        ..ExecutionFlags::default()
    });
    probe.advance(Duration::from_millis(tail_ms));
    profiler.finalize().expect("record")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_buckets_sum_to_total(
        ticks in prop::collection::vec(tick_strategy(), 0..24),
        tail_ms in 0u64..20,
    ) {
        let record = run_request(&ticks, tail_ms);

        let expected_total =
            ticks.iter().map(Tick::elapsed_ms).sum::<u64>() + tail_ms;
        let accounted = record.runtime.wordpress
            + record.runtime.theme
            + record.runtime.plugins
            + record.runtime.profile;

        prop_assert!((record.runtime.total - expected_total as f64 / 1000.0).abs() < 1e-9);
        prop_assert!((accounted - record.runtime.total).abs() < 1e-9);
    }

    #[test]
    fn prop_breakdown_sums_to_plugins_bucket(
        ticks in prop::collection::vec(tick_strategy(), 0..24),
    ) {
        let record = run_request(&ticks, 1);
        let breakdown_sum: f64 = record.runtime.breakdown.values().sum();
        prop_assert!((breakdown_sum - record.runtime.plugins).abs() < 1e-9);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_any_plugin_frame_wins(
        theme_frames in 0usize..4,
        core_frames in 0usize..4,
        plugin_position in 0usize..8,
    ) {
        let mut frames = Vec::new();
        for _ in 0..theme_frames {
            frames.push(StackFrame::new(format!(
                "{CONTENT_DIR}/themes/minimal/part.php"
            )));
        }
        for _ in 0..core_frames {
            frames.push(StackFrame::new("/srv/app/wp-includes/query.php"));
        }
        let at = plugin_position.min(frames.len());
        frames.insert(
            at,
            StackFrame::new(format!("{CONTENT_DIR}/plugins/gallery/gallery.php")),
        );

        let mut categorizer = StackCategorizer::new(PathClassifier::new(
            ClassifierConfig::from_content_dir(CONTENT_DIR),
        ));
        let (category, id) = categorizer.classify(&frames);
        prop_assert_eq!(category, ExecutionCategory::Plugin);
        prop_assert_eq!(id, Some("gallery".to_string()));
    }

    #[test]
    fn prop_theme_beats_core_without_plugins(
        core_before in 0usize..4,
        core_after in 0usize..4,
    ) {
        let mut frames = Vec::new();
        for _ in 0..core_before {
            frames.push(StackFrame::new("/srv/app/wp-includes/query.php"));
        }
        frames.push(StackFrame::new(format!(
            "{CONTENT_DIR}/themes/minimal/single.php"
        )));
        for _ in 0..core_after {
            frames.push(StackFrame::new("/srv/app/wp-load.php"));
        }

        let mut categorizer = StackCategorizer::new(PathClassifier::new(
            ClassifierConfig::from_content_dir(CONTENT_DIR),
        ));
        let (category, _) = categorizer.classify(&frames);
        prop_assert_eq!(category, ExecutionCategory::Theme);
    }
}
