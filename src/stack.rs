//! Call-stack categorization
//!
//! Maps the call stack at an interruption point to the single execution
//! category the next interval will be billed against. A stack can cross
//! layers (core calling into a theme calling into a plugin), but only one
//! bucket may be billed per interval, so the priority is fixed: plugin
//! beats theme beats core. The innermost, most specific layer wins.

use std::path::PathBuf;

use crate::classifier::PathClassifier;

/// The three mutually-exclusive attribution buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionCategory {
    /// Host-framework code
    Core,
    /// Template-layer code from the active theme
    Theme,
    /// Third-party plugin code
    Plugin,
}

/// One frame of the interrupted call stack.
///
/// Only the file path is consulted. Frames without a resolvable file
/// (dynamically evaluated code) carry `None` and are skipped during
/// classification, never treated as a match.
#[derive(Debug, Clone)]
pub struct StackFrame {
    pub file: Option<PathBuf>,
}

impl StackFrame {
    /// Frame backed by a source file.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(file.into()),
        }
    }

    /// Frame from dynamically evaluated code with no file behind it.
    pub fn dynamic() -> Self {
        Self { file: None }
    }
}

/// Determines the execution category of a call stack.
#[derive(Debug)]
pub struct StackCategorizer {
    classifier: PathClassifier,
}

impl StackCategorizer {
    pub fn new(classifier: PathClassifier) -> Self {
        Self { classifier }
    }

    /// The classifier is shared with the finalization path, which checks
    /// the entry script itself against the same (cached) roots.
    pub fn classifier_mut(&mut self) -> &mut PathClassifier {
        &mut self.classifier
    }

    /// Classify a stack, returning the winning category and, for plugin
    /// stacks, the identity of the matched plugin.
    ///
    /// Scans once for the first plugin frame; failing that, once more for
    /// the first theme frame; otherwise the stack is core.
    pub fn classify(&mut self, frames: &[StackFrame]) -> (ExecutionCategory, Option<String>) {
        for frame in frames {
            let Some(file) = frame.file.as_deref() else {
                continue;
            };
            if self.classifier.is_plugin_file(file) {
                let id = self.classifier.resolve_plugin_id(file);
                return (ExecutionCategory::Plugin, id);
            }
        }
        for frame in frames {
            let Some(file) = frame.file.as_deref() else {
                continue;
            };
            if self.classifier.is_theme_file(file) {
                return (ExecutionCategory::Theme, None);
            }
        }
        (ExecutionCategory::Core, None)
    }
}
