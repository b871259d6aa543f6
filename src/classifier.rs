//! Path classification for plugin and theme detection
//!
//! Decides, from a source file path, whether it belongs to a third-party
//! plugin or to the active theme, and resolves a plugin's identity from
//! its location on disk. Both decisions are memoized for the life of the
//! process: the on-disk layout does not change while requests execute, so
//! a path never needs to be resolved twice.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Directory roots consulted during classification.
///
/// The roots are canonicalized once at construction so that symlinked
/// install layouts compare correctly against canonicalized query paths.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Content root (parent of the plugin and theme directories)
    pub content_dir: PathBuf,
    /// Regular plugin directory
    pub plugin_dir: PathBuf,
    /// Must-use plugin directory
    pub mu_plugin_dir: PathBuf,
    /// Theme root directory
    pub theme_root: PathBuf,
    /// Source-file suffix stripped from single-file plugin identities
    pub source_suffix: String,
}

impl ClassifierConfig {
    /// Conventional layout rooted at a content directory:
    /// `plugins/`, `mu-plugins/` and `themes/` directly underneath it.
    pub fn from_content_dir(content_dir: impl Into<PathBuf>) -> Self {
        let content_dir = content_dir.into();
        Self {
            plugin_dir: content_dir.join("plugins"),
            mu_plugin_dir: content_dir.join("mu-plugins"),
            theme_root: content_dir.join("themes"),
            source_suffix: ".php".to_string(),
            content_dir,
        }
    }
}

/// Classifies file paths against the configured plugin/theme roots.
///
/// Every query is memoized per queried path. Cache entries hold the
/// verdict computed from the canonicalized (symlink-resolved) form of the
/// path, so two spellings of the same file always agree.
#[derive(Debug)]
pub struct PathClassifier {
    config: ClassifierConfig,
    plugin_cache: HashMap<PathBuf, bool>,
    theme_cache: HashMap<PathBuf, bool>,
    id_cache: HashMap<PathBuf, Option<String>>,
    /// Uncached resolutions performed; lets tests observe memoization.
    #[cfg(test)]
    pub(crate) uncached_lookups: u64,
}

impl PathClassifier {
    pub fn new(mut config: ClassifierConfig) -> Self {
        config.content_dir = canonicalize_lossy(&config.content_dir);
        config.plugin_dir = canonicalize_lossy(&config.plugin_dir);
        config.mu_plugin_dir = canonicalize_lossy(&config.mu_plugin_dir);
        config.theme_root = canonicalize_lossy(&config.theme_root);
        Self {
            config,
            plugin_cache: HashMap::new(),
            theme_cache: HashMap::new(),
            id_cache: HashMap::new(),
            #[cfg(test)]
            uncached_lookups: 0,
        }
    }

    /// True iff `path` lies under the regular or must-use plugin root.
    pub fn is_plugin_file(&mut self, path: &Path) -> bool {
        if let Some(&verdict) = self.plugin_cache.get(path) {
            return verdict;
        }
        self.count_lookup();
        let canonical = canonicalize_lossy(path);
        let verdict = canonical.starts_with(&self.config.plugin_dir)
            || canonical.starts_with(&self.config.mu_plugin_dir);
        self.plugin_cache.insert(path.to_path_buf(), verdict);
        verdict
    }

    /// True iff `path` lies under the theme root.
    pub fn is_theme_file(&mut self, path: &Path) -> bool {
        if let Some(&verdict) = self.theme_cache.get(path) {
            return verdict;
        }
        self.count_lookup();
        let canonical = canonicalize_lossy(path);
        let verdict = canonical.starts_with(&self.config.theme_root);
        self.theme_cache.insert(path.to_path_buf(), verdict);
        verdict
    }

    /// Resolve a plugin's identity from a path under a plugin root.
    ///
    /// A file nested inside a plugin directory is identified by that
    /// directory's name; a single file sitting directly in the plugin
    /// root is identified by its file name minus the source suffix.
    /// Returns `None` for paths outside both plugin roots.
    pub fn resolve_plugin_id(&mut self, path: &Path) -> Option<String> {
        if let Some(cached) = self.id_cache.get(path) {
            return cached.clone();
        }
        self.count_lookup();
        let canonical = canonicalize_lossy(path);
        let relative = canonical
            .strip_prefix(&self.config.plugin_dir)
            .or_else(|_| canonical.strip_prefix(&self.config.mu_plugin_dir))
            .ok();
        let id = relative.and_then(|relative| {
            let mut components = relative.components();
            let first = components.next()?.as_os_str().to_string_lossy();
            if components.next().is_some() {
                // Nested file: the plugin is its top-level directory.
                Some(first.into_owned())
            } else {
                // Single-file plugin: file name minus the source suffix.
                let trimmed = first
                    .strip_suffix(self.config.source_suffix.as_str())
                    .unwrap_or(&first);
                Some(trimmed.to_string())
            }
        });
        self.id_cache.insert(path.to_path_buf(), id.clone());
        id
    }

    #[cfg(test)]
    fn count_lookup(&mut self) {
        self.uncached_lookups += 1;
    }

    #[cfg(not(test))]
    fn count_lookup(&mut self) {}
}

/// Resolve symlinks where the path exists; fall back to a lexical
/// normalization (`.`/`..` removal) for paths that are not on disk, so
/// classification still behaves sensibly for synthetic paths.
fn canonicalize_lossy(path: &Path) -> PathBuf {
    path.canonicalize()
        .unwrap_or_else(|_| lexical_normalize(path))
}

fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    normalized
}
