//! Typed configuration models.
//!
//! # Design
//! - `PathRule` is immutable once loaded; reloads replace the whole `WatchConfig`.
//! - Rule lookup is a longest-prefix match over path components, so `/data2`
//!   never resolves to a rule named `/data`.
//! - Each rule's patterns are compiled into a `GlobSet` once, when the
//!   configuration is built; matching never recompiles them.

use std::path::{Path, PathBuf};

use globset::GlobSet;
use serde::{Deserialize, Serialize};

use crate::error::ConfigResult;
use crate::loader;
use crate::validate;

/// Matching and unpacking policy for one watched directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PathRule {
    /// Absolute root of the watched tree.
    pub name: PathBuf,
    /// Smallest accepted depth below `name`.
    pub min_depth: usize,
    /// Largest accepted depth below `name`.
    pub max_depth: usize,
    /// Reject files with a hidden segment below `name`.
    pub skip_hidden: bool,
    /// Glob patterns matched against the file's base name.
    pub patterns: Vec<String>,
    /// Delete the checksum list and its volumes after extraction.
    pub remove: bool,
    /// Extension identifying archive volumes, without a leading dot.
    pub archive_ext: String,
    /// Command template executed after a successful run; empty disables it.
    pub post_command: String,
}

impl PathRule {
    /// Construct a rule for `name` using the built-in defaults for every other field.
    #[must_use]
    pub fn with_defaults(name: impl Into<PathBuf>) -> Self {
        loader::RawRule::default().into_rule(name.into(), &loader::RawRule::default())
    }

    /// Depth of `path` below this rule's root, or `None` when `path` lies outside it.
    #[must_use]
    pub fn depth_of(&self, path: &Path) -> Option<usize> {
        path.strip_prefix(&self.name)
            .ok()
            .map(|relative| relative.components().count())
    }
}

/// Complete watcher configuration: every watched tree plus queue sizing.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    paths: Vec<PathRule>,
    patterns: Vec<GlobSet>,
    buffer_size: usize,
    source: Option<PathBuf>,
}

impl PartialEq for WatchConfig {
    fn eq(&self, other: &Self) -> bool {
        self.paths == other.paths
            && self.buffer_size == other.buffer_size
            && self.source == other.source
    }
}

impl Eq for WatchConfig {}

impl WatchConfig {
    /// Build and validate a configuration that has no backing file.
    ///
    /// # Errors
    ///
    /// Returns an error when a rule or the buffer size fails validation.
    pub fn new(paths: Vec<PathRule>, buffer_size: usize) -> ConfigResult<Self> {
        Self::assemble(paths, buffer_size, None)
    }

    /// Read, merge defaults into and validate the JSON document at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }

    /// Parse a JSON document, remembering `source` for later reloads.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be parsed or validated.
    pub fn from_json_str(document: &str, source: Option<&Path>) -> ConfigResult<Self> {
        loader::parse_document(document, source)
    }

    /// Validate the parts, then compile every rule's patterns.
    pub(crate) fn assemble(
        paths: Vec<PathRule>,
        buffer_size: usize,
        source: Option<PathBuf>,
    ) -> ConfigResult<Self> {
        let mut config = Self {
            paths,
            patterns: Vec::new(),
            buffer_size,
            source,
        };
        validate::validate_config(&config)?;
        config.patterns = config
            .paths
            .iter()
            .map(validate::build_globset)
            .collect::<ConfigResult<_>>()?;
        Ok(config)
    }

    /// Configured rules in document order.
    #[must_use]
    pub fn paths(&self) -> &[PathRule] {
        &self.paths
    }

    /// Capacity of the change-event queue.
    #[must_use]
    pub const fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// File this configuration was loaded from, used by reload.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Resolve the rule governing `path` by longest matching root.
    #[must_use]
    pub fn find_rule(&self, path: &Path) -> Option<&PathRule> {
        self.resolve(path).map(|(rule, _)| rule)
    }

    /// Like [`find_rule`](Self::find_rule), also returning the rule's compiled patterns.
    #[must_use]
    pub fn resolve(&self, path: &Path) -> Option<(&PathRule, &GlobSet)> {
        self.paths
            .iter()
            .zip(&self.patterns)
            .filter(|(rule, _)| path.starts_with(&rule.name))
            .max_by_key(|(rule, _)| rule.name.components().count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult<T> = anyhow::Result<T>;

    fn rule(name: &str) -> PathRule {
        PathRule::with_defaults(name)
    }

    #[test]
    fn find_rule_prefers_longest_prefix() -> TestResult<()> {
        let config = WatchConfig::new(
            vec![
                rule("/data"),
                rule("/data/tv/complete"),
                rule("/data/tv"),
            ],
            10,
        )?;

        let found = config.find_rule(Path::new("/data/tv/complete/show/show.sfv"));
        assert_eq!(
            found.map(|rule| rule.name.as_path()),
            Some(Path::new("/data/tv/complete"))
        );

        let found = config.find_rule(Path::new("/data/tv/other/show.sfv"));
        assert_eq!(
            found.map(|rule| rule.name.as_path()),
            Some(Path::new("/data/tv"))
        );

        let found = config.find_rule(Path::new("/data/movies/a.sfv"));
        assert_eq!(found.map(|rule| rule.name.as_path()), Some(Path::new("/data")));
        Ok(())
    }

    #[test]
    fn find_rule_matches_whole_components_only() -> TestResult<()> {
        let config = WatchConfig::new(vec![rule("/data")], 10)?;
        assert!(config.find_rule(Path::new("/data2/a.sfv")).is_none());
        assert!(config.find_rule(Path::new("/other/a.sfv")).is_none());
        Ok(())
    }

    #[test]
    fn resolve_returns_compiled_patterns_of_the_rule() -> TestResult<()> {
        let mut tv = rule("/data/tv");
        tv.patterns = vec!["*.sfv".into(), "*.SFV".into()];
        let mut movies = rule("/data/movies");
        movies.patterns = vec!["*.nfo".into()];
        let config = WatchConfig::new(vec![tv, movies], 10)?;

        let Some((found, patterns)) = config.resolve(Path::new("/data/tv/show/a.SFV")) else {
            anyhow::bail!("no rule resolved");
        };
        assert_eq!(found.name, Path::new("/data/tv"));
        assert_eq!(patterns.len(), 2);
        assert!(patterns.is_match("a.SFV"));
        assert!(!patterns.is_match("a.nfo"));

        let Some((_, patterns)) = config.resolve(Path::new("/data/movies/m.nfo")) else {
            anyhow::bail!("no rule resolved");
        };
        assert!(patterns.is_match("m.nfo"));
        assert!(config.resolve(Path::new("/data/music/a.sfv")).is_none());
        Ok(())
    }

    #[test]
    fn equality_ignores_compiled_patterns() -> TestResult<()> {
        let first = WatchConfig::new(vec![rule("/data")], 10)?;
        let second = WatchConfig::new(vec![rule("/data")], 10)?;
        assert_eq!(first, second);
        assert_ne!(first, WatchConfig::new(vec![rule("/data")], 11)?);
        Ok(())
    }

    #[test]
    fn depth_counts_segments_below_root() {
        let rule = rule("/watch");
        assert_eq!(rule.depth_of(Path::new("/watch/a.sfv")), Some(1));
        assert_eq!(rule.depth_of(Path::new("/watch/rel/a.sfv")), Some(2));
        assert_eq!(rule.depth_of(Path::new("/watch")), Some(0));
        assert_eq!(rule.depth_of(Path::new("/elsewhere/a.sfv")), None);
    }

    #[test]
    fn with_defaults_uses_builtin_values() {
        let rule = rule("/watch");
        assert_eq!(rule.min_depth, crate::defaults::MIN_DEPTH);
        assert_eq!(rule.max_depth, crate::defaults::MAX_DEPTH);
        assert_eq!(rule.patterns, vec!["*.sfv".to_string()]);
        assert_eq!(rule.archive_ext, "rar");
        assert!(rule.skip_hidden);
        assert!(!rule.remove);
        assert!(rule.post_command.is_empty());
    }
}
