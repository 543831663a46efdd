//! Validation helpers for watch configuration.

use std::collections::HashSet;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::{ConfigError, ConfigResult};
use crate::model::{PathRule, WatchConfig};

/// Validate every rule plus the global settings of `config`.
///
/// # Errors
///
/// Returns the first validation failure encountered, in document order.
pub fn validate_config(config: &WatchConfig) -> ConfigResult<()> {
    if config.buffer_size() == 0 {
        return Err(ConfigError::invalid(
            "BufferSize",
            None,
            "must_be_positive",
            Some("0".into()),
        ));
    }

    let mut seen = HashSet::new();
    for rule in config.paths() {
        validate_rule(rule)?;
        if !seen.insert(rule.name.as_path()) {
            return Err(ConfigError::invalid(
                "Name",
                Some(rule.name.clone()),
                "duplicate",
                Some(rule.name.display().to_string()),
            ));
        }
    }
    Ok(())
}

/// Validate a single path rule.
///
/// # Errors
///
/// Returns an error when the root is relative, the depth bounds are inverted,
/// the archive extension is empty, or a pattern is missing or malformed.
pub fn validate_rule(rule: &PathRule) -> ConfigResult<()> {
    let invalid = |field: &'static str, reason: &'static str, value: Option<String>| {
        ConfigError::invalid(field, Some(rule.name.clone()), reason, value)
    };

    if !rule.name.is_absolute() {
        return Err(invalid(
            "Name",
            "must_be_absolute",
            Some(rule.name.display().to_string()),
        ));
    }
    if rule.min_depth > rule.max_depth {
        return Err(invalid(
            "MinDepth",
            "exceeds_max_depth",
            Some(format!("{}>{}", rule.min_depth, rule.max_depth)),
        ));
    }
    if rule.archive_ext.trim().is_empty() {
        return Err(invalid("ArchiveExt", "empty", None));
    }
    if rule.patterns.is_empty() {
        return Err(invalid("Patterns", "empty", None));
    }
    if rule.patterns.iter().any(|pattern| pattern.trim().is_empty()) {
        return Err(invalid("Patterns", "empty_pattern", None));
    }
    build_globset(rule).map(|_| ())
}

/// Compile every pattern of `rule` into one matcher.
///
/// # Errors
///
/// Returns an error naming the first pattern that does not compile.
pub fn build_globset(rule: &PathRule) -> ConfigResult<GlobSet> {
    let invalid = |value: Option<String>| {
        ConfigError::invalid("Patterns", Some(rule.name.clone()), "invalid_glob", value)
    };

    let mut builder = GlobSetBuilder::new();
    for pattern in &rule.patterns {
        builder.add(Glob::new(pattern).map_err(|_| invalid(Some(pattern.clone())))?);
    }
    builder.build().map_err(|_| invalid(None))
}
