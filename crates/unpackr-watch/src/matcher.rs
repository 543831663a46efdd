//! Decide whether a changed file should trigger the pipeline.
//!
//! # Design
//! - Gates run in a fixed order (hidden, depth, pattern) and stop at the first rejection.
//! - The hidden gate inspects the root's own last segment and every segment
//!   below it. Directories above the root are not inspected.
//! - Patterns match the base name only. Live dispatch uses the sets compiled
//!   with the configuration; [`evaluate`] compiles its own.

use std::path::{Component, Path};

use globset::{Glob, GlobSet, GlobSetBuilder};
use unpackr_config::PathRule;

use crate::error::{WatchError, WatchResult};

/// Why a path was not accepted by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The path does not live below the rule root.
    OutsideRule,
    /// The root's own name or a segment below it starts with a dot.
    HiddenAncestor,
    /// The path's depth is outside the configured range.
    DepthOutOfRange {
        /// Depth of the path below the root.
        depth: usize,
        /// Smallest accepted depth.
        min: usize,
        /// Largest accepted depth.
        max: usize,
    },
    /// No pattern matched the base name.
    NoPatternMatch,
}

impl RejectReason {
    /// Stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OutsideRule => "outside_rule",
            Self::HiddenAncestor => "hidden",
            Self::DepthOutOfRange { .. } => "depth",
            Self::NoPatternMatch => "pattern",
        }
    }
}

/// Result of evaluating a path against a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    /// Every gate passed.
    Matched,
    /// A gate rejected the path.
    Rejected(RejectReason),
}

/// Evaluate `path` against `rule`, compiling the rule's patterns first.
///
/// # Errors
///
/// Returns [`WatchError::Glob`] when a rule pattern does not compile.
pub fn evaluate(rule: &PathRule, path: &Path) -> WatchResult<MatchDecision> {
    let patterns = compile_patterns(rule)?;
    Ok(evaluate_with(rule, &patterns, path))
}

/// Evaluate `path` against `rule` using its already compiled `patterns`.
#[must_use]
pub fn evaluate_with(rule: &PathRule, patterns: &GlobSet, path: &Path) -> MatchDecision {
    let Ok(relative) = path.strip_prefix(&rule.name) else {
        return MatchDecision::Rejected(RejectReason::OutsideRule);
    };

    let root_segment = rule.name.components().next_back();
    if rule.skip_hidden && root_segment.into_iter().chain(relative.components()).any(is_hidden) {
        return MatchDecision::Rejected(RejectReason::HiddenAncestor);
    }

    let depth = relative.components().count();
    if depth < rule.min_depth || depth > rule.max_depth {
        return MatchDecision::Rejected(RejectReason::DepthOutOfRange {
            depth,
            min: rule.min_depth,
            max: rule.max_depth,
        });
    }

    match path.file_name() {
        Some(base) if patterns.is_match(base) => MatchDecision::Matched,
        _ => MatchDecision::Rejected(RejectReason::NoPatternMatch),
    }
}

/// Compile every pattern of `rule` into one set.
///
/// # Errors
///
/// Returns [`WatchError::Glob`] naming the pattern that failed.
pub fn compile_patterns(rule: &PathRule) -> WatchResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in &rule.patterns {
        builder.add(Glob::new(pattern).map_err(|source| WatchError::Glob {
            pattern: pattern.clone(),
            source,
        })?);
    }
    builder.build().map_err(|source| WatchError::Glob {
        pattern: rule.patterns.join(" "),
        source,
    })
}

fn is_hidden(component: Component<'_>) -> bool {
    matches!(component, Component::Normal(segment) if segment.to_string_lossy().starts_with('.'))
}
