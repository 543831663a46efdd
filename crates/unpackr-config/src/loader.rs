//! JSON document loading.
//!
//! # Design
//! - Parse into an all-optional raw shape first, then merge each path over the
//!   `Default` section and the built-in defaults.
//! - Unknown keys are rejected so typos surface at load time instead of being ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{PathRule, WatchConfig};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    default: RawRule,
    buffer_size: Option<usize>,
    #[serde(default)]
    paths: Vec<RawRule>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub(crate) struct RawRule {
    name: Option<PathBuf>,
    min_depth: Option<usize>,
    max_depth: Option<usize>,
    skip_hidden: Option<bool>,
    patterns: Option<Vec<String>>,
    remove: Option<bool>,
    archive_ext: Option<String>,
    post_command: Option<String>,
}

impl RawRule {
    pub(crate) fn into_rule(self, name: PathBuf, fallback: &Self) -> PathRule {
        let archive_ext = self
            .archive_ext
            .or_else(|| fallback.archive_ext.clone())
            .unwrap_or_else(|| defaults::ARCHIVE_EXT.to_string());
        PathRule {
            name,
            min_depth: self
                .min_depth
                .or(fallback.min_depth)
                .unwrap_or(defaults::MIN_DEPTH),
            max_depth: self
                .max_depth
                .or(fallback.max_depth)
                .unwrap_or(defaults::MAX_DEPTH),
            skip_hidden: self
                .skip_hidden
                .or(fallback.skip_hidden)
                .unwrap_or(defaults::SKIP_HIDDEN),
            patterns: self
                .patterns
                .or_else(|| fallback.patterns.clone())
                .unwrap_or_else(|| {
                    defaults::PATTERNS
                        .iter()
                        .map(|pattern| (*pattern).to_string())
                        .collect()
                }),
            remove: self.remove.or(fallback.remove).unwrap_or(defaults::REMOVE),
            archive_ext: normalize_extension(&archive_ext),
            post_command: self
                .post_command
                .or_else(|| fallback.post_command.clone())
                .unwrap_or_else(|| defaults::POST_COMMAND.to_string()),
        }
    }
}

/// Lowercase an archive extension and strip a leading dot.
#[must_use]
pub fn normalize_extension(value: &str) -> String {
    value.trim().trim_start_matches('.').to_ascii_lowercase()
}

pub(crate) fn load_file(path: &Path) -> ConfigResult<WatchConfig> {
    let document =
        fs::read_to_string(path).map_err(|source| ConfigError::io("config.read", path, source))?;
    parse_document(&document, Some(path))
}

pub(crate) fn parse_document(document: &str, source: Option<&Path>) -> ConfigResult<WatchConfig> {
    let raw: RawDocument =
        serde_json::from_str(document).map_err(|source_err| ConfigError::Json {
            path: source.map(Path::to_path_buf),
            source: source_err,
        })?;

    let RawDocument {
        default,
        buffer_size,
        paths,
    } = raw;

    let mut rules = Vec::with_capacity(paths.len());
    for (index, mut raw_rule) in paths.into_iter().enumerate() {
        let Some(name) = raw_rule.name.take() else {
            return Err(ConfigError::invalid(
                "Name",
                None,
                "missing",
                Some(format!("Paths[{index}]")),
            ));
        };
        rules.push(raw_rule.into_rule(name, &default));
    }

    let config = WatchConfig::assemble(
        rules,
        buffer_size.unwrap_or(defaults::BUFFER_SIZE),
        source.map(Path::to_path_buf),
    )?;

    debug!(
        source = ?config.source(),
        paths = config.paths().len(),
        buffer_size = config.buffer_size(),
        "configuration loaded"
    );
    Ok(config)
}
