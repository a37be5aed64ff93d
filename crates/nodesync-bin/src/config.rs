// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration file loading.
//!
//! A configuration file is TOML or JSON, chosen by extension:
//!
//! ```toml
//! [fetcher]
//! max_nodes_per_request = 50
//! request_timeout = "5s"
//!
//! [logging]
//! level = "${NODESYNC_LEVEL:info}"
//! format = "compact"
//!
//! [server]
//! snapshot = "plant.toml"
//! ```
//!
//! Loading happens in three steps:
//!
//! 1. `${VAR}` and `${VAR:default}` placeholders in the raw text are
//!    replaced from the environment
//! 2. The text is parsed and missing sections take their defaults
//! 3. `NODESYNC_LOG_LEVEL`, `NODESYNC_LOG_FORMAT` and `NODESYNC_SNAPSHOT`
//!    override the parsed values
//!
//! A relative snapshot path is resolved against the directory of the
//! configuration file.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use nodesync_core::NodeSyncError;
use nodesync_fetch::FetcherConfig;

use crate::cli::LogFormat;
use crate::error::{BinError, BinResult};
use crate::logging::is_known_level;

/// Prefix of the override variables.
pub const ENV_PREFIX: &str = "NODESYNC";

// =============================================================================
// Schema
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSyncConfig {
    /// Fetch layer settings.
    pub fetcher: FetcherConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// In-process server settings.
    pub server: ServerConfig,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level name.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// In-process server settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Snapshot of the nodes the server exposes on top of the standard
    /// catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<PathBuf>,
}

impl NodeSyncConfig {
    /// Checks every section.
    pub fn validate(&self) -> BinResult<()> {
        self.fetcher.validate().map_err(NodeSyncError::from)?;
        if !is_known_level(&self.logging.level) {
            return Err(BinError::config(format!(
                "unknown log level '{}'",
                self.logging.level
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Formats
// =============================================================================

/// Serialization format of a file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl FileFormat {
    /// Detects the format of `path`.
    pub fn from_path(path: &Path) -> BinResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);
        match extension.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(BinError::config(format!(
                "unsupported file extension: {} (expected .toml or .json)",
                path.display()
            ))),
        }
    }

    /// Parses `content` in this format.
    pub fn parse<T>(self, content: &str) -> Result<T, String>
    where
        T: serde::de::DeserializeOwned,
    {
        match self {
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Loads a configuration file, applying placeholders and overrides from
/// the process environment.
pub fn load_config(path: &Path) -> BinResult<NodeSyncConfig> {
    load_config_with(path, |name| env::var(name).ok())
}

/// Returns the defaults with the environment overrides applied.
pub fn default_config() -> BinResult<NodeSyncConfig> {
    let mut config = NodeSyncConfig::default();
    apply_overrides(&mut config, |name| env::var(name).ok())?;
    Ok(config)
}

/// Like [`load_config`] with a custom variable lookup.
pub fn load_config_with<F>(path: &Path, lookup: F) -> BinResult<NodeSyncConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let format = FileFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| BinError::from(e).with_context(format!("reading {}", path.display())))?;

    let mut config = parse_config(&content, format, &lookup)?;

    if let Some(snapshot) = config.server.snapshot.as_mut() {
        if snapshot.is_relative() {
            if let Some(dir) = path.parent() {
                *snapshot = dir.join(&*snapshot);
            }
        }
    }
    Ok(config)
}

/// Parses configuration text.
pub fn parse_config<F>(content: &str, format: FileFormat, lookup: F) -> BinResult<NodeSyncConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let expanded = expand_placeholders(content, &lookup);
    let mut config: NodeSyncConfig = format.parse(&expanded).map_err(BinError::config)?;
    apply_overrides(&mut config, &lookup)?;
    config.validate()?;
    Ok(config)
}

/// Replaces `${VAR}` and `${VAR:default}` placeholders.
///
/// An unset variable without a default is left in place. An unterminated
/// placeholder is copied verbatim.
pub fn expand_placeholders<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut expanded = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            expanded.push_str(&rest[start..]);
            return expanded;
        };

        let body = &after[..end];
        let (name, default) = match body.split_once(':') {
            Some((name, default)) => (name, Some(default)),
            None => (body, None),
        };

        match (lookup(name), default) {
            (Some(value), _) => expanded.push_str(&value),
            (None, Some(default)) => expanded.push_str(default),
            (None, None) => {
                warn!(variable = name, "Environment variable not set");
                expanded.push_str(&rest[start..start + 2 + end + 1]);
            }
        }
        rest = &after[end + 1..];
    }

    expanded.push_str(rest);
    expanded
}

/// Applies the `NODESYNC_*` overrides.
pub fn apply_overrides<F>(config: &mut NodeSyncConfig, lookup: F) -> BinResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let key = |suffix: &str| format!("{ENV_PREFIX}_{suffix}");

    if let Some(level) = lookup(&key("LOG_LEVEL")) {
        config.logging.level = level;
    }
    if let Some(format) = lookup(&key("LOG_FORMAT")) {
        config.logging.format = format
            .parse()
            .map_err(|e: String| BinError::config(format!("{}: {e}", key("LOG_FORMAT"))))?;
    }
    if let Some(snapshot) = lookup(&key("SNAPSHOT")) {
        config.server.snapshot = Some(PathBuf::from(snapshot));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use std::time::Duration;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_expand_placeholders() {
        let lookup = vars(&[("HOST", "plant-a")]);
        assert_eq!(expand_placeholders("name = \"${HOST}\"", &lookup), "name = \"plant-a\"");
        assert_eq!(expand_placeholders("${PORT:4840}", &lookup), "4840");
        assert_eq!(expand_placeholders("${HOST:ignored}", &lookup), "plant-a");
        assert_eq!(expand_placeholders("a ${MISSING} b", &lookup), "a ${MISSING} b");
        assert_eq!(expand_placeholders("open ${HOST", &lookup), "open ${HOST");
        assert_eq!(expand_placeholders("$HOST {x}", &lookup), "$HOST {x}");
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "nodesync.toml",
            r#"
                [fetcher]
                max_nodes_per_request = 5
                request_timeout = "${TIMEOUT:2s}"

                [logging]
                level = "debug"
                format = "json"

                [server]
                snapshot = "plant.json"
            "#,
        );

        let config = load_config_with(&path, vars(&[])).unwrap();
        assert_eq!(config.fetcher.max_nodes_per_request, 5);
        assert_eq!(config.fetcher.max_children_per_request, 100);
        assert_eq!(config.fetcher.request_timeout, Duration::from_secs(2));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.server.snapshot, Some(dir.path().join("plant.json")));
    }

    #[test]
    fn test_load_json_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "nodesync.json", r#"{ "fetcher": { "max_children_per_request": 7 } }"#);

        let config = load_config_with(&path, vars(&[])).unwrap();
        assert_eq!(config.fetcher.max_children_per_request, 7);
        assert_eq!(config.logging, LoggingConfig::default());
        assert!(config.server.snapshot.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let lookup = vars(&[
            ("NODESYNC_LOG_LEVEL", "warn"),
            ("NODESYNC_LOG_FORMAT", "compact"),
            ("NODESYNC_SNAPSHOT", "/srv/plant.toml"),
        ]);
        let config = parse_config("[logging]\nlevel = \"trace\"\n", FileFormat::Toml, lookup).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.server.snapshot, Some(PathBuf::from("/srv/plant.toml")));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let lookup = vars(&[("NODESYNC_LOG_FORMAT", "xml")]);
        let err = parse_config("", FileFormat::Toml, lookup).unwrap_err();
        assert!(err.to_string().contains("NODESYNC_LOG_FORMAT"));
    }

    #[test]
    fn test_validation_errors() {
        let err = parse_config(
            "[fetcher]\nmax_nodes_per_request = 0\n",
            FileFormat::Toml,
            vars(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, BinError::NodeSync(_)));

        let err = parse_config(r#"{"logging": {"level": "loud"}}"#, FileFormat::Json, vars(&[]))
            .unwrap_err();
        assert!(matches!(err, BinError::Configuration(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "nodesync.yaml", "fetcher: {}");
        assert!(matches!(
            load_config_with(&path, vars(&[])),
            Err(BinError::Configuration(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_with(&dir.path().join("absent.toml"), vars(&[])).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }
}
