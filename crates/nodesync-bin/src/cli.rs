// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command line arguments.
//!
//! - `sync`: fetch nodes from a snapshot-backed server and report the result
//! - `tree`: fetch the hierarchy below a node and print it
//! - `validate`: check a configuration file and its snapshot
//! - `version`: show version information

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

// =============================================================================
// Cli
// =============================================================================

/// Keeps a local address space in sync with a node server.
#[derive(Parser, Debug)]
#[command(
    name = "nodesync",
    author = "Sylvex <contact@sylvex.io>",
    version = crate::VERSION,
    about = "Address space synchronization for node servers",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, env = "NODESYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overrides the config
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Log format, overrides the config
    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Fetch nodes and their children
    ///
    /// Loads the snapshot into an in-process server, opens a channel and
    /// fetches every requested node together with its children.
    Sync(SyncArgs),

    /// Print the synced hierarchy
    ///
    /// Fetches level by level below the start node and prints the result
    /// by display name.
    Tree(TreeArgs),

    /// Validate the configuration file
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

/// Arguments for the `sync` command.
#[derive(Args, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Node ids to fetch, e.g. `i=85` or `ns=1;s=Pump`. Defaults to the
    /// Objects folder.
    pub nodes: Vec<String>,

    /// Server snapshot (TOML or JSON), overrides the config
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Print every event the fetcher emitted
    #[arg(short, long)]
    pub events: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

/// Arguments for the `tree` command.
#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    /// Start node. Defaults to the Root folder.
    pub root: Option<String>,

    /// Server snapshot (TOML or JSON), overrides the config
    #[arg(short, long)]
    pub snapshot: Option<PathBuf>,

    /// Number of levels to fetch below the start node
    #[arg(short, long, default_value = "8")]
    pub depth: usize,

    /// Show node ids next to display names
    #[arg(long)]
    pub ids: bool,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Show the parsed configuration
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parses the process arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the log level after `--quiet`, `--verbose` and `--log-level`,
    /// falling back to `configured`.
    pub fn effective_log_level<'a>(&'a self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            self.log_level.as_deref().unwrap_or(configured)
        }
    }

    /// Returns the log format, falling back to `configured`.
    pub fn effective_log_format(&self, configured: LogFormat) -> LogFormat {
        self.log_format.unwrap_or(configured)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_defaults() {
        let cli = Cli::parse_from(["nodesync", "sync"]);
        match cli.command {
            Commands::Sync(args) => {
                assert!(args.nodes.is_empty());
                assert!(args.snapshot.is_none());
                assert_eq!(args.format, OutputFormat::Text);
            }
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn test_sync_nodes_and_snapshot() {
        let cli = Cli::parse_from([
            "nodesync",
            "sync",
            "i=85",
            "ns=1;i=3",
            "--snapshot",
            "plant.json",
            "-f",
            "json",
        ]);
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.nodes, vec!["i=85", "ns=1;i=3"]);
        assert_eq!(args.snapshot, Some(PathBuf::from("plant.json")));
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn test_tree_depth() {
        let cli = Cli::parse_from(["nodesync", "tree", "i=85", "-d", "2", "--ids"]);
        let Commands::Tree(args) = cli.command else {
            panic!("expected tree");
        };
        assert_eq!(args.root.as_deref(), Some("i=85"));
        assert_eq!(args.depth, 2);
        assert!(args.ids);
    }

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::parse_from(["nodesync", "validate", "-c", "/etc/nodesync.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/nodesync.toml")));
    }

    #[test]
    fn test_effective_log_level() {
        let cli = Cli::parse_from(["nodesync", "version"]);
        assert_eq!(cli.effective_log_level("info"), "info");

        let cli = Cli::parse_from(["nodesync", "-l", "trace", "version"]);
        assert_eq!(cli.effective_log_level("info"), "trace");

        let cli = Cli::parse_from(["nodesync", "-q", "-l", "trace", "version"]);
        assert_eq!(cli.effective_log_level("info"), "warn");

        let cli = Cli::parse_from(["nodesync", "-v", "version"]);
        assert_eq!(cli.effective_log_level("info"), "debug");
    }

    #[test]
    fn test_log_format_override() {
        let cli = Cli::parse_from(["nodesync", "--log-format", "json", "version"]);
        assert_eq!(cli.effective_log_format(LogFormat::Text), LogFormat::Json);

        let cli = Cli::parse_from(["nodesync", "version"]);
        assert_eq!(cli.effective_log_format(LogFormat::Compact), LogFormat::Compact);
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
