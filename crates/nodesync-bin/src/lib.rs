// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # nodesync-bin
//!
//! The `nodesync` command line tool. It loads a server snapshot into an
//! in-process [`MemoryServer`](nodesync_fetch::MemoryServer) and drives a
//! client-side fetcher against it.
//!
//! ```text
//!   main.rs ──▶ cli ──▶ config ──▶ logging
//!                          │
//!                          ▼
//!                      commands ──▶ snapshot ──▶ MemoryServer
//!                          │                          ▲
//!                          ▼                          │ Read / Browse
//!                       Session ──▶ FetchDriver ──────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Fetch the Objects folder and its children
//! nodesync sync --snapshot plant.toml
//!
//! # Fetch two nodes and dump every event as JSON
//! nodesync sync "ns=1;i=1" "ns=1;s=Pump" --events -f json
//!
//! # Print the hierarchy three levels deep
//! nodesync tree --snapshot plant.toml -d 3
//!
//! # Check a configuration file and its snapshot
//! nodesync -c nodesync.toml validate
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod snapshot;

pub use cli::{Cli, Commands, LogFormat, OutputFormat};
pub use config::{load_config, NodeSyncConfig};
pub use error::{BinError, BinResult};

/// Version of the binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the binary.
pub const NAME: &str = "nodesync";

/// Loads the configuration, installs logging and runs the command.
pub async fn run(cli: Cli) -> BinResult<()> {
    let config = commands::resolve_config(&cli)?;

    let level = cli.effective_log_level(&config.logging.level);
    logging::init_logging(level, cli.effective_log_format(config.logging.format));
    tracing::debug!(version = VERSION, "nodesync starting");

    commands::execute(&cli, &config).await
}
