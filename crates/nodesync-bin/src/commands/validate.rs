// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `validate` command.

use serde_json::json;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::config::NodeSyncConfig;
use crate::error::{BinError, BinResult};
use crate::snapshot::Snapshot;

/// Checks the loaded configuration and the snapshot it names.
///
/// The configuration itself was validated while loading. This adds the
/// snapshot, which is only read on demand otherwise.
pub fn validate(cli: &Cli, config: &NodeSyncConfig, args: &ValidateArgs) -> BinResult<()> {
    let source = cli
        .config
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());

    let snapshot_nodes = match &config.server.snapshot {
        Some(path) => Some(Snapshot::load(path)?.nodes.len()),
        None => None,
    };

    let mut warnings = Vec::new();
    if snapshot_nodes.is_none() {
        warnings.push("No snapshot configured, the server only exposes the standard catalog");
    }
    if snapshot_nodes == Some(0) {
        warnings.push("Snapshot contains no nodes");
    }

    match args.format {
        OutputFormat::Text => {
            println!("Configuration is valid: {source}");
            println!();
            println!("Fetcher:");
            println!("  Nodes per request:    {}", config.fetcher.max_nodes_per_request);
            println!("  Children per request: {}", config.fetcher.max_children_per_request);
            println!("  Request timeout:      {:?}", config.fetcher.request_timeout);
            println!("  Event capacity:       {}", config.fetcher.event_channel_capacity);
            println!("Logging: {} ({:?})", config.logging.level, config.logging.format);
            if let (Some(path), Some(count)) = (&config.server.snapshot, snapshot_nodes) {
                println!("Snapshot: {} ({count} nodes)", path.display());
            }

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  {warning}");
                }
            }

            if args.show_config {
                let rendered = toml::to_string_pretty(config)
                    .map_err(|e| BinError::runtime(format!("rendering configuration: {e}")))?;
                println!();
                println!("{rendered}");
            }
        }
        OutputFormat::Json => {
            let mut output = json!({
                "valid": true,
                "source": source,
                "snapshot_nodes": snapshot_nodes,
                "warnings": warnings,
            });
            if args.show_config {
                output["config"] = serde_json::to_value(config)
                    .map_err(|e| BinError::runtime(format!("rendering configuration: {e}")))?;
            }
            let rendered = serde_json::to_string_pretty(&output)
                .map_err(|e| BinError::runtime(format!("rendering result: {e}")))?;
            println!("{rendered}");
        }
    }
    Ok(())
}
