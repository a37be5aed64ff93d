// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `sync` command.

use serde::Serialize;

use nodesync_core::{ids, NodeId, StatusCode};
use nodesync_fetch::{AddressSpaceFetcher, FetcherEvent, NodeFetchStatus};

use super::{open_session, parse_node_ids};
use crate::cli::{OutputFormat, SyncArgs};
use crate::config::NodeSyncConfig;
use crate::error::{BinError, BinResult};

/// Outcome for one requested node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    /// Requested node.
    pub node_id: NodeId,
    /// Display name, or the id when the node is unknown.
    pub display_name: String,
    /// Name of the fetch status code.
    pub status: String,
    /// Fetch completeness.
    pub fetch_status: NodeFetchStatus,
}

/// Event counts by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    /// `StatusChanged` batches.
    pub status_changed: usize,
    /// `ModelChanged` events.
    pub model_changed: usize,
    /// `SemanticsChanged` events.
    pub semantics_changed: usize,
}

impl EventCounts {
    fn count(events: &[FetcherEvent]) -> Self {
        events.iter().fold(Self::default(), |mut counts, event| {
            match event {
                FetcherEvent::StatusChanged(_) => counts.status_changed += 1,
                FetcherEvent::ModelChanged(_) => counts.model_changed += 1,
                FetcherEvent::SemanticsChanged(_) => counts.semantics_changed += 1,
            }
            counts
        })
    }
}

/// Result of a `sync` run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Nodes in the local address space afterwards.
    pub node_count: usize,
    /// Outcome per requested node.
    pub requested: Vec<NodeOutcome>,
    /// Event counts.
    pub event_counts: EventCounts,
    /// Every event, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<FetcherEvent>>,
}

impl SyncReport {
    fn build(
        fetcher: &AddressSpaceFetcher,
        nodes: &[NodeId],
        events: Vec<FetcherEvent>,
        keep_events: bool,
    ) -> Self {
        let requested = nodes
            .iter()
            .map(|node_id| {
                let (status, fetch_status) = fetcher.node_fetch_status(node_id);
                NodeOutcome {
                    node_id: node_id.clone(),
                    display_name: fetcher.display_name(node_id),
                    status: status.to_string(),
                    fetch_status,
                }
            })
            .collect();

        Self {
            node_count: fetcher.space().len(),
            requested,
            event_counts: EventCounts::count(&events),
            events: keep_events.then_some(events),
        }
    }

    /// Returns `true` if every requested node was fetched with its children.
    pub fn is_complete(&self) -> bool {
        self.requested.iter().all(|outcome| {
            outcome.status == StatusCode::GOOD.to_string()
                && outcome.fetch_status.satisfies(NodeFetchStatus::node_and_children())
        })
    }
}

/// Executes `sync`.
pub async fn sync(config: &NodeSyncConfig, args: &SyncArgs) -> BinResult<()> {
    let report = run_sync(config, args).await?;

    match args.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report)
                .map_err(|e| BinError::runtime(format!("serializing report: {e}")))?;
            println!("{json}");
        }
    }

    if report.is_complete() {
        Ok(())
    } else {
        Err(BinError::runtime("some nodes could not be fetched"))
    }
}

/// Fetches the requested nodes and builds the report.
pub async fn run_sync(config: &NodeSyncConfig, args: &SyncArgs) -> BinResult<SyncReport> {
    let nodes = if args.nodes.is_empty() {
        vec![ids::OBJECTS_FOLDER]
    } else {
        parse_node_ids(&args.nodes)?
    };

    let mut session = open_session(config, args.snapshot.as_deref())?;
    session.fetch(&nodes, NodeFetchStatus::node_and_children()).await;
    let (fetcher, events) = session.finish().await?;

    Ok(SyncReport::build(&fetcher, &nodes, events, args.events))
}

fn print_text(report: &SyncReport) {
    println!("Synced {} nodes", report.node_count);
    println!();
    for outcome in &report.requested {
        let completeness = match (
            outcome.fetch_status.node_fetched,
            outcome.fetch_status.children_fetched,
        ) {
            (true, true) => "node+children",
            (true, false) => "node",
            (false, true) => "children",
            (false, false) => "-",
        };
        println!(
            "  {:<24} {:<24} {:<20} {}",
            outcome.node_id.to_string(),
            outcome.display_name,
            outcome.status,
            completeness
        );
    }

    let counts = report.event_counts;
    println!();
    println!(
        "Events: {} status, {} model, {} semantic",
        counts.status_changed, counts.model_changed, counts.semantics_changed
    );

    if let Some(events) = &report.events {
        for event in events {
            match serde_json::to_string(event) {
                Ok(line) => println!("  {line}"),
                Err(_) => println!("  {event:?}"),
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
