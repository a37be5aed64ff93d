// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Command implementations.
//!
//! `sync` and `tree` run a [`FetchDriver`] against an in-process server
//! built from the configured snapshot. A [`Session`] owns that driver and
//! collects its events.

mod sync;
mod tree;
mod validate;
mod version;

pub use sync::sync;
pub use tree::tree;
pub use validate::validate;
pub use version::version;

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use nodesync_core::{AddressSpace, GenericNodeFactory, NodeId, NodeSyncError, StandardCatalog};
use nodesync_fetch::{
    AddressSpaceFetcher, FetchDriver, FetcherConfig, FetcherEvent, MemoryServer, NodeFetchStatus,
};

use crate::cli::{Cli, Commands};
use crate::config::{self, NodeSyncConfig};
use crate::error::{BinError, BinResult};

/// Runs the selected command with an already loaded configuration.
pub async fn execute(cli: &Cli, config: &NodeSyncConfig) -> BinResult<()> {
    match &cli.command {
        Commands::Sync(args) => sync::sync(config, args).await,
        Commands::Tree(args) => tree::tree(config, args).await,
        Commands::Validate(args) => validate::validate(cli, config, args),
        Commands::Version => version::version(),
    }
}

/// Loads the configuration named by `--config`, or the defaults.
pub fn resolve_config(cli: &Cli) -> BinResult<NodeSyncConfig> {
    match &cli.config {
        Some(path) => config::load_config(path),
        None => config::default_config(),
    }
}

/// Parses node id arguments.
pub(crate) fn parse_node_ids(args: &[String]) -> BinResult<Vec<NodeId>> {
    args.iter()
        .map(|arg| {
            arg.parse::<NodeId>().map_err(|e| {
                BinError::from(NodeSyncError::from(e)).with_context(format!("node id '{arg}'"))
            })
        })
        .collect()
}

// =============================================================================
// Session
// =============================================================================

/// A fetch driver connected to an in-process server.
pub(crate) struct Session {
    driver: FetchDriver,
    collector: JoinHandle<Vec<FetcherEvent>>,
}

impl Session {
    /// Builds a client address space over `server` and opens the channel.
    pub(crate) fn open(config: &FetcherConfig, server: MemoryServer) -> BinResult<Self> {
        let mut space = AddressSpace::new();
        StandardCatalog::standard()
            .install(&mut space)
            .map_err(NodeSyncError::from)?;

        let fetcher = AddressSpaceFetcher::new(space, Arc::new(GenericNodeFactory::new()), config);
        let server = Arc::new(server);
        let (mut driver, mut events) = FetchDriver::new(fetcher, server.clone(), server, config);

        // The driver blocks on a full event channel, so drain it concurrently.
        let collector = tokio::spawn(async move {
            let mut collected = Vec::new();
            while let Some(event) = events.recv().await {
                collected.push(event);
            }
            collected
        });

        driver.fetcher_mut().on_channel_opened();
        Ok(Self { driver, collector })
    }

    /// Requests `nodes` with `requested` and waits until nothing is in flight.
    pub(crate) async fn fetch(&mut self, nodes: &[NodeId], requested: NodeFetchStatus) {
        for node_id in nodes {
            self.driver.fetcher_mut().fetch_node(node_id, requested);
        }
        self.driver.run_until_idle().await;
        debug!(
            requested = nodes.len(),
            nodes = self.driver.fetcher().space().len(),
            "Fetch round settled"
        );
    }

    /// The fetcher state between rounds.
    pub(crate) fn fetcher(&self) -> &AddressSpaceFetcher {
        self.driver.fetcher()
    }

    /// Stops the session and returns the fetcher with every event it emitted.
    pub(crate) async fn finish(mut self) -> BinResult<(AddressSpaceFetcher, Vec<FetcherEvent>)> {
        self.driver.fetcher_mut().on_channel_closed();
        let fetcher = self.driver.into_fetcher();
        let events = self
            .collector
            .await
            .map_err(|e| BinError::runtime(format!("event collector failed: {e}")))?;
        info!(nodes = fetcher.space().len(), events = events.len(), "Session finished");
        Ok((fetcher, events))
    }
}

/// Builds the server for a command from its `--snapshot` or the config.
pub(crate) fn open_session(config: &NodeSyncConfig, snapshot: Option<&Path>) -> BinResult<Session> {
    let snapshot = snapshot.or(config.server.snapshot.as_deref());
    let server = crate::snapshot::build_server(snapshot)?;
    Session::open(&config.fetcher, server)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nodesync_core::ids;

    #[test]
    fn test_parse_node_ids() {
        let parsed = parse_node_ids(&["i=85".to_string(), "ns=1;s=Pump".to_string()]).unwrap();
        assert_eq!(parsed[0], ids::OBJECTS_FOLDER);
        assert_eq!(parsed[1].to_string(), "ns=1;s=Pump");

        let err = parse_node_ids(&["pump".to_string()]).unwrap_err();
        assert!(err.to_string().starts_with("node id 'pump'"));
    }

    #[tokio::test]
    async fn test_session_fetches_objects_folder() {
        let mut session = open_session(&NodeSyncConfig::default(), None).unwrap();
        session
            .fetch(&[ids::OBJECTS_FOLDER], NodeFetchStatus::node_and_children())
            .await;

        let (status, fetch_status) = session.fetcher().node_fetch_status(&ids::OBJECTS_FOLDER);
        assert!(status.is_good());
        assert!(fetch_status.satisfies(NodeFetchStatus::node_and_children()));

        let (_, events) = session.finish().await.unwrap();
        assert!(events
            .iter()
            .any(|event| matches!(event, FetcherEvent::StatusChanged(_))));
    }
}
