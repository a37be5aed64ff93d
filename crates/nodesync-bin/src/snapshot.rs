// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Server snapshots.
//!
//! A snapshot lists the nodes an in-process [`MemoryServer`] exposes on
//! top of the standard catalog. It is TOML or JSON with a single `nodes`
//! array of [`NodeState`] records, in any order.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use nodesync_core::{GenericNodeFactory, NodeSyncError, NodeState};
use nodesync_fetch::MemoryServer;

use crate::config::FileFormat;
use crate::error::{BinError, BinResult};

/// File contents of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Nodes to load.
    #[serde(default)]
    pub nodes: Vec<NodeState>,
}

impl Snapshot {
    /// Reads a snapshot file.
    pub fn load(path: &Path) -> BinResult<Self> {
        let format = FileFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)
            .map_err(|e| BinError::from(e).with_context(format!("reading {}", path.display())))?;
        format
            .parse(&content)
            .map_err(|e| BinError::snapshot(path, e))
    }
}

/// Builds a server with the standard catalog and, if given, the nodes of
/// `snapshot`.
///
/// Nodes the server factory rejects are logged and left out. A snapshot
/// where every node is rejected is an error.
pub fn build_server(snapshot: Option<&Path>) -> BinResult<MemoryServer> {
    let server = MemoryServer::standard().map_err(NodeSyncError::from)?;
    let Some(path) = snapshot else {
        return Ok(server);
    };

    let snapshot = Snapshot::load(path)?;
    let total = snapshot.nodes.len();
    let report = server.load(&GenericNodeFactory::new(), snapshot.nodes);

    for (node_id, error) in &report.failed_nodes {
        warn!(node_id = %node_id, error = %error, "Snapshot node rejected");
    }
    if total > 0 && report.failed_nodes.len() == total {
        return Err(BinError::snapshot(path, "no node could be loaded"));
    }

    info!(
        path = %path.display(),
        count = report.added_nodes.len(),
        rejected = report.failed_nodes.len(),
        "Snapshot loaded"
    );
    Ok(server)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nodesync_core::{ids, NodeId};

    const PLANT_TOML: &str = r#"
        [[nodes]]
        node_id = "ns=1;i=1"
        node_class = "object"
        type_definition_id = "i=61"
        parent_id = "i=85"
        reference_type_id = "i=35"
        attributes = { browse_name = { namespace_index = 1, name = "Plant" } }

        [[nodes]]
        node_id = "ns=1;i=2"
        node_class = "object"
        type_definition_id = "i=58"
        parent_id = "ns=1;i=1"
        reference_type_id = "i=35"
        attributes = { browse_name = { namespace_index = 1, name = "Line1" }, display_name = "Line 1" }
    "#;

    #[test]
    fn test_build_server_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plant.toml");
        std::fs::write(&path, PLANT_TOML).unwrap();

        let server = build_server(Some(&path)).unwrap();
        let space = server.space();
        assert_eq!(space.children(&NodeId::numeric(1, 1)), vec![NodeId::numeric(1, 2)]);
        assert!(space.children(&ids::OBJECTS_FOLDER).contains(&NodeId::numeric(1, 1)));
        assert_eq!(
            space.get_node(&NodeId::numeric(1, 2)).map(|n| n.display_name.as_str()),
            Some("Line 1")
        );
    }

    #[test]
    fn test_json_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plant.json");
        std::fs::write(
            &path,
            r#"{"nodes": [{"node_id": "ns=1;s=Pump", "node_class": "object",
                "type_definition_id": "i=58", "parent_id": "i=85", "reference_type_id": "i=35"}]}"#,
        )
        .unwrap();

        let snapshot = Snapshot::load(&path).unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert!(build_server(Some(&path)).is_ok());
    }

    #[test]
    fn test_without_snapshot() {
        let server = build_server(None).unwrap();
        assert!(server.space().contains(&ids::OBJECTS_FOLDER));
    }

    #[test]
    fn test_malformed_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nodes: ").unwrap();
        assert!(matches!(Snapshot::load(&path), Err(BinError::Snapshot(_))));
    }

    #[test]
    fn test_all_nodes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orphan.json");
        std::fs::write(
            &path,
            r#"{"nodes": [{"node_id": "ns=1;i=9", "node_class": "object",
                "type_definition_id": "i=58", "parent_id": "ns=1;i=404", "reference_type_id": "i=35"}]}"#,
        )
        .unwrap();
        assert!(matches!(build_server(Some(&path)), Err(BinError::Snapshot(_))));
    }
}
