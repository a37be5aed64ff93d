// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The `tree` command.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use nodesync_core::{ids, NodeId};
use nodesync_fetch::{AddressSpaceFetcher, NodeFetchStatus};

use super::{open_session, parse_node_ids};
use crate::cli::TreeArgs;
use crate::config::NodeSyncConfig;
use crate::error::BinResult;

/// Executes `tree`.
pub async fn tree(config: &NodeSyncConfig, args: &TreeArgs) -> BinResult<()> {
    let rendered = render_tree(config, args).await?;
    print!("{rendered}");
    Ok(())
}

/// Fetches `args.depth` levels below the start node and renders them.
pub async fn render_tree(config: &NodeSyncConfig, args: &TreeArgs) -> BinResult<String> {
    let root = match &args.root {
        Some(root) => parse_node_ids(std::slice::from_ref(root))?.remove(0),
        None => ids::ROOT_FOLDER,
    };

    let mut session = open_session(config, args.snapshot.as_deref())?;
    session.fetch(std::slice::from_ref(&root), NodeFetchStatus::node_only()).await;

    let mut visited = BTreeSet::new();
    let mut frontier = vec![root.clone()];
    for _ in 0..args.depth {
        frontier.retain(|node_id| visited.insert(node_id.clone()));
        if frontier.is_empty() {
            break;
        }
        session.fetch(&frontier, NodeFetchStatus::node_and_children()).await;
        frontier = frontier
            .iter()
            .flat_map(|node_id| session.fetcher().space().children(node_id))
            .collect();
    }

    let (fetcher, _) = session.finish().await?;
    Ok(TreePrinter::new(&fetcher, args.ids).render(&root, args.depth))
}

// =============================================================================
// TreePrinter
// =============================================================================

struct TreePrinter<'a> {
    fetcher: &'a AddressSpaceFetcher,
    show_ids: bool,
    output: String,
    on_path: BTreeSet<NodeId>,
}

impl<'a> TreePrinter<'a> {
    fn new(fetcher: &'a AddressSpaceFetcher, show_ids: bool) -> Self {
        Self {
            fetcher,
            show_ids,
            output: String::new(),
            on_path: BTreeSet::new(),
        }
    }

    fn render(mut self, root: &NodeId, depth: usize) -> String {
        let label = self.label(root);
        let _ = writeln!(self.output, "{label}");
        self.on_path.insert(root.clone());
        self.children(root, "", depth);
        self.output
    }

    fn children(&mut self, node_id: &NodeId, prefix: &str, depth: usize) {
        if depth == 0 {
            return;
        }
        let mut children: Vec<(String, NodeId)> = self
            .fetcher
            .space()
            .children(node_id)
            .into_iter()
            .map(|child| (self.label(&child), child))
            .collect();
        children.sort();
        let last = children.len().saturating_sub(1);

        for (index, (label, child)) in children.iter().enumerate() {
            let (branch, indent) = if index == last {
                ("└── ", "    ")
            } else {
                ("├── ", "│   ")
            };

            if !self.on_path.insert(child.clone()) {
                let _ = writeln!(self.output, "{prefix}{branch}{label} (cycle)");
                continue;
            }
            let _ = writeln!(self.output, "{prefix}{branch}{label}");
            self.children(child, &format!("{prefix}{indent}"), depth - 1);
            self.on_path.remove(child);
        }
    }

    fn label(&self, node_id: &NodeId) -> String {
        let name = self.fetcher.display_name(node_id);
        if self.show_ids {
            format!("{name} [{node_id}]")
        } else {
            name
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PLANT: &str = r#"
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
        attributes = { browse_name = { namespace_index = 1, name = "Line1" } }

        [[nodes]]
        node_id = "ns=1;i=3"
        node_class = "object"
        type_definition_id = "i=58"
        parent_id = "ns=1;i=1"
        reference_type_id = "i=35"
        attributes = { browse_name = { namespace_index = 1, name = "Line2" } }
    "#;

    fn args(dir: &tempfile::TempDir, root: &str, depth: usize) -> TreeArgs {
        let path = dir.path().join("plant.toml");
        std::fs::write(&path, PLANT).unwrap();
        TreeArgs {
            root: Some(root.to_string()),
            snapshot: Some(path),
            depth,
            ids: false,
        }
    }

    #[tokio::test]
    async fn test_render_snapshot_tree() {
        let dir = tempfile::tempdir().unwrap();
        let rendered = render_tree(&NodeSyncConfig::default(), &args(&dir, "ns=1;i=1", 2))
            .await
            .unwrap();
        assert_eq!(rendered, "Plant\n├── Line1\n└── Line2\n");
    }

    #[tokio::test]
    async fn test_depth_limits_output() {
        let dir = tempfile::tempdir().unwrap();
        let rendered = render_tree(&NodeSyncConfig::default(), &args(&dir, "i=85", 1))
            .await
            .unwrap();
        assert!(rendered.starts_with("Objects\n"));
        assert!(rendered.contains("── Plant\n"));
        assert!(!rendered.contains("Line1"));
    }

    #[tokio::test]
    async fn test_ids_shown() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = args(&dir, "ns=1;i=1", 1);
        args.ids = true;
        let rendered = render_tree(&NodeSyncConfig::default(), &args).await.unwrap();
        assert!(rendered.starts_with("Plant [ns=1;i=1]\n"));
    }
}
