// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fetch-in-progress node state.
//!
//! A [`FetchingNode`] exists from the first time an id is needed until the
//! node and everything it transitively depends on are fetched. Dependency
//! edges are id sets inside the owning [`FetchingNodeGraph`].

use std::collections::{BTreeMap, BTreeSet};

use nodesync_core::{NodeId, NodeState, StatusCode};

// =============================================================================
// FetchingNode
// =============================================================================

/// A node whose fetch is not complete yet.
#[derive(Debug, Clone, Default)]
pub struct FetchingNode {
    /// Snapshot being filled in.
    pub state: NodeState,

    /// Queue position, set while the node waits for a round.
    pub(crate) queue_key: Option<QueueKey>,

    /// Ordering epoch. Children share their parent's epoch.
    pub pending_sequence: u64,

    /// Requests for the node were issued.
    pub fetch_started: bool,

    /// Round that owns the node. Results of other rounds are stale.
    pub fetch_request_id: u32,

    /// Browse the inverse hierarchical reference even if the parent is known.
    pub fetch_parent: bool,

    /// All reads of the node completed.
    pub attributes_fetched: bool,

    /// All browses of the node completed.
    pub references_fetched: bool,

    /// Fetch outcome.
    pub status: StatusCode,

    /// The fetch was forced. Propagated to dependencies.
    pub force: bool,

    /// Property of an instance or of a type.
    pub is_property: bool,

    /// Property declared on a type definition.
    pub is_declaration: bool,

    depends_of: BTreeSet<NodeId>,
    dependent_nodes: BTreeSet<NodeId>,
    cache_iteration: u64,
    cache_state: bool,
}

impl FetchingNode {
    fn new(node_id: NodeId) -> Self {
        Self {
            state: NodeState {
                node_id,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Returns the node id.
    pub fn node_id(&self) -> &NodeId {
        &self.state.node_id
    }

    /// Returns `true` once the node's own reads and browses completed.
    pub fn fetched(&self) -> bool {
        self.attributes_fetched && self.references_fetched
    }

    /// Returns `true` while the node waits in the queue.
    pub fn is_pending(&self) -> bool {
        self.queue_key.is_some()
    }

    /// Ids this node waits for.
    pub fn depends_of(&self) -> &BTreeSet<NodeId> {
        &self.depends_of
    }

    /// Ids waiting for this node.
    pub fn dependent_nodes(&self) -> &BTreeSet<NodeId> {
        &self.dependent_nodes
    }

    /// Forgets the results of a started fetch so it can be issued again.
    pub(crate) fn reset_fetch(&mut self) {
        self.fetch_started = false;
        self.fetch_request_id = 0;
        self.attributes_fetched = false;
        self.references_fetched = false;
        self.status = StatusCode::GOOD;
        // References are browsed again.
        self.state.references.clear();
    }
}

// =============================================================================
// FetchQueue
// =============================================================================

pub(crate) type QueueKey = (u64, u64, NodeId);

/// Pending nodes ordered by epoch, then by insertion.
#[derive(Debug, Default)]
pub(crate) struct FetchQueue {
    keys: BTreeSet<QueueKey>,
    next_sequence: u64,
}

impl FetchQueue {
    pub(crate) fn len(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Queues `node`, moving it if its epoch changed.
    pub(crate) fn push(&mut self, node: &mut FetchingNode) {
        if let Some(key) = &node.queue_key {
            if key.0 == node.pending_sequence {
                return;
            }
            self.keys.remove(key);
        }
        let key = (node.pending_sequence, self.next_sequence, node.state.node_id.clone());
        self.next_sequence += 1;
        self.keys.insert(key.clone());
        node.queue_key = Some(key);
    }

    /// Pops the first queued id. The caller clears the node's key.
    pub(crate) fn pop(&mut self) -> Option<NodeId> {
        self.keys.pop_first().map(|(_, _, node_id)| node_id)
    }

    pub(crate) fn erase(&mut self, node: &mut FetchingNode) {
        if let Some(key) = node.queue_key.take() {
            self.keys.remove(&key);
        }
    }
}

// =============================================================================
// FetchedNodes
// =============================================================================

/// Nodes whose fetch closure completed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedNodes {
    /// Snapshots of successfully fetched nodes.
    pub nodes: Vec<NodeState>,

    /// Nodes that failed, with their status.
    pub errors: Vec<(NodeId, StatusCode)>,
}

impl FetchedNodes {
    /// Returns `true` if nothing completed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.errors.is_empty()
    }

    /// Appends another batch.
    pub fn extend(&mut self, other: FetchedNodes) {
        self.nodes.extend(other.nodes);
        self.errors.extend(other.errors);
    }
}

// =============================================================================
// FetchingNodeGraph
// =============================================================================

/// Map of fetching nodes with dependency edges.
#[derive(Debug, Default)]
pub struct FetchingNodeGraph {
    nodes: BTreeMap<NodeId, FetchingNode>,
    iteration: u64,
}

impl FetchingNodeGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of incomplete nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node is incomplete.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `node_id` is incomplete.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Looks up a node.
    pub fn find(&self, node_id: &NodeId) -> Option<&FetchingNode> {
        self.nodes.get(node_id)
    }

    /// Looks up a node for update.
    pub fn find_mut(&mut self, node_id: &NodeId) -> Option<&mut FetchingNode> {
        self.nodes.get_mut(node_id)
    }

    /// Returns the node, creating it if needed.
    pub fn add_node(&mut self, node_id: NodeId) -> &mut FetchingNode {
        self.nodes
            .entry(node_id.clone())
            .or_insert_with(|| FetchingNode::new(node_id))
    }

    /// Removes a node and every edge touching it.
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<FetchingNode> {
        let node = self.nodes.remove(node_id)?;
        for id in &node.depends_of {
            if let Some(from) = self.nodes.get_mut(id) {
                from.dependent_nodes.remove(node_id);
            }
        }
        for id in &node.dependent_nodes {
            if let Some(dependent) = self.nodes.get_mut(id) {
                dependent.depends_of.remove(node_id);
            }
        }
        Some(node)
    }

    /// Makes `node_id` wait for `from_id`. Both must be in the graph.
    pub fn add_dependency(&mut self, node_id: &NodeId, from_id: &NodeId) {
        if node_id == from_id || !self.nodes.contains_key(node_id) {
            return;
        }
        let Some(from) = self.nodes.get_mut(from_id) else {
            return;
        };
        from.dependent_nodes.insert(node_id.clone());
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.depends_of.insert(from_id.clone());
        }
    }

    /// Iterates over the nodes.
    pub fn iter(&self) -> impl Iterator<Item = &FetchingNode> {
        self.nodes.values()
    }

    /// Removes and returns every node whose dependency closure is fetched.
    ///
    /// A dependency cycle counts as fetched once each member is.
    pub fn get_fetched_nodes(&mut self) -> FetchedNodes {
        let mut fetched = FetchedNodes::default();
        let ids: Vec<NodeId> = self.nodes.keys().cloned().collect();

        for node_id in ids {
            if !self.nodes.contains_key(&node_id) {
                continue;
            }
            self.iteration += 1;
            if !self.is_fetched_recursively(&node_id, self.iteration) {
                continue;
            }
            if let Some(node) = self.remove_node(&node_id) {
                if node.status.is_good() {
                    fetched.nodes.push(node.state);
                } else {
                    fetched.errors.push((node_id, node.status));
                }
            }
        }
        fetched
    }

    fn is_fetched_recursively(&mut self, node_id: &NodeId, iteration: u64) -> bool {
        let Some(node) = self.nodes.get_mut(node_id) else {
            return true;
        };
        if !node.fetched() {
            return false;
        }
        if node.cache_iteration == iteration {
            return node.cache_state;
        }

        node.cache_iteration = iteration;
        node.cache_state = true;

        let depends_of: Vec<NodeId> = node.depends_of.iter().cloned().collect();
        let fetched = depends_of
            .iter()
            .all(|id| self.is_fetched_recursively(id, iteration));

        if let Some(node) = self.nodes.get_mut(node_id) {
            node.cache_state = fetched;
        }
        fetched
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: u32) -> NodeId {
        NodeId::numeric(1, value)
    }

    fn mark_fetched(graph: &mut FetchingNodeGraph, node_id: &NodeId) {
        let node = graph.find_mut(node_id).unwrap();
        node.fetch_started = true;
        node.attributes_fetched = true;
        node.references_fetched = true;
    }

    #[test]
    fn test_queue_orders_by_epoch() {
        let mut graph = FetchingNodeGraph::new();
        let mut queue = FetchQueue::default();

        for (value, sequence) in [(1, 5), (2, 1), (3, 5)] {
            let node = graph.add_node(id(value));
            node.pending_sequence = sequence;
            queue.push(node);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop(), Some(id(2)));
        assert_eq!(queue.pop(), Some(id(1)));
        assert_eq!(queue.pop(), Some(id(3)));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_push_is_idempotent_and_erase() {
        let mut graph = FetchingNodeGraph::new();
        let mut queue = FetchQueue::default();
        let node = graph.add_node(id(1));
        queue.push(node);
        queue.push(node);
        assert_eq!(queue.len(), 1);
        assert!(node.is_pending());

        queue.erase(node);
        assert!(!node.is_pending());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_dependency_blocks_completion() {
        let mut graph = FetchingNodeGraph::new();
        graph.add_node(id(1));
        graph.add_node(id(2));
        graph.add_dependency(&id(1), &id(2));
        mark_fetched(&mut graph, &id(1));

        assert!(graph.get_fetched_nodes().is_empty());

        mark_fetched(&mut graph, &id(2));
        let fetched = graph.get_fetched_nodes();
        assert_eq!(fetched.nodes.len(), 2);
        assert!(graph.is_empty());
    }

    #[test]
    fn test_cycle_counts_as_fetched() {
        let mut graph = FetchingNodeGraph::new();
        for value in 1..=3 {
            graph.add_node(id(value));
        }
        graph.add_dependency(&id(1), &id(2));
        graph.add_dependency(&id(2), &id(3));
        graph.add_dependency(&id(3), &id(1));

        mark_fetched(&mut graph, &id(1));
        mark_fetched(&mut graph, &id(2));
        assert!(graph.get_fetched_nodes().is_empty());

        mark_fetched(&mut graph, &id(3));
        let fetched = graph.get_fetched_nodes();
        let mut ids: Vec<_> = fetched.nodes.iter().map(|s| s.node_id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec![id(1), id(2), id(3)]);
    }

    #[test]
    fn test_bad_status_reported_as_error() {
        let mut graph = FetchingNodeGraph::new();
        graph.add_node(id(1));
        mark_fetched(&mut graph, &id(1));
        graph.find_mut(&id(1)).unwrap().status = StatusCode::BAD_NODE_ID_UNKNOWN;

        let fetched = graph.get_fetched_nodes();
        assert!(fetched.nodes.is_empty());
        assert_eq!(fetched.errors, vec![(id(1), StatusCode::BAD_NODE_ID_UNKNOWN)]);
    }

    #[test]
    fn test_remove_node_clears_edges() {
        let mut graph = FetchingNodeGraph::new();
        graph.add_node(id(1));
        graph.add_node(id(2));
        graph.add_dependency(&id(1), &id(2));
        graph.remove_node(&id(2));

        assert!(graph.find(&id(1)).unwrap().depends_of().is_empty());
        mark_fetched(&mut graph, &id(1));
        assert_eq!(graph.get_fetched_nodes().nodes.len(), 1);
    }

    #[test]
    fn test_reset_fetch() {
        let mut graph = FetchingNodeGraph::new();
        let node = graph.add_node(id(1));
        node.fetch_started = true;
        node.fetch_request_id = 7;
        node.attributes_fetched = true;
        node.status = StatusCode::BAD_TIMEOUT;
        node.state.references.push(nodesync_core::ReferenceDescription::forward(
            nodesync_core::ids::ORGANIZES,
            id(2),
        ));

        node.reset_fetch();
        assert!(!node.fetch_started);
        assert_eq!(node.fetch_request_id, 0);
        assert!(!node.fetched());
        assert!(node.status.is_good());
        assert!(node.state.references.is_empty());
    }
}
