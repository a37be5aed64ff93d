// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Fetch completeness tracking.
//!
//! [`NodeFetchStatusTracker`] knows, per node id, whether the node is
//! fetched and whether its children are. A node counts as fetched once it
//! exists in the address space or has a recorded error. Children count as
//! fetched once a children browse was reported and every reported target
//! is fetched.
//!
//! Entry points never notify while their maps are being updated. Changed
//! ids are gathered in a [`DeferredQueue`] and turned into
//! [`NodeFetchStatusChangedItem`]s after the outermost call is done, so a
//! consumer that reacts by fetching more cannot observe a half-updated
//! tracker.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use nodesync_core::{AddressSpace, NodeId, ReferenceDescription, StatusCode};

use crate::fetch_status::{NodeFetchStatus, NodeFetchStatusChangedItem};

// =============================================================================
// DeferredQueue
// =============================================================================

/// Ids whose status may have changed during one entry point.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    pending: BTreeSet<NodeId>,
}

impl DeferredQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a changed id.
    pub fn push(&mut self, node_id: NodeId) {
        self.pending.insert(node_id);
    }

    /// Drops a recorded id.
    pub fn cancel(&mut self, node_id: &NodeId) {
        self.pending.remove(node_id);
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drains the queue into notification items.
    pub fn flush<F>(self, mut status: F) -> Vec<NodeFetchStatusChangedItem>
    where
        F: FnMut(&NodeId) -> (StatusCode, NodeFetchStatus),
    {
        self.pending
            .into_iter()
            .map(|node_id| {
                let (status, fetch_status) = status(&node_id);
                NodeFetchStatusChangedItem {
                    node_id,
                    status,
                    fetch_status,
                }
            })
            .collect()
    }
}

// =============================================================================
// ChildrenFetchedUpdate
// =============================================================================

/// Output of [`NodeFetchStatusTracker::on_children_fetched`].
#[derive(Debug, Default)]
pub struct ChildrenFetchedUpdate {
    /// Status notifications.
    pub changed: Vec<NodeFetchStatusChangedItem>,

    /// Ids the parent now waits for that nobody fetched yet.
    pub fetch_requests: Vec<NodeId>,
}

// =============================================================================
// NodeFetchStatusTracker
// =============================================================================

/// Per-node fetch completeness state machine.
#[derive(Debug, Default)]
pub struct NodeFetchStatusTracker {
    // Absent: children never reported. Empty set: children fetched.
    parents: BTreeMap<NodeId, BTreeSet<NodeId>>,
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,
    errors: BTreeMap<NodeId, StatusCode>,
    reported: BTreeMap<NodeId, (StatusCode, NodeFetchStatus)>,
}

impl NodeFetchStatusTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records fetch outcomes.
    ///
    /// A good status requires the node to be present in `space`.
    pub fn on_nodes_fetched(
        &mut self,
        space: &AddressSpace,
        statuses: &[(NodeId, StatusCode)],
    ) -> Vec<NodeFetchStatusChangedItem> {
        info!(count = statuses.len(), "Nodes fetched");

        let mut queue = DeferredQueue::new();
        for (node_id, status) in statuses {
            if status.is_good() {
                self.errors.remove(node_id);
            } else {
                debug!(node_id = %node_id, status = %status, "Node fetch failed");
                self.errors.insert(node_id.clone(), *status);
            }

            // As a parent.
            queue.push(node_id.clone());

            // As a child.
            self.on_child_fetched(node_id, &mut queue);
        }
        self.flush(space, queue)
    }

    /// Records the result of a children browse of `parent_id`.
    pub fn on_children_fetched(
        &mut self,
        space: &AddressSpace,
        parent_id: &NodeId,
        references: &[ReferenceDescription],
    ) -> ChildrenFetchedUpdate {
        info!(parent_id = %parent_id, count = references.len(), "Children fetched");

        if matches!(self.parents.get(parent_id), Some(pending) if pending.is_empty()) {
            return ChildrenFetchedUpdate::default();
        }

        let mut queue = DeferredQueue::new();
        let mut fetch_requests = Vec::new();

        let stale = self
            .parents
            .insert(parent_id.clone(), BTreeSet::new())
            .unwrap_or_default();
        for child_id in &stale {
            self.remove_reverse_entry(child_id, parent_id);
        }

        let mut pending = BTreeSet::new();
        for reference in references {
            for id in [&reference.reference_type_id, &reference.node_id] {
                if id == parent_id || id.is_null() || self.is_node_fetched(space, id) {
                    continue;
                }
                if pending.insert(id.clone()) {
                    self.children
                        .entry(id.clone())
                        .or_default()
                        .insert(parent_id.clone());
                    fetch_requests.push(id.clone());
                }
            }
        }

        if pending.is_empty() {
            queue.push(parent_id.clone());
        }
        self.parents.insert(parent_id.clone(), pending);

        ChildrenFetchedUpdate {
            changed: self.flush(space, queue),
            fetch_requests,
        }
    }

    /// Forgets everything about `node_id` and its known descendants.
    ///
    /// Must be called before the node is removed from `space`.
    pub fn delete(&mut self, space: &AddressSpace, node_id: &NodeId) -> Vec<NodeFetchStatusChangedItem> {
        info!(node_id = %node_id, "Delete fetch status");

        let mut queue = DeferredQueue::new();
        let mut visited = BTreeSet::new();
        self.delete_recursive(space, node_id, &mut queue, &mut visited);
        for id in &visited {
            queue.cancel(id);
        }
        self.flush(space, queue)
    }

    /// Returns the fetch outcome and completeness of `node_id`.
    pub fn get_status(&self, space: &AddressSpace, node_id: &NodeId) -> (StatusCode, NodeFetchStatus) {
        let node_fetched = self.is_node_fetched(space, node_id);
        match self.errors.get(node_id) {
            Some(status) => (*status, NodeFetchStatus::new(node_fetched, true)),
            None => {
                let children_fetched = self
                    .parents
                    .get(node_id)
                    .is_some_and(BTreeSet::is_empty);
                (
                    StatusCode::GOOD,
                    NodeFetchStatus::new(node_fetched, children_fetched),
                )
            }
        }
    }

    /// Returns the recorded error of `node_id`.
    pub fn error(&self, node_id: &NodeId) -> Option<StatusCode> {
        self.errors.get(node_id).copied()
    }

    /// Returns the children `parent_id` still waits for.
    pub fn pending_children(&self, parent_id: &NodeId) -> Option<&BTreeSet<NodeId>> {
        self.parents.get(parent_id)
    }

    /// Returns `true` if the tracker holds any state for `node_id`.
    pub fn is_tracked(&self, node_id: &NodeId) -> bool {
        self.parents.contains_key(node_id)
            || self.children.contains_key(node_id)
            || self.errors.contains_key(node_id)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn is_node_fetched(&self, space: &AddressSpace, node_id: &NodeId) -> bool {
        space.contains(node_id) || self.errors.contains_key(node_id)
    }

    fn delete_recursive(
        &mut self,
        space: &AddressSpace,
        node_id: &NodeId,
        queue: &mut DeferredQueue,
        visited: &mut BTreeSet<NodeId>,
    ) {
        if !visited.insert(node_id.clone()) {
            return;
        }

        self.errors.remove(node_id);
        self.reported.remove(node_id);

        // As a parent.
        if let Some(pending) = self.parents.remove(node_id) {
            for child_id in &pending {
                self.remove_reverse_entry(child_id, node_id);
            }
        }

        // As a child.
        self.on_child_fetched(node_id, queue);

        for child_id in space.children(node_id) {
            self.delete_recursive(space, &child_id, queue, visited);
        }
    }

    fn on_child_fetched(&mut self, child_id: &NodeId, queue: &mut DeferredQueue) {
        let Some(parent_ids) = self.children.remove(child_id) else {
            return;
        };
        for parent_id in parent_ids {
            if let Some(pending) = self.parents.get_mut(&parent_id) {
                pending.remove(child_id);
                if pending.is_empty() {
                    queue.push(parent_id);
                }
            }
        }
    }

    fn remove_reverse_entry(&mut self, child_id: &NodeId, parent_id: &NodeId) {
        if let Some(parent_ids) = self.children.get_mut(child_id) {
            parent_ids.remove(parent_id);
            if parent_ids.is_empty() {
                self.children.remove(child_id);
            }
        }
    }

    /// Turns queued ids into notifications.
    ///
    /// An item is emitted when the completeness of a node strictly increases
    /// or its status code changes. The first report of a node counts as a
    /// change. A drop in completeness is recorded silently.
    fn flush(&mut self, space: &AddressSpace, queue: DeferredQueue) -> Vec<NodeFetchStatusChangedItem> {
        let items = queue.flush(|node_id| self.get_status(space, node_id));
        items
            .into_iter()
            .filter(|item| {
                let current = (item.status, item.fetch_status);
                match self.reported.insert(item.node_id.clone(), current) {
                    None => true,
                    Some((status, fetch_status)) => {
                        status != item.status || item.fetch_status > fetch_status
                    }
                }
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
