// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Per-node fetch completeness.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use nodesync_core::{NodeId, StatusCode};

/// Whether a node's own data and its children are known.
///
/// The order is componentwise, so `(true, false)` and `(false, true)` are
/// incomparable.
///
/// # Examples
///
/// ```
/// use nodesync_fetch::NodeFetchStatus;
///
/// assert!(NodeFetchStatus::node_only() <= NodeFetchStatus::node_and_children());
/// assert!(NodeFetchStatus::node_and_children().satisfies(NodeFetchStatus::node_only()));
/// assert!(!NodeFetchStatus::node_only().satisfies(NodeFetchStatus::children_only()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NodeFetchStatus {
    /// Attributes and non-hierarchical references are known.
    pub node_fetched: bool,

    /// Hierarchical children are enumerated and fetched.
    pub children_fetched: bool,
}

impl NodeFetchStatus {
    /// Creates a status.
    pub const fn new(node_fetched: bool, children_fetched: bool) -> Self {
        Self {
            node_fetched,
            children_fetched,
        }
    }

    /// Nothing known.
    pub const fn empty() -> Self {
        Self::new(false, false)
    }

    /// The node itself.
    pub const fn node_only() -> Self {
        Self::new(true, false)
    }

    /// The children only.
    pub const fn children_only() -> Self {
        Self::new(false, true)
    }

    /// The node and its children.
    pub const fn node_and_children() -> Self {
        Self::new(true, true)
    }

    /// Returns `true` if nothing is set.
    pub const fn is_empty(&self) -> bool {
        !self.node_fetched && !self.children_fetched
    }

    /// Returns `true` if this status covers `requested`.
    pub fn satisfies(&self, requested: Self) -> bool {
        *self >= requested
    }
}

impl PartialOrd for NodeFetchStatus {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let node = self.node_fetched.cmp(&other.node_fetched);
        let children = self.children_fetched.cmp(&other.children_fetched);
        match (node, children) {
            (a, b) if a == b => Some(a),
            (Ordering::Equal, b) => Some(b),
            (a, Ordering::Equal) => Some(a),
            _ => None,
        }
    }
}

impl BitOr for NodeFetchStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self::new(
            self.node_fetched || rhs.node_fetched,
            self.children_fetched || rhs.children_fetched,
        )
    }
}

impl BitOrAssign for NodeFetchStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl fmt::Display for NodeFetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node_fetched, self.children_fetched)
    }
}

/// One entry of a status-changed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFetchStatusChangedItem {
    /// Node whose status changed.
    pub node_id: NodeId,

    /// Fetch outcome. Bad if the node failed to fetch.
    pub status: StatusCode,

    /// Completeness at the time of the notification.
    pub fetch_status: NodeFetchStatus,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_order() {
        let empty = NodeFetchStatus::empty();
        let node = NodeFetchStatus::node_only();
        let children = NodeFetchStatus::children_only();
        let all = NodeFetchStatus::node_and_children();

        assert!(empty < node);
        assert!(node < all);
        assert!(children < all);
        assert_eq!(node.partial_cmp(&children), None);
        assert!(!(node <= children));
        assert!(!(children <= node));
    }

    #[test]
    fn test_satisfies() {
        assert!(NodeFetchStatus::node_and_children().satisfies(NodeFetchStatus::node_only()));
        assert!(NodeFetchStatus::node_only().satisfies(NodeFetchStatus::empty()));
        assert!(!NodeFetchStatus::node_only().satisfies(NodeFetchStatus::node_and_children()));
    }

    #[test]
    fn test_union() {
        let mut status = NodeFetchStatus::node_only();
        status |= NodeFetchStatus::children_only();
        assert_eq!(status, NodeFetchStatus::node_and_children());
        assert!(NodeFetchStatus::empty().is_empty());
        assert_eq!(status.to_string(), "true/true");
    }
}
