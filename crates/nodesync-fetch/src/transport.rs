// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Read/Browse service boundary.
//!
//! The fetch layer never talks to a wire protocol directly. It issues
//! batched [`ReadValueId`] and [`BrowseDescription`] lists through the
//! [`AttributeService`] and [`ViewService`] traits and receives remote model
//! changes as [`ViewEvent`] values.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use nodesync_core::{
    AttributeId, BrowseDirection, DataValue, ModelChangeEvent, NodeId, ReferenceDescription,
    SemanticChangeEvent, StatusCode,
};

// =============================================================================
// ReadValueId
// =============================================================================

/// One attribute of one node to read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadValueId {
    /// Node to read.
    pub node_id: NodeId,

    /// Attribute to read.
    pub attribute_id: AttributeId,
}

impl ReadValueId {
    /// Creates a read item.
    pub fn new(node_id: NodeId, attribute_id: AttributeId) -> Self {
        Self {
            node_id,
            attribute_id,
        }
    }
}

impl fmt::Display for ReadValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.node_id, self.attribute_id)
    }
}

// =============================================================================
// BrowseDescription / BrowseResult
// =============================================================================

/// One browse of one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrowseDescription {
    /// Node to browse.
    pub node_id: NodeId,

    /// Which references to follow.
    pub direction: BrowseDirection,

    /// Reference type filter. A null id matches every reference.
    pub reference_type_id: NodeId,

    /// Whether subtypes of `reference_type_id` match as well.
    pub include_subtypes: bool,
}

impl BrowseDescription {
    /// Browses forward references of `reference_type_id` and its subtypes.
    pub fn forward(node_id: NodeId, reference_type_id: NodeId) -> Self {
        Self {
            node_id,
            direction: BrowseDirection::Forward,
            reference_type_id,
            include_subtypes: true,
        }
    }

    /// Browses inverse references of `reference_type_id` and its subtypes.
    pub fn inverse(node_id: NodeId, reference_type_id: NodeId) -> Self {
        Self {
            node_id,
            direction: BrowseDirection::Inverse,
            reference_type_id,
            include_subtypes: true,
        }
    }
}

impl fmt::Display for BrowseDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {}",
            self.node_id, self.direction, self.reference_type_id
        )
    }
}

/// Result of one browse.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BrowseResult {
    /// Per-item status.
    pub status_code: StatusCode,

    /// Matching references.
    pub references: Vec<ReferenceDescription>,
}

impl BrowseResult {
    /// Creates a good result.
    pub fn good(references: Vec<ReferenceDescription>) -> Self {
        Self {
            status_code: StatusCode::GOOD,
            references,
        }
    }

    /// Creates a failed result.
    pub fn bad(status_code: StatusCode) -> Self {
        Self {
            status_code,
            references: Vec::new(),
        }
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Attribute read service.
///
/// `Err` fails the whole call. Otherwise the result holds exactly one
/// [`DataValue`] per input, in input order.
#[async_trait]
pub trait AttributeService: Send + Sync {
    /// Reads the given attributes.
    async fn read(&self, read_ids: Vec<ReadValueId>) -> Result<Vec<DataValue>, StatusCode>;
}

/// Reference browse service.
///
/// `Err` fails the whole call. Otherwise the result holds exactly one
/// [`BrowseResult`] per input, in input order.
#[async_trait]
pub trait ViewService: Send + Sync {
    /// Browses the given nodes.
    async fn browse(
        &self,
        descriptions: Vec<BrowseDescription>,
    ) -> Result<Vec<BrowseResult>, StatusCode>;
}

// =============================================================================
// ViewEvent
// =============================================================================

/// Remote model notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewEvent {
    /// Nodes or references were added or deleted.
    ModelChanged(ModelChangeEvent),

    /// Attributes or properties of a node changed.
    SemanticsChanged(SemanticChangeEvent),
}

impl ViewEvent {
    /// Returns the node the event is about.
    pub fn node_id(&self) -> &NodeId {
        match self {
            Self::ModelChanged(event) => &event.node_id,
            Self::SemanticsChanged(event) => &event.node_id,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nodesync_core::{ids, ModelChangeVerbs};

    #[test]
    fn test_browse_description_constructors() {
        let forward = BrowseDescription::forward(ids::ROOT_FOLDER, ids::ORGANIZES);
        assert_eq!(forward.direction, BrowseDirection::Forward);
        assert!(forward.include_subtypes);

        let inverse = BrowseDescription::inverse(ids::OBJECTS_FOLDER, ids::HIERARCHICAL_REFERENCES);
        assert_eq!(inverse.direction, BrowseDirection::Inverse);
        assert_eq!(inverse.to_string(), "i=85 Inverse i=33");
    }

    #[test]
    fn test_browse_result() {
        assert!(BrowseResult::good(Vec::new()).status_code.is_good());
        let bad = BrowseResult::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
        assert!(bad.status_code.is_bad());
        assert!(bad.references.is_empty());
    }

    #[test]
    fn test_view_event_node_id() {
        let node_id = NodeId::numeric(1, 7);
        let event = ViewEvent::ModelChanged(ModelChangeEvent::new(
            node_id.clone(),
            NodeId::null(),
            ModelChangeVerbs::NODE_DELETED,
        ));
        assert_eq!(event.node_id(), &node_id);

        let event = ViewEvent::SemanticsChanged(SemanticChangeEvent::new(node_id.clone()));
        assert_eq!(event.node_id(), &node_id);
    }
}
