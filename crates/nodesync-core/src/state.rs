// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Flattened node snapshots and model change events.
//!
//! A [`NodeState`] is what a fetch produces and what the updater merges. It
//! holds ids only, never references into an address space, and is
//! discarded after the merge.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::types::{NodeClass, NodeId, QualifiedName};
use crate::value::Variant;

// =============================================================================
// ReferenceDescription
// =============================================================================

/// One reference as seen from the browsed node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReferenceDescription {
    /// Reference type id.
    pub reference_type_id: NodeId,

    /// `true` if the browsed node is the source.
    #[serde(default = "default_forward")]
    pub forward: bool,

    /// The node at the other end.
    pub node_id: NodeId,
}

fn default_forward() -> bool {
    true
}

impl ReferenceDescription {
    /// Creates a forward reference description.
    pub fn forward(reference_type_id: NodeId, node_id: NodeId) -> Self {
        Self {
            reference_type_id,
            forward: true,
            node_id,
        }
    }

    /// Creates an inverse reference description.
    pub fn inverse(reference_type_id: NodeId, node_id: NodeId) -> Self {
        Self {
            reference_type_id,
            forward: false,
            node_id,
        }
    }
}

// =============================================================================
// NodeAttributes
// =============================================================================

/// The attribute bag of a node snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeAttributes {
    /// Browse name.
    pub browse_name: QualifiedName,

    /// Display name.
    pub display_name: String,

    /// Data type id, null when not applicable.
    pub data_type: NodeId,

    /// Value, for variables and variable types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Variant>,
}

impl NodeAttributes {
    /// Sets the browse name.
    pub fn with_browse_name(mut self, browse_name: impl Into<QualifiedName>) -> Self {
        self.browse_name = browse_name.into();
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the data type.
    pub fn with_data_type(mut self, data_type: NodeId) -> Self {
        self.data_type = data_type;
        self
    }

    /// Sets the value.
    pub fn with_value(mut self, value: impl Into<Variant>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// A property value keyed by its declaration id.
pub type NodeProperty = (NodeId, Variant);

// =============================================================================
// NodeState
// =============================================================================

/// Flattened snapshot of one node.
///
/// # Examples
///
/// ```
/// use nodesync_core::ids;
/// use nodesync_core::state::NodeState;
/// use nodesync_core::types::{NodeClass, NodeId};
///
/// let state = NodeState::new(NodeId::numeric(1, 1), NodeClass::Object)
///     .with_type_definition(ids::FOLDER_TYPE)
///     .with_parent(ids::ORGANIZES, ids::OBJECTS_FOLDER)
///     .with_browse_name("Plant");
/// assert_eq!(state.attributes.browse_name.name, "Plant");
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeState {
    /// Node id.
    pub node_id: NodeId,

    /// Node class.
    pub node_class: NodeClass,

    /// Type definition id, null for type definitions.
    pub type_definition_id: NodeId,

    /// Hierarchical parent id.
    pub parent_id: NodeId,

    /// Reference type from the parent to this node.
    pub reference_type_id: NodeId,

    /// Attributes.
    pub attributes: NodeAttributes,

    /// Property values by declaration id.
    pub properties: Vec<NodeProperty>,

    /// Non-hierarchical references.
    pub references: Vec<ReferenceDescription>,

    /// Nested children created together with this node.
    pub children: Vec<NodeState>,

    /// Supertype id, for type definitions.
    pub supertype_id: NodeId,
}

impl NodeState {
    /// Creates a snapshot with the given id and class.
    pub fn new(node_id: NodeId, node_class: NodeClass) -> Self {
        Self {
            node_id,
            node_class,
            ..Default::default()
        }
    }

    /// Sets the type definition.
    pub fn with_type_definition(mut self, type_definition_id: NodeId) -> Self {
        self.type_definition_id = type_definition_id;
        self
    }

    /// Sets the hierarchical parent.
    pub fn with_parent(mut self, reference_type_id: NodeId, parent_id: NodeId) -> Self {
        self.reference_type_id = reference_type_id;
        self.parent_id = parent_id;
        self
    }

    /// Sets the supertype.
    pub fn with_supertype(mut self, supertype_id: NodeId) -> Self {
        self.supertype_id = supertype_id;
        self
    }

    /// Sets the browse name, and the display name when it is still empty.
    pub fn with_browse_name(mut self, browse_name: impl Into<QualifiedName>) -> Self {
        self.attributes.browse_name = browse_name.into();
        if self.attributes.display_name.is_empty() {
            self.attributes.display_name = self.attributes.browse_name.name.clone();
        }
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.attributes.display_name = display_name.into();
        self
    }

    /// Sets the data type.
    pub fn with_data_type(mut self, data_type: NodeId) -> Self {
        self.attributes.data_type = data_type;
        self
    }

    /// Sets the value.
    pub fn with_value(mut self, value: impl Into<Variant>) -> Self {
        self.attributes.value = Some(value.into());
        self
    }

    /// Sets a property value, replacing an earlier value for the same
    /// declaration.
    pub fn with_property(mut self, prop_decl_id: NodeId, value: impl Into<Variant>) -> Self {
        self.set_property(prop_decl_id, value);
        self
    }

    /// Adds a reference.
    pub fn with_reference(mut self, reference: ReferenceDescription) -> Self {
        self.references.push(reference);
        self
    }

    /// Adds a nested child.
    pub fn with_child(mut self, child: NodeState) -> Self {
        self.children.push(child);
        self
    }

    /// Sets a property value in place.
    pub fn set_property(&mut self, prop_decl_id: NodeId, value: impl Into<Variant>) {
        let value = value.into();
        match self.properties.iter_mut().find(|(id, _)| *id == prop_decl_id) {
            Some(entry) => entry.1 = value,
            None => self.properties.push((prop_decl_id, value)),
        }
    }

    /// Finds the target of the first reference with the given type and
    /// direction.
    pub fn find_reference_target(&self, reference_type_id: &NodeId, forward: bool) -> Option<&NodeId> {
        self.references
            .iter()
            .find(|r| r.forward == forward && r.reference_type_id == *reference_type_id)
            .map(|r| &r.node_id)
    }
}

// =============================================================================
// ModelChangeVerbs
// =============================================================================

/// Bitset of model change verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelChangeVerbs(u8);

impl ModelChangeVerbs {
    /// No change.
    pub const NONE: Self = Self(0);
    /// The node was added.
    pub const NODE_ADDED: Self = Self(1 << 0);
    /// The node was deleted.
    pub const NODE_DELETED: Self = Self(1 << 1);
    /// A reference on the node was added.
    pub const REFERENCE_ADDED: Self = Self(1 << 2);
    /// A reference on the node was deleted.
    pub const REFERENCE_DELETED: Self = Self(1 << 3);
    /// The data type of the node changed.
    pub const DATA_TYPE_CHANGED: Self = Self(1 << 4);

    /// Creates from raw bits.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Returns `true` if every verb in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` if any verb in `other` is set.
    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Returns `true` if no verb is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ModelChangeVerbs {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ModelChangeVerbs {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ModelChangeVerbs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ModelChangeVerbs, &str); 5] = [
            (ModelChangeVerbs::NODE_ADDED, "NodeAdded"),
            (ModelChangeVerbs::NODE_DELETED, "NodeDeleted"),
            (ModelChangeVerbs::REFERENCE_ADDED, "ReferenceAdded"),
            (ModelChangeVerbs::REFERENCE_DELETED, "ReferenceDeleted"),
            (ModelChangeVerbs::DATA_TYPE_CHANGED, "DataTypeChanged"),
        ];
        let mut first = true;
        for (verb, name) in NAMES {
            if self.contains(verb) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("None")?;
        }
        Ok(())
    }
}

// =============================================================================
// Events
// =============================================================================

/// A structural change of the model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelChangeEvent {
    /// Affected node.
    pub node_id: NodeId,
    /// Type definition of the affected node, null if unknown.
    pub type_definition_id: NodeId,
    /// What changed.
    pub verbs: ModelChangeVerbs,
}

impl ModelChangeEvent {
    /// Creates a new event.
    pub fn new(node_id: NodeId, type_definition_id: NodeId, verbs: ModelChangeVerbs) -> Self {
        Self {
            node_id,
            type_definition_id,
            verbs,
        }
    }
}

/// A change of attribute or property values of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SemanticChangeEvent {
    /// Affected node.
    pub node_id: NodeId,
}

impl SemanticChangeEvent {
    /// Creates a new event.
    pub fn new(node_id: NodeId) -> Self {
        Self { node_id }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids;

    #[test]
    fn test_node_state_builder() {
        let state = NodeState::new(NodeId::numeric(1, 10), NodeClass::Variable)
            .with_type_definition(ids::BASE_DATA_VARIABLE_TYPE)
            .with_parent(ids::HAS_COMPONENT, NodeId::numeric(1, 1))
            .with_browse_name("Level")
            .with_data_type(ids::DOUBLE)
            .with_value(2.5)
            .with_property(NodeId::numeric(1, 301), "a")
            .with_property(NodeId::numeric(1, 301), "b");

        assert_eq!(state.attributes.display_name, "Level");
        assert_eq!(state.properties, vec![(NodeId::numeric(1, 301), Variant::from("b"))]);
        assert_eq!(state.attributes.value, Some(Variant::Double(2.5)));
    }

    #[test]
    fn test_find_reference_target() {
        let state = NodeState::new(NodeId::numeric(1, 1), NodeClass::Object)
            .with_reference(ReferenceDescription::forward(NodeId::numeric(1, 102), NodeId::numeric(1, 2)))
            .with_reference(ReferenceDescription::inverse(ids::ORGANIZES, ids::ROOT_FOLDER));

        assert_eq!(
            state.find_reference_target(&NodeId::numeric(1, 102), true),
            Some(&NodeId::numeric(1, 2))
        );
        assert_eq!(state.find_reference_target(&ids::ORGANIZES, true), None);
    }

    #[test]
    fn test_model_change_verbs() {
        let mut verbs = ModelChangeVerbs::NODE_ADDED;
        verbs |= ModelChangeVerbs::REFERENCE_ADDED;
        assert!(verbs.contains(ModelChangeVerbs::NODE_ADDED));
        assert!(!verbs.contains(ModelChangeVerbs::NODE_DELETED));
        assert!(verbs.intersects(ModelChangeVerbs::REFERENCE_ADDED | ModelChangeVerbs::NODE_DELETED));
        assert_eq!(verbs.bits(), 5);
        assert_eq!(verbs.to_string(), "NodeAdded|ReferenceAdded");
        assert_eq!(ModelChangeVerbs::NONE.to_string(), "None");
    }

    #[test]
    fn test_node_state_deserialize_defaults() {
        let json = r#"{
            "node_id": "ns=1;i=5",
            "node_class": "object",
            "type_definition_id": "i=61",
            "parent_id": "i=85",
            "reference_type_id": "i=35",
            "attributes": { "browse_name": { "namespace_index": 1, "name": "Area" } }
        }"#;
        let state: NodeState = serde_json::from_str(json).unwrap();
        assert_eq!(state.parent_id, ids::OBJECTS_FOLDER);
        assert!(state.supertype_id.is_null());
        assert!(state.references.is_empty());
    }
}
