// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Nodes stored in an [`AddressSpace`](crate::address_space::AddressSpace).
//!
//! Nodes refer to each other by id only. References are kept as two
//! ordered lists per node, and the address space maintains the forward and
//! inverse halves of every reference together.

use serde::{Deserialize, Serialize};

use crate::types::{NodeClass, NodeId, QualifiedName};
use crate::value::Variant;

// =============================================================================
// Reference
// =============================================================================

/// One half of a reference: its type and the node at the other end.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    /// Reference type id.
    pub reference_type: NodeId,
    /// Node at the other end.
    pub target: NodeId,
}

impl Reference {
    /// Creates a reference half.
    pub fn new(reference_type: NodeId, target: NodeId) -> Self {
        Self {
            reference_type,
            target,
        }
    }
}

// =============================================================================
// NodeKind
// =============================================================================

/// Class-specific node data.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// An object instance.
    Object,

    /// A variable instance.
    Variable {
        /// Data type id.
        data_type: NodeId,
        /// Current value.
        value: Variant,
    },

    /// A method.
    Method,

    /// An object type.
    ObjectType,

    /// A variable type.
    VariableType {
        /// Data type id.
        data_type: NodeId,
        /// Default value of instances.
        default_value: Variant,
    },

    /// A reference type.
    ReferenceType,

    /// A data type.
    DataType {
        /// Labels of an enumeration, empty otherwise.
        enum_strings: Vec<String>,
    },
}

impl NodeKind {
    /// Builds the kind for a class, or `None` for classes that cannot be
    /// stored.
    pub fn for_class(node_class: NodeClass, data_type: NodeId, value: Variant) -> Option<Self> {
        let kind = match node_class {
            NodeClass::Object => Self::Object,
            NodeClass::Variable => Self::Variable { data_type, value },
            NodeClass::Method => Self::Method,
            NodeClass::ObjectType => Self::ObjectType,
            NodeClass::VariableType => Self::VariableType {
                data_type,
                default_value: value,
            },
            NodeClass::ReferenceType => Self::ReferenceType,
            NodeClass::DataType => Self::DataType {
                enum_strings: Vec::new(),
            },
            NodeClass::View => return None,
        };
        Some(kind)
    }

    /// Returns the node class.
    pub const fn node_class(&self) -> NodeClass {
        match self {
            Self::Object => NodeClass::Object,
            Self::Variable { .. } => NodeClass::Variable,
            Self::Method => NodeClass::Method,
            Self::ObjectType => NodeClass::ObjectType,
            Self::VariableType { .. } => NodeClass::VariableType,
            Self::ReferenceType => NodeClass::ReferenceType,
            Self::DataType { .. } => NodeClass::DataType,
        }
    }
}

// =============================================================================
// Node
// =============================================================================

/// A node of an address space.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node id.
    pub id: NodeId,

    /// Browse name.
    pub browse_name: QualifiedName,

    /// Display name.
    pub display_name: String,

    /// Class-specific data.
    pub kind: NodeKind,

    pub(crate) forward: Vec<Reference>,
    pub(crate) inverse: Vec<Reference>,
    pub(crate) type_definition: Option<NodeId>,
}

impl Node {
    /// Creates a node without references.
    pub fn new(
        id: NodeId,
        browse_name: QualifiedName,
        display_name: impl Into<String>,
        kind: NodeKind,
    ) -> Self {
        Self {
            id,
            browse_name,
            display_name: display_name.into(),
            kind,
            forward: Vec::new(),
            inverse: Vec::new(),
            type_definition: None,
        }
    }

    /// Returns the node class.
    #[inline]
    pub fn node_class(&self) -> NodeClass {
        self.kind.node_class()
    }

    /// Returns `true` if this node is a type definition.
    #[inline]
    pub fn is_type_definition(&self) -> bool {
        self.node_class().is_type_definition()
    }

    /// Forward references in insertion order.
    pub fn forward_references(&self) -> &[Reference] {
        &self.forward
    }

    /// Inverse references in insertion order.
    pub fn inverse_references(&self) -> &[Reference] {
        &self.inverse
    }

    /// Cached HasTypeDefinition target.
    pub fn type_definition(&self) -> Option<&NodeId> {
        self.type_definition.as_ref()
    }

    /// Data type for variables and variable types.
    pub fn data_type(&self) -> Option<&NodeId> {
        match &self.kind {
            NodeKind::Variable { data_type, .. } | NodeKind::VariableType { data_type, .. } => {
                Some(data_type)
            }
            _ => None,
        }
    }

    /// Value for variables, default value for variable types.
    pub fn value(&self) -> Option<&Variant> {
        match &self.kind {
            NodeKind::Variable { value, .. } => Some(value),
            NodeKind::VariableType { default_value, .. } => Some(default_value),
            _ => None,
        }
    }

    /// Replaces the value. Returns `false` for nodes without a value.
    pub fn set_value(&mut self, new_value: Variant) -> bool {
        match &mut self.kind {
            NodeKind::Variable { value, .. } => *value = new_value,
            NodeKind::VariableType { default_value, .. } => *default_value = new_value,
            _ => return false,
        }
        true
    }

    /// Returns `true` if a forward reference of this exact type to `target`
    /// exists.
    pub fn has_forward(&self, reference_type: &NodeId, target: &NodeId) -> bool {
        self.forward
            .iter()
            .any(|r| r.reference_type == *reference_type && r.target == *target)
    }
}

// =============================================================================
// Tests
// =============================================================================
