// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node creation from snapshots.
//!
//! [`GenericNodeFactory`] validates a [`NodeState`] against the address
//! space, creates the node, instantiates the property declarations of its
//! type, wires it to its parent and creates its nested children. A failed
//! creation leaves the address space as it was.

use tracing::debug;

use crate::address_space::AddressSpace;
use crate::error::{fallback_display_name, CoreError, CoreResult};
use crate::ids;
use crate::node::{Node, NodeKind};
use crate::state::{NodeAttributes, NodeState};
use crate::types::{NodeClass, NodeId};
use crate::value::Variant;

/// Creates nodes from snapshots.
pub trait NodeFactory: Send + Sync {
    /// Creates the node described by `state` and returns its id.
    fn create_node(&self, space: &mut AddressSpace, state: &NodeState) -> CoreResult<NodeId>;
}

/// The default factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericNodeFactory;

impl GenericNodeFactory {
    /// Creates a new factory.
    pub fn new() -> Self {
        Self
    }

    fn check_class(space: &AddressSpace, node_id: &NodeId, expected: NodeClass) -> bool {
        space
            .get_node(node_id)
            .is_some_and(|node| node.node_class() == expected)
    }

    fn validate(space: &AddressSpace, state: &NodeState) -> CoreResult<()> {
        let node_id = &state.node_id;
        if space.contains(node_id) {
            return Err(CoreError::duplicate_node_id(node_id.clone()));
        }

        let check_type_definition = |expected: NodeClass| {
            if Self::check_class(space, &state.type_definition_id, expected) {
                Ok(())
            } else {
                Err(CoreError::wrong_type_definition(
                    node_id.clone(),
                    state.type_definition_id.clone(),
                    expected,
                ))
            }
        };
        let check_data_type = || {
            if Self::check_class(space, &state.attributes.data_type, NodeClass::DataType) {
                Ok(())
            } else {
                Err(CoreError::unknown_data_type(
                    node_id.clone(),
                    state.attributes.data_type.clone(),
                ))
            }
        };

        match state.node_class {
            NodeClass::Object => check_type_definition(NodeClass::ObjectType)?,
            NodeClass::Variable => {
                check_type_definition(NodeClass::VariableType)?;
                check_data_type()?;
            }
            NodeClass::VariableType => check_data_type()?,
            NodeClass::View => {
                return Err(CoreError::wrong_node_class(node_id.clone(), Some(NodeClass::View)))
            }
            _ => {}
        }

        if !state.parent_id.is_null() {
            if !space.contains(&state.parent_id) {
                return Err(CoreError::unknown_parent(node_id.clone(), state.parent_id.clone()));
            }
            if !Self::check_class(space, &state.reference_type_id, NodeClass::ReferenceType) {
                return Err(CoreError::unknown_reference_type(state.reference_type_id.clone()));
            }
        }
        Ok(())
    }

    fn create(&self, space: &mut AddressSpace, state: &NodeState) -> CoreResult<NodeId> {
        Self::validate(space, state)?;

        let node = build_node(state)?;
        let node_id = node.id.clone();
        space.add_node(node)?;

        if let Err(e) = self.wire(space, state) {
            space.delete_node(&node_id);
            return Err(e);
        }

        debug!(node_id = %node_id, node_class = %state.node_class, "Node created");
        Ok(node_id)
    }

    fn wire(&self, space: &mut AddressSpace, state: &NodeState) -> CoreResult<()> {
        let node_id = &state.node_id;

        if state.node_class.is_instance() {
            space.add_reference(&ids::HAS_TYPE_DEFINITION, node_id, &state.type_definition_id)?;
        }

        if !state.parent_id.is_null() {
            space.add_reference(&state.reference_type_id, &state.parent_id, node_id)?;
        }

        if state.node_class.is_instance() {
            self.create_properties(space, node_id, &state.type_definition_id)?;
        }

        space.notify_node_created(node_id);

        for child in &state.children {
            let mut child = child.clone();
            child.parent_id = node_id.clone();
            if child.reference_type_id.is_null() {
                child.reference_type_id = ids::HAS_COMPONENT;
            }
            self.create(space, &child)?;
        }

        for (prop_decl_id, value) in &state.properties {
            space.set_property_value(node_id, prop_decl_id, value.clone())?;
        }
        Ok(())
    }

    fn create_properties(
        &self,
        space: &mut AddressSpace,
        node_id: &NodeId,
        type_definition_id: &NodeId,
    ) -> CoreResult<()> {
        for prop_decl_id in space.property_declarations(type_definition_id) {
            let Some(declaration) = space.get_node(&prop_decl_id) else {
                continue;
            };
            let name = declaration.browse_name.name.clone();
            if space.find_child(node_id, &name).is_some() {
                continue;
            }

            let mut attributes = NodeAttributes::default()
                .with_browse_name(declaration.browse_name.clone())
                .with_display_name(declaration.display_name.clone())
                .with_data_type(declaration.data_type().cloned().unwrap_or(ids::BASE_DATA_TYPE));
            attributes.value = declaration.value().cloned();

            let property = NodeState {
                node_id: NodeId::nested(node_id, &name),
                node_class: NodeClass::Variable,
                type_definition_id: ids::PROPERTY_TYPE,
                parent_id: node_id.clone(),
                reference_type_id: ids::HAS_PROPERTY,
                attributes,
                ..Default::default()
            };
            self.create(space, &property)?;
        }
        Ok(())
    }
}

impl NodeFactory for GenericNodeFactory {
    fn create_node(&self, space: &mut AddressSpace, state: &NodeState) -> CoreResult<NodeId> {
        self.create(space, state)
    }
}

/// Builds an unwired node from a snapshot.
pub(crate) fn build_node(state: &NodeState) -> CoreResult<Node> {
    let attributes = &state.attributes;
    let value = attributes.value.clone().unwrap_or_default();

    let kind = match state.node_class {
        NodeClass::DataType => NodeKind::DataType {
            enum_strings: enum_strings(&value),
        },
        class => NodeKind::for_class(class, attributes.data_type.clone(), value)
            .ok_or_else(|| CoreError::wrong_node_class(state.node_id.clone(), Some(class)))?,
    };

    let display_name = if !attributes.display_name.is_empty() {
        attributes.display_name.clone()
    } else if !attributes.browse_name.is_empty() {
        attributes.browse_name.name.clone()
    } else {
        fallback_display_name(&state.node_id)
    };

    Ok(Node::new(
        state.node_id.clone(),
        attributes.browse_name.clone(),
        display_name,
        kind,
    ))
}

fn enum_strings(value: &Variant) -> Vec<String> {
    match value {
        Variant::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

// =============================================================================
// Tests
// =============================================================================
