// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The standard node set.
//!
//! [`StandardCatalog`] lists the folders, reference types, data types and
//! base types every address space starts with. Installation adds all nodes
//! first, then the HasSubtype edges, then parent and type definition
//! references, so entries may refer to each other in any order.

use tracing::debug;

use crate::address_space::AddressSpace;
use crate::error::CoreResult;
use crate::factory::build_node;
use crate::ids;
use crate::state::NodeState;
use crate::types::{NodeClass, NodeId, QualifiedName};
use crate::value::Variant;

/// An ordered list of standard nodes.
#[derive(Debug, Clone, Default)]
pub struct StandardCatalog {
    nodes: Vec<NodeState>,
}

impl StandardCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the standard catalog.
    pub fn standard() -> Self {
        let mut catalog = Self::new();

        // Folders.
        catalog.push(folder(ids::ROOT_FOLDER, "Root", None));
        catalog.push(folder(ids::OBJECTS_FOLDER, "Objects", Some(ids::ROOT_FOLDER)));
        catalog.push(folder(ids::TYPES_FOLDER, "Types", Some(ids::ROOT_FOLDER)));
        catalog.push(folder(ids::VIEWS_FOLDER, "Views", Some(ids::ROOT_FOLDER)));
        catalog.push(folder(ids::OBJECT_TYPES_FOLDER, "ObjectTypes", Some(ids::TYPES_FOLDER)));
        catalog.push(folder(ids::VARIABLE_TYPES_FOLDER, "VariableTypes", Some(ids::TYPES_FOLDER)));
        catalog.push(folder(ids::DATA_TYPES_FOLDER, "DataTypes", Some(ids::TYPES_FOLDER)));
        catalog.push(folder(ids::REFERENCE_TYPES_FOLDER, "ReferenceTypes", Some(ids::TYPES_FOLDER)));

        // Reference types.
        catalog.push(
            type_node(ids::REFERENCES, NodeClass::ReferenceType, "References", NodeId::null())
                .with_parent(ids::ORGANIZES, ids::REFERENCE_TYPES_FOLDER),
        );
        for (id, name, supertype) in [
            (ids::HIERARCHICAL_REFERENCES, "HierarchicalReferences", ids::REFERENCES),
            (ids::NON_HIERARCHICAL_REFERENCES, "NonHierarchicalReferences", ids::REFERENCES),
            (ids::HAS_CHILD, "HasChild", ids::HIERARCHICAL_REFERENCES),
            (ids::ORGANIZES, "Organizes", ids::HIERARCHICAL_REFERENCES),
            (ids::HAS_EVENT_SOURCE, "HasEventSource", ids::HIERARCHICAL_REFERENCES),
            (ids::HAS_NOTIFIER, "HasNotifier", ids::HAS_EVENT_SOURCE),
            (ids::AGGREGATES, "Aggregates", ids::HAS_CHILD),
            (ids::HAS_SUBTYPE, "HasSubtype", ids::HAS_CHILD),
            (ids::HAS_COMPONENT, "HasComponent", ids::AGGREGATES),
            (ids::HAS_PROPERTY, "HasProperty", ids::AGGREGATES),
            (ids::HAS_TYPE_DEFINITION, "HasTypeDefinition", ids::NON_HIERARCHICAL_REFERENCES),
            (ids::HAS_MODELLING_RULE, "HasModellingRule", ids::NON_HIERARCHICAL_REFERENCES),
        ] {
            catalog.push(type_node(id, NodeClass::ReferenceType, name, supertype));
        }

        // Data types.
        catalog.push(
            type_node(ids::BASE_DATA_TYPE, NodeClass::DataType, "BaseDataType", NodeId::null())
                .with_parent(ids::ORGANIZES, ids::DATA_TYPES_FOLDER),
        );
        for (id, name, supertype) in [
            (ids::BOOLEAN, "Boolean", ids::BASE_DATA_TYPE),
            (ids::NUMBER, "Number", ids::BASE_DATA_TYPE),
            (ids::INTEGER, "Integer", ids::NUMBER),
            (ids::UINTEGER, "UInteger", ids::NUMBER),
            (ids::INT32, "Int32", ids::INTEGER),
            (ids::INT64, "Int64", ids::INTEGER),
            (ids::UINT32, "UInt32", ids::UINTEGER),
            (ids::DOUBLE, "Double", ids::NUMBER),
            (ids::STRING, "String", ids::BASE_DATA_TYPE),
            (ids::DATE_TIME, "DateTime", ids::BASE_DATA_TYPE),
            (ids::NODE_ID, "NodeId", ids::BASE_DATA_TYPE),
            (ids::LOCALIZED_TEXT, "LocalizedText", ids::BASE_DATA_TYPE),
            (ids::ENUMERATION, "Enumeration", ids::BASE_DATA_TYPE),
        ] {
            catalog.push(type_node(id, NodeClass::DataType, name, supertype));
        }

        // Object and variable types.
        catalog.push(
            type_node(ids::BASE_OBJECT_TYPE, NodeClass::ObjectType, "BaseObjectType", NodeId::null())
                .with_parent(ids::ORGANIZES, ids::OBJECT_TYPES_FOLDER),
        );
        catalog.push(type_node(ids::FOLDER_TYPE, NodeClass::ObjectType, "FolderType", ids::BASE_OBJECT_TYPE));
        catalog.push(
            type_node(ids::BASE_VARIABLE_TYPE, NodeClass::VariableType, "BaseVariableType", NodeId::null())
                .with_parent(ids::ORGANIZES, ids::VARIABLE_TYPES_FOLDER)
                .with_data_type(ids::BASE_DATA_TYPE)
                .with_value(Variant::Null),
        );
        for (id, name) in [
            (ids::BASE_DATA_VARIABLE_TYPE, "BaseDataVariableType"),
            (ids::PROPERTY_TYPE, "PropertyType"),
        ] {
            catalog.push(
                type_node(id, NodeClass::VariableType, name, ids::BASE_VARIABLE_TYPE)
                    .with_data_type(ids::BASE_DATA_TYPE)
                    .with_value(Variant::Null),
            );
        }

        catalog
    }

    /// Appends an entry.
    pub fn push(&mut self, state: NodeState) {
        self.nodes.push(state);
    }

    /// Returns the entries in creation order.
    pub fn nodes(&self) -> &[NodeState] {
        &self.nodes
    }

    /// Returns `true` if the catalog defines the node.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.nodes.iter().any(|state| state.node_id == *node_id)
    }

    /// Adds every catalog node to `space`.
    pub fn install(&self, space: &mut AddressSpace) -> CoreResult<()> {
        for state in &self.nodes {
            space.add_node(build_node(state)?)?;
        }
        for state in &self.nodes {
            if !state.supertype_id.is_null() {
                space.add_reference(&ids::HAS_SUBTYPE, &state.supertype_id, &state.node_id)?;
            }
        }
        for state in &self.nodes {
            if !state.parent_id.is_null() {
                space.add_reference(&state.reference_type_id, &state.parent_id, &state.node_id)?;
            }
            if !state.type_definition_id.is_null() {
                space.add_reference(&ids::HAS_TYPE_DEFINITION, &state.node_id, &state.type_definition_id)?;
            }
        }
        debug!(count = self.nodes.len(), "Standard nodes installed");
        Ok(())
    }
}

fn folder(node_id: NodeId, name: &str, parent: Option<NodeId>) -> NodeState {
    let state = NodeState::new(node_id, NodeClass::Object)
        .with_type_definition(ids::FOLDER_TYPE)
        .with_browse_name(QualifiedName::new(0, name));
    match parent {
        Some(parent) => state.with_parent(ids::ORGANIZES, parent),
        None => state,
    }
}

fn type_node(node_id: NodeId, node_class: NodeClass, name: &str, supertype: NodeId) -> NodeState {
    NodeState::new(node_id, node_class)
        .with_browse_name(QualifiedName::new(0, name))
        .with_supertype(supertype)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_standard_catalog() {
        let catalog = StandardCatalog::standard();
        let mut space = AddressSpace::new();
        catalog.install(&mut space).unwrap();

        assert_eq!(space.len(), catalog.nodes().len());
        assert_eq!(space.parent(&ids::OBJECTS_FOLDER), Some(&ids::ROOT_FOLDER));
        assert_eq!(space.parent(&ids::ROOT_FOLDER), None);
        assert_eq!(space.type_definition(&ids::ROOT_FOLDER), Some(&ids::FOLDER_TYPE));
        assert!(space.is_subtype_of(&ids::UINT32, &ids::NUMBER));
        assert!(space.is_subtype_of(&ids::PROPERTY_TYPE, &ids::BASE_VARIABLE_TYPE));
        assert_eq!(
            space.get_node(&ids::BASE_DATA_VARIABLE_TYPE).unwrap().data_type(),
            Some(&ids::BASE_DATA_TYPE)
        );
    }

    #[test]
    fn test_install_twice_fails() {
        let catalog = StandardCatalog::standard();
        let mut space = AddressSpace::new();
        catalog.install(&mut space).unwrap();
        assert!(catalog.install(&mut space).is_err());
    }

    #[test]
    fn test_catalog_contains() {
        let catalog = StandardCatalog::standard();
        assert!(catalog.contains(&ids::HAS_PROPERTY));
        assert!(!catalog.contains(&NodeId::numeric(1, 1)));
    }
}
