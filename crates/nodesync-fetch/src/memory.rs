// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process server over an [`AddressSpace`].
//!
//! [`MemoryServer`] answers Read and Browse calls from a shared address
//! space. It backs the command line tool and the tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

use nodesync_core::{
    AddressSpace, AttributeId, CoreResult, DataValue, ModelChangeEvent,
    ModelChangeVerbs, Node, NodeFactory, NodeKind, NodeState, Reference, ReferenceDescription,
    StandardCatalog, StatusCode, Variant,
};

use crate::fetcher::{Completion, OutgoingRequest};
use crate::transport::{
    AttributeService, BrowseDescription, BrowseResult, ReadValueId, ViewService,
};
use crate::updater::{update_nodes, UpdateReport};

/// Serves an address space held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    space: Arc<RwLock<AddressSpace>>,
}

impl MemoryServer {
    /// Serves `space`.
    pub fn new(space: AddressSpace) -> Self {
        Self {
            space: Arc::new(RwLock::new(space)),
        }
    }

    /// Serves a space that only holds the standard nodes.
    pub fn standard() -> CoreResult<Self> {
        let mut space = AddressSpace::new();
        StandardCatalog::standard().install(&mut space)?;
        Ok(Self::new(space))
    }

    /// Returns the shared space.
    pub fn shared(&self) -> Arc<RwLock<AddressSpace>> {
        Arc::clone(&self.space)
    }

    /// Locks the space for reading.
    pub fn space(&self) -> RwLockReadGuard<'_, AddressSpace> {
        self.space.read()
    }

    /// Locks the space for writing.
    pub fn space_mut(&self) -> RwLockWriteGuard<'_, AddressSpace> {
        self.space.write()
    }

    /// Merges snapshots into the served space.
    pub fn load(&self, factory: &dyn NodeFactory, states: Vec<NodeState>) -> UpdateReport {
        update_nodes(&mut self.space.write(), factory, states)
    }

    /// Deletes a node and returns the event a real server would publish.
    pub fn delete_node(&self, node_id: &nodesync_core::NodeId) -> Option<ModelChangeEvent> {
        let mut space = self.space.write();
        let type_definition_id = space.type_definition(node_id).cloned().unwrap_or_default();
        space.delete_node(node_id).then(|| {
            ModelChangeEvent::new(
                node_id.clone(),
                type_definition_id,
                ModelChangeVerbs::NODE_DELETED,
            )
        })
    }

    /// Reads attributes synchronously.
    pub fn read_values(&self, read_ids: &[ReadValueId]) -> Vec<DataValue> {
        let space = self.space.read();
        read_ids
            .iter()
            .map(|read_id| match space.get_node(&read_id.node_id) {
                Some(node) => read_attribute(node, read_id.attribute_id),
                None => DataValue::bad(StatusCode::BAD_NODE_ID_UNKNOWN),
            })
            .collect()
    }

    /// Browses synchronously.
    pub fn browse_references(&self, descriptions: &[BrowseDescription]) -> Vec<BrowseResult> {
        let space = self.space.read();
        descriptions
            .iter()
            .map(|description| browse_node(&space, description))
            .collect()
    }

    /// Executes a request synchronously.
    pub fn complete(&self, request: &OutgoingRequest) -> Completion {
        match request {
            OutgoingRequest::Read { ticket, read_ids } => Completion::Read {
                ticket: *ticket,
                result: Ok(self.read_values(read_ids)),
            },
            OutgoingRequest::Browse {
                ticket,
                descriptions,
            } => Completion::Browse {
                ticket: *ticket,
                result: Ok(self.browse_references(descriptions)),
            },
        }
    }
}

#[async_trait]
impl AttributeService for MemoryServer {
    async fn read(&self, read_ids: Vec<ReadValueId>) -> Result<Vec<DataValue>, StatusCode> {
        debug!(count = read_ids.len(), "Read");
        Ok(self.read_values(&read_ids))
    }
}

#[async_trait]
impl ViewService for MemoryServer {
    async fn browse(
        &self,
        descriptions: Vec<BrowseDescription>,
    ) -> Result<Vec<BrowseResult>, StatusCode> {
        debug!(count = descriptions.len(), "Browse");
        Ok(self.browse_references(&descriptions))
    }
}

fn read_attribute(node: &Node, attribute_id: AttributeId) -> DataValue {
    match attribute_id {
        AttributeId::NodeClass => DataValue::good(node.node_class().value() as i32),
        AttributeId::BrowseName => DataValue::good(node.browse_name.clone()),
        AttributeId::DisplayName => DataValue::good(node.display_name.clone()),
        AttributeId::DataType => match node.data_type() {
            Some(data_type) => DataValue::good(data_type.clone()),
            None => DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
        },
        AttributeId::Value => match &node.kind {
            NodeKind::DataType { enum_strings } if !enum_strings.is_empty() => DataValue::good(
                Variant::Array(enum_strings.iter().map(|s| Variant::from(s.as_str())).collect()),
            ),
            _ => match node.value() {
                Some(value) => DataValue::good(value.clone()),
                None => DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
            },
        },
        _ => DataValue::bad(StatusCode::BAD_ATTRIBUTE_ID_INVALID),
    }
}

fn browse_node(space: &AddressSpace, description: &BrowseDescription) -> BrowseResult {
    let Some(node) = space.get_node(&description.node_id) else {
        return BrowseResult::bad(StatusCode::BAD_NODE_ID_UNKNOWN);
    };
    let filter = &description.reference_type_id;
    if !filter.is_null() && !space.contains(filter) {
        return BrowseResult::bad(StatusCode::BAD_REFERENCE_TYPE_ID_INVALID);
    }

    let accepts = |reference: &Reference| {
        filter.is_null()
            || reference.reference_type == *filter
            || (description.include_subtypes
                && space.is_subtype_of(&reference.reference_type, filter))
    };

    let mut references = Vec::new();
    if description.direction.includes(true) {
        references.extend(
            node.forward_references()
                .iter()
                .filter(|r| accepts(r))
                .map(|r| ReferenceDescription::forward(r.reference_type.clone(), r.target.clone())),
        );
    }
    if description.direction.includes(false) {
        references.extend(
            node.inverse_references()
                .iter()
                .filter(|r| accepts(r))
                .map(|r| ReferenceDescription::inverse(r.reference_type.clone(), r.target.clone())),
        );
    }
    trace!(description = %description, count = references.len(), "Browsed");
    BrowseResult::good(references)
}

/// A small server model shared by the unit tests.
///
/// `ns=1;i=101` TestType declares the properties 301 (Alias) and 302
/// (Label). Objects organizes TestNode1 (of TestType), TestNode2 and the
/// folder TestNode3, which organizes TestNode4 and TestNode5. TestNode4
/// organizes TestNode6. TestNode5 refers to TestNode2 via the non
/// hierarchical TestRefType 102.
#[cfg(test)]
pub(crate) fn test_server_space() -> AddressSpace {
    use nodesync_core::{ids, GenericNodeFactory, NodeClass, NodeId};

    let id = |value| NodeId::numeric(1, value);
    let object = |value, name: &str, parent| {
        NodeState::new(id(value), NodeClass::Object)
            .with_browse_name(format!("1:{name}"))
            .with_type_definition(ids::BASE_OBJECT_TYPE)
            .with_parent(ids::ORGANIZES, parent)
    };
    let declaration = |value, name: &str, default: &str| {
        NodeState::new(id(value), NodeClass::Variable)
            .with_browse_name(format!("1:{name}"))
            .with_type_definition(ids::PROPERTY_TYPE)
            .with_parent(ids::HAS_PROPERTY, id(101))
            .with_data_type(ids::STRING)
            .with_value(default)
    };

    let states = vec![
        NodeState::new(id(102), NodeClass::ReferenceType)
            .with_browse_name("1:TestRefType")
            .with_supertype(ids::NON_HIERARCHICAL_REFERENCES),
        NodeState::new(id(101), NodeClass::ObjectType)
            .with_browse_name("1:TestType")
            .with_supertype(ids::BASE_OBJECT_TYPE),
        declaration(301, "Alias", ""),
        declaration(302, "Label", "Default"),
        object(1, "TestNode1", ids::OBJECTS_FOLDER)
            .with_type_definition(id(101))
            .with_property(id(301), "X"),
        object(2, "TestNode2", ids::OBJECTS_FOLDER),
        object(3, "TestNode3", ids::OBJECTS_FOLDER).with_type_definition(ids::FOLDER_TYPE),
        object(4, "TestNode4", id(3)),
        object(5, "TestNode5", id(3))
            .with_reference(ReferenceDescription::forward(id(102), id(2))),
        object(6, "TestNode6", id(4)),
    ];

    let server = match MemoryServer::standard() {
        Ok(server) => server,
        Err(e) => panic!("standard catalog: {e}"),
    };
    let report = server.load(&GenericNodeFactory::new(), states);
    assert!(report.failed_nodes.is_empty(), "{:?}", report.failed_nodes);
    let space = std::mem::take(&mut *server.space_mut());
    space
}

// =============================================================================
// Tests
// =============================================================================
