// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The node container.
//!
//! [`AddressSpace`] owns every [`Node`] in an arena keyed by [`NodeId`].
//! Cross-node links are ids looked up through the container, so there is
//! no shared ownership between nodes.
//!
//! # Invariants
//!
//! - Every forward reference `(type, A -> B)` has a matching inverse
//!   reference `(type, B <- A)`, and both are removed together.
//! - A node has at most one hierarchical parent.
//! - Deleting a node deletes its hierarchical descendants first, then all of
//!   its own references, then the node.
//!
//! # Observers
//!
//! Global observers see every change. A node-scoped observer registered on
//! `X` sees changes of `X` and of every node below `X` along the parent
//! chain.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{CoreError, CoreResult};
use crate::ids;
use crate::node::{Node, Reference};
use crate::state::{NodeAttributes, NodeProperty};
use crate::types::{NodeClass, NodeId};
use crate::value::Variant;

// =============================================================================
// NodeObserver
// =============================================================================

/// Receives address space change notifications.
pub trait NodeObserver: Send + Sync {
    /// A node was created and wired to its parent.
    fn on_node_created(&self, _node: &Node) {}

    /// A node is about to be removed; its references are already gone.
    fn on_node_deleted(&self, _node: &Node) {}

    /// Attributes or properties of a node changed.
    fn on_node_modified(&self, _node: &Node, _property_ids: &[NodeId]) {}

    /// A reference was added.
    fn on_reference_added(&self, _reference_type: &NodeId, _source: &NodeId, _target: &NodeId) {}

    /// A reference was deleted.
    fn on_reference_deleted(&self, _reference_type: &NodeId, _source: &NodeId, _target: &NodeId) {}
}

/// Handle returned by the subscribe methods.
pub type ObserverId = u64;

type ObserverList = Vec<(ObserverId, Arc<dyn NodeObserver>)>;

// =============================================================================
// NodeLookup
// =============================================================================

/// Answers whether a node is known locally.
pub trait NodeLookup {
    /// Returns `true` if the node exists.
    fn contains_node(&self, node_id: &NodeId) -> bool;
}

impl NodeLookup for HashSet<NodeId> {
    fn contains_node(&self, node_id: &NodeId) -> bool {
        self.contains(node_id)
    }
}

// =============================================================================
// AddressSpace
// =============================================================================

/// Arena of nodes keyed by id.
#[derive(Default)]
pub struct AddressSpace {
    nodes: BTreeMap<NodeId, Node>,
    observers: ObserverList,
    node_observers: HashMap<NodeId, ObserverList>,
    next_observer_id: ObserverId,
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("nodes", &self.nodes.len())
            .field("observers", &self.observers.len())
            .field("node_observers", &self.node_observers.len())
            .finish()
    }
}

impl NodeLookup for AddressSpace {
    fn contains_node(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }
}

impl AddressSpace {
    /// Creates an empty address space.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Returns the number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if there are no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if the node exists.
    #[inline]
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Returns the node.
    #[inline]
    pub fn get_node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    /// Iterates over node ids in order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Iterates over nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    // =========================================================================
    // Structure Queries
    // =========================================================================

    /// Returns the supertype of a type definition.
    pub fn supertype(&self, node_id: &NodeId) -> Option<&NodeId> {
        let node = self.nodes.get(node_id)?;
        if !node.is_type_definition() {
            return None;
        }
        node.inverse
            .iter()
            .find(|r| r.reference_type == ids::HAS_SUBTYPE)
            .map(|r| &r.target)
    }

    /// Returns `true` if `type_id` is `base_id` or derives from it.
    pub fn is_subtype_of(&self, type_id: &NodeId, base_id: &NodeId) -> bool {
        let mut current = Some(type_id);
        let mut steps = 0;
        while let Some(id) = current {
            if id == base_id {
                return self.nodes.get(id).is_some_and(Node::is_type_definition);
            }
            steps += 1;
            if steps > self.nodes.len() {
                return false;
            }
            current = self.supertype(id);
        }
        false
    }

    /// Returns `true` if the reference type is hierarchical.
    pub fn is_hierarchical(&self, reference_type: &NodeId) -> bool {
        self.is_subtype_of(reference_type, &ids::HIERARCHICAL_REFERENCES)
    }

    /// Returns `true` if the node's type definition is `type_id` or one of
    /// its subtypes.
    pub fn is_instance_of(&self, node_id: &NodeId, type_id: &NodeId) -> bool {
        self.type_definition(node_id)
            .is_some_and(|type_definition| self.is_subtype_of(type_definition, type_id))
    }

    /// Returns the hierarchical parent reference, as stored on the child.
    pub fn parent_reference(&self, node_id: &NodeId) -> Option<&Reference> {
        let node = self.nodes.get(node_id)?;
        node.inverse
            .iter()
            .find(|r| self.is_hierarchical(&r.reference_type))
    }

    /// Returns the hierarchical parent.
    pub fn parent(&self, node_id: &NodeId) -> Option<&NodeId> {
        self.parent_reference(node_id).map(|r| &r.target)
    }

    /// Returns the node followed by its ancestors along the parent chain.
    pub fn ancestors(&self, node_id: &NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(node_id).map(|n| n.id.clone());
        while let Some(id) = current {
            if chain.contains(&id) {
                break;
            }
            current = self.parent(&id).cloned();
            chain.push(id);
        }
        chain
    }

    /// Returns the cached type definition.
    pub fn type_definition(&self, node_id: &NodeId) -> Option<&NodeId> {
        self.nodes.get(node_id)?.type_definition()
    }

    /// Returns the targets of forward hierarchical references.
    pub fn children(&self, node_id: &NodeId) -> Vec<NodeId> {
        self.forward_targets(node_id, &ids::HIERARCHICAL_REFERENCES)
    }

    /// Returns the targets of forward HasProperty references.
    pub fn properties(&self, node_id: &NodeId) -> Vec<NodeId> {
        self.forward_targets(node_id, &ids::HAS_PROPERTY)
    }

    /// Returns the targets of forward references of `reference_type` or
    /// its subtypes.
    pub fn forward_targets(&self, node_id: &NodeId, reference_type: &NodeId) -> Vec<NodeId> {
        match self.nodes.get(node_id) {
            Some(node) => node
                .forward
                .iter()
                .filter(|r| self.is_subtype_of(&r.reference_type, reference_type))
                .map(|r| r.target.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Finds a hierarchical child by browse name.
    pub fn find_child(&self, node_id: &NodeId, browse_name: &str) -> Option<&Node> {
        self.children(node_id)
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .find(|child| child.browse_name.name == browse_name)
    }

    /// Finds a property declaration on `type_id` or its supertypes.
    pub fn find_property_declaration(&self, type_id: &NodeId, prop_decl_id: &NodeId) -> Option<&Node> {
        let mut current = Some(type_id);
        let mut steps = 0;
        while let Some(id) = current {
            if self.properties(id).contains(prop_decl_id) {
                return self.nodes.get(prop_decl_id);
            }
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
            current = self.supertype(id);
        }
        None
    }

    /// Returns the property declarations of a type and its supertypes,
    /// nearest type first.
    pub fn property_declarations(&self, type_id: &NodeId) -> Vec<NodeId> {
        let mut declarations = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(type_id.clone());
        while let Some(id) = current {
            if !visited.insert(id.clone()) {
                break;
            }
            declarations.extend(self.properties(&id));
            current = self.supertype(&id).cloned();
        }
        declarations
    }

    fn property_node_id(&self, node_id: &NodeId, prop_decl_id: &NodeId) -> Option<NodeId> {
        let type_id = self.type_definition(node_id)?;
        let declaration = self.find_property_declaration(type_id, prop_decl_id)?;
        self.find_child(node_id, &declaration.browse_name.name)
            .filter(|p| p.node_class() == NodeClass::Variable)
            .map(|p| p.id.clone())
    }

    /// Returns the value of the property instantiated from `prop_decl_id`.
    pub fn property_value(&self, node_id: &NodeId, prop_decl_id: &NodeId) -> Option<&Variant> {
        let property_id = self.property_node_id(node_id, prop_decl_id)?;
        self.nodes.get(&property_id)?.value()
    }

    /// Sets the value of the property instantiated from `prop_decl_id`.
    pub fn set_property_value(
        &mut self,
        node_id: &NodeId,
        prop_decl_id: &NodeId,
        value: Variant,
    ) -> CoreResult<()> {
        if !self.contains(node_id) {
            return Err(CoreError::unknown_node(node_id.clone()));
        }
        let property_id = self
            .property_node_id(node_id, prop_decl_id)
            .ok_or_else(|| CoreError::wrong_property_id(node_id.clone(), prop_decl_id.clone()))?;
        match self.nodes.get_mut(&property_id).map(|property| property.set_value(value)) {
            Some(true) => Ok(()),
            _ => Err(CoreError::wrong_property_id(node_id.clone(), prop_decl_id.clone())),
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Adds a node without references.
    ///
    /// Observers are not notified until [`notify_node_created`] is called,
    /// so that the node can be wired to its parent first.
    ///
    /// [`notify_node_created`]: Self::notify_node_created
    pub fn add_node(&mut self, mut node: Node) -> CoreResult<()> {
        if node.id.is_null() {
            return Err(CoreError::invalid_node_id(node.id.to_string(), "Null node id"));
        }
        if self.nodes.contains_key(&node.id) {
            return Err(CoreError::duplicate_node_id(node.id));
        }
        node.forward.clear();
        node.inverse.clear();
        node.type_definition = None;
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Notifies observers that a node was created.
    pub fn notify_node_created(&self, node_id: &NodeId) {
        if let Some(node) = self.nodes.get(node_id) {
            for observer in self.observers_for(&self.ancestors(node_id)) {
                observer.on_node_created(node);
            }
        }
    }

    /// Deletes a node and its hierarchical descendants.
    ///
    /// Returns `false` if the node does not exist.
    pub fn delete_node(&mut self, node_id: &NodeId) -> bool {
        if !self.contains(node_id) {
            return false;
        }
        let mut in_progress = HashSet::new();
        self.delete_recursive(node_id, &mut in_progress);
        true
    }

    fn delete_recursive(&mut self, node_id: &NodeId, in_progress: &mut HashSet<NodeId>) {
        if !in_progress.insert(node_id.clone()) {
            return;
        }

        while let Some(child) = self
            .children(node_id)
            .into_iter()
            .find(|child| !in_progress.contains(child))
        {
            self.delete_recursive(&child, in_progress);
        }

        let chain = self.ancestors(node_id);
        self.delete_all_references(node_id);

        if let Some(node) = self.nodes.get(node_id) {
            for observer in self.observers_for(&chain) {
                observer.on_node_deleted(node);
            }
        }

        self.node_observers.remove(node_id);
        self.nodes.remove(node_id);
        debug!(node_id = %node_id, "Node deleted");
    }

    fn delete_all_references(&mut self, node_id: &NodeId) {
        while let Some(r) = self.nodes.get(node_id).and_then(|n| n.inverse.last().cloned()) {
            if !self.delete_reference(&r.reference_type, &r.target, node_id) {
                if let Some(node) = self.nodes.get_mut(node_id) {
                    node.inverse.pop();
                }
            }
        }
        while let Some(r) = self.nodes.get(node_id).and_then(|n| n.forward.last().cloned()) {
            self.delete_reference(&r.reference_type, node_id, &r.target);
        }
    }

    /// Updates attributes and property values of an existing node.
    ///
    /// Empty names and absent values are left unchanged. Returns `true` if
    /// anything changed.
    pub fn modify_node(
        &mut self,
        node_id: &NodeId,
        attributes: NodeAttributes,
        properties: Vec<NodeProperty>,
    ) -> CoreResult<bool> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| CoreError::unknown_node(node_id.clone()))?;

        let mut attributes_changed = false;

        if !attributes.browse_name.is_empty() && node.browse_name != attributes.browse_name {
            node.browse_name = attributes.browse_name;
            attributes_changed = true;
        }

        if !attributes.display_name.is_empty() && node.display_name != attributes.display_name {
            node.display_name = attributes.display_name;
            attributes_changed = true;
        }

        if let Some(value) = attributes.value {
            if node.value().is_none() {
                warn!(node_id = %node_id, "Value ignored for node without a value");
            } else if node.value() != Some(&value) {
                node.set_value(value);
                attributes_changed = true;
            }
        }

        let mut changed_properties = Vec::new();
        for (prop_decl_id, value) in properties {
            if self.property_value(node_id, &prop_decl_id) == Some(&value) {
                continue;
            }
            match self.set_property_value(node_id, &prop_decl_id, value) {
                Ok(()) => changed_properties.push(prop_decl_id),
                Err(e) => warn!(node_id = %node_id, error = %e, "Property not modified"),
            }
        }

        if !attributes_changed && changed_properties.is_empty() {
            return Ok(false);
        }

        if let Some(node) = self.nodes.get(node_id) {
            for observer in self.observers_for(&self.ancestors(node_id)) {
                observer.on_node_modified(node, &changed_properties);
            }
        }
        Ok(true)
    }

    /// Adds a reference from `source` to `target`.
    ///
    /// Returns `Ok(false)` if the reference already exists.
    pub fn add_reference(
        &mut self,
        reference_type: &NodeId,
        source: &NodeId,
        target: &NodeId,
    ) -> CoreResult<bool> {
        match self.nodes.get(reference_type) {
            Some(node) if node.node_class() == NodeClass::ReferenceType => {}
            _ => return Err(CoreError::unknown_reference_type(reference_type.clone())),
        }
        let source_node = self
            .nodes
            .get(source)
            .ok_or_else(|| CoreError::unknown_node(source.clone()))?;
        if !self.nodes.contains_key(target) {
            return Err(CoreError::unknown_node(target.clone()));
        }
        if source_node.has_forward(reference_type, target) {
            return Ok(false);
        }

        if self.is_hierarchical(reference_type) {
            if let Some(existing) = self.parent(target) {
                if existing != source {
                    return Err(CoreError::multiple_parents(
                        target.clone(),
                        existing.clone(),
                        source.clone(),
                    ));
                }
            }
        }

        if let Some(node) = self.nodes.get_mut(source) {
            node.forward.push(Reference::new(reference_type.clone(), target.clone()));
            if *reference_type == ids::HAS_TYPE_DEFINITION {
                node.type_definition = Some(target.clone());
            }
        }
        if let Some(node) = self.nodes.get_mut(target) {
            node.inverse.push(Reference::new(reference_type.clone(), source.clone()));
        }

        for (_, observer) in &self.observers {
            observer.on_reference_added(reference_type, source, target);
        }
        Ok(true)
    }

    /// Deletes the reference from `source` to `target`.
    ///
    /// Returns `false` if it did not exist.
    pub fn delete_reference(&mut self, reference_type: &NodeId, source: &NodeId, target: &NodeId) -> bool {
        let Some(node) = self.nodes.get_mut(source) else {
            return false;
        };
        let Some(index) = node
            .forward
            .iter()
            .position(|r| r.reference_type == *reference_type && r.target == *target)
        else {
            return false;
        };
        node.forward.remove(index);
        if *reference_type == ids::HAS_TYPE_DEFINITION {
            node.type_definition = node
                .forward
                .iter()
                .find(|r| r.reference_type == ids::HAS_TYPE_DEFINITION)
                .map(|r| r.target.clone());
        }

        if let Some(node) = self.nodes.get_mut(target) {
            if let Some(index) = node
                .inverse
                .iter()
                .position(|r| r.reference_type == *reference_type && r.target == *source)
            {
                node.inverse.remove(index);
            }
        }

        for (_, observer) in &self.observers {
            observer.on_reference_deleted(reference_type, source, target);
        }
        true
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Subscribes a global observer.
    pub fn subscribe(&mut self, observer: Arc<dyn NodeObserver>) -> ObserverId {
        let id = self.allocate_observer_id();
        self.observers.push((id, observer));
        id
    }

    /// Unsubscribes a global observer.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Subscribes an observer to a node and everything below it.
    pub fn subscribe_node(&mut self, node_id: NodeId, observer: Arc<dyn NodeObserver>) -> ObserverId {
        let id = self.allocate_observer_id();
        self.node_observers.entry(node_id).or_default().push((id, observer));
        id
    }

    /// Unsubscribes a node-scoped observer.
    pub fn unsubscribe_node(&mut self, node_id: &NodeId, id: ObserverId) -> bool {
        let Some(list) = self.node_observers.get_mut(node_id) else {
            return false;
        };
        let before = list.len();
        list.retain(|(observer_id, _)| *observer_id != id);
        let removed = list.len() != before;
        if list.is_empty() {
            self.node_observers.remove(node_id);
        }
        removed
    }

    fn allocate_observer_id(&mut self) -> ObserverId {
        self.next_observer_id += 1;
        self.next_observer_id
    }

    /// Node-scoped observers along `chain`, followed by global observers.
    fn observers_for(&self, chain: &[NodeId]) -> Vec<Arc<dyn NodeObserver>> {
        chain
            .iter()
            .filter_map(|id| self.node_observers.get(id))
            .flatten()
            .chain(self.observers.iter())
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
