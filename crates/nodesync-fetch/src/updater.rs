// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Merging fetched snapshots into the address space.
//!
//! [`update_nodes`] applies one batch of [`NodeState`]s in phases:
//!
//! 0. Hierarchical edges of type definitions are stashed, so the factory
//!    creates types unwired.
//! 1. The batch is sorted so that every node comes after the batch members
//!    it refers to.
//! 2. Existing nodes are modified, new nodes are created. A server property
//!    replaces the placeholder the factory made for the same browse name.
//! 3. Non-hierarchical forward references are reconciled with the snapshot.
//! 4. The stashed type edges are added back.
//!
//! Failures of single nodes are logged and reported, the rest of the batch
//! is still applied.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use nodesync_core::{
    fallback_display_name, ids, AddressSpace, CoreError, ModelChangeVerbs, NodeFactory, NodeId,
    NodeState, ReferenceDescription,
};

// =============================================================================
// UpdateReport
// =============================================================================

/// What one [`update_nodes`] call changed.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Model change verbs per affected node.
    pub model_changes: BTreeMap<NodeId, ModelChangeVerbs>,

    /// Nodes created.
    pub added_nodes: Vec<NodeId>,

    /// Existing nodes whose attributes or properties changed.
    pub modified_nodes: Vec<NodeId>,

    /// Nodes to report a semantic change for. Property changes are rolled
    /// up to the nearest non-property ancestor.
    pub semantic_changes: BTreeSet<NodeId>,

    /// References added, keyed by source.
    pub added_references: Vec<(NodeId, ReferenceDescription)>,

    /// References deleted, keyed by source.
    pub deleted_references: Vec<(NodeId, ReferenceDescription)>,

    /// Nodes that could not be created or modified.
    pub failed_nodes: Vec<(NodeId, CoreError)>,
}

impl UpdateReport {
    fn add_verbs(&mut self, node_id: &NodeId, verbs: ModelChangeVerbs) {
        *self.model_changes.entry(node_id.clone()).or_default() |= verbs;
    }

    /// Returns `true` if the batch changed nothing.
    pub fn is_empty(&self) -> bool {
        self.model_changes.is_empty()
            && self.semantic_changes.is_empty()
            && self.failed_nodes.is_empty()
    }
}

/// Hierarchical edges of a type definition, applied after creation.
#[derive(Debug, Clone)]
struct TypeEdges {
    parent_id: NodeId,
    reference_type_id: NodeId,
    supertype_id: NodeId,
}

// =============================================================================
// update_nodes
// =============================================================================

/// Merges `states` into `space`.
pub fn update_nodes(
    space: &mut AddressSpace,
    factory: &dyn NodeFactory,
    states: Vec<NodeState>,
) -> UpdateReport {
    let mut report = UpdateReport::default();
    if states.is_empty() {
        return report;
    }
    let count = states.len();

    let mut states = states;
    let stash = stash_type_edges(&mut states);
    let states = sort_states(states, &stash);

    let mut applied = Vec::with_capacity(states.len());
    for state in states {
        if apply_state(space, factory, &state, &mut report) {
            if let Some(edges) = stash.get(&state.node_id) {
                wire_type_edges(space, &state.node_id, edges, &mut report, false);
            }
            applied.push(state);
        }
    }

    for state in &applied {
        reconcile_references(space, state, &mut report);
    }

    for (node_id, edges) in &stash {
        if space.contains(node_id) {
            wire_type_edges(space, node_id, edges, &mut report, true);
        }
    }

    info!(
        count,
        added = report.added_nodes.len(),
        modified = report.modified_nodes.len(),
        failed = report.failed_nodes.len(),
        "Address space updated"
    );
    report
}

/// Phase 0: detaches type definitions from their parents.
fn stash_type_edges(states: &mut [NodeState]) -> BTreeMap<NodeId, TypeEdges> {
    let mut stash = BTreeMap::new();
    for state in states.iter_mut() {
        if !state.node_class.is_type_definition() {
            continue;
        }
        let edges = TypeEdges {
            parent_id: std::mem::take(&mut state.parent_id),
            reference_type_id: std::mem::take(&mut state.reference_type_id),
            supertype_id: state.supertype_id.clone(),
        };
        stash.insert(state.node_id.clone(), edges);
    }
    stash
}

/// Phase 1: depth-first post-order over in-batch dependencies.
///
/// Duplicate ids keep the last snapshot. Cycles are broken arbitrarily.
fn sort_states(states: Vec<NodeState>, stash: &BTreeMap<NodeId, TypeEdges>) -> Vec<NodeState> {
    let mut index: BTreeMap<NodeId, usize> = BTreeMap::new();
    for (i, state) in states.iter().enumerate() {
        index.insert(state.node_id.clone(), i);
    }

    let mut aggregated: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();
    for (i, state) in states.iter().enumerate() {
        if index.get(&state.node_id) == Some(&i) && !state.parent_id.is_null() {
            aggregated.entry(state.parent_id.clone()).or_default().push(i);
        }
    }

    let mut visited = vec![false; states.len()];
    let mut order = Vec::with_capacity(index.len());
    let mut roots: Vec<usize> = index.values().copied().collect();
    roots.sort_unstable();

    for root in roots {
        visit(root, &states, stash, &index, &aggregated, &mut visited, &mut order);
    }

    let mut slots: Vec<Option<NodeState>> = states.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

fn visit(
    i: usize,
    states: &[NodeState],
    stash: &BTreeMap<NodeId, TypeEdges>,
    index: &BTreeMap<NodeId, usize>,
    aggregated: &BTreeMap<NodeId, Vec<usize>>,
    visited: &mut [bool],
    order: &mut Vec<usize>,
) {
    if visited[i] {
        return;
    }
    visited[i] = true;

    let state = &states[i];
    let has_subtype = ids::HAS_SUBTYPE;
    let mut dependencies = vec![
        &state.reference_type_id,
        &state.parent_id,
        &state.type_definition_id,
        &state.attributes.data_type,
        &state.supertype_id,
    ];
    if let Some(edges) = stash.get(&state.node_id) {
        dependencies.push(&edges.parent_id);
        dependencies.push(&edges.reference_type_id);
        if !edges.supertype_id.is_null() {
            dependencies.push(&has_subtype);
        }
    }

    for dependency in dependencies {
        if let Some(&j) = index.get(dependency) {
            visit(j, states, stash, index, aggregated, visited, order);
        }
    }

    // Declarations come before instances of the type.
    if let Some(declarations) = aggregated.get(&state.type_definition_id) {
        for &j in declarations {
            visit(j, states, stash, index, aggregated, visited, order);
        }
    }

    order.push(i);
}

/// Phase 2 for one node. Returns `false` if the node is not in the space.
fn apply_state(
    space: &mut AddressSpace,
    factory: &dyn NodeFactory,
    state: &NodeState,
    report: &mut UpdateReport,
) -> bool {
    let node_id = &state.node_id;

    if space.contains(node_id) {
        match space.modify_node(node_id, state.attributes.clone(), state.properties.clone()) {
            Ok(true) => {
                debug!(node_id = %node_id, "Node modified");
                report.modified_nodes.push(node_id.clone());
                report.semantic_changes.insert(semantic_owner(space, node_id));
            }
            Ok(false) => {}
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "Node modification failed");
                report.failed_nodes.push((node_id.clone(), e));
            }
        }
        return true;
    }

    let placeholder = property_placeholder(space, state);
    match factory.create_node(space, state) {
        Ok(_) => {
            if let Some(placeholder) = placeholder {
                replace_placeholder(space, state, &placeholder, report);
            }
            report.added_nodes.push(node_id.clone());
            report.add_verbs(
                node_id,
                ModelChangeVerbs::NODE_ADDED | ModelChangeVerbs::REFERENCE_ADDED,
            );
            if !state.parent_id.is_null() {
                report.add_verbs(&state.parent_id, ModelChangeVerbs::REFERENCE_ADDED);
            }
            true
        }
        Err(e) => {
            warn!(
                node_id = %node_id,
                node_class = %state.node_class,
                error = %e,
                "Node creation failed"
            );
            report.failed_nodes.push((node_id.clone(), e));
            false
        }
    }
}

/// Finds the property the factory instantiated under the parent of `state`
/// with the same browse name, when the server names that property
/// differently.
fn property_placeholder(space: &AddressSpace, state: &NodeState) -> Option<NodeId> {
    let name = &state.attributes.browse_name.name;
    if name.is_empty() || !is_instance_property(space, state) {
        return None;
    }
    let placeholder = NodeId::nested(&state.parent_id, name);
    let existing = space.find_child(&state.parent_id, name)?;
    (existing.id == placeholder && placeholder != state.node_id).then_some(placeholder)
}

/// Drops a factory-made property once the server's own node for it exists.
fn replace_placeholder(
    space: &mut AddressSpace,
    state: &NodeState,
    placeholder: &NodeId,
    report: &mut UpdateReport,
) {
    let value_changed = state.attributes.value.is_some()
        && space.get_node(placeholder).and_then(|p| p.value()) != state.attributes.value.as_ref();
    space.delete_node(placeholder);
    debug!(
        node_id = %state.node_id,
        placeholder = %placeholder,
        "Property placeholder replaced"
    );
    let owner = semantic_owner(space, &state.parent_id);
    if value_changed && !report.added_nodes.contains(&owner) {
        report.semantic_changes.insert(owner);
    }
}

/// Walks up HasProperty edges to the node that owns a property.
fn semantic_owner(space: &AddressSpace, node_id: &NodeId) -> NodeId {
    let mut current = node_id.clone();
    for _ in 0..space.len() {
        match space.parent_reference(&current) {
            Some(parent) if parent.reference_type == ids::HAS_PROPERTY => {
                current = parent.target.clone();
            }
            _ => break,
        }
    }
    current
}

fn is_instance_property(space: &AddressSpace, state: &NodeState) -> bool {
    state.reference_type_id == ids::HAS_PROPERTY
        && space
            .get_node(&state.parent_id)
            .is_some_and(|parent| !parent.is_type_definition())
}

/// Phase 3: makes the node's non-hierarchical forward references match the
/// snapshot. HasTypeDefinition is left alone.
fn reconcile_references(space: &mut AddressSpace, state: &NodeState, report: &mut UpdateReport) {
    if is_instance_property(space, state) {
        return;
    }
    let node_id = &state.node_id;
    let Some(node) = space.get_node(node_id) else {
        return;
    };

    let stale: Vec<_> = node
        .forward_references()
        .iter()
        .filter(|r| r.reference_type != ids::HAS_TYPE_DEFINITION)
        .filter(|r| !space.is_hierarchical(&r.reference_type))
        .filter(|r| {
            !state.references.iter().any(|d| {
                d.forward && d.reference_type_id == r.reference_type && d.node_id == r.target
            })
        })
        .cloned()
        .collect();

    for reference in stale {
        if space.delete_reference(&reference.reference_type, node_id, &reference.target) {
            debug!(
                reference = %describe_reference(space, &reference.reference_type, node_id, &reference.target),
                "Reference deleted"
            );
            report.add_verbs(node_id, ModelChangeVerbs::REFERENCE_DELETED);
            report.add_verbs(&reference.target, ModelChangeVerbs::REFERENCE_DELETED);
            report.deleted_references.push((
                node_id.clone(),
                ReferenceDescription::forward(reference.reference_type, reference.target),
            ));
        }
    }

    for description in state.references.iter().filter(|d| d.forward) {
        let reference_type = &description.reference_type_id;
        let target = &description.node_id;
        if space
            .get_node(node_id)
            .is_some_and(|n| n.has_forward(reference_type, target))
        {
            continue;
        }
        let is_reference_type = space
            .get_node(reference_type)
            .is_some_and(|n| n.node_class() == nodesync_core::NodeClass::ReferenceType);
        if !is_reference_type || !space.contains(target) {
            warn!(
                reference = %describe_reference(space, reference_type, node_id, target),
                "Reference skipped, type or target unknown"
            );
            continue;
        }
        match space.add_reference(reference_type, node_id, target) {
            Ok(true) => {
                report.add_verbs(node_id, ModelChangeVerbs::REFERENCE_ADDED);
                report.add_verbs(target, ModelChangeVerbs::REFERENCE_ADDED);
                report
                    .added_references
                    .push((node_id.clone(), description.clone()));
            }
            Ok(false) => {}
            Err(e) => warn!(
                reference = %describe_reference(space, reference_type, node_id, target),
                error = %e,
                "Reference not added"
            ),
        }
    }
}

/// Phases 2 and 4: adds the stashed supertype and parent edges.
fn wire_type_edges(
    space: &mut AddressSpace,
    node_id: &NodeId,
    edges: &TypeEdges,
    report: &mut UpdateReport,
    final_pass: bool,
) {
    let mut wire = |space: &mut AddressSpace, reference_type: &NodeId, source: &NodeId| {
        if source.is_null() || reference_type.is_null() {
            return;
        }
        match space.add_reference(reference_type, source, node_id) {
            Ok(true) => {
                report.add_verbs(source, ModelChangeVerbs::REFERENCE_ADDED);
                report.add_verbs(node_id, ModelChangeVerbs::REFERENCE_ADDED);
                report.added_references.push((
                    source.clone(),
                    ReferenceDescription::forward(reference_type.clone(), node_id.clone()),
                ));
            }
            Ok(false) => {}
            Err(e) if final_pass => warn!(
                reference = %describe_reference(space, reference_type, source, node_id),
                error = %e,
                "Type definition edge not added"
            ),
            Err(e) => debug!(node_id = %node_id, error = %e, "Type definition edge deferred"),
        }
    };

    wire(space, &ids::HAS_SUBTYPE, &edges.supertype_id);
    if edges.parent_id != edges.supertype_id {
        wire(space, &edges.reference_type_id, &edges.parent_id);
    }
}

/// Formats a reference as `source RefName target` with display names.
pub fn describe_reference(
    space: &AddressSpace,
    reference_type: &NodeId,
    source: &NodeId,
    target: &NodeId,
) -> String {
    let name = |id: &NodeId| {
        space
            .get_node(id)
            .map(|n| n.display_name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| fallback_display_name(id))
    };
    format!("{} {} {}", name(source), name(reference_type), name(target))
}

// =============================================================================
// find_deleted_children
// =============================================================================

/// Returns the Organizes children of `node_id` that are missing from the
/// browsed `references`.
pub fn find_deleted_children(
    space: &AddressSpace,
    node_id: &NodeId,
    references: &[ReferenceDescription],
) -> Vec<NodeId> {
    let present: BTreeSet<&NodeId> = references
        .iter()
        .filter(|r| r.forward)
        .map(|r| &r.node_id)
        .collect();
    space
        .forward_targets(node_id, &ids::ORGANIZES)
        .into_iter()
        .filter(|child| !present.contains(child))
        .collect()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nodesync_core::{GenericNodeFactory, NodeClass, StandardCatalog, Variant};

    fn id(value: u32) -> NodeId {
        NodeId::numeric(1, value)
    }

    fn standard_space() -> AddressSpace {
        let mut space = AddressSpace::new();
        StandardCatalog::standard().install(&mut space).unwrap();
        space
    }

    fn folder(value: u32, parent: NodeId) -> NodeState {
        NodeState::new(id(value), NodeClass::Object)
            .with_type_definition(ids::FOLDER_TYPE)
            .with_parent(ids::ORGANIZES, parent)
            .with_browse_name(format!("Folder{value}"))
    }

    /// TestType with one string property declaration.
    fn test_type_states() -> Vec<NodeState> {
        let declaration = NodeState::new(id(301), NodeClass::Variable)
            .with_type_definition(ids::PROPERTY_TYPE)
            .with_parent(ids::HAS_PROPERTY, id(101))
            .with_browse_name("Alias")
            .with_data_type(ids::STRING)
            .with_value("");
        let test_type = NodeState::new(id(101), NodeClass::ObjectType)
            .with_supertype(ids::BASE_OBJECT_TYPE)
            .with_browse_name("TestType");
        vec![declaration, test_type]
    }

    #[test]
    fn test_creates_in_dependency_order() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();

        // Child listed before its parent.
        let states = vec![folder(2, id(1)), folder(1, ids::OBJECTS_FOLDER)];
        let report = update_nodes(&mut space, &factory, states);

        assert!(report.failed_nodes.is_empty());
        assert_eq!(report.added_nodes, vec![id(1), id(2)]);
        assert_eq!(space.parent(&id(2)), Some(&id(1)));
        assert!(report.model_changes[&id(1)].contains(ModelChangeVerbs::NODE_ADDED));
        assert!(report.model_changes[&ids::OBJECTS_FOLDER].contains(ModelChangeVerbs::REFERENCE_ADDED));
    }

    #[test]
    fn test_type_definition_wired_after_creation() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();

        let report = update_nodes(&mut space, &factory, test_type_states());
        assert!(report.failed_nodes.is_empty(), "{:?}", report.failed_nodes);
        assert_eq!(space.supertype(&id(101)), Some(&ids::BASE_OBJECT_TYPE));
        assert_eq!(space.parent(&id(301)), Some(&id(101)));
        assert!(space.is_subtype_of(&id(101), &ids::BASE_OBJECT_TYPE));
    }

    #[test]
    fn test_instance_gets_declared_properties() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();

        let mut states = vec![NodeState::new(id(1), NodeClass::Object)
            .with_type_definition(id(101))
            .with_parent(ids::ORGANIZES, ids::OBJECTS_FOLDER)
            .with_browse_name("TestNode1")];
        states.extend(test_type_states());

        let report = update_nodes(&mut space, &factory, states);
        assert!(report.failed_nodes.is_empty(), "{:?}", report.failed_nodes);
        assert_eq!(space.property_value(&id(1), &id(301)), Some(&Variant::from("")));
    }

    #[test]
    fn test_type_states_applied_twice() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();
        update_nodes(&mut space, &factory, test_type_states());

        let report = update_nodes(&mut space, &factory, test_type_states());
        assert!(report.is_empty(), "{report:?}");
        assert!(report.added_references.is_empty());
        assert!(report.added_nodes.is_empty());
        assert_eq!(space.children(&id(101)), vec![id(301)]);
        let subtype_edges = space
            .get_node(&ids::BASE_OBJECT_TYPE)
            .unwrap()
            .forward_references()
            .iter()
            .filter(|r| r.reference_type == ids::HAS_SUBTYPE && r.target == id(101))
            .count();
        assert_eq!(subtype_edges, 1);
        let property_edges = space
            .get_node(&id(101))
            .unwrap()
            .forward_references()
            .iter()
            .filter(|r| r.reference_type == ids::HAS_PROPERTY)
            .count();
        assert_eq!(property_edges, 1);
    }

    #[test]
    fn test_server_property_replaces_placeholder() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();

        let mut states = vec![
            NodeState::new(id(1), NodeClass::Object)
                .with_type_definition(id(101))
                .with_parent(ids::ORGANIZES, ids::OBJECTS_FOLDER)
                .with_browse_name("TestNode1"),
            NodeState::new(id(500), NodeClass::Variable)
                .with_type_definition(ids::PROPERTY_TYPE)
                .with_parent(ids::HAS_PROPERTY, id(1))
                .with_browse_name("Alias")
                .with_data_type(ids::STRING)
                .with_value("X"),
        ];
        states.extend(test_type_states());

        let report = update_nodes(&mut space, &factory, states);
        assert!(report.failed_nodes.is_empty(), "{:?}", report.failed_nodes);
        assert_eq!(space.children(&id(1)), vec![id(500)]);
        assert!(!space.contains(&NodeId::nested(&id(1), "Alias")));
        assert_eq!(space.property_value(&id(1), &id(301)), Some(&Variant::from("X")));
        assert!(report.semantic_changes.is_empty());
    }

    #[test]
    fn test_server_property_for_existing_instance() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();
        let mut states = vec![NodeState::new(id(1), NodeClass::Object)
            .with_type_definition(id(101))
            .with_parent(ids::ORGANIZES, ids::OBJECTS_FOLDER)
            .with_browse_name("TestNode1")];
        states.extend(test_type_states());
        update_nodes(&mut space, &factory, states);

        let property = NodeState::new(id(500), NodeClass::Variable)
            .with_type_definition(ids::PROPERTY_TYPE)
            .with_parent(ids::HAS_PROPERTY, id(1))
            .with_browse_name("Alias")
            .with_data_type(ids::STRING)
            .with_value("X");
        let report = update_nodes(&mut space, &factory, vec![property.clone()]);
        assert_eq!(report.added_nodes, vec![id(500)]);
        assert_eq!(report.semantic_changes, [id(1)].into_iter().collect());
        assert_eq!(space.children(&id(1)), vec![id(500)]);
        assert_eq!(space.property_value(&id(1), &id(301)), Some(&Variant::from("X")));

        // The server's node is modified in place from now on.
        let report = update_nodes(&mut space, &factory, vec![property.with_value("Y")]);
        assert_eq!(report.modified_nodes, vec![id(500)]);
        assert_eq!(space.children(&id(1)), vec![id(500)]);
        assert_eq!(space.property_value(&id(1), &id(301)), Some(&Variant::from("Y")));
    }

    #[test]
    fn test_modify_rolls_up_property_change() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();
        let mut states = vec![NodeState::new(id(1), NodeClass::Object)
            .with_type_definition(id(101))
            .with_parent(ids::ORGANIZES, ids::OBJECTS_FOLDER)
            .with_browse_name("TestNode1")];
        states.extend(test_type_states());
        update_nodes(&mut space, &factory, states);

        let property_id = NodeId::nested(&id(1), "Alias");
        let property = NodeState::new(property_id.clone(), NodeClass::Variable)
            .with_type_definition(ids::PROPERTY_TYPE)
            .with_parent(ids::HAS_PROPERTY, id(1))
            .with_browse_name("Alias")
            .with_data_type(ids::STRING)
            .with_value("X");

        let report = update_nodes(&mut space, &factory, vec![property]);
        assert_eq!(report.modified_nodes, vec![property_id]);
        assert_eq!(report.semantic_changes, [id(1)].into_iter().collect());
        assert!(report.model_changes.is_empty());
        assert_eq!(space.property_value(&id(1), &id(301)), Some(&Variant::from("X")));
    }

    #[test]
    fn test_unchanged_snapshot_reports_nothing() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();
        update_nodes(&mut space, &factory, vec![folder(1, ids::OBJECTS_FOLDER)]);

        let report = update_nodes(&mut space, &factory, vec![folder(1, ids::OBJECTS_FOLDER)]);
        assert!(report.is_empty());
    }

    #[test]
    fn test_reconciles_non_hierarchical_references() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();
        update_nodes(
            &mut space,
            &factory,
            vec![folder(1, ids::OBJECTS_FOLDER), folder(2, ids::OBJECTS_FOLDER)],
        );

        let linked = folder(1, ids::OBJECTS_FOLDER)
            .with_reference(ReferenceDescription::forward(ids::HAS_MODELLING_RULE, id(2)))
            .with_reference(ReferenceDescription::forward(ids::HAS_MODELLING_RULE, id(99)));
        let report = update_nodes(&mut space, &factory, vec![linked]);
        assert_eq!(report.added_references.len(), 1);
        assert!(report.model_changes[&id(2)].contains(ModelChangeVerbs::REFERENCE_ADDED));
        assert!(space
            .get_node(&id(1))
            .unwrap()
            .has_forward(&ids::HAS_MODELLING_RULE, &id(2)));

        let report = update_nodes(&mut space, &factory, vec![folder(1, ids::OBJECTS_FOLDER)]);
        assert_eq!(
            report.deleted_references,
            vec![(id(1), ReferenceDescription::forward(ids::HAS_MODELLING_RULE, id(2)))]
        );
        assert!(report.model_changes[&id(1)].contains(ModelChangeVerbs::REFERENCE_DELETED));
        assert_eq!(space.type_definition(&id(1)), Some(&ids::FOLDER_TYPE));
    }

    #[test]
    fn test_creation_failure_is_reported() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();

        let orphan = NodeState::new(id(1), NodeClass::Object)
            .with_type_definition(id(999))
            .with_parent(ids::ORGANIZES, ids::OBJECTS_FOLDER);
        let report = update_nodes(&mut space, &factory, vec![orphan, folder(2, ids::OBJECTS_FOLDER)]);

        assert_eq!(report.failed_nodes.len(), 1);
        assert_eq!(report.failed_nodes[0].0, id(1));
        assert!(matches!(report.failed_nodes[0].1, CoreError::WrongTypeDefinition { .. }));
        assert!(space.contains(&id(2)));
        assert!(!space.contains(&id(1)));
    }

    #[test]
    fn test_find_deleted_children() {
        let mut space = standard_space();
        let factory = GenericNodeFactory::new();
        update_nodes(
            &mut space,
            &factory,
            vec![folder(1, ids::OBJECTS_FOLDER), folder(2, ids::OBJECTS_FOLDER)],
        );

        let browsed = vec![ReferenceDescription::forward(ids::ORGANIZES, id(1))];
        let deleted = find_deleted_children(&space, &ids::OBJECTS_FOLDER, &browsed);
        assert_eq!(deleted, vec![id(2)]);
    }

    #[test]
    fn test_describe_reference_uses_fallback() {
        let space = standard_space();
        let text = describe_reference(&space, &ids::ORGANIZES, &ids::ROOT_FOLDER, &id(7));
        assert!(text.starts_with("Root Organizes "), "{text}");
        assert!(text.ends_with(&fallback_display_name(&id(7))));
    }
}
