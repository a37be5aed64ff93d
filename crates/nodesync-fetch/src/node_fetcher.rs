// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batched attribute and reference fetching.
//!
//! [`NodeFetcher`] is a synchronous state machine. Callers queue nodes with
//! [`NodeFetcher::fetch`], drain the resulting [`FetchRequest`]s with
//! [`NodeFetcher::take_requests`], execute them on a transport, and feed the
//! results back through [`NodeFetcher::on_read_result`] and
//! [`NodeFetcher::on_browse_result`].
//!
//! Every id discovered while applying results (reference types, targets,
//! data types, children) that is not known locally becomes a dependency and
//! is fetched as well. A node is only handed out once its whole dependency
//! closure is fetched, so the batch can be merged into the address space in
//! one pass.
//!
//! # Request Window
//!
//! At most one round is in flight. A round is one Read and one Browse call
//! covering up to `max_nodes_per_request` nodes; the next round starts after
//! both calls completed.

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use nodesync_core::{
    ids, AttributeId, DataValue, NodeClass, NodeId, NodeLookup, NodeSyncError,
    ReferenceDescription, StatusCode, TransportError,
};

use crate::config::DEFAULT_MAX_NODES_PER_REQUEST;
use crate::fetching_node::{FetchQueue, FetchedNodes, FetchingNode, FetchingNodeGraph};
use crate::transport::{BrowseDescription, BrowseResult, ReadValueId};

// =============================================================================
// FetchOptions
// =============================================================================

/// Parameters of one [`NodeFetcher::fetch`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Node to fetch.
    pub node_id: NodeId,

    /// Browse the parent even if it is already known.
    pub fetch_parent: bool,

    /// Parent known to the caller, null if unknown.
    pub parent_id: NodeId,

    /// Reference type from `parent_id`, null if unknown.
    pub reference_type_id: NodeId,

    /// Refetch even if the node already has a fetch in progress.
    pub force: bool,
}

impl FetchOptions {
    /// Creates options for an unforced fetch with an unknown parent.
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            fetch_parent: false,
            parent_id: NodeId::null(),
            reference_type_id: NodeId::null(),
            force: false,
        }
    }

    /// Sets whether the parent is browsed.
    pub fn fetch_parent(mut self, fetch_parent: bool) -> Self {
        self.fetch_parent = fetch_parent;
        self
    }

    /// Sets the known parent.
    pub fn parent(mut self, reference_type_id: NodeId, parent_id: NodeId) -> Self {
        self.reference_type_id = reference_type_id;
        self.parent_id = parent_id;
        self
    }

    /// Sets whether the fetch is forced.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

// =============================================================================
// FetchRequest
// =============================================================================

/// A transport call the fetcher wants executed.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchRequest {
    /// Attribute read of one round.
    Read {
        /// Round id, passed back with the result.
        request_id: u32,
        /// Items to read.
        read_ids: Vec<ReadValueId>,
    },

    /// Reference browse of one round.
    Browse {
        /// Round id, passed back with the result.
        request_id: u32,
        /// Items to browse.
        descriptions: Vec<BrowseDescription>,
    },
}

impl FetchRequest {
    /// Returns the round id.
    pub fn request_id(&self) -> u32 {
        match self {
            Self::Read { request_id, .. } | Self::Browse { request_id, .. } => *request_id,
        }
    }
}

#[derive(Debug)]
struct RequestWindow {
    request_id: u32,
    read_ids: Vec<ReadValueId>,
    descriptions: Vec<BrowseDescription>,
    read_pending: bool,
    browse_pending: bool,
    started: Instant,
}

// =============================================================================
// NodeFetcher
// =============================================================================

/// Fetches node attributes and references in batched rounds.
#[derive(Debug)]
pub struct NodeFetcher {
    max_nodes_per_request: usize,
    graph: FetchingNodeGraph,
    queue: FetchQueue,
    window: Option<RequestWindow>,
    next_request_id: u32,
    next_pending_sequence: u64,
    requests: Vec<FetchRequest>,
}

impl Default for NodeFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NODES_PER_REQUEST)
    }
}

impl NodeFetcher {
    /// Creates a fetcher that puts at most `max_nodes_per_request` nodes in
    /// one round.
    pub fn new(max_nodes_per_request: usize) -> Self {
        Self {
            max_nodes_per_request: max_nodes_per_request.max(1),
            graph: FetchingNodeGraph::new(),
            queue: FetchQueue::default(),
            window: None,
            next_request_id: 0,
            next_pending_sequence: 0,
            requests: Vec::new(),
        }
    }

    /// Returns the number of nodes whose fetch is not complete.
    pub fn pending_count(&self) -> usize {
        self.graph.len()
    }

    /// Returns `true` if `node_id` has a fetch in progress.
    pub fn is_fetching(&self, node_id: &NodeId) -> bool {
        self.graph.contains(node_id)
    }

    /// Returns the in-progress state of `node_id`.
    pub fn fetching_node(&self, node_id: &NodeId) -> Option<&FetchingNode> {
        self.graph.find(node_id)
    }

    /// Returns `true` if a round is in flight.
    pub fn is_busy(&self) -> bool {
        self.window.is_some()
    }

    /// Drains the calls issued since the last drain.
    pub fn take_requests(&mut self) -> Vec<FetchRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Queues a node.
    ///
    /// An unforced fetch of a node that already started is a no-op. A
    /// forced fetch drops the in-flight results of the node and queues it
    /// again. A parent and reference type given in `options` become
    /// dependencies of the node when its attributes arrive.
    pub fn fetch(&mut self, options: FetchOptions) {
        if options.node_id.is_null() {
            return;
        }
        let sequence = self.next_pending_sequence;
        self.next_pending_sequence += 1;

        let node = self.graph.add_node(options.node_id.clone());
        node.fetch_parent |= options.fetch_parent;
        if !options.parent_id.is_null() {
            node.state.parent_id = options.parent_id;
            node.state.reference_type_id = options.reference_type_id;
        }

        debug!(node_id = %options.node_id, force = options.force, "Node fetch requested");
        self.fetch_node(&options.node_id, sequence, options.force);
    }

    /// Drops a node from the fetch.
    ///
    /// Late results for the node are ignored. Returns nodes that were only
    /// waiting on it.
    pub fn cancel(&mut self, node_id: &NodeId) -> FetchedNodes {
        let Some(mut node) = self.graph.remove_node(node_id) else {
            return FetchedNodes::default();
        };
        self.queue.erase(&mut node);
        debug!(node_id = %node_id, "Node fetch cancelled");
        self.graph.get_fetched_nodes()
    }

    fn fetch_node(&mut self, node_id: &NodeId, sequence: u64, force: bool) {
        let Some(node) = self.graph.find_mut(node_id) else {
            return;
        };
        if node.fetch_started {
            if !force {
                return;
            }
            node.reset_fetch();
        }
        node.force |= force;
        node.pending_sequence = sequence;
        self.queue.push(node);
        self.start_round();
    }

    fn next_request_id(&mut self) -> u32 {
        self.next_request_id = self.next_request_id.wrapping_add(1);
        if self.next_request_id == 0 {
            self.next_request_id = 1;
        }
        self.next_request_id
    }

    fn start_round(&mut self) {
        if self.window.is_some() || self.queue.is_empty() {
            return;
        }

        let request_id = self.next_request_id();
        let mut read_ids = Vec::new();
        let mut descriptions = Vec::new();
        let mut count = 0;

        while count < self.max_nodes_per_request {
            let Some(node_id) = self.queue.pop() else {
                break;
            };
            let Some(node) = self.graph.find_mut(&node_id) else {
                continue;
            };
            node.queue_key = None;
            node.fetch_started = true;
            node.fetch_request_id = request_id;

            let reads_before = read_ids.len();
            push_read_ids(node, &mut read_ids);
            if read_ids.len() == reads_before {
                node.attributes_fetched = true;
            }

            let browses_before = descriptions.len();
            push_browse_descriptions(node, &mut descriptions);
            if descriptions.len() == browses_before {
                node.references_fetched = true;
            }
            count += 1;
        }

        if count == 0 {
            return;
        }

        info!(
            request_id,
            count,
            reads = read_ids.len(),
            browses = descriptions.len(),
            "Node fetch round started"
        );

        if !read_ids.is_empty() {
            self.requests.push(FetchRequest::Read {
                request_id,
                read_ids: read_ids.clone(),
            });
        }
        if !descriptions.is_empty() {
            self.requests.push(FetchRequest::Browse {
                request_id,
                descriptions: descriptions.clone(),
            });
        }
        self.window = Some(RequestWindow {
            request_id,
            read_pending: !read_ids.is_empty(),
            browse_pending: !descriptions.is_empty(),
            read_ids,
            descriptions,
            started: Instant::now(),
        });
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Applies the result of a Read call.
    pub fn on_read_result(
        &mut self,
        lookup: &dyn NodeLookup,
        request_id: u32,
        result: Result<Vec<DataValue>, StatusCode>,
    ) -> FetchedNodes {
        let Some(window) = self
            .window
            .as_mut()
            .filter(|w| w.request_id == request_id && w.read_pending)
        else {
            info!(request_id, "Stale read result dropped");
            return FetchedNodes::default();
        };
        window.read_pending = false;
        let read_ids = std::mem::take(&mut window.read_ids);

        let values = match check_result_count("Read", read_ids.len(), result) {
            Ok(values) => values,
            Err(status) => read_ids.iter().map(|_| DataValue::bad(status)).collect(),
        };

        let nodes: BTreeSet<NodeId> = read_ids.iter().map(|r| r.node_id.clone()).collect();
        for (read_id, value) in read_ids.into_iter().zip(values) {
            self.apply_read_value(lookup, request_id, read_id, value);
        }
        for node_id in &nodes {
            let Some(node) = self.live_node(node_id, request_id) else {
                continue;
            };
            node.attributes_fetched = true;
            let parent_id = node.state.parent_id.clone();
            let reference_type_id = node.state.reference_type_id.clone();
            self.validate_dependency(lookup, node_id, &reference_type_id);
            self.validate_dependency(lookup, node_id, &parent_id);
        }

        self.complete_window_half()
    }

    /// Applies the result of a Browse call.
    pub fn on_browse_result(
        &mut self,
        lookup: &dyn NodeLookup,
        request_id: u32,
        result: Result<Vec<BrowseResult>, StatusCode>,
    ) -> FetchedNodes {
        let Some(window) = self
            .window
            .as_mut()
            .filter(|w| w.request_id == request_id && w.browse_pending)
        else {
            info!(request_id, "Stale browse result dropped");
            return FetchedNodes::default();
        };
        window.browse_pending = false;
        let descriptions = std::mem::take(&mut window.descriptions);

        let results = match check_result_count("Browse", descriptions.len(), result) {
            Ok(results) => results,
            Err(status) => descriptions.iter().map(|_| BrowseResult::bad(status)).collect(),
        };

        let nodes: BTreeSet<NodeId> = descriptions.iter().map(|d| d.node_id.clone()).collect();
        for (description, result) in descriptions.into_iter().zip(results) {
            self.apply_browse_result(lookup, request_id, description, result);
        }
        for node_id in &nodes {
            if let Some(node) = self.live_node(node_id, request_id) {
                node.references_fetched = true;
            }
        }

        self.complete_window_half()
    }

    fn complete_window_half(&mut self) -> FetchedNodes {
        if self
            .window
            .as_ref()
            .is_some_and(|w| !w.read_pending && !w.browse_pending)
        {
            if let Some(window) = self.window.take() {
                info!(
                    request_id = window.request_id,
                    elapsed_ms = window.started.elapsed().as_millis() as u64,
                    "Node fetch round completed"
                );
            }
        }

        let fetched = self.graph.get_fetched_nodes();
        if !fetched.is_empty() {
            debug!(
                nodes = fetched.nodes.len(),
                errors = fetched.errors.len(),
                "Nodes fetched"
            );
        }
        self.start_round();
        fetched
    }

    fn live_node(&mut self, node_id: &NodeId, request_id: u32) -> Option<&mut FetchingNode> {
        self.graph
            .find_mut(node_id)
            .filter(|n| n.fetch_started && n.fetch_request_id == request_id)
    }

    fn apply_read_value(
        &mut self,
        lookup: &dyn NodeLookup,
        request_id: u32,
        read_id: ReadValueId,
        value: DataValue,
    ) {
        let node_id = read_id.node_id;
        let Some(node) = self.live_node(&node_id, request_id) else {
            info!(node_id = %node_id, request_id, "Stale read value dropped");
            return;
        };

        if value.status.is_bad() {
            if read_id.attribute_id == AttributeId::BrowseName {
                node.status = value.status;
            }
            debug!(
                node_id = %node_id,
                attribute = ?read_id.attribute_id,
                status = %value.status,
                "Attribute read failed"
            );
            return;
        }

        match read_id.attribute_id {
            AttributeId::NodeClass => {
                match value
                    .value
                    .as_i64()
                    .and_then(|v| u32::try_from(v).ok())
                    .and_then(NodeClass::from_value)
                {
                    Some(node_class) => node.state.node_class = node_class,
                    None => warn!(node_id = %node_id, value = ?value.value, "Invalid node class"),
                }
            }
            AttributeId::BrowseName => {
                if let Some(browse_name) = value.value.to_qualified_name() {
                    node.state.attributes.browse_name = browse_name;
                }
            }
            AttributeId::DisplayName => {
                if let Some(display_name) = value.value.as_str() {
                    node.state.attributes.display_name = display_name.to_string();
                }
            }
            AttributeId::DataType => {
                if let Some(data_type) = value.value.as_node_id().cloned() {
                    node.state.attributes.data_type = data_type.clone();
                    self.validate_dependency(lookup, &node_id, &data_type);
                }
            }
            AttributeId::Value => {
                node.state.attributes.value = Some(value.value);
            }
            _ => {}
        }
    }

    fn apply_browse_result(
        &mut self,
        lookup: &dyn NodeLookup,
        request_id: u32,
        description: BrowseDescription,
        result: BrowseResult,
    ) {
        let node_id = description.node_id;
        let Some(node) = self.live_node(&node_id, request_id) else {
            info!(node_id = %node_id, request_id, "Stale browse result dropped");
            return;
        };

        if result.status_code.is_bad() {
            node.status = result.status_code;
            debug!(
                node_id = %node_id,
                reference_type = %description.reference_type_id,
                status = %result.status_code,
                "Browse failed"
            );
            return;
        }

        for reference in result.references {
            if reference.reference_type_id.is_null() || reference.node_id.is_null() {
                warn!(
                    node_id = %node_id,
                    reference_type = %reference.reference_type_id,
                    target = %reference.node_id,
                    "Reference with null type or target skipped"
                );
                continue;
            }
            self.add_fetched_reference(lookup, &node_id, &description.reference_type_id, reference);
        }
    }

    fn add_fetched_reference(
        &mut self,
        lookup: &dyn NodeLookup,
        node_id: &NodeId,
        browsed_type: &NodeId,
        reference: ReferenceDescription,
    ) {
        self.validate_dependency(lookup, node_id, &reference.reference_type_id);

        let Some(node) = self.graph.find_mut(node_id) else {
            return;
        };

        if !reference.forward {
            if reference.reference_type_id == ids::HAS_SUBTYPE {
                node.state.supertype_id = reference.node_id.clone();
            } else {
                node.state.parent_id = reference.node_id.clone();
                node.state.reference_type_id = reference.reference_type_id.clone();
            }
            self.validate_dependency(lookup, node_id, &reference.node_id);
            return;
        }

        if *browsed_type == ids::AGGREGATES {
            self.add_child(lookup, node_id, reference);
            return;
        }

        if reference.reference_type_id == ids::HAS_TYPE_DEFINITION {
            node.state.type_definition_id = reference.node_id.clone();
        } else if !node.state.references.contains(&reference) {
            node.state.references.push(reference.clone());
        }
        self.validate_dependency(lookup, node_id, &reference.node_id);
    }

    fn add_child(
        &mut self,
        lookup: &dyn NodeLookup,
        parent_id: &NodeId,
        reference: ReferenceDescription,
    ) {
        let child_id = reference.node_id;
        if child_id == *parent_id {
            warn!(node_id = %parent_id, "Node aggregates itself");
            return;
        }
        let Some(parent) = self.graph.find(parent_id) else {
            return;
        };
        let sequence = parent.pending_sequence;
        let force = parent.force;
        let parent_is_type = parent.state.node_class.is_type_definition();

        let is_property = reference.reference_type_id == ids::HAS_PROPERTY;
        let child = self.graph.add_node(child_id.clone());
        child.state.parent_id = parent_id.clone();
        child.state.reference_type_id = reference.reference_type_id;
        child.force |= force;
        if is_property {
            child.state.node_class = NodeClass::Variable;
            child.state.type_definition_id = ids::PROPERTY_TYPE;
            child.is_property = true;
            child.is_declaration = parent_is_type;
        }

        self.graph.add_dependency(&child_id, parent_id);
        self.graph.add_dependency(parent_id, &child_id);
        self.fetch_node(&child_id, sequence, false);

        if is_property {
            self.validate_dependency(lookup, &child_id, &ids::PROPERTY_TYPE);
        }
    }

    /// Makes `from_id` wait for `dependency_id` unless it is known locally.
    fn validate_dependency(
        &mut self,
        lookup: &dyn NodeLookup,
        from_id: &NodeId,
        dependency_id: &NodeId,
    ) {
        if dependency_id.is_null() || dependency_id == from_id || lookup.contains_node(dependency_id) {
            return;
        }
        let Some(from) = self.graph.find(from_id) else {
            return;
        };
        let sequence = from.pending_sequence;
        let force = from.force;

        let dependency = self.graph.add_node(dependency_id.clone());
        dependency.force |= force;
        self.graph.add_dependency(from_id, dependency_id);
        self.fetch_node(dependency_id, sequence, false);
    }
}

// =============================================================================
// Request Building
// =============================================================================

fn push_read_ids(node: &FetchingNode, read_ids: &mut Vec<ReadValueId>) {
    let node_id = node.node_id();
    let instance_property = node.is_property && !node.is_declaration;

    read_ids.push(ReadValueId::new(node_id.clone(), AttributeId::BrowseName));
    read_ids.push(ReadValueId::new(node_id.clone(), AttributeId::DisplayName));
    if !instance_property {
        read_ids.push(ReadValueId::new(node_id.clone(), AttributeId::NodeClass));
    }
    read_ids.push(ReadValueId::new(node_id.clone(), AttributeId::DataType));
    if node.is_property {
        read_ids.push(ReadValueId::new(node_id.clone(), AttributeId::Value));
    }
}

fn push_browse_descriptions(node: &FetchingNode, descriptions: &mut Vec<BrowseDescription>) {
    let node_id = node.node_id();
    let state = &node.state;
    let instance_property = node.is_property && !node.is_declaration;

    if !node.is_property {
        descriptions.push(BrowseDescription::forward(node_id.clone(), ids::AGGREGATES));
    }
    if !instance_property {
        descriptions.push(BrowseDescription::forward(
            node_id.clone(),
            ids::NON_HIERARCHICAL_REFERENCES,
        ));
    }
    let parent_unknown = *node_id != ids::ROOT_FOLDER
        && state.parent_id.is_null()
        && state.reference_type_id.is_null();
    if node.fetch_parent || parent_unknown {
        descriptions.push(BrowseDescription::inverse(
            node_id.clone(),
            ids::HIERARCHICAL_REFERENCES,
        ));
    }
}

/// Turns a count mismatch into a whole-call failure.
fn check_result_count<T>(
    service: &'static str,
    expected: usize,
    result: Result<Vec<T>, StatusCode>,
) -> Result<Vec<T>, StatusCode> {
    match result {
        Ok(items) if items.len() == expected => Ok(items),
        Ok(items) => {
            NodeSyncError::transport(TransportError::result_mismatch(
                service,
                expected,
                items.len(),
            ))
            .log("node fetch");
            Err(StatusCode::BAD_UNEXPECTED_ERROR)
        }
        Err(status) => {
            warn!(service, status = %status, "Node fetch call failed");
            Err(status)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
