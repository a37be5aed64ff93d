// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The address space synchronizer.
//!
//! [`AddressSpaceFetcher`] owns the local [`AddressSpace`] and the fetchers
//! that fill it. It is driven from outside:
//!
//! - callers request nodes with [`AddressSpaceFetcher::fetch_node`];
//! - the transport executes [`OutgoingRequest`]s from
//!   [`AddressSpaceFetcher::take_requests`] and returns [`Completion`]s;
//! - remote model changes arrive through
//!   [`AddressSpaceFetcher::on_model_changed`].
//!
//! Every effect visible to consumers is queued as a [`FetcherEvent`].
//! [`FetchDriver`](crate::FetchDriver) does all of this on tokio.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use nodesync_core::{
    fallback_display_name, ids, AddressSpace, DataValue, ModelChangeEvent, ModelChangeVerbs,
    NodeFactory, NodeId, NodeState, ReferenceDescription, SemanticChangeEvent, StatusCode,
};

use crate::children_fetcher::{ChildrenFetched, NodeChildrenFetcher};
use crate::config::FetcherConfig;
use crate::fetch_status::{NodeFetchStatus, NodeFetchStatusChangedItem};
use crate::fetching_node::FetchedNodes;
use crate::node_fetcher::{FetchOptions, FetchRequest, NodeFetcher};
use crate::status_tracker::NodeFetchStatusTracker;
use crate::transport::{BrowseDescription, BrowseResult, ReadValueId, ViewEvent};
use crate::updater::{find_deleted_children, update_nodes};

// =============================================================================
// Requests, Completions, Events
// =============================================================================

/// Identifies which fetcher a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTicket {
    /// A node fetch round.
    NodeFetch(u32),
    /// A children fetch round.
    Children(u64),
}

/// A transport call to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingRequest {
    /// Attribute read.
    Read {
        /// Returned with the completion.
        ticket: RequestTicket,
        /// Items to read.
        read_ids: Vec<ReadValueId>,
    },
    /// Reference browse.
    Browse {
        /// Returned with the completion.
        ticket: RequestTicket,
        /// Items to browse.
        descriptions: Vec<BrowseDescription>,
    },
}

impl OutgoingRequest {
    /// Returns the ticket.
    pub fn ticket(&self) -> RequestTicket {
        match self {
            Self::Read { ticket, .. } | Self::Browse { ticket, .. } => *ticket,
        }
    }

    /// Returns the service name, for logging.
    pub fn service(&self) -> &'static str {
        match self {
            Self::Read { .. } => "Read",
            Self::Browse { .. } => "Browse",
        }
    }

    /// Builds a completion that fails every item with `status`.
    pub fn fail(&self, status: StatusCode) -> Completion {
        match self {
            Self::Read { ticket, .. } => Completion::Read {
                ticket: *ticket,
                result: Err(status),
            },
            Self::Browse { ticket, .. } => Completion::Browse {
                ticket: *ticket,
                result: Err(status),
            },
        }
    }
}

impl From<FetchRequest> for OutgoingRequest {
    fn from(request: FetchRequest) -> Self {
        match request {
            FetchRequest::Read {
                request_id,
                read_ids,
            } => Self::Read {
                ticket: RequestTicket::NodeFetch(request_id),
                read_ids,
            },
            FetchRequest::Browse {
                request_id,
                descriptions,
            } => Self::Browse {
                ticket: RequestTicket::NodeFetch(request_id),
                descriptions,
            },
        }
    }
}

/// The result of an [`OutgoingRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// Read result.
    Read {
        /// Ticket of the request.
        ticket: RequestTicket,
        /// Values or a whole-call failure.
        result: Result<Vec<DataValue>, StatusCode>,
    },
    /// Browse result.
    Browse {
        /// Ticket of the request.
        ticket: RequestTicket,
        /// Results or a whole-call failure.
        result: Result<Vec<BrowseResult>, StatusCode>,
    },
}

/// Effects reported to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event", rename_all = "snake_case")]
pub enum FetcherEvent {
    /// Fetch completeness of nodes changed.
    StatusChanged(Vec<NodeFetchStatusChangedItem>),
    /// Nodes or references were added or deleted.
    ModelChanged(ModelChangeEvent),
    /// Attributes or properties of a node changed.
    SemanticsChanged(SemanticChangeEvent),
}

// =============================================================================
// AddressSpaceFetcher
// =============================================================================

/// Keeps a local address space in sync with a remote server.
pub struct AddressSpaceFetcher {
    space: AddressSpace,
    factory: Arc<dyn NodeFactory>,
    node_fetcher: NodeFetcher,
    children_fetcher: NodeChildrenFetcher,
    tracker: NodeFetchStatusTracker,
    channel_opened: bool,
    postponed: BTreeMap<NodeId, NodeFetchStatus>,
    events: Vec<FetcherEvent>,
}

impl std::fmt::Debug for AddressSpaceFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSpaceFetcher")
            .field("space", &self.space)
            .field("channel_opened", &self.channel_opened)
            .field("pending_tasks", &self.pending_task_count())
            .field("postponed", &self.postponed.len())
            .finish()
    }
}

impl AddressSpaceFetcher {
    /// Creates a fetcher over `space`. The channel starts closed.
    pub fn new(space: AddressSpace, factory: Arc<dyn NodeFactory>, config: &FetcherConfig) -> Self {
        Self {
            space,
            factory,
            node_fetcher: NodeFetcher::new(config.max_nodes_per_request),
            children_fetcher: NodeChildrenFetcher::new(config.max_children_per_request),
            tracker: NodeFetchStatusTracker::new(),
            channel_opened: false,
            postponed: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    /// Returns the local address space.
    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    /// Returns the local address space for observer registration.
    pub fn space_mut(&mut self) -> &mut AddressSpace {
        &mut self.space
    }

    /// Returns `true` while the channel to the server is open.
    pub fn is_channel_opened(&self) -> bool {
        self.channel_opened
    }

    /// Returns the number of nodes with a fetch in progress.
    pub fn pending_task_count(&self) -> usize {
        self.node_fetcher.pending_count() + self.children_fetcher.pending_count()
    }

    /// Returns the display name of a node, or its id if it is unknown.
    pub fn display_name(&self, node_id: &NodeId) -> String {
        self.space
            .get_node(node_id)
            .map(|node| node.display_name.clone())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| fallback_display_name(node_id))
    }

    /// Returns the fetch outcome and completeness of `node_id`.
    pub fn node_fetch_status(&self, node_id: &NodeId) -> (StatusCode, NodeFetchStatus) {
        self.tracker.get_status(&self.space, node_id)
    }

    /// Drains the transport calls issued since the last drain.
    pub fn take_requests(&mut self) -> Vec<OutgoingRequest> {
        let mut requests: Vec<OutgoingRequest> = self
            .node_fetcher
            .take_requests()
            .into_iter()
            .map(OutgoingRequest::from)
            .collect();
        requests.extend(self.children_fetcher.take_requests().into_iter().map(|r| {
            OutgoingRequest::Browse {
                ticket: RequestTicket::Children(r.request_id),
                descriptions: r.descriptions,
            }
        }));
        requests
    }

    /// Drains the events queued since the last drain.
    pub fn take_events(&mut self) -> Vec<FetcherEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // Channel
    // =========================================================================

    /// Marks the channel open, refreshes known nodes and replays postponed
    /// fetches.
    pub fn on_channel_opened(&mut self) {
        self.channel_opened = true;

        let known = reachable_instances(&self.space);
        info!(
            known = known.len(),
            postponed = self.postponed.len(),
            "Channel opened"
        );

        for node_id in known {
            self.node_fetcher.fetch(
                FetchOptions::new(node_id.clone())
                    .fetch_parent(true)
                    .force(true),
            );
            self.children_fetcher.fetch(node_id);
        }

        for (node_id, requested) in std::mem::take(&mut self.postponed) {
            if requested.node_fetched {
                self.node_fetcher
                    .fetch(FetchOptions::new(node_id.clone()).fetch_parent(true));
            }
            if requested.children_fetched {
                self.children_fetcher.fetch(node_id);
            }
        }
    }

    /// Marks the channel closed. Later fetches are postponed.
    pub fn on_channel_closed(&mut self) {
        info!("Channel closed");
        self.channel_opened = false;
    }

    // =========================================================================
    // Fetch Requests
    // =========================================================================

    /// Requests that `node_id` reach at least `requested` completeness.
    ///
    /// Parts that are already fetched are not fetched again. The outcome is
    /// reported as [`FetcherEvent::StatusChanged`].
    pub fn fetch_node(&mut self, node_id: &NodeId, requested: NodeFetchStatus) {
        if node_id.is_null() || requested.is_empty() {
            return;
        }
        if !self.channel_opened {
            debug!(node_id = %node_id, requested = %requested, "Fetch postponed");
            *self.postponed.entry(node_id.clone()).or_default() |= requested;
            return;
        }

        let (_, status) = self.tracker.get_status(&self.space, node_id);
        if requested.node_fetched && !status.node_fetched {
            self.node_fetcher
                .fetch(FetchOptions::new(node_id.clone()).fetch_parent(true));
        }
        if requested.children_fetched && !status.children_fetched {
            self.children_fetcher.fetch(node_id.clone());
        }
    }

    /// Applies a remote view event.
    pub fn on_view_event(&mut self, event: ViewEvent) {
        match event {
            ViewEvent::ModelChanged(event) => self.on_model_changed(event),
            ViewEvent::SemanticsChanged(event) => self.on_node_semantics_changed(event),
        }
    }

    /// Applies a remote model change and forwards it.
    pub fn on_model_changed(&mut self, event: ModelChangeEvent) {
        if event.verbs.contains(ModelChangeVerbs::NODE_DELETED) {
            info!(node_id = %event.node_id, "Node deleted");
            self.delete_node(&event.node_id);
        } else {
            if event.verbs.contains(ModelChangeVerbs::NODE_ADDED) {
                info!(node_id = %event.node_id, "Node added");
            }
            let references_changed = event
                .verbs
                .intersects(ModelChangeVerbs::REFERENCE_ADDED | ModelChangeVerbs::REFERENCE_DELETED);
            if references_changed && self.space.contains(&event.node_id) {
                info!(node_id = %event.node_id, "Fetch references");
                self.node_fetcher.fetch(
                    FetchOptions::new(event.node_id.clone())
                        .fetch_parent(true)
                        .force(true),
                );
                self.children_fetcher.fetch(event.node_id.clone());
            }
        }
        self.events.push(FetcherEvent::ModelChanged(event));
    }

    /// Refetches a known node whose attributes changed remotely.
    pub fn on_node_semantics_changed(&mut self, event: SemanticChangeEvent) {
        info!(node_id = %event.node_id, "Node semantics changed");
        if self.space.contains(&event.node_id) {
            self.node_fetcher
                .fetch(FetchOptions::new(event.node_id).force(true));
        }
    }

    /// Removes a node and its descendants and cancels their fetches.
    pub fn delete_node(&mut self, node_id: &NodeId) {
        let mut released = FetchedNodes::default();
        for id in subtree(&self.space, node_id) {
            released.extend(self.node_fetcher.cancel(&id));
            self.children_fetcher.cancel(&id);
        }

        let changed = self.tracker.delete(&self.space, node_id);
        self.push_status(changed);
        self.space.delete_node(node_id);

        if !released.is_empty() {
            self.on_fetch_completed(released);
        }
    }

    // =========================================================================
    // Completions
    // =========================================================================

    /// Applies the result of an [`OutgoingRequest`].
    pub fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Read {
                ticket: RequestTicket::NodeFetch(request_id),
                result,
            } => {
                let fetched = self
                    .node_fetcher
                    .on_read_result(&self.space, request_id, result);
                self.on_fetch_completed(fetched);
            }
            Completion::Browse {
                ticket: RequestTicket::NodeFetch(request_id),
                result,
            } => {
                let fetched = self
                    .node_fetcher
                    .on_browse_result(&self.space, request_id, result);
                self.on_fetch_completed(fetched);
            }
            Completion::Browse {
                ticket: RequestTicket::Children(request_id),
                result,
            } => {
                for fetched in self.children_fetcher.on_browse_result(request_id, result) {
                    self.on_children_fetched(fetched);
                }
            }
            Completion::Read {
                ticket: RequestTicket::Children(request_id),
                ..
            } => {
                warn!(request_id, "Read completion for a children round ignored");
            }
        }
    }

    fn on_fetch_completed(&mut self, fetched: FetchedNodes) {
        if fetched.is_empty() {
            return;
        }
        let FetchedNodes { mut nodes, errors } = fetched;
        info!(count = nodes.len(), "Nodes fetched");
        if !errors.is_empty() {
            warn!(count = errors.len(), "Node fetch errors");
            for (node_id, status) in &errors {
                debug!(node_id = %node_id, status = %status, "Node fetch error");
            }
        }

        for state in &mut nodes {
            fill_missing_parent(&self.space, state);
        }
        let node_ids: Vec<NodeId> = nodes.iter().map(|s| s.node_id.clone()).collect();

        let report = update_nodes(&mut self.space, self.factory.as_ref(), nodes);

        let failed: BTreeSet<&NodeId> = report.failed_nodes.iter().map(|(id, _)| id).collect();
        let mut statuses = errors;
        for node_id in node_ids {
            if !failed.contains(&node_id) && self.space.contains(&node_id) {
                statuses.push((node_id, StatusCode::GOOD));
            }
        }
        for (node_id, error) in &report.failed_nodes {
            statuses.push((node_id.clone(), StatusCode::from(error)));
        }

        if !statuses.is_empty() {
            let changed = self.tracker.on_nodes_fetched(&self.space, &statuses);
            self.push_status(changed);
        }

        for (node_id, verbs) in &report.model_changes {
            if let Some(node) = self.space.get_node(node_id) {
                let type_definition_id = node.type_definition().cloned().unwrap_or_default();
                self.events.push(FetcherEvent::ModelChanged(ModelChangeEvent::new(
                    node_id.clone(),
                    type_definition_id,
                    *verbs,
                )));
            }
        }
        for node_id in &report.semantic_changes {
            if self.space.contains(node_id) {
                self.events
                    .push(FetcherEvent::SemanticsChanged(SemanticChangeEvent::new(
                        node_id.clone(),
                    )));
            }
        }
    }

    fn on_children_fetched(&mut self, fetched: ChildrenFetched) {
        let ChildrenFetched {
            node_id,
            status,
            references,
        } = fetched;

        if status.is_good() {
            // Children can arrive before the node itself.
            if self.space.contains(&node_id) {
                let organizes: Vec<ReferenceDescription> = references
                    .targets(&ids::ORGANIZES)
                    .map(|targets| {
                        targets
                            .iter()
                            .map(|(target, rt)| ReferenceDescription::forward(rt.clone(), target.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                for child_id in find_deleted_children(&self.space, &node_id, &organizes) {
                    let type_definition_id = self
                        .space
                        .type_definition(&child_id)
                        .cloned()
                        .unwrap_or_default();
                    info!(parent_id = %node_id, child_id = %child_id, "Child node was deleted");
                    self.delete_node(&child_id);
                    self.events.push(FetcherEvent::ModelChanged(ModelChangeEvent::new(
                        child_id,
                        type_definition_id,
                        ModelChangeVerbs::NODE_DELETED,
                    )));
                }
            }
        } else {
            warn!(node_id = %node_id, status = %status, "Children fetch failed");
        }

        let references = references.references();
        let update = self
            .tracker
            .on_children_fetched(&self.space, &node_id, &references);
        self.push_status(update.changed);

        let child_types: BTreeMap<&NodeId, &NodeId> = references
            .iter()
            .map(|r| (&r.node_id, &r.reference_type_id))
            .collect();
        let forced: BTreeSet<NodeId> = update.fetch_requests.into_iter().collect();

        for id in &forced {
            let mut options = FetchOptions::new(id.clone()).fetch_parent(true).force(true);
            if let Some(rt) = child_types.get(id) {
                options = options.parent((*rt).clone(), node_id.clone());
            }
            self.node_fetcher.fetch(options);
        }
        for reference in &references {
            if self.space.contains(&reference.node_id) || forced.contains(&reference.node_id) {
                continue;
            }
            self.node_fetcher.fetch(
                FetchOptions::new(reference.node_id.clone())
                    .parent(reference.reference_type_id.clone(), node_id.clone()),
            );
        }
    }

    fn push_status(&mut self, items: Vec<NodeFetchStatusChangedItem>) {
        if !items.is_empty() {
            self.events.push(FetcherEvent::StatusChanged(items));
        }
    }
}

/// Copies the known parent edge into a snapshot that has none.
fn fill_missing_parent(space: &AddressSpace, state: &mut NodeState) {
    if !state.parent_id.is_null() || !state.supertype_id.is_null() {
        return;
    }
    let Some(parent) = space.parent_reference(&state.node_id) else {
        return;
    };
    if space.is_subtype_of(&parent.reference_type, &ids::HAS_SUBTYPE) {
        state.supertype_id = parent.target.clone();
    } else {
        state.parent_id = parent.target.clone();
        state.reference_type_id = parent.reference_type.clone();
    }
}

/// Instances reachable from Root through hierarchical non-property
/// references, Root first.
fn reachable_instances(space: &AddressSpace) -> Vec<NodeId> {
    let mut result = Vec::new();
    if !space.contains(&ids::ROOT_FOLDER) {
        return result;
    }
    let mut visited = BTreeSet::new();
    let mut stack = vec![ids::ROOT_FOLDER];
    while let Some(node_id) = stack.pop() {
        if !visited.insert(node_id.clone()) {
            continue;
        }
        let Some(node) = space.get_node(&node_id) else {
            continue;
        };
        for reference in node.forward_references().iter().rev() {
            let is_type = space
                .get_node(&reference.target)
                .is_some_and(|target| target.is_type_definition());
            if !is_type
                && space.is_hierarchical(&reference.reference_type)
                && !space.is_subtype_of(&reference.reference_type, &ids::HAS_PROPERTY)
            {
                stack.push(reference.target.clone());
            }
        }
        result.push(node_id);
    }
    result
}

/// The node and its hierarchical descendants.
fn subtree(space: &AddressSpace, node_id: &NodeId) -> Vec<NodeId> {
    let mut visited = BTreeSet::new();
    let mut result = Vec::new();
    let mut stack = vec![node_id.clone()];
    while let Some(id) = stack.pop() {
        if !visited.insert(id.clone()) {
            continue;
        }
        stack.extend(space.children(&id));
        result.push(id);
    }
    result
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{test_server_space, MemoryServer};
    use nodesync_core::{GenericNodeFactory, StandardCatalog, Variant};

    fn id(value: u32) -> NodeId {
        NodeId::numeric(1, value)
    }

    fn client() -> AddressSpaceFetcher {
        let mut space = AddressSpace::new();
        StandardCatalog::standard().install(&mut space).unwrap();
        AddressSpaceFetcher::new(
            space,
            Arc::new(GenericNodeFactory::new()),
            &FetcherConfig::default(),
        )
    }

    /// Serves requests until the fetcher is idle.
    fn run(fetcher: &mut AddressSpaceFetcher, server: &MemoryServer) -> Vec<FetcherEvent> {
        loop {
            let requests = fetcher.take_requests();
            if requests.is_empty() {
                return fetcher.take_events();
            }
            for request in requests {
                fetcher.on_completion(server.complete(&request));
            }
        }
    }

    fn status_items(events: &[FetcherEvent]) -> Vec<NodeFetchStatusChangedItem> {
        events
            .iter()
            .filter_map(|e| match e {
                FetcherEvent::StatusChanged(items) => Some(items.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn test_fetch_postponed_until_channel_opened() {
        let server = MemoryServer::new(test_server_space());
        let mut fetcher = client();

        fetcher.fetch_node(&id(1), NodeFetchStatus::node_only());
        assert!(fetcher.take_requests().is_empty());

        fetcher.on_channel_opened();
        run(&mut fetcher, &server);
        assert!(fetcher.space().contains(&id(1)));
        assert_eq!(
            fetcher.node_fetch_status(&id(1)),
            (StatusCode::GOOD, NodeFetchStatus::node_only())
        );
    }

    #[test]
    fn test_fetch_node_creates_node_with_properties() {
        let server = MemoryServer::new(test_server_space());
        let mut fetcher = client();
        fetcher.on_channel_opened();
        run(&mut fetcher, &server);

        fetcher.fetch_node(&id(1), NodeFetchStatus::node_only());
        let events = run(&mut fetcher, &server);

        let space = fetcher.space();
        let node = space.get_node(&id(1)).unwrap();
        assert_eq!(node.browse_name.name, "TestNode1");
        assert_eq!(space.type_definition(&id(1)), Some(&id(101)));
        assert_eq!(space.property_value(&id(1), &id(301)), Some(&Variant::from("X")));
        assert_eq!(fetcher.pending_task_count(), 0);

        let items = status_items(&events);
        assert!(items
            .iter()
            .any(|item| item.node_id == id(1) && item.fetch_status.node_fetched));
    }

    #[test]
    fn test_unknown_node_reports_error() {
        let server = MemoryServer::new(test_server_space());
        let mut fetcher = client();
        fetcher.on_channel_opened();
        run(&mut fetcher, &server);

        fetcher.fetch_node(&id(9999), NodeFetchStatus::node_only());
        let events = run(&mut fetcher, &server);

        let items = status_items(&events);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].status, StatusCode::BAD_NODE_ID_UNKNOWN);
        assert_eq!(items[0].fetch_status, NodeFetchStatus::node_and_children());
        assert!(!fetcher.space().contains(&id(9999)));
    }

    #[test]
    fn test_children_fetch_removes_deleted_children() {
        let server = MemoryServer::new(test_server_space());
        let mut fetcher = client();
        fetcher.on_channel_opened();
        run(&mut fetcher, &server);
        assert!(fetcher.space().contains(&id(2)));

        server.delete_node(&id(2));
        fetcher.on_model_changed(ModelChangeEvent::new(
            ids::OBJECTS_FOLDER,
            ids::FOLDER_TYPE,
            ModelChangeVerbs::REFERENCE_DELETED,
        ));
        let events = run(&mut fetcher, &server);

        assert!(!fetcher.space().contains(&id(2)));
        assert!(events.iter().any(|e| matches!(
            e,
            FetcherEvent::ModelChanged(event)
                if event.node_id == id(2) && event.verbs.contains(ModelChangeVerbs::NODE_DELETED)
        )));
    }

    #[test]
    fn test_node_deleted_event() {
        let server = MemoryServer::new(test_server_space());
        let mut fetcher = client();
        fetcher.on_channel_opened();
        fetcher.fetch_node(&id(3), NodeFetchStatus::node_and_children());
        run(&mut fetcher, &server);
        assert!(fetcher.space().contains(&id(4)));

        fetcher.on_model_changed(ModelChangeEvent::new(
            id(3),
            ids::FOLDER_TYPE,
            ModelChangeVerbs::NODE_DELETED,
        ));
        let events = fetcher.take_events();

        assert!(!fetcher.space().contains(&id(3)));
        assert!(!fetcher.space().contains(&id(4)));
        assert!(matches!(&events[..], [.., FetcherEvent::ModelChanged(e)] if e.node_id == id(3)));
    }

    #[test]
    fn test_read_completion_for_children_ignored() {
        let mut fetcher = client();
        fetcher.on_completion(Completion::Read {
            ticket: RequestTicket::Children(1),
            result: Ok(Vec::new()),
        });
        assert!(fetcher.take_events().is_empty());
    }

    #[test]
    fn test_reachable_instances_skip_types() {
        let fetcher = client();
        let known = reachable_instances(fetcher.space());
        assert_eq!(known.first(), Some(&ids::ROOT_FOLDER));
        assert!(known.contains(&ids::OBJECTS_FOLDER));
        assert!(!known.contains(&ids::BASE_OBJECT_TYPE));
        assert!(!known.contains(&ids::ORGANIZES));
    }

    #[test]
    fn test_display_name_fallback() {
        let fetcher = client();
        assert_eq!(fetcher.display_name(&ids::ROOT_FOLDER), "Root");
        assert_eq!(fetcher.display_name(&id(77)), fallback_display_name(&id(77)));
    }
}
