// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Hierarchical child enumeration.
//!
//! [`NodeChildrenFetcher`] browses the Organizes and HasSubtype children of
//! queued nodes in rounds and hands the grouped references back. Whether a
//! child is new or deleted is decided by the caller.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::time::Instant;

use tracing::{debug, info, warn};

use nodesync_core::{ids, NodeId, ReferenceDescription, StatusCode};

use crate::config::DEFAULT_MAX_CHILDREN_PER_REQUEST;
use crate::transport::{BrowseDescription, BrowseResult};

// =============================================================================
// ReferenceMap
// =============================================================================

/// Browse results of one node: browsed reference type to
/// (target, actual reference type).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceMap(BTreeMap<NodeId, BTreeMap<NodeId, NodeId>>);

impl ReferenceMap {
    /// Records a forward reference found by browsing `browsed_type`.
    pub fn insert(&mut self, browsed_type: NodeId, target: NodeId, reference_type_id: NodeId) {
        self.0
            .entry(browsed_type)
            .or_default()
            .insert(target, reference_type_id);
    }

    /// Returns the targets found by browsing `browsed_type`.
    pub fn targets(&self, browsed_type: &NodeId) -> Option<&BTreeMap<NodeId, NodeId>> {
        self.0.get(browsed_type)
    }

    /// Returns `true` if nothing was found.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(BTreeMap::is_empty)
    }

    /// Flattens the map into forward reference descriptions.
    pub fn references(&self) -> Vec<ReferenceDescription> {
        self.0
            .values()
            .flat_map(|targets| {
                targets.iter().map(|(target, reference_type_id)| {
                    ReferenceDescription::forward(reference_type_id.clone(), target.clone())
                })
            })
            .collect()
    }
}

/// Children browse outcome for one node.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildrenFetched {
    /// Browsed node.
    pub node_id: NodeId,

    /// Bad if any of the node's browses failed.
    pub status: StatusCode,

    /// Children found.
    pub references: ReferenceMap,
}

// =============================================================================
// ChildrenRequest
// =============================================================================

/// A Browse call the children fetcher wants executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildrenRequest {
    /// Round id, passed back with the result.
    pub request_id: u64,

    /// Items to browse.
    pub descriptions: Vec<BrowseDescription>,
}

#[derive(Debug)]
struct ChildrenRound {
    request_id: u64,
    descriptions: Vec<BrowseDescription>,
    node_ids: BTreeSet<NodeId>,
    started: Instant,
}

// =============================================================================
// NodeChildrenFetcher
// =============================================================================

/// Enumerates hierarchical children in batched rounds.
#[derive(Debug)]
pub struct NodeChildrenFetcher {
    max_nodes_per_request: usize,
    queue: VecDeque<NodeId>,
    queued: HashSet<NodeId>,
    in_flight: Option<ChildrenRound>,
    next_request_id: u64,
    requests: Vec<ChildrenRequest>,
}

impl Default for NodeChildrenFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHILDREN_PER_REQUEST)
    }
}

impl NodeChildrenFetcher {
    /// Creates a fetcher that browses at most `max_nodes_per_request` nodes
    /// per round.
    pub fn new(max_nodes_per_request: usize) -> Self {
        Self {
            max_nodes_per_request: max_nodes_per_request.max(1),
            queue: VecDeque::new(),
            queued: HashSet::new(),
            in_flight: None,
            next_request_id: 0,
            requests: Vec::new(),
        }
    }

    /// Returns queued plus in-flight node count.
    pub fn pending_count(&self) -> usize {
        self.queue.len() + self.in_flight.as_ref().map_or(0, |r| r.node_ids.len())
    }

    /// Drains the calls issued since the last drain.
    pub fn take_requests(&mut self) -> Vec<ChildrenRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Queues `node_id`. A node already queued is not queued twice.
    pub fn fetch(&mut self, node_id: NodeId) {
        if node_id.is_null() || !self.queued.insert(node_id.clone()) {
            return;
        }
        self.queue.push_back(node_id);
        self.start_round();
    }

    /// Removes `node_id` from the queue and the in-flight round.
    pub fn cancel(&mut self, node_id: &NodeId) {
        if self.queued.remove(node_id) {
            self.queue.retain(|id| id != node_id);
        }
        if let Some(round) = self.in_flight.as_mut() {
            round.node_ids.remove(node_id);
        }
    }

    fn start_round(&mut self) {
        if self.in_flight.is_some() || self.queue.is_empty() {
            return;
        }

        self.next_request_id += 1;
        let request_id = self.next_request_id;
        let mut descriptions = Vec::new();
        let mut node_ids = BTreeSet::new();

        while node_ids.len() < self.max_nodes_per_request {
            let Some(node_id) = self.queue.pop_front() else {
                break;
            };
            self.queued.remove(&node_id);
            descriptions.push(BrowseDescription::forward(node_id.clone(), ids::ORGANIZES));
            descriptions.push(BrowseDescription::forward(node_id.clone(), ids::HAS_SUBTYPE));
            node_ids.insert(node_id);
        }

        info!(request_id, count = node_ids.len(), "Children fetch round started");
        self.requests.push(ChildrenRequest {
            request_id,
            descriptions: descriptions.clone(),
        });
        self.in_flight = Some(ChildrenRound {
            request_id,
            descriptions,
            node_ids,
            started: Instant::now(),
        });
    }

    /// Applies the result of a Browse call.
    ///
    /// Results for nodes cancelled while the call was in flight are dropped.
    pub fn on_browse_result(
        &mut self,
        request_id: u64,
        result: Result<Vec<BrowseResult>, StatusCode>,
    ) -> Vec<ChildrenFetched> {
        let current = self
            .in_flight
            .as_ref()
            .is_some_and(|r| r.request_id == request_id);
        if !current {
            info!(request_id, "Stale children result dropped");
            return Vec::new();
        }
        let Some(round) = self.in_flight.take() else {
            return Vec::new();
        };

        let results = match result {
            Ok(results) if results.len() == round.descriptions.len() => results,
            Ok(results) => {
                warn!(
                    request_id,
                    expected = round.descriptions.len(),
                    actual = results.len(),
                    "Children browse result count mismatch"
                );
                round
                    .descriptions
                    .iter()
                    .map(|_| BrowseResult::bad(StatusCode::BAD_UNEXPECTED_ERROR))
                    .collect()
            }
            Err(status) => {
                warn!(request_id, status = %status, "Children browse failed");
                round
                    .descriptions
                    .iter()
                    .map(|_| BrowseResult::bad(status))
                    .collect()
            }
        };

        let mut grouped: BTreeMap<NodeId, ChildrenFetched> = BTreeMap::new();
        for (description, result) in round.descriptions.into_iter().zip(results) {
            if !round.node_ids.contains(&description.node_id) {
                continue;
            }
            let entry = grouped
                .entry(description.node_id.clone())
                .or_insert_with(|| ChildrenFetched {
                    node_id: description.node_id.clone(),
                    status: StatusCode::GOOD,
                    references: ReferenceMap::default(),
                });
            if entry.status.is_good() {
                entry.status = result.status_code;
            }
            for reference in result.references {
                if !reference.forward
                    || reference.node_id.is_null()
                    || reference.reference_type_id.is_null()
                {
                    continue;
                }
                entry.references.insert(
                    description.reference_type_id.clone(),
                    reference.node_id,
                    reference.reference_type_id,
                );
            }
        }

        info!(
            request_id,
            count = grouped.len(),
            elapsed_ms = round.started.elapsed().as_millis() as u64,
            "Children fetch round completed"
        );
        for fetched in grouped.values() {
            debug!(
                node_id = %fetched.node_id,
                status = %fetched.status,
                children = fetched.references.references().len(),
                "Children fetched"
            );
        }

        self.start_round();
        grouped.into_values().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
