// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! A server model, a client factory and a transport whose calls can be
//! held back.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use nodesync_core::{
    ids, AddressSpace, DataValue, GenericNodeFactory, NodeClass, NodeId, NodeState,
    ReferenceDescription, StandardCatalog, StatusCode,
};
use nodesync_fetch::{
    AddressSpaceFetcher, AttributeService, BrowseDescription, BrowseResult, FetchDriver,
    FetcherConfig, FetcherEvent, MemoryServer, ReadValueId, ViewService,
};

// =============================================================================
// Ids
// =============================================================================

pub const TEST_TYPE: u32 = 101;
pub const TEST_REF_TYPE: u32 = 102;
pub const ALIAS: u32 = 301;
pub const LABEL: u32 = 302;

pub fn id(value: u32) -> NodeId {
    NodeId::numeric(1, value)
}

// =============================================================================
// Server Model
// =============================================================================

fn object(value: u32, name: &str, parent: NodeId) -> NodeState {
    NodeState::new(id(value), NodeClass::Object)
        .with_browse_name(format!("1:{name}"))
        .with_type_definition(ids::BASE_OBJECT_TYPE)
        .with_parent(ids::ORGANIZES, parent)
}

fn declaration(value: u32, name: &str, default: &str) -> NodeState {
    NodeState::new(id(value), NodeClass::Variable)
        .with_browse_name(format!("1:{name}"))
        .with_type_definition(ids::PROPERTY_TYPE)
        .with_parent(ids::HAS_PROPERTY, id(TEST_TYPE))
        .with_data_type(ids::STRING)
        .with_value(default)
}

/// Server snapshots:
///
/// ```text
/// Objects
/// ├── TestNode1 (TestType, Alias = "X")
/// ├── TestNode2
/// └── TestNode3 (folder)
///     ├── TestNode4
///     │   └── TestNode6
///     └── TestNode5 ──TestRefType──▶ TestNode2
/// ```
pub fn server_states() -> Vec<NodeState> {
    vec![
        NodeState::new(id(TEST_REF_TYPE), NodeClass::ReferenceType)
            .with_browse_name("1:TestRefType")
            .with_supertype(ids::NON_HIERARCHICAL_REFERENCES),
        NodeState::new(id(TEST_TYPE), NodeClass::ObjectType)
            .with_browse_name("1:TestType")
            .with_supertype(ids::BASE_OBJECT_TYPE),
        declaration(ALIAS, "Alias", ""),
        declaration(LABEL, "Label", "Default"),
        object(1, "TestNode1", ids::OBJECTS_FOLDER)
            .with_type_definition(id(TEST_TYPE))
            .with_property(id(ALIAS), "X"),
        object(2, "TestNode2", ids::OBJECTS_FOLDER),
        object(3, "TestNode3", ids::OBJECTS_FOLDER).with_type_definition(ids::FOLDER_TYPE),
        object(4, "TestNode4", id(3)),
        object(5, "TestNode5", id(3))
            .with_reference(ReferenceDescription::forward(id(TEST_REF_TYPE), id(2))),
        object(6, "TestNode6", id(4)),
    ]
}

pub fn server() -> MemoryServer {
    let server = MemoryServer::standard().expect("standard catalog");
    let report = server.load(&GenericNodeFactory::new(), server_states());
    assert!(report.failed_nodes.is_empty(), "{:?}", report.failed_nodes);
    server
}

pub fn object_state(value: u32, name: &str, parent: NodeId) -> NodeState {
    object(value, name, parent)
}

// =============================================================================
// Client
// =============================================================================

pub fn client_space() -> AddressSpace {
    let mut space = AddressSpace::new();
    StandardCatalog::standard()
        .install(&mut space)
        .expect("standard catalog");
    space
}

pub fn driver<T>(transport: Arc<T>, config: &FetcherConfig) -> (FetchDriver, mpsc::Receiver<FetcherEvent>)
where
    T: AttributeService + ViewService + 'static,
{
    let fetcher = AddressSpaceFetcher::new(client_space(), Arc::new(GenericNodeFactory::new()), config);
    FetchDriver::new(fetcher, transport.clone(), transport, config)
}

pub fn drain(events: &mut mpsc::Receiver<FetcherEvent>) -> Vec<FetcherEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

// =============================================================================
// GatedTransport
// =============================================================================

/// Forwards to a [`MemoryServer`] but holds calls while the gate is
/// closed.
#[derive(Debug)]
pub struct GatedTransport {
    server: MemoryServer,
    closed: AtomicBool,
    notify: Notify,
    calls: AtomicUsize,
}

impl GatedTransport {
    pub fn new(server: MemoryServer) -> Self {
        Self {
            server,
            closed: AtomicBool::new(false),
            notify: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn server(&self) -> &MemoryServer {
        &self.server
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn open(&self) {
        self.closed.store(false, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn pass(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        loop {
            let notified = self.notify.notified();
            if !self.closed.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl AttributeService for GatedTransport {
    async fn read(&self, read_ids: Vec<ReadValueId>) -> Result<Vec<DataValue>, StatusCode> {
        let values = self.server.read_values(&read_ids);
        self.pass().await;
        Ok(values)
    }
}

#[async_trait]
impl ViewService for GatedTransport {
    async fn browse(
        &self,
        descriptions: Vec<BrowseDescription>,
    ) -> Result<Vec<BrowseResult>, StatusCode> {
        let results = self.server.browse_references(&descriptions);
        self.pass().await;
        Ok(results)
    }
}
