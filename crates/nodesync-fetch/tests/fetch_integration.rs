// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Fetch Integration Tests
//!
//! End-to-end synchronization of a client address space against a
//! [`MemoryServer`] through the [`FetchDriver`].
//!
//! ## Test Categories
//!
//! - `test_fetch_*`: node and children fetches
//! - `test_model_change_*`: remote model changes
//! - `test_transport_*`: slow and failing transports

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};

use nodesync_core::{
    ids, GenericNodeFactory, ModelChangeVerbs, NodeClass, NodeState, ReferenceDescription,
    SemanticChangeEvent, StatusCode, Variant,
};
use nodesync_fetch::{FetcherConfig, FetcherEvent, MemoryServer, NodeFetchStatus, ViewEvent};

use common::{
    driver, drain, id, object_state, server, GatedTransport, ALIAS, LABEL, TEST_REF_TYPE, TEST_TYPE,
};

// =============================================================================
// Fetch Tests
// =============================================================================

#[tokio::test]
async fn test_fetch_root_then_instance_with_type() {
    let server = Arc::new(server());
    let (mut driver, mut events) = driver(server, &FetcherConfig::default());

    driver.fetcher_mut().on_channel_opened();
    driver
        .fetcher_mut()
        .fetch_node(&ids::ROOT_FOLDER, NodeFetchStatus::node_and_children());
    driver.run_until_idle().await;

    assert_eq!(
        driver.fetcher().node_fetch_status(&ids::ROOT_FOLDER),
        (StatusCode::GOOD, NodeFetchStatus::node_and_children())
    );
    drain(&mut events);

    driver
        .fetcher_mut()
        .fetch_node(&id(1), NodeFetchStatus::node_and_children());
    driver.run_until_idle().await;

    let fetcher = driver.fetcher();
    let space = fetcher.space();
    assert_eq!(
        fetcher.node_fetch_status(&id(1)),
        (StatusCode::GOOD, NodeFetchStatus::node_and_children())
    );
    assert_eq!(space.parent(&id(1)), Some(&ids::OBJECTS_FOLDER));
    assert_eq!(space.type_definition(&id(1)), Some(&id(TEST_TYPE)));
    assert_eq!(space.supertype(&id(TEST_TYPE)), Some(&ids::BASE_OBJECT_TYPE));
    let mut declarations = space.property_declarations(&id(TEST_TYPE));
    declarations.sort();
    assert_eq!(declarations, vec![id(ALIAS), id(LABEL)]);
    assert_eq!(space.property_value(&id(1), &id(ALIAS)), Some(&Variant::from("X")));
    assert_eq!(
        space.property_value(&id(1), &id(LABEL)),
        Some(&Variant::from("Default"))
    );
    assert_eq!(fetcher.pending_task_count(), 0);

    let events = drain(&mut events);
    assert!(events.iter().any(|event| matches!(
        event,
        FetcherEvent::ModelChanged(change)
            if change.node_id == id(1)
                && change.type_definition_id == id(TEST_TYPE)
                && change.verbs.contains(ModelChangeVerbs::NODE_ADDED)
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        FetcherEvent::StatusChanged(items)
            if items.iter().any(|item| item.node_id == id(1)
                && item.fetch_status == NodeFetchStatus::node_and_children())
    )));
}

#[tokio::test]
async fn test_fetch_children_waits_for_every_child() {
    let server = Arc::new(server());
    let (mut driver, _events) = driver(server, &FetcherConfig::default());

    driver.fetcher_mut().on_channel_opened();
    driver
        .fetcher_mut()
        .fetch_node(&id(3), NodeFetchStatus::node_and_children());
    driver.run_until_idle().await;

    let fetcher = driver.fetcher();
    assert_eq!(
        fetcher.node_fetch_status(&id(3)),
        (StatusCode::GOOD, NodeFetchStatus::node_and_children())
    );
    let mut children = fetcher.space().children(&id(3));
    children.sort();
    assert_eq!(children, vec![id(4), id(5)]);
    // Grandchildren are only fetched on request.
    assert!(!fetcher.space().contains(&id(6)));
    // The reference type of TestNode5 was fetched with it.
    assert!(fetcher.space().contains(&id(TEST_REF_TYPE)));
    assert!(fetcher
        .space()
        .get_node(&id(5))
        .unwrap()
        .has_forward(&id(TEST_REF_TYPE), &id(2)));
}

#[tokio::test]
async fn test_fetch_unknown_node_reports_error() {
    let server = Arc::new(server());
    let (mut driver, mut events) = driver(server, &FetcherConfig::default());

    driver.fetcher_mut().on_channel_opened();
    driver.run_until_idle().await;
    drain(&mut events);

    driver
        .fetcher_mut()
        .fetch_node(&id(4242), NodeFetchStatus::node_only());
    driver.run_until_idle().await;

    let events = drain(&mut events);
    let items: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            FetcherEvent::StatusChanged(items) => Some(items),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].node_id, id(4242));
    assert_eq!(items[0].status, StatusCode::BAD_NODE_ID_UNKNOWN);
    assert!(!driver.fetcher().space().contains(&id(4242)));
}

#[tokio::test]
async fn test_fetch_survives_reference_cycles() {
    let server = server();
    let a = NodeState::new(id(10), NodeClass::Object)
        .with_browse_name("1:A")
        .with_type_definition(ids::BASE_OBJECT_TYPE)
        .with_parent(ids::ORGANIZES, ids::OBJECTS_FOLDER)
        .with_reference(ReferenceDescription::forward(id(TEST_REF_TYPE), id(11)));
    let b = NodeState::new(id(11), NodeClass::Object)
        .with_browse_name("1:B")
        .with_type_definition(ids::BASE_OBJECT_TYPE)
        .with_parent(ids::ORGANIZES, id(10))
        .with_reference(ReferenceDescription::forward(id(TEST_REF_TYPE), id(10)));
    let report = server.load(&GenericNodeFactory::new(), vec![a, b]);
    assert!(report.failed_nodes.is_empty());

    let (mut driver, _events) = driver(Arc::new(server), &FetcherConfig::default());
    driver.fetcher_mut().on_channel_opened();
    driver
        .fetcher_mut()
        .fetch_node(&id(11), NodeFetchStatus::node_only());
    driver.run_until_idle().await;

    let space = driver.fetcher().space();
    assert!(space.contains(&id(10)));
    assert!(space.contains(&id(11)));
    assert_eq!(space.parent(&id(11)), Some(&id(10)));
    assert!(space.get_node(&id(10)).unwrap().has_forward(&id(TEST_REF_TYPE), &id(11)));
    assert!(space.get_node(&id(11)).unwrap().has_forward(&id(TEST_REF_TYPE), &id(10)));
}

#[tokio::test]
async fn test_fetch_postponed_while_channel_closed() {
    let server = Arc::new(server());
    let (mut driver, _events) = driver(server, &FetcherConfig::default());

    driver
        .fetcher_mut()
        .fetch_node(&id(2), NodeFetchStatus::node_only());
    driver.run_until_idle().await;
    assert!(!driver.fetcher().space().contains(&id(2)));

    driver.fetcher_mut().on_channel_opened();
    driver.run_until_idle().await;
    assert!(driver.fetcher().space().contains(&id(2)));
}

// =============================================================================
// Model Change Tests
// =============================================================================

#[tokio::test]
async fn test_model_change_node_deleted() {
    let server = server();
    let (driver, mut events) = driver(Arc::new(server.clone()), &FetcherConfig::default());
    let handle = driver.handle();
    let (view_tx, view_rx) = mpsc::channel(8);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(driver.run(view_rx, shutdown_rx));

    handle.channel_opened().await.unwrap();
    handle
        .fetch_node(id(4), NodeFetchStatus::node_and_children())
        .await
        .unwrap();

    let mut fetched = false;
    for _ in 0..1000 {
        let (_, status) = handle.status(id(6)).await.unwrap();
        if status.node_fetched {
            fetched = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(fetched);

    let deleted = server.delete_node(&id(4)).unwrap();
    view_tx.send(ViewEvent::ModelChanged(deleted)).await.unwrap();

    let forwarded = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if let FetcherEvent::ModelChanged(change) = event {
                if change.node_id == id(4) {
                    return change;
                }
            }
        }
        panic!("event channel closed");
    })
    .await
    .unwrap();
    assert!(forwarded.verbs.contains(ModelChangeVerbs::NODE_DELETED));
    assert_eq!(forwarded.type_definition_id, ids::BASE_OBJECT_TYPE);

    shutdown_tx.send(()).unwrap();
    let fetcher = task.await.unwrap();
    assert!(!fetcher.space().contains(&id(4)));
    assert!(!fetcher.space().contains(&id(6)));
    assert_eq!(
        fetcher.node_fetch_status(&id(6)),
        (StatusCode::GOOD, NodeFetchStatus::empty())
    );
}

#[tokio::test]
async fn test_model_change_reference_deleted_refreshes_children() {
    let server = server();
    let (mut driver, mut events) = driver(Arc::new(server.clone()), &FetcherConfig::default());

    driver.fetcher_mut().on_channel_opened();
    driver
        .fetcher_mut()
        .fetch_node(&id(3), NodeFetchStatus::node_and_children());
    driver.run_until_idle().await;
    assert!(driver.fetcher().space().contains(&id(5)));
    drain(&mut events);

    server.delete_node(&id(5));
    driver.fetcher_mut().on_model_changed(nodesync_core::ModelChangeEvent::new(
        id(3),
        ids::FOLDER_TYPE,
        ModelChangeVerbs::REFERENCE_DELETED,
    ));
    driver.run_until_idle().await;

    assert!(!driver.fetcher().space().contains(&id(5)));
    let events = drain(&mut events);
    assert!(events.iter().any(|event| matches!(
        event,
        FetcherEvent::ModelChanged(change)
            if change.node_id == id(5) && change.verbs.contains(ModelChangeVerbs::NODE_DELETED)
    )));
}

// =============================================================================
// Transport Tests
// =============================================================================

#[tokio::test]
async fn test_transport_forced_refetch_while_in_flight() {
    let transport = Arc::new(GatedTransport::new(server()));
    let (mut driver, mut events) = driver(transport.clone(), &FetcherConfig::default());

    driver.fetcher_mut().on_channel_opened();
    driver
        .fetcher_mut()
        .fetch_node(&id(2), NodeFetchStatus::node_only());
    driver.run_until_idle().await;
    assert_eq!(driver.fetcher().display_name(&id(2)), "TestNode2");
    drain(&mut events);

    transport.close();
    let before = transport.calls();
    driver
        .fetcher_mut()
        .on_node_semantics_changed(SemanticChangeEvent::new(id(2)));
    driver.dispatch();
    assert!(driver.in_flight() > 0);

    // The held calls answer with the old name.
    let held = before + driver.in_flight();
    while transport.calls() < held {
        tokio::task::yield_now().await;
    }

    let renamed = object_state(2, "TestNode2", ids::OBJECTS_FOLDER).with_display_name("Renamed");
    transport
        .server()
        .load(&GenericNodeFactory::new(), vec![renamed]);

    driver
        .fetcher_mut()
        .on_node_semantics_changed(SemanticChangeEvent::new(id(2)));
    driver.dispatch();

    transport.open();
    driver.run_until_idle().await;

    assert_eq!(driver.fetcher().display_name(&id(2)), "Renamed");
    assert_eq!(driver.fetcher().pending_task_count(), 0);
    let events = drain(&mut events);
    let semantic_changes = events
        .iter()
        .filter(|event| matches!(
            event,
            FetcherEvent::SemanticsChanged(change) if change.node_id == id(2)
        ))
        .count();
    assert_eq!(semantic_changes, 1);
}

#[tokio::test(start_paused = true)]
async fn test_transport_timeout_reports_bad_timeout() {
    let transport = Arc::new(GatedTransport::new(server()));
    let config = FetcherConfig::builder()
        .request_timeout(Duration::from_millis(100))
        .build()
        .unwrap();
    let (mut driver, _events) = driver(transport.clone(), &config);

    transport.close();
    driver.fetcher_mut().on_channel_opened();
    driver
        .fetcher_mut()
        .fetch_node(&id(7), NodeFetchStatus::node_only());
    driver.run_until_idle().await;

    assert!(transport.calls() > 0);
    let (status, fetch_status) = driver.fetcher().node_fetch_status(&id(7));
    assert_eq!(status, StatusCode::BAD_TIMEOUT);
    assert!(fetch_status.node_fetched);
    assert!(!driver.fetcher().space().contains(&id(7)));
}

#[tokio::test]
async fn test_transport_memory_server_shared_between_drivers() {
    let server = MemoryServer::new(common::client_space());
    let (mut first, _a) = driver(Arc::new(server.clone()), &FetcherConfig::default());
    let (mut second, _b) = driver(Arc::new(server), &FetcherConfig::default());

    for each in [&mut first, &mut second] {
        each.fetcher_mut().on_channel_opened();
        each.fetcher_mut()
            .fetch_node(&ids::OBJECTS_FOLDER, NodeFetchStatus::node_and_children());
        each.run_until_idle().await;
        assert_eq!(
            each.fetcher().node_fetch_status(&ids::OBJECTS_FOLDER),
            (StatusCode::GOOD, NodeFetchStatus::node_and_children())
        );
    }
}
