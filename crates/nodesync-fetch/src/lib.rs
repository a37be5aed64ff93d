// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address space synchronization for nodesync.
//!
//! This crate keeps a local [`AddressSpace`](nodesync_core::AddressSpace)
//! in sync with a remote server that is only reachable through batched
//! Read and Browse calls:
//!
//! - [`node_fetcher`]: dependency-tracked fetching of single nodes, so a
//!   node is only delivered together with the types and parents it needs
//! - [`children_fetcher`]: batched enumeration of hierarchical children
//! - [`status_tracker`]: per-node completeness and change notifications
//! - [`updater`]: merging fetched snapshots into the address space
//! - [`fetcher`]: the [`AddressSpaceFetcher`] that ties them together
//! - [`driver`]: the [`FetchDriver`] that runs it on tokio
//!
//! # Architecture
//!
//! ```text
//!  fetch_node()        ┌─────────────────────┐   OutgoingRequest   ┌───────────┐
//! ────────────────────▶│ AddressSpaceFetcher │────────────────────▶│ Transport │
//!  ViewEvent           │  NodeFetcher        │                     │ Read      │
//! ────────────────────▶│  ChildrenFetcher    │◀────────────────────│ Browse    │
//!                      │  StatusTracker      │     Completion      └───────────┘
//!  FetcherEvent        │  AddressSpace       │
//! ◀────────────────────└─────────────────────┘
//! ```
//!
//! The state machines never await. They queue requests and react to
//! completions, which keeps them deterministic under test.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use nodesync_core::{ids, AddressSpace, GenericNodeFactory, StandardCatalog};
//! use nodesync_fetch::{FetchDriver, FetcherConfig, MemoryServer, NodeFetchStatus};
//! use nodesync_fetch::AddressSpaceFetcher;
//!
//! # tokio_test_block_on(async {
//! let server = Arc::new(MemoryServer::standard().unwrap());
//!
//! let mut space = AddressSpace::new();
//! StandardCatalog::standard().install(&mut space).unwrap();
//! let config = FetcherConfig::default();
//! let fetcher = AddressSpaceFetcher::new(space, Arc::new(GenericNodeFactory::new()), &config);
//!
//! let (mut driver, _events) = FetchDriver::new(fetcher, server.clone(), server, &config);
//! driver.fetcher_mut().on_channel_opened();
//! driver
//!     .fetcher_mut()
//!     .fetch_node(&ids::OBJECTS_FOLDER, NodeFetchStatus::node_and_children());
//! driver.run_until_idle().await;
//!
//! let (_, status) = driver.fetcher().node_fetch_status(&ids::OBJECTS_FOLDER);
//! assert!(status.satisfies(NodeFetchStatus::node_and_children()));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod children_fetcher;
pub mod config;
pub mod driver;
pub mod fetch_status;
pub mod fetcher;
pub mod fetching_node;
pub mod memory;
pub mod node_fetcher;
pub mod status_tracker;
pub mod transport;
pub mod updater;

pub use children_fetcher::{ChildrenFetched, ChildrenRequest, NodeChildrenFetcher, ReferenceMap};
pub use config::{FetcherConfig, FetcherConfigBuilder};
pub use driver::{FetchDriver, FetcherCommand, FetcherHandle};
pub use fetch_status::{NodeFetchStatus, NodeFetchStatusChangedItem};
pub use fetcher::{AddressSpaceFetcher, Completion, FetcherEvent, OutgoingRequest, RequestTicket};
pub use fetching_node::{FetchedNodes, FetchingNode, FetchingNodeGraph};
pub use memory::MemoryServer;
pub use node_fetcher::{FetchOptions, FetchRequest, NodeFetcher};
pub use status_tracker::{ChildrenFetchedUpdate, DeferredQueue, NodeFetchStatusTracker};
pub use transport::{
    AttributeService, BrowseDescription, BrowseResult, ReadValueId, ViewEvent, ViewService,
};
pub use updater::{describe_reference, find_deleted_children, update_nodes, UpdateReport};
