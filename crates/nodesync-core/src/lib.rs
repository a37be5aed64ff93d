// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Node model and client-side address space for nodesync.
//!
//! This crate holds the typed object graph that the fetch layer keeps in
//! sync with a remote server:
//!
//! - [`types`]: node ids, qualified names, node classes, status codes
//! - [`node`] and [`address_space`]: the node arena with symmetric references
//!   and change observers
//! - [`state`]: flattened [`NodeState`] snapshots and model change events
//! - [`factory`]: validated node creation from snapshots
//! - [`catalog`]: the standard node set every address space starts with
//!
//! # Error Handling
//!
//! ```text
//! NodeSyncError
//! ├── Core          - Structural violations in the address space
//! ├── Transport     - Read/Browse service failures
//! └── Configuration - Invalid settings
//! ```
//!
//! # Examples
//!
//! ```
//! use nodesync_core::{ids, AddressSpace, StandardCatalog};
//!
//! let mut space = AddressSpace::new();
//! StandardCatalog::standard().install(&mut space).unwrap();
//! assert_eq!(space.parent(&ids::OBJECTS_FOLDER), Some(&ids::ROOT_FOLDER));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod address_space;
pub mod catalog;
pub mod error;
pub mod factory;
pub mod ids;
pub mod node;
pub mod state;
pub mod types;
pub mod value;

pub use address_space::{AddressSpace, NodeLookup, NodeObserver, ObserverId};
pub use catalog::StandardCatalog;
pub use error::{
    fallback_display_name, ConfigurationError, CoreError, CoreResult, ErrorCode, ErrorSeverity,
    NodeSyncError, NodeSyncResult, TransportError,
};
pub use factory::{GenericNodeFactory, NodeFactory};
pub use node::{Node, NodeKind, Reference};
pub use state::{
    ModelChangeEvent, ModelChangeVerbs, NodeAttributes, NodeProperty, NodeState,
    ReferenceDescription, SemanticChangeEvent,
};
pub use types::{
    AttributeId, BrowseDirection, NodeClass, NodeId, NodeIdentifier, QualifiedName, StatusCode,
};
pub use value::{DataValue, Variant};
