// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Well-known node ids of the standard namespace.
//!
//! These are read-only identities. The nodes themselves are created by
//! [`StandardCatalog`](crate::catalog::StandardCatalog).

use crate::types::NodeId;

const fn ns0(value: u32) -> NodeId {
    NodeId::numeric(0, value)
}

// =============================================================================
// Folders
// =============================================================================

/// RootFolder - i=84.
pub const ROOT_FOLDER: NodeId = ns0(84);
/// ObjectsFolder - i=85.
pub const OBJECTS_FOLDER: NodeId = ns0(85);
/// TypesFolder - i=86.
pub const TYPES_FOLDER: NodeId = ns0(86);
/// ViewsFolder - i=87.
pub const VIEWS_FOLDER: NodeId = ns0(87);
/// ObjectTypesFolder - i=88.
pub const OBJECT_TYPES_FOLDER: NodeId = ns0(88);
/// VariableTypesFolder - i=89.
pub const VARIABLE_TYPES_FOLDER: NodeId = ns0(89);
/// DataTypesFolder - i=90.
pub const DATA_TYPES_FOLDER: NodeId = ns0(90);
/// ReferenceTypesFolder - i=91.
pub const REFERENCE_TYPES_FOLDER: NodeId = ns0(91);

// =============================================================================
// Reference Types
// =============================================================================

/// References (abstract base type) - i=31.
pub const REFERENCES: NodeId = ns0(31);
/// NonHierarchicalReferences (abstract) - i=32.
pub const NON_HIERARCHICAL_REFERENCES: NodeId = ns0(32);
/// HierarchicalReferences (abstract) - i=33.
pub const HIERARCHICAL_REFERENCES: NodeId = ns0(33);
/// HasChild (abstract) - i=34.
pub const HAS_CHILD: NodeId = ns0(34);
/// Organizes - i=35.
pub const ORGANIZES: NodeId = ns0(35);
/// HasEventSource - i=36.
pub const HAS_EVENT_SOURCE: NodeId = ns0(36);
/// HasModellingRule - i=37.
pub const HAS_MODELLING_RULE: NodeId = ns0(37);
/// HasTypeDefinition - i=40.
pub const HAS_TYPE_DEFINITION: NodeId = ns0(40);
/// Aggregates (abstract) - i=44.
pub const AGGREGATES: NodeId = ns0(44);
/// HasSubtype - i=45.
pub const HAS_SUBTYPE: NodeId = ns0(45);
/// HasProperty - i=46.
pub const HAS_PROPERTY: NodeId = ns0(46);
/// HasComponent - i=47.
pub const HAS_COMPONENT: NodeId = ns0(47);
/// HasNotifier - i=48.
pub const HAS_NOTIFIER: NodeId = ns0(48);

// =============================================================================
// Object and Variable Types
// =============================================================================

/// BaseObjectType - i=58.
pub const BASE_OBJECT_TYPE: NodeId = ns0(58);
/// FolderType - i=61.
pub const FOLDER_TYPE: NodeId = ns0(61);
/// BaseVariableType - i=62.
pub const BASE_VARIABLE_TYPE: NodeId = ns0(62);
/// BaseDataVariableType - i=63.
pub const BASE_DATA_VARIABLE_TYPE: NodeId = ns0(63);
/// PropertyType - i=68.
pub const PROPERTY_TYPE: NodeId = ns0(68);

// =============================================================================
// Data Types
// =============================================================================

/// Boolean - i=1.
pub const BOOLEAN: NodeId = ns0(1);
/// Int32 - i=6.
pub const INT32: NodeId = ns0(6);
/// UInt32 - i=7.
pub const UINT32: NodeId = ns0(7);
/// Int64 - i=8.
pub const INT64: NodeId = ns0(8);
/// Double - i=11.
pub const DOUBLE: NodeId = ns0(11);
/// String - i=12.
pub const STRING: NodeId = ns0(12);
/// DateTime - i=13.
pub const DATE_TIME: NodeId = ns0(13);
/// NodeId - i=17.
pub const NODE_ID: NodeId = ns0(17);
/// LocalizedText - i=21.
pub const LOCALIZED_TEXT: NodeId = ns0(21);
/// BaseDataType (abstract) - i=24.
pub const BASE_DATA_TYPE: NodeId = ns0(24);
/// Number (abstract) - i=26.
pub const NUMBER: NodeId = ns0(26);
/// Integer (abstract) - i=27.
pub const INTEGER: NodeId = ns0(27);
/// UInteger (abstract) - i=28.
pub const UINTEGER: NodeId = ns0(28);
/// Enumeration (abstract) - i=29.
pub const ENUMERATION: NodeId = ns0(29);

// =============================================================================
// Tests
// =============================================================================
