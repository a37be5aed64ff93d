// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for address space synchronization.
//!
//! # Error Categories
//!
//! ```text
//! NodeSyncError
//! ├── Core          - Structural violations in the address space
//! ├── Transport     - Read/Browse service failures
//! └── Configuration - Invalid settings
//! ```
//!
//! Remote failures travel as [`StatusCode`] values on fetched nodes and
//! never surface as `Err`. The variants here cover local structural
//! problems (rejected node creation, duplicate ids, broken parent chains)
//! and the ambient concerns of the binary.
//!
//! # Examples
//!
//! ```
//! use nodesync_core::error::{CoreError, NodeSyncError};
//! use nodesync_core::types::{NodeId, StatusCode};
//!
//! let error = CoreError::duplicate_node_id(NodeId::numeric(2, 7));
//! assert_eq!(StatusCode::from(&error), StatusCode::BAD_NODE_ID_EXISTS);
//!
//! let error = NodeSyncError::from(error);
//! assert!(!error.is_retryable());
//! assert_eq!(error.error_code().to_string(), "NS-0102");
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::Level;

use crate::types::{NodeClass, NodeId, StatusCode};

// =============================================================================
// NodeSyncError - Main Error Type
// =============================================================================

/// The main error type for nodesync.
#[derive(Debug, Error)]
pub enum NodeSyncError {
    /// Address space structural errors.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// Read/Browse transport errors.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl NodeSyncError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a core error.
    #[inline]
    pub fn core(error: CoreError) -> Self {
        Self::Core(error)
    }

    /// Creates a transport error.
    #[inline]
    pub fn transport(error: TransportError) -> Self {
        Self::Transport(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Core(_) | Self::Configuration(_) => false,
            Self::Transport(e) => e.is_retryable(),
        }
    }

    /// Returns the suggested retry delay for this error.
    ///
    /// Returns `None` if the error is not retryable.
    pub fn suggested_retry_delay(&self) -> Option<Duration> {
        match self {
            Self::Transport(e) if e.is_retryable() => Some(e.suggested_retry_delay()),
            _ => None,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Core(e) => e.severity(),
            Self::Transport(e) => e.severity(),
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Core(_) => "core",
            Self::Transport(_) => "transport",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Core(e) => e.error_code(),
            Self::Transport(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns recovery hints for this error.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Core(e) => e.recovery_hints(),
            Self::Transport(e) => e.recovery_hints(),
            Self::Configuration(e) => e.recovery_hints(),
        }
    }

    /// Returns a user-friendly error message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Core(e) => e.user_message(),
            Self::Transport(e) => e.user_message(),
            Self::Configuration(e) => e.user_message(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let level = self.tracing_level();
        let code = self.error_code();

        match level {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                retryable = self.is_retryable(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// CoreError
// =============================================================================

/// Structural errors raised by the address space and the node factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A node id string could not be parsed.
    #[error("Invalid node ID format: '{input}' - {reason}")]
    InvalidNodeId {
        /// The rejected input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A node with the same id already exists.
    #[error("Duplicate node id: {node_id}")]
    DuplicateNodeId {
        /// The duplicated id.
        node_id: NodeId,
    },

    /// The node does not exist.
    #[error("Unknown node: {node_id}")]
    UnknownNode {
        /// The missing id.
        node_id: NodeId,
    },

    /// The node's parent does not exist.
    #[error("Unknown parent {parent_id} for node {node_id}")]
    UnknownParent {
        /// The node being created.
        node_id: NodeId,
        /// The missing parent.
        parent_id: NodeId,
    },

    /// The reference type does not exist.
    #[error("Unknown reference type: {reference_type_id}")]
    UnknownReferenceType {
        /// The missing reference type.
        reference_type_id: NodeId,
    },

    /// The type definition is missing or of the wrong class.
    #[error("Node {node_id} requires a {expected} type definition, got '{type_definition_id}'")]
    WrongTypeDefinition {
        /// The node being created.
        node_id: NodeId,
        /// The rejected type definition.
        type_definition_id: NodeId,
        /// The class the type definition must have.
        expected: NodeClass,
    },

    /// The data type is missing or not a DataType node.
    #[error("Node {node_id} has unknown data type '{data_type_id}'")]
    UnknownDataType {
        /// The node being created.
        node_id: NodeId,
        /// The rejected data type.
        data_type_id: NodeId,
    },

    /// The node class cannot be created or is not known.
    #[error("Node {node_id} has unsupported node class {node_class:?}")]
    WrongNodeClass {
        /// The node being created.
        node_id: NodeId,
        /// The rejected class, if one was read.
        node_class: Option<NodeClass>,
    },

    /// A second hierarchical parent was attached to a node.
    #[error("Node {node_id} already has parent {existing_parent}, rejected {new_parent}")]
    MultipleParents {
        /// The child node.
        node_id: NodeId,
        /// The parent already attached.
        existing_parent: NodeId,
        /// The rejected parent.
        new_parent: NodeId,
    },

    /// A property declaration does not exist on the node's type.
    #[error("Node {node_id} has no property declared as {prop_decl_id}")]
    WrongPropertyId {
        /// The node the property was set on.
        node_id: NodeId,
        /// The unknown declaration.
        prop_decl_id: NodeId,
    },
}

impl CoreError {
    /// Creates an invalid node id error.
    pub fn invalid_node_id(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates a duplicate node id error.
    pub fn duplicate_node_id(node_id: NodeId) -> Self {
        Self::DuplicateNodeId { node_id }
    }

    /// Creates an unknown node error.
    pub fn unknown_node(node_id: NodeId) -> Self {
        Self::UnknownNode { node_id }
    }

    /// Creates an unknown parent error.
    pub fn unknown_parent(node_id: NodeId, parent_id: NodeId) -> Self {
        Self::UnknownParent { node_id, parent_id }
    }

    /// Creates an unknown reference type error.
    pub fn unknown_reference_type(reference_type_id: NodeId) -> Self {
        Self::UnknownReferenceType { reference_type_id }
    }

    /// Creates a wrong type definition error.
    pub fn wrong_type_definition(
        node_id: NodeId,
        type_definition_id: NodeId,
        expected: NodeClass,
    ) -> Self {
        Self::WrongTypeDefinition {
            node_id,
            type_definition_id,
            expected,
        }
    }

    /// Creates an unknown data type error.
    pub fn unknown_data_type(node_id: NodeId, data_type_id: NodeId) -> Self {
        Self::UnknownDataType {
            node_id,
            data_type_id,
        }
    }

    /// Creates a wrong node class error.
    pub fn wrong_node_class(node_id: NodeId, node_class: Option<NodeClass>) -> Self {
        Self::WrongNodeClass {
            node_id,
            node_class,
        }
    }

    /// Creates a multiple parents error.
    pub fn multiple_parents(node_id: NodeId, existing_parent: NodeId, new_parent: NodeId) -> Self {
        Self::MultipleParents {
            node_id,
            existing_parent,
            new_parent,
        }
    }

    /// Creates a wrong property id error.
    pub fn wrong_property_id(node_id: NodeId, prop_decl_id: NodeId) -> Self {
        Self::WrongPropertyId {
            node_id,
            prop_decl_id,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidNodeId { .. } => ErrorSeverity::Error,
            Self::MultipleParents { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::InvalidNodeId { .. } => 1,
            Self::DuplicateNodeId { .. } => 2,
            Self::UnknownNode { .. } => 3,
            Self::UnknownParent { .. } => 4,
            Self::UnknownReferenceType { .. } => 5,
            Self::WrongTypeDefinition { .. } => 6,
            Self::UnknownDataType { .. } => 7,
            Self::WrongNodeClass { .. } => 8,
            Self::MultipleParents { .. } => 9,
            Self::WrongPropertyId { .. } => 10,
        };
        ErrorCode::new(1, code)
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::InvalidNodeId { .. } => vec![
                "Use the format ns=<index>;{i|s|g|b}=<identifier>",
                "Omit the ns= prefix for namespace 0",
            ],
            Self::DuplicateNodeId { .. } => vec!["Modify the existing node instead"],
            Self::UnknownParent { .. }
            | Self::UnknownReferenceType { .. }
            | Self::WrongTypeDefinition { .. }
            | Self::UnknownDataType { .. } => vec![
                "Fetch the node's dependencies before creating it",
                "Check that the server exposes the referenced type nodes",
            ],
            Self::MultipleParents { .. } => vec!["Delete the existing parent reference first"],
            _ => vec![],
        }
    }

    /// Returns a user-friendly message.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidNodeId { input, .. } => format!("'{}' is not a valid node id", input),
            Self::DuplicateNodeId { node_id } => format!("Node {} already exists", node_id),
            Self::UnknownNode { node_id } => format!("Node {} is not known", node_id),
            other => other.to_string(),
        }
    }
}

impl From<&CoreError> for StatusCode {
    fn from(error: &CoreError) -> Self {
        match error {
            CoreError::InvalidNodeId { .. } | CoreError::UnknownNode { .. } => {
                StatusCode::BAD_NODE_ID_UNKNOWN
            }
            CoreError::DuplicateNodeId { .. } => StatusCode::BAD_NODE_ID_EXISTS,
            CoreError::UnknownParent { .. } | CoreError::MultipleParents { .. } => {
                StatusCode::BAD_PARENT_NODE_ID_INVALID
            }
            CoreError::UnknownReferenceType { .. } => StatusCode::BAD_REFERENCE_TYPE_ID_INVALID,
            CoreError::WrongTypeDefinition { .. } => StatusCode::BAD_TYPE_DEFINITION_INVALID,
            CoreError::UnknownDataType { .. } => StatusCode::BAD_DATA_TYPE_ID_UNKNOWN,
            CoreError::WrongNodeClass { .. } => StatusCode::BAD_NODE_CLASS_INVALID,
            CoreError::WrongPropertyId { .. } => StatusCode::BAD_NODE_ID_UNKNOWN,
        }
    }
}

// =============================================================================
// TransportError
// =============================================================================

/// Read/Browse service errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The service call returned a bad status.
    #[error("{service} failed with status {status}")]
    ServiceFault {
        /// Service name.
        service: &'static str,
        /// Returned status.
        status: StatusCode,
    },

    /// The service call did not complete in time.
    #[error("{service} timed out after {duration:?}")]
    Timeout {
        /// Service name.
        service: &'static str,
        /// Elapsed time.
        duration: Duration,
    },

    /// The result count does not match the request count.
    #[error("{service} returned {actual} results for {expected} requests")]
    ResultMismatch {
        /// Service name.
        service: &'static str,
        /// Requested item count.
        expected: usize,
        /// Returned item count.
        actual: usize,
    },

    /// The channel to the server is closed.
    #[error("Channel closed: {reason}")]
    ChannelClosed {
        /// Reason given by the transport.
        reason: String,
    },
}

impl TransportError {
    /// Creates a service fault error.
    pub fn service_fault(service: &'static str, status: StatusCode) -> Self {
        Self::ServiceFault { service, status }
    }

    /// Creates a timeout error.
    pub fn timeout(service: &'static str, duration: Duration) -> Self {
        Self::Timeout { service, duration }
    }

    /// Creates a result mismatch error.
    pub fn result_mismatch(service: &'static str, expected: usize, actual: usize) -> Self {
        Self::ResultMismatch {
            service,
            expected,
            actual,
        }
    }

    /// Creates a channel closed error.
    pub fn channel_closed(reason: impl Into<String>) -> Self {
        Self::ChannelClosed {
            reason: reason.into(),
        }
    }

    /// Returns the status code applied to every item of the failed call.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServiceFault { status, .. } => *status,
            Self::Timeout { .. } => StatusCode::BAD_TIMEOUT,
            Self::ResultMismatch { .. } => StatusCode::BAD_UNEXPECTED_ERROR,
            Self::ChannelClosed { .. } => StatusCode::BAD_COMMUNICATION_ERROR,
        }
    }

    /// Returns `true` if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ResultMismatch { .. })
    }

    /// Returns the suggested retry delay.
    pub fn suggested_retry_delay(&self) -> Duration {
        match self {
            Self::Timeout { .. } => Duration::from_secs(1),
            Self::ChannelClosed { .. } => Duration::from_secs(5),
            _ => Duration::from_millis(500),
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::ResultMismatch { .. } => ErrorSeverity::Error,
            _ => ErrorSeverity::Warning,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        let code = match self {
            Self::ServiceFault { .. } => 1,
            Self::Timeout { .. } => 2,
            Self::ResultMismatch { .. } => 3,
            Self::ChannelClosed { .. } => 4,
        };
        ErrorCode::new(2, code)
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        match self {
            Self::Timeout { .. } => vec![
                "Increase the request timeout",
                "Reduce the number of nodes per request",
            ],
            Self::ChannelClosed { .. } => vec!["Nodes are refetched once the channel reopens"],
            Self::ResultMismatch { .. } => vec!["The server violated the protocol; check its logs"],
            Self::ServiceFault { .. } => vec![],
        }
    }

    /// Returns a user-friendly message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout { service, .. } => format!("The server did not answer the {} request", service),
            Self::ChannelClosed { .. } => "The connection to the server is closed".to_string(),
            other => other.to_string(),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A field has an invalid value.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// Field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A required field is missing.
    #[error("Missing required field: '{field}'")]
    MissingField {
        /// Field path.
        field: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidValue { .. } => ErrorCode::new(3, 1),
            Self::MissingField { .. } => ErrorCode::new(3, 2),
        }
    }

    /// Returns recovery hints.
    pub fn recovery_hints(&self) -> Vec<&'static str> {
        vec!["Check the configuration file against the documented defaults"]
    }

    /// Returns a user-friendly message.
    pub fn user_message(&self) -> String {
        format!("Configuration error: {}", self)
    }
}

// =============================================================================
// ErrorSeverity
// =============================================================================

/// Error severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Informational - no action required.
    Info,
    /// Warning - action may be required.
    Warning,
    /// Error - action required, but recoverable.
    Error,
    /// Critical - immediate action required.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Info => Level::INFO,
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ErrorCode
// =============================================================================

/// Structured error code.
///
/// Format: `NS-XXYY` where XX is the category and YY the specific error.
///
/// Categories:
/// - 1: Core
/// - 2: Transport
/// - 3: Configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    /// Category (1-3).
    pub category: u8,
    /// Specific error within category.
    pub code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }

    /// Creates from a u16.
    pub fn from_u16(value: u16) -> Self {
        Self {
            category: (value >> 8) as u8,
            code: (value & 0xFF) as u8,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NS-{:02X}{:02X}", self.category, self.code)
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// A Result type with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

/// A Result type with NodeSyncError.
pub type NodeSyncResult<T> = Result<T, NodeSyncError>;

/// Display name used for a node whose attributes could not be fetched.
pub fn fallback_display_name(node_id: &NodeId) -> String {
    node_id.to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_status_mapping() {
        let id = NodeId::numeric(1, 5);
        assert_eq!(
            StatusCode::from(&CoreError::unknown_parent(id.clone(), NodeId::numeric(1, 6))),
            StatusCode::BAD_PARENT_NODE_ID_INVALID
        );
        assert_eq!(
            StatusCode::from(&CoreError::wrong_type_definition(
                id.clone(),
                NodeId::null(),
                NodeClass::ObjectType
            )),
            StatusCode::BAD_TYPE_DEFINITION_INVALID
        );
        assert_eq!(
            StatusCode::from(&CoreError::unknown_data_type(id, NodeId::null())),
            StatusCode::BAD_DATA_TYPE_ID_UNKNOWN
        );
    }

    #[test]
    fn test_transport_error_status_and_retry() {
        let timeout = TransportError::timeout("Read", Duration::from_secs(30));
        assert_eq!(timeout.status_code(), StatusCode::BAD_TIMEOUT);
        assert!(timeout.is_retryable());

        let mismatch = TransportError::result_mismatch("Browse", 3, 2);
        assert!(!mismatch.is_retryable());
        assert!(mismatch.to_string().contains("2 results for 3"));
    }

    #[test]
    fn test_error_code_format() {
        let code = ErrorCode::new(2, 4);
        assert_eq!(code.to_string(), "NS-0204");
        assert_eq!(ErrorCode::from_u16(code.as_u16()), code);
    }

    #[test]
    fn test_node_sync_error_properties() {
        let error = NodeSyncError::from(ConfigurationError::invalid_value(
            "fetcher.max_nodes_per_request",
            "must be greater than 0",
        ));
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert_eq!(error.category(), "configuration");
        assert!(error.suggested_retry_delay().is_none());

        let error = NodeSyncError::from(TransportError::channel_closed("eof"));
        assert_eq!(error.suggested_retry_delay(), Some(Duration::from_secs(5)));
        assert_eq!(error.tracing_level(), Level::WARN);
    }

    #[test]
    fn test_fallback_display_name() {
        assert_eq!(fallback_display_name(&NodeId::string(3, "Pump")), "ns=3;s=Pump");
    }
}
