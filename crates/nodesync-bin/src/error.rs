// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Errors of the `nodesync` binary and how they are reported.

use std::path::Path;

use thiserror::Error;

use nodesync_core::NodeSyncError;

/// Result type alias for the binary.
pub type BinResult<T> = Result<T, BinError>;

/// Errors surfaced by a command.
#[derive(Debug, Error)]
pub enum BinError {
    /// The configuration file or a command line value is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A snapshot could not be read or applied.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// A command failed while running.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Error from the library crates.
    #[error("{0}")]
    NodeSync(#[from] NodeSyncError),

    /// Another error with a description of what was being done.
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<BinError>,
    },
}

impl BinError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a snapshot error.
    pub fn snapshot(path: &Path, msg: impl std::fmt::Display) -> Self {
        Self::Snapshot(format!("{}: {}", path.display(), msg))
    }

    /// Creates a runtime error.
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Wraps the error with context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration(_) => 1,
            Self::Snapshot(_) => 2,
            Self::Runtime(_) => 3,
            Self::Io(_) => 4,
            Self::NodeSync(_) => 5,
            Self::WithContext { source, .. } => source.exit_code(),
        }
    }
}

impl From<std::io::Error> for BinError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

// =============================================================================
// Reporting
// =============================================================================

/// Prints the error and its causes to stderr.
pub fn report_error(error: &BinError) {
    eprintln!("Error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("  Caused by: {cause}");
        source = cause.source();
    }
}

/// Prints the error and exits with its code.
pub fn report_error_and_exit(error: BinError) -> ! {
    report_error(&error);
    std::process::exit(error.exit_code())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nodesync_core::ConfigurationError;

    #[test]
    fn test_display() {
        let err = BinError::config("missing snapshot");
        assert_eq!(err.to_string(), "Configuration error: missing snapshot");

        let err = BinError::snapshot(Path::new("plant.json"), "expected value");
        assert_eq!(err.to_string(), "Snapshot error: plant.json: expected value");
    }

    #[test]
    fn test_context_keeps_exit_code() {
        let err = BinError::runtime("fetch stalled").with_context("sync");
        assert_eq!(err.to_string(), "sync: Runtime error: fetch stalled");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_from_nodesync_error() {
        let err: BinError =
            NodeSyncError::from(ConfigurationError::invalid_value("max_nodes_per_request", "must be positive"))
                .into();
        assert_eq!(err.exit_code(), 5);
        assert!(err.to_string().contains("max_nodes_per_request"));
    }

    #[test]
    fn test_from_io_error() {
        let err: BinError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, BinError::Io(_)));
        assert_eq!(err.exit_code(), 4);
    }
}
