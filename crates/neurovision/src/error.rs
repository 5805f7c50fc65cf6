//! Error types for NeuroVision operations.
//!
//! Errors fall into three groups:
//!
//! - **`Error`**: top-level failures that end the current operation (the scan
//!   root vanished, a configuration file is malformed, a scan was cancelled)
//! - **`ParseWarning`**: file-level problems that are collected into the scan
//!   summary but never abort a scan
//! - **Boundary errors** (`ValidationError`, `GraphError`): malformed input
//!   rejected before it reaches the graph store
//!
//! ## Error Philosophy
//!
//! Scanning is best effort:
//! - A single unreadable or undecodable file must not prevent scanning the rest
//! - File-level problems are collected and reported, not thrown
//! - Only a missing or unreadable project root makes a scan fail
//!
//! Querying a node that does not exist is not an error at all; impact
//! analysis reports it as a normal negative outcome.
//!
//! ## Warning Categorization
//!
//! `ParseWarningKind` uses a 4xx/5xx style categorization:
//! - Input problems (the project's files): encoding errors, oversized files
//! - Internal problems (the environment): I/O and walker failures

use std::path::PathBuf;
use thiserror::Error;

/// Result type for NeuroVision operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for NeuroVision operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The project root could not be scanned
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// A graph store operation was misused
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Input was rejected at the boundary
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// A built-in extraction pattern failed to compile
    #[error("invalid extraction pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A scan was cancelled before it committed
    #[error("scan cancelled; graph left at its last consistent state")]
    Cancelled,
}

/// The project root could not be walked.
///
/// Fatal to the scan attempt that raised it, never to the process.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Root path does not exist or cannot be canonicalized
    #[error("project root not found: {}", path.display())]
    RootNotFound {
        /// The root that was requested
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// Root path exists but is not a directory
    #[error("project root is not a directory: {}", path.display())]
    NotADirectory {
        /// The root that was requested
        path: PathBuf,
    },

    /// Root directory exists but cannot be listed
    #[error("project root is unreadable: {}", path.display())]
    RootUnreadable {
        /// The root that was requested
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// An ignore pattern is not a valid glob
    #[error("invalid ignore pattern '{pattern}': {reason}")]
    InvalidIgnore {
        /// The offending pattern
        pattern: String,
        /// Why the glob compiler rejected it
        reason: String,
    },
}

/// Misuse of the graph store API.
///
/// The store keeps its invariants by construction; these errors report
/// requests that would break them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// An edge from a node to itself that is not a cycle indicator
    #[error("self-loop on {0} is only allowed for cycle edges")]
    SelfLoop(String),

    /// The node id is not present in the graph
    #[error("unknown node: {0}")]
    UnknownNode(String),
}

/// Malformed input rejected at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// The offending field
    pub field: &'static str,
    /// What was wrong with it
    pub reason: String,
}

impl ValidationError {
    /// Create a validation error for `field`.
    #[must_use]
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    /// A required field was missing or blank.
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::new(field, "is required and must not be blank")
    }
}

/// A problem with one file encountered while scanning.
///
/// Collected into the scan summary; the scan continues with the remaining
/// files.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ParseWarning {
    /// Path to the file (or directory) that was skipped
    pub path: PathBuf,
    /// Category of the problem
    pub kind: ParseWarningKind,
    /// Human-readable message
    pub message: String,
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.path.display(),
            self.message,
            self.kind
        )
    }
}

impl std::error::Error for ParseWarning {}

/// Categorization of scan warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseWarningKind {
    // === Input Problems (analogous to HTTP 4xx) ===
    /// File content is not valid UTF-8
    EncodingError,

    /// File exceeds the configured size limit
    TooLarge,

    // === Internal Problems (analogous to HTTP 5xx) ===
    /// Could not read the file or directory entry
    IoError,

    /// The directory walker reported a failure (permissions, symlink loop)
    WalkError,
}

impl std::fmt::Display for ParseWarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EncodingError => write!(f, "encoding error"),
            Self::TooLarge => write!(f, "file too large"),
            Self::IoError => write!(f, "I/O error"),
            Self::WalkError => write!(f, "walk error"),
        }
    }
}

impl ParseWarningKind {
    /// Returns `true` if this is an input problem (4xx-style).
    #[must_use]
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::EncodingError | Self::TooLarge)
    }

    /// Returns `true` if this is an internal problem (5xx-style).
    #[must_use]
    pub fn is_internal_error(&self) -> bool {
        matches!(self, Self::IoError | Self::WalkError)
    }
}

impl ParseWarning {
    /// Create a new scan warning.
    #[must_use]
    pub fn new(path: PathBuf, kind: ParseWarningKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Create an encoding warning for a file.
    #[must_use]
    pub fn encoding_error(path: PathBuf) -> Self {
        Self::new(
            path,
            ParseWarningKind::EncodingError,
            "file is not valid UTF-8",
        )
    }

    /// Create a size-limit warning for a file.
    #[must_use]
    pub fn too_large(path: PathBuf, size: u64, limit: u64) -> Self {
        Self::new(
            path,
            ParseWarningKind::TooLarge,
            format!("{size} bytes exceeds limit of {limit} bytes"),
        )
    }

    /// Create an I/O warning for a file.
    #[must_use]
    pub fn io_error(path: PathBuf, error: &std::io::Error) -> Self {
        Self::new(path, ParseWarningKind::IoError, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warning_kind_categorization() {
        assert!(ParseWarningKind::EncodingError.is_input_error());
        assert!(ParseWarningKind::TooLarge.is_input_error());
        assert!(!ParseWarningKind::EncodingError.is_internal_error());

        assert!(ParseWarningKind::IoError.is_internal_error());
        assert!(ParseWarningKind::WalkError.is_internal_error());
        assert!(!ParseWarningKind::IoError.is_input_error());
    }

    #[test]
    fn warning_display_includes_path_and_kind() {
        let warning = ParseWarning::encoding_error(PathBuf::from("src/blob.py"));

        let display = warning.to_string();
        assert!(display.contains("src/blob.py"));
        assert!(display.contains("UTF-8"));
        assert!(display.contains("encoding error"));
    }

    #[test]
    fn validation_error_names_the_field() {
        let error = ValidationError::missing("source_agent_id");
        assert_eq!(
            error.to_string(),
            "invalid source_agent_id: is required and must not be blank"
        );
    }

    #[test]
    fn scan_error_converts_into_top_level_error() {
        let error: Error = ScanError::NotADirectory {
            path: PathBuf::from("/tmp/file.txt"),
        }
        .into();

        assert!(matches!(error, Error::Scan(ScanError::NotADirectory { .. })));
        assert!(error.to_string().contains("not a directory"));
    }
}
