//! Error types for the NeuroVision MCP server.

use rmcp::ErrorData as McpError;
use thiserror::Error;

/// Errors that can occur in the NeuroVision MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// No project context has been set.
    #[error("No project context set. Call set_context first.")]
    NoContext,

    /// The specified project root was not found or the path is invalid.
    #[error("Project not found: {path}")]
    ProjectNotFound {
        /// The path that was not found.
        path: String,
        /// The underlying IO error, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// Project exists but was not mounted via `set_context`.
    #[error("Project not mounted: {0}. Call set_context first.")]
    ProjectNotMounted(String),

    /// A tool argument was malformed.
    #[error("Invalid {field}: {reason}")]
    InvalidArgument {
        /// The field name that had an invalid value.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// An error from the graph engine.
    #[error(transparent)]
    Engine(#[from] neurovision::Error),

    /// A blocking engine task panicked or was aborted.
    #[error("Engine task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MCP protocol error.
    #[error("MCP error: {0}")]
    Mcp(String),
}

impl Error {
    /// Whether the caller can fix this error by changing the request.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        match self {
            Self::NoContext
            | Self::ProjectNotFound { .. }
            | Self::ProjectNotMounted(_)
            | Self::InvalidArgument { .. } => true,
            Self::Engine(e) => matches!(
                e,
                neurovision::Error::Validation(_) | neurovision::Error::Scan(_)
            ),
            Self::Join(_) | Self::Json(_) | Self::Mcp(_) => false,
        }
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        if err.is_caller_error() {
            McpError::invalid_params(err.to_string(), None)
        } else {
            McpError::internal_error(err.to_string(), None)
        }
    }
}

/// Result type for NeuroVision MCP operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use neurovision::ValidationError;

    const INVALID_PARAMS: i32 = -32602;
    const INTERNAL_ERROR: i32 = -32603;

    #[test]
    fn validation_failures_are_invalid_params() {
        let err = Error::Engine(ValidationError::missing("severity").into());
        let mcp: McpError = err.into();
        assert_eq!(mcp.code.0, INVALID_PARAMS);
        assert!(mcp.message.contains("severity"));
    }

    #[test]
    fn missing_context_is_invalid_params() {
        let mcp: McpError = Error::NoContext.into();
        assert_eq!(mcp.code.0, INVALID_PARAMS);
    }

    #[test]
    fn cancelled_scan_is_internal() {
        let mcp: McpError = Error::Engine(neurovision::Error::Cancelled).into();
        assert_eq!(mcp.code.0, INTERNAL_ERROR);
    }
}
