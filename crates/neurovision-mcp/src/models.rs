//! MCP parameter and response models.
//!
//! Parameter structs derive `JsonSchema` so rmcp can advertise tool input
//! schemas. Graph views, impact outcomes and telemetry acknowledgements are
//! returned as the engine serializes them.

use neurovision::ScanSummary;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// === Parameters ===

/// Parameters for the `set_context` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SetContextParams {
    /// Absolute or relative path of the project root to mount.
    pub project_root: String,
}

/// Parameters for the `refresh_vision` tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RefreshParams {
    /// Project to rescan (defaults to the current context).
    pub project_root: Option<String>,
}

/// Parameters for the `visualize_architecture` tool.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct VisualizeParams {
    /// Project to visualize (defaults to the current context).
    pub project_root: Option<String>,

    /// Only include files at most this many directories below the root.
    pub max_depth: Option<usize>,

    /// Include external dependency nodes (default true).
    pub include_external: Option<bool>,
}

/// Parameters for the `analyze_impact` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ImpactParams {
    /// Node id, absolute path, path relative to the project root, or path
    /// suffix of the file being changed.
    pub target: String,

    /// Project to query (defaults to the current context).
    pub project_root: Option<String>,

    /// Stop the ripple after this many hops.
    pub max_hops: Option<u32>,

    /// Drop results scoring below this confidence (0.0 to 1.0).
    pub min_confidence: Option<f64>,

    /// Witness paths reported per impacted node.
    pub max_paths: Option<usize>,
}

/// Parameters for the `send_telemetry` tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TelemetryParams {
    /// Node id or file path the event refers to.
    pub node: String,

    /// Severity or event type: info, warning, error, execution or
    /// `variable_update`.
    pub severity: String,

    /// Human-readable message.
    pub message: String,

    /// Identifier of the reporting agent.
    pub source_agent_id: String,

    /// When the event happened (RFC 3339); defaults to arrival time.
    pub timestamp: Option<String>,

    /// Free-form key/value data.
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,

    /// Project to annotate (defaults to the current context).
    pub project_root: Option<String>,
}

// === Responses ===

/// Outcome of a full scan, flattened for MCP transport.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ScanReport {
    /// Files parsed and committed.
    pub files_scanned: usize,

    /// Files skipped because nothing changed.
    pub files_unchanged: usize,

    /// Files that could not be read.
    pub files_skipped: usize,

    /// Nodes removed because their file disappeared.
    pub files_removed: usize,

    /// Dependency edges in the graph.
    pub edges: usize,

    /// References that could not be matched to a project file.
    pub unresolved: usize,

    /// Scan time in milliseconds.
    pub duration_ms: u64,

    /// File-level problems, one line each.
    pub warnings: Vec<String>,
}

impl From<ScanSummary> for ScanReport {
    fn from(summary: ScanSummary) -> Self {
        Self {
            files_scanned: summary.files_scanned,
            files_unchanged: summary.files_unchanged,
            files_skipped: summary.files_skipped,
            files_removed: summary.files_removed,
            edges: summary.edges,
            unresolved: summary.unresolved,
            duration_ms: u64::try_from(summary.duration.as_millis()).unwrap_or(u64::MAX),
            warnings: summary.warnings.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Response from the `set_context` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetContextResponse {
    /// The canonical project root that was set.
    pub project_root: String,

    /// Lifecycle state of the project's graph.
    pub state: String,

    /// Scan results if the project was scanned by this call.
    pub scan: Option<ScanReport>,

    /// Nodes in the graph.
    pub nodes: usize,

    /// Edges in the graph.
    pub edges: usize,

    /// Status message.
    pub message: String,
}

/// Response from the `where_am_i` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WhereAmIResponse {
    /// The current project root, if set.
    pub project_root: Option<String>,

    /// Lifecycle state of the current graph, if set.
    pub state: Option<String>,

    /// Nodes in the current graph.
    pub nodes: Option<usize>,

    /// Edges in the current graph.
    pub edges: Option<usize>,

    /// Whether a context is currently set.
    pub context_set: bool,

    /// Projects with a cached engine.
    pub cached_projects: usize,
}

/// Response from the `refresh_vision` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RefreshResponse {
    /// The project that was rescanned.
    pub project_root: String,

    /// Lifecycle state after the scan.
    pub state: String,

    /// Scan results.
    pub scan: ScanReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_scan_report_from_summary() {
        let summary = ScanSummary {
            files_scanned: 3,
            files_unchanged: 1,
            edges: 4,
            duration: Duration::from_millis(1500),
            ..ScanSummary::default()
        };

        let report = ScanReport::from(summary);

        assert_eq!(report.files_scanned, 3);
        assert_eq!(report.files_unchanged, 1);
        assert_eq!(report.edges, 4);
        assert_eq!(report.duration_ms, 1500);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_telemetry_params_optional_fields() {
        let params: TelemetryParams = serde_json::from_str(
            r#"{"node":"a.py","severity":"error","message":"boom","source_agent_id":"agent"}"#,
        )
        .unwrap();

        assert_eq!(params.node, "a.py");
        assert!(params.metadata.is_none());
        assert!(params.timestamp.is_none());
        assert!(params.project_root.is_none());
    }
}
