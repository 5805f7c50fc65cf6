//! Consistent views of the graph for visualization clients.
//!
//! A [`GraphView`] combines one topology snapshot with the telemetry logs
//! of the nodes it contains. It holds no state of its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::store::{GraphSnapshot, GraphState};
use crate::telemetry::{NodeActivity, TelemetryAnnotation, TelemetryBridge};
use crate::types::{EdgeKind, Language, NodeId, NodeKind};

/// Default number of recent annotations included per node.
pub const DEFAULT_RECENT_ANNOTATIONS: usize = 5;

/// Filters applied when composing a view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizeOptions {
    /// Keep only nodes whose root-relative path has at most this many
    /// directory components (`None` = all)
    pub max_depth: Option<usize>,
    /// Keep external nodes and the edges to them
    pub include_external: bool,
    /// Recent annotations included per node
    pub recent_annotations: usize,
}

impl Default for VisualizeOptions {
    fn default() -> Self {
        Self {
            max_depth: None,
            include_external: true,
            recent_annotations: DEFAULT_RECENT_ANNOTATIONS,
        }
    }
}

/// A node as shown to clients.
#[derive(Debug, Clone, Serialize)]
pub struct NodeView {
    /// Node id
    pub id: NodeId,
    /// Short display name
    pub label: String,
    /// Node kind
    pub kind: NodeKind,
    /// Detected language
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    /// Path relative to the project root, for nodes inside it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    /// Edges entering the node (dependents)
    pub in_degree: usize,
    /// Edges leaving the node (dependencies)
    pub out_degree: usize,
    /// Telemetry counters, if any event was received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<NodeActivity>,
    /// Most recent annotations, newest first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<TelemetryAnnotation>,
}

/// An edge as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    /// Depending node
    pub source: NodeId,
    /// Node depended upon
    pub target: NodeId,
    /// Edge kind
    pub kind: EdgeKind,
    /// Whether the target is a project file
    pub resolved: bool,
}

/// Node and edge tallies of a view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewCounts {
    /// Nodes in the view
    pub nodes: usize,
    /// Edges in the view
    pub edges: usize,
    /// File nodes
    pub files: usize,
    /// External nodes
    pub external: usize,
    /// Placeholder nodes
    pub placeholders: usize,
    /// Edges to external nodes
    pub unresolved_edges: usize,
}

/// A consistent picture of the graph at one instant.
#[derive(Debug, Clone, Serialize)]
pub struct GraphView {
    /// Lifecycle state when the view was taken
    pub state: GraphState,
    /// When the view was composed
    pub generated_at: DateTime<Utc>,
    /// Commit counter of the underlying snapshot
    pub generation: u64,
    /// Tallies
    pub counts: ViewCounts,
    /// Nodes sorted by id
    pub nodes: Vec<NodeView>,
    /// Edges sorted by source, target and kind
    pub edges: Vec<EdgeView>,
}

/// Compose a view of `snapshot` with the annotations held by `bridge`.
#[must_use]
pub fn compose(
    snapshot: &GraphSnapshot,
    bridge: &TelemetryBridge,
    root: &Path,
    state: GraphState,
    options: &VisualizeOptions,
) -> GraphView {
    let graph = snapshot.graph();
    let mut counts = ViewCounts::default();

    let mut nodes: Vec<NodeView> = graph
        .node_indices()
        .filter_map(|idx| {
            let data = &graph[idx];
            let relative = relative_path(&data.id, root);
            if !keep(data.kind, relative.as_deref(), options) {
                return None;
            }
            let (in_degree, out_degree) = snapshot.degree(idx);
            Some(NodeView {
                label: label(&data.id),
                id: data.id.clone(),
                kind: data.kind,
                language: data.language,
                relative_path: relative,
                in_degree,
                out_degree,
                activity: bridge.activity(data.id.as_str()),
                annotations: bridge.recent(data.id.as_str(), options.recent_annotations),
            })
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let kept: std::collections::HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let mut edges: Vec<EdgeView> = snapshot
        .edges()
        .filter(|(source, target, _)| kept.contains(source) && kept.contains(target))
        .map(|(source, target, data)| EdgeView {
            source: source.clone(),
            target: target.clone(),
            kind: data.kind,
            resolved: data.resolved,
        })
        .collect();
    edges.sort_by(|a, b| {
        a.source
            .cmp(&b.source)
            .then_with(|| a.target.cmp(&b.target))
            .then(a.kind.cmp(&b.kind))
    });

    for node in &nodes {
        match node.kind {
            NodeKind::File => counts.files += 1,
            NodeKind::External => counts.external += 1,
            NodeKind::Placeholder => counts.placeholders += 1,
        }
    }
    counts.nodes = nodes.len();
    counts.edges = edges.len();
    counts.unresolved_edges = edges.iter().filter(|e| !e.resolved).count();

    GraphView {
        state,
        generated_at: Utc::now(),
        generation: snapshot.generation(),
        counts,
        nodes,
        edges,
    }
}

fn keep(kind: NodeKind, relative: Option<&str>, options: &VisualizeOptions) -> bool {
    if kind == NodeKind::External {
        return options.include_external;
    }
    match (options.max_depth, relative) {
        (Some(max), Some(rel)) => directory_depth(rel) <= max,
        _ => true,
    }
}

/// Number of directory components in a relative file path.
fn directory_depth(relative: &str) -> usize {
    relative.split('/').filter(|c| !c.is_empty()).count().saturating_sub(1)
}

fn relative_path(id: &NodeId, root: &Path) -> Option<String> {
    if id.is_external() {
        return None;
    }
    Path::new(id.as_str())
        .strip_prefix(root)
        .ok()
        .map(|p| p.to_string_lossy().replace('\\', "/"))
}

fn label(id: &NodeId) -> String {
    if let Some(spec) = id.as_str().strip_prefix(crate::types::EXTERNAL_PREFIX) {
        return spec.to_string();
    }
    Path::new(id.as_str())
        .file_name()
        .map_or_else(|| id.to_string(), |n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::GraphStore;
    use crate::telemetry::TelemetryEvent;
    use crate::types::EdgeSpec;

    fn fixture() -> (GraphStore, TelemetryBridge) {
        let store = GraphStore::new();
        let edges = [
            EdgeSpec::resolved(NodeId::new("/p/main.py"), NodeId::new("/p/pkg/a.py"), EdgeKind::Import),
            EdgeSpec::resolved(NodeId::new("/p/pkg/a.py"), NodeId::new("/p/pkg/sub/b.py"), EdgeKind::Import),
            EdgeSpec::unresolved(NodeId::new("/p/main.py"), "requests", EdgeKind::Import),
        ];
        for edge in &edges {
            store.upsert_edge(edge).unwrap();
        }
        (store, TelemetryBridge::new(10))
    }

    fn ids(view: &GraphView) -> Vec<&str> {
        view.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn full_view_contains_everything_sorted() {
        let (store, bridge) = fixture();
        let view = compose(
            &store.snapshot(),
            &bridge,
            Path::new("/p"),
            GraphState::Ready,
            &VisualizeOptions::default(),
        );

        assert_eq!(
            ids(&view),
            vec!["/p/main.py", "/p/pkg/a.py", "/p/pkg/sub/b.py", "external:requests"]
        );
        assert_eq!(view.counts.edges, 3);
        assert_eq!(view.counts.unresolved_edges, 1);
        assert_eq!(view.nodes[0].out_degree, 2);
        assert_eq!(view.nodes[3].label, "requests");
        assert_eq!(view.nodes[1].relative_path.as_deref(), Some("pkg/a.py"));
    }

    #[test]
    fn max_depth_counts_directory_components() {
        let (store, bridge) = fixture();
        let options = VisualizeOptions {
            max_depth: Some(1),
            include_external: false,
            ..VisualizeOptions::default()
        };
        let view = compose(&store.snapshot(), &bridge, Path::new("/p"), GraphState::Ready, &options);

        assert_eq!(ids(&view), vec!["/p/main.py", "/p/pkg/a.py"]);
        assert_eq!(view.edges.len(), 1);
        assert_eq!(view.edges[0].target.as_str(), "/p/pkg/a.py");
    }

    #[test]
    fn annotations_are_attached_newest_first() {
        let (store, bridge) = fixture();
        for message in ["first", "second"] {
            bridge
                .ingest(
                    &store,
                    Path::new("/p"),
                    TelemetryEvent::new("main.py", "info", message, "agent"),
                )
                .unwrap();
        }

        let view = compose(
            &store.snapshot(),
            &bridge,
            Path::new("/p"),
            GraphState::Ready,
            &VisualizeOptions::default(),
        );
        let main = &view.nodes[0];

        assert_eq!(main.annotations[0].message, "second");
        assert_eq!(main.activity.as_ref().unwrap().event_count, 2);
    }

    #[test]
    fn directory_depth_of_paths() {
        assert_eq!(directory_depth("a.py"), 0);
        assert_eq!(directory_depth("pkg/a.py"), 1);
        assert_eq!(directory_depth("pkg/sub/b.py"), 2);
    }
}
