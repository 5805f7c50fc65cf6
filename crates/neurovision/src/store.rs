//! In-memory dependency graph with copy-on-write snapshots.
//!
//! The topology (a `petgraph` `StableDiGraph` plus an id → index map) lives
//! in an `Arc` behind a `parking_lot::RwLock`:
//!
//! - readers take the lock only long enough to clone the `Arc`
//!   ([`GraphStore::snapshot`]) and then read without any lock
//! - writers mutate through `Arc::make_mut`, which copies the topology only
//!   when a snapshot is still alive
//! - a multi-file commit ([`GraphStore::apply`]) happens under one write
//!   lock, so no reader ever observes a half-applied rescan
//!
//! # Edge Direction
//!
//! Edges point from **dependent → dependency**: `a.py → b.py` means `a.py`
//! imports `b.py`. Dependents of a node are therefore its *incoming*
//! neighbors.

use parking_lot::{Mutex, RwLock};
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::GraphError;
use crate::types::{EdgeData, EdgeKind, EdgeSpec, NodeData, NodeId, NodeKind};

/// Lifecycle of the graph.
///
/// `Empty → Scanning → Ready → Stale → Scanning → Ready …`. A failed or
/// cancelled scan returns to the state held before it started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphState {
    /// Never scanned
    Empty,
    /// A full scan is running
    Scanning,
    /// Reflects the filesystem as of the last scan
    Ready,
    /// The filesystem changed since the last scan
    Stale,
}

impl GraphState {
    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Scanning => "scanning",
            Self::Ready => "ready",
            Self::Stale => "stale",
        }
    }
}

impl std::fmt::Display for GraphState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A neighbor of a node along one edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Neighbor {
    /// The node on the other end of the edge
    pub node: NodeId,
    /// Edge payload
    #[serde(flatten)]
    pub edge: EdgeData,
}

/// Nodes and edges of the graph.
///
/// Only reachable through [`GraphStore`] writes or a [`GraphSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct Topology {
    graph: StableDiGraph<NodeData, EdgeData>,
    index: HashMap<NodeId, NodeIndex>,
    generation: u64,
}

impl Topology {
    /// The underlying petgraph graph.
    #[must_use]
    pub fn graph(&self) -> &StableDiGraph<NodeData, EdgeData> {
        &self.graph
    }

    /// Arena index of a node.
    #[must_use]
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Node attributes.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.index_of(id).map(|idx| &self.graph[idx])
    }

    /// Whether a node exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Commit counter, incremented by every write.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// All nodes, in arena order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.graph.node_weights()
    }

    /// All edges as `(source, target, payload)`.
    pub fn edges(&self) -> impl Iterator<Item = (&NodeId, &NodeId, EdgeData)> {
        self.graph.edge_references().map(|e| {
            (
                &self.graph[e.source()].id,
                &self.graph[e.target()].id,
                *e.weight(),
            )
        })
    }

    /// Neighbors of `id` in `direction`, sorted by node id then edge kind.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if the node does not exist.
    pub fn neighbors(&self, id: &str, direction: Direction) -> Result<Vec<Neighbor>, GraphError> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        let mut out: Vec<Neighbor> = self
            .graph
            .edges_directed(idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                Neighbor {
                    node: self.graph[other].id.clone(),
                    edge: *e.weight(),
                }
            })
            .collect();
        out.sort_by(|a, b| a.node.cmp(&b.node).then(a.edge.kind.cmp(&b.edge.kind)));
        Ok(out)
    }

    /// Number of edges entering and leaving a node.
    #[must_use]
    pub fn degree(&self, idx: NodeIndex) -> (usize, usize) {
        (
            self.graph.edges_directed(idx, Direction::Incoming).count(),
            self.graph.edges_directed(idx, Direction::Outgoing).count(),
        )
    }

    fn upsert_node(&mut self, data: NodeData) -> NodeIndex {
        if let Some(&idx) = self.index.get(&data.id) {
            self.graph[idx] = data;
            idx
        } else {
            let id = data.id.clone();
            let idx = self.graph.add_node(data);
            self.index.insert(id, idx);
            idx
        }
    }

    fn ensure_node(&mut self, id: &NodeId) -> NodeIndex {
        match self.index.get(id) {
            Some(&idx) => idx,
            None => self.upsert_node(NodeData::implied(id.clone())),
        }
    }

    fn remove_node(&mut self, id: &str) -> Option<NodeData> {
        let idx = self.index.remove(id)?;
        // StableGraph drops the node's incident edges with it.
        self.graph.remove_node(idx)
    }

    fn upsert_edge(&mut self, edge: &EdgeSpec) -> Result<bool, GraphError> {
        check_self_loop(edge)?;
        let source = self.ensure_node(&edge.source);
        let target = self.ensure_node(&edge.target);
        let existing = self
            .graph
            .edges_directed(source, Direction::Outgoing)
            .find(|e| e.target() == target && e.weight().kind == edge.data.kind)
            .map(|e| e.id());
        match existing {
            Some(edge_idx) => {
                self.graph[edge_idx] = edge.data;
                Ok(false)
            }
            None => {
                self.graph.add_edge(source, target, edge.data);
                Ok(true)
            }
        }
    }

    fn remove_edge(&mut self, source: &str, target: &str, kind: EdgeKind) -> bool {
        let (Some(s), Some(t)) = (self.index_of(source), self.index_of(target)) else {
            return false;
        };
        let found = self
            .graph
            .edges_directed(s, Direction::Outgoing)
            .find(|e| e.target() == t && e.weight().kind == kind)
            .map(|e| e.id());
        found.is_some_and(|edge_idx| self.graph.remove_edge(edge_idx).is_some())
    }

    fn clear_outgoing(&mut self, idx: NodeIndex) -> usize {
        let edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge_idx in &edges {
            self.graph.remove_edge(*edge_idx);
        }
        edges.len()
    }

    /// Remove external nodes nothing points at any more.
    fn collect_orphan_externals(&mut self) -> Vec<NodeId> {
        let orphans: Vec<NodeId> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph[idx].kind == NodeKind::External
                    && self
                        .graph
                        .edges_directed(idx, Direction::Incoming)
                        .next()
                        .is_none()
            })
            .map(|idx| self.graph[idx].id.clone())
            .collect();
        for id in &orphans {
            self.remove_node(id.as_str());
        }
        orphans
    }
}

fn check_self_loop(edge: &EdgeSpec) -> Result<(), GraphError> {
    if edge.source == edge.target && edge.data.kind != EdgeKind::Cycle {
        return Err(GraphError::SelfLoop(edge.source.to_string()));
    }
    Ok(())
}

/// Immutable point-in-time view of the graph.
///
/// Cheap to clone; never blocks writers and is never affected by them.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot(Arc<Topology>);

impl std::ops::Deref for GraphSnapshot {
    type Target = Topology;

    fn deref(&self) -> &Topology {
        &self.0
    }
}

/// A multi-file change committed in one step.
#[derive(Debug, Clone, Default)]
pub struct GraphBatch {
    upserts: Vec<(NodeData, Vec<EdgeSpec>)>,
    refreshes: Vec<NodeData>,
    removals: Vec<NodeId>,
}

impl GraphBatch {
    /// An empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update `node` and replace its outgoing edges with `edges`.
    pub fn replace(&mut self, node: NodeData, edges: Vec<EdgeSpec>) {
        self.upserts.push((node, edges));
    }

    /// Update node attributes while keeping its edges.
    pub fn refresh(&mut self, node: NodeData) {
        self.refreshes.push(node);
    }

    /// Remove a node and every edge touching it.
    pub fn remove(&mut self, id: NodeId) {
        self.removals.push(id);
    }

    /// Whether the batch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.refreshes.is_empty() && self.removals.is_empty()
    }

    fn validate(&self) -> Result<(), GraphError> {
        for (node, edges) in &self.upserts {
            for edge in edges {
                if edge.source != node.id {
                    return Err(GraphError::UnknownNode(edge.source.to_string()));
                }
                check_self_loop(edge)?;
            }
        }
        Ok(())
    }
}

/// What a commit changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Edges newly created
    pub edges_added: usize,
    /// Edges dropped (replaced outgoing sets and cascades not counted)
    pub edges_removed: usize,
    /// Nodes removed, including collected external nodes
    pub removed: Vec<NodeId>,
}

/// The single shared-mutable graph.
#[derive(Debug)]
pub struct GraphStore {
    topology: RwLock<Arc<Topology>>,
    state: Mutex<GraphState>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            topology: RwLock::new(Arc::new(Topology::default())),
            state: Mutex::new(GraphState::Empty),
        }
    }

    /// Immutable view of the current graph.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot(Arc::clone(&self.topology.read()))
    }

    /// Run `f` against the current topology while holding the read lock.
    ///
    /// Writers wait until `f` returns.
    pub fn read<R>(&self, f: impl FnOnce(&Topology) -> R) -> R {
        f(&self.topology.read())
    }

    fn write<R>(&self, f: impl FnOnce(&mut Topology) -> R) -> R {
        let mut guard = self.topology.write();
        let topology = Arc::make_mut(&mut guard);
        topology.generation += 1;
        f(topology)
    }

    /// Whether a node exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.read(|t| t.contains(id))
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.read(Topology::node_count)
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.read(Topology::edge_count)
    }

    /// Neighbors of a node.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::UnknownNode` if the node does not exist.
    pub fn neighbors(&self, id: &str, direction: Direction) -> Result<Vec<Neighbor>, GraphError> {
        self.read(|t| t.neighbors(id, direction))
    }

    /// Insert a node or replace its attributes. Edges are kept.
    pub fn upsert_node(&self, data: NodeData) {
        trace!(node = %data.id, kind = data.kind.as_str(), "Upsert node");
        self.write(|t| {
            t.upsert_node(data);
        });
    }

    /// Insert `data` unless a node with that id exists, then run `f` while
    /// still holding the write lock.
    pub fn ensure_node_with<R>(&self, data: NodeData, f: impl FnOnce(bool) -> R) -> R {
        let mut guard = self.topology.write();
        if guard.contains(data.id.as_str()) {
            return f(false);
        }
        let topology = Arc::make_mut(&mut guard);
        topology.generation += 1;
        debug!(node = %data.id, kind = data.kind.as_str(), "Created node on first reference");
        topology.upsert_node(data);
        f(true)
    }

    /// Remove a node and every edge touching it.
    pub fn remove_node(&self, id: &str) -> Option<NodeData> {
        self.write(|t| t.remove_node(id))
    }

    /// Insert an edge, creating missing endpoints. Returns `false` when the
    /// (source, target, kind) triple already existed.
    ///
    /// # Errors
    ///
    /// Returns `GraphError::SelfLoop` for a self edge whose kind is not
    /// `cycle`.
    pub fn upsert_edge(&self, edge: &EdgeSpec) -> Result<bool, GraphError> {
        check_self_loop(edge)?;
        self.write(|t| t.upsert_edge(edge))
    }

    /// Remove one edge. Returns whether it existed.
    pub fn remove_edge(&self, source: &str, target: &str, kind: EdgeKind) -> bool {
        self.write(|t| t.remove_edge(source, target, kind))
    }

    /// Replace one node and its outgoing edges in a single step.
    ///
    /// # Errors
    ///
    /// Returns `GraphError` if an edge does not start at `node` or is an
    /// invalid self-loop; nothing is changed in that case.
    pub fn replace_outgoing(
        &self,
        node: NodeData,
        edges: Vec<EdgeSpec>,
        on_removed: impl FnOnce(&[NodeId]),
    ) -> Result<CommitReport, GraphError> {
        let mut batch = GraphBatch::new();
        batch.replace(node, edges);
        self.apply(batch, on_removed)
    }

    /// Commit a batch atomically.
    ///
    /// Removals are applied first, then replacements and refreshes; external
    /// nodes left without incoming edges are collected last. `on_removed`
    /// runs under the same write lock with every removed node id.
    ///
    /// # Errors
    ///
    /// Returns `GraphError` if any edge is invalid; the graph is left
    /// untouched in that case.
    pub fn apply(
        &self,
        batch: GraphBatch,
        on_removed: impl FnOnce(&[NodeId]),
    ) -> Result<CommitReport, GraphError> {
        batch.validate()?;
        let mut guard = self.topology.write();
        let topology = Arc::make_mut(&mut guard);
        topology.generation += 1;

        let mut report = CommitReport::default();
        for id in batch.removals {
            if topology.remove_node(id.as_str()).is_some() {
                report.removed.push(id);
            }
        }
        for (node, edges) in batch.upserts {
            let idx = topology.upsert_node(node);
            report.edges_removed += topology.clear_outgoing(idx);
            for edge in &edges {
                if topology.upsert_edge(edge)? {
                    report.edges_added += 1;
                }
            }
        }
        for node in batch.refreshes {
            topology.upsert_node(node);
        }
        report.removed.extend(topology.collect_orphan_externals());

        on_removed(&report.removed);
        debug!(
            added = report.edges_added,
            removed_edges = report.edges_removed,
            removed_nodes = report.removed.len(),
            generation = topology.generation,
            "Committed graph batch"
        );
        Ok(report)
    }

    // === Lifecycle ===

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> GraphState {
        *self.state.lock()
    }

    /// Enter `Scanning`, returning the state to restore if the scan fails.
    pub fn begin_scan(&self) -> GraphState {
        let mut state = self.state.lock();
        let prior = *state;
        *state = GraphState::Scanning;
        prior
    }

    /// Leave `Scanning` after a successful commit.
    pub fn finish_scan(&self) {
        *self.state.lock() = GraphState::Ready;
    }

    /// Leave `Scanning` without committing.
    pub fn abort_scan(&self, prior: GraphState) {
        *self.state.lock() = prior;
    }

    /// Move `Ready → Stale`. Returns whether the state changed.
    pub fn mark_stale(&self) -> bool {
        let mut state = self.state.lock();
        if *state == GraphState::Ready {
            *state = GraphState::Stale;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn file(s: &str) -> NodeData {
        NodeData {
            kind: NodeKind::File,
            ..NodeData::placeholder(id(s))
        }
    }

    fn import(a: &str, b: &str) -> EdgeSpec {
        EdgeSpec::resolved(id(a), id(b), EdgeKind::Import)
    }

    #[test]
    fn upsert_edge_creates_missing_endpoints() {
        let store = GraphStore::new();
        assert!(store.upsert_edge(&import("/p/a.py", "/p/b.py")).unwrap());

        let snap = store.snapshot();
        assert_eq!(snap.node_count(), 2);
        assert_eq!(snap.node("/p/b.py").unwrap().kind, NodeKind::Placeholder);

        store
            .upsert_edge(&EdgeSpec::unresolved(id("/p/a.py"), "os", EdgeKind::Import))
            .unwrap();
        assert_eq!(
            store.snapshot().node("external:os").unwrap().kind,
            NodeKind::External
        );
    }

    #[test]
    fn duplicate_edges_collapse() {
        let store = GraphStore::new();
        assert!(store.upsert_edge(&import("a", "b")).unwrap());
        assert!(!store.upsert_edge(&import("a", "b")).unwrap());
        assert_eq!(store.edge_count(), 1);

        // Same endpoints, different kind, is a different edge.
        store
            .upsert_edge(&EdgeSpec::resolved(id("a"), id("b"), EdgeKind::Require))
            .unwrap();
        assert_eq!(store.edge_count(), 2);
    }

    #[test]
    fn self_loops_require_cycle_kind() {
        let store = GraphStore::new();
        assert_eq!(
            store.upsert_edge(&import("a", "a")),
            Err(GraphError::SelfLoop("a".to_string()))
        );
        assert_eq!(store.node_count(), 0);

        assert!(
            store
                .upsert_edge(&EdgeSpec::resolved(id("a"), id("a"), EdgeKind::Cycle))
                .unwrap()
        );
    }

    #[test]
    fn remove_node_cascades_edges() {
        let store = GraphStore::new();
        store.upsert_edge(&import("a", "b")).unwrap();
        store.upsert_edge(&import("b", "c")).unwrap();
        store.upsert_edge(&import("c", "a")).unwrap();

        assert!(store.remove_node("b").is_some());

        let snap = store.snapshot();
        assert_eq!(snap.edge_count(), 1);
        assert!(snap.edges().all(|(s, t, _)| s.as_str() != "b" && t.as_str() != "b"));
        assert!(store.remove_node("b").is_none());
    }

    #[test]
    fn remove_edge_reports_presence() {
        let store = GraphStore::new();
        store.upsert_edge(&import("a", "b")).unwrap();

        assert!(!store.remove_edge("a", "b", EdgeKind::Require));
        assert!(store.remove_edge("a", "b", EdgeKind::Import));
        assert!(!store.remove_edge("a", "b", EdgeKind::Import));
        assert_eq!(store.node_count(), 2);
    }

    #[test]
    fn neighbors_are_sorted_and_directional() {
        let store = GraphStore::new();
        store.upsert_edge(&import("z", "t")).unwrap();
        store.upsert_edge(&import("a", "t")).unwrap();

        let incoming = store.neighbors("t", Direction::Incoming).unwrap();
        let ids: Vec<_> = incoming.iter().map(|n| n.node.as_str()).collect();
        assert_eq!(ids, vec!["a", "z"]);
        assert!(store.neighbors("t", Direction::Outgoing).unwrap().is_empty());
        assert!(matches!(
            store.neighbors("missing", Direction::Incoming),
            Err(GraphError::UnknownNode(_))
        ));
    }

    #[test]
    fn replace_outgoing_swaps_edges_and_collects_externals() {
        let store = GraphStore::new();
        store
            .replace_outgoing(
                file("a"),
                vec![
                    import("a", "b"),
                    EdgeSpec::unresolved(id("a"), "requests", EdgeKind::Import),
                ],
                |_| {},
            )
            .unwrap();
        assert_eq!(store.edge_count(), 2);

        let mut dropped = Vec::new();
        let report = store
            .replace_outgoing(file("a"), vec![import("a", "c")], |removed| {
                dropped.extend_from_slice(removed);
            })
            .unwrap();

        assert_eq!(report.edges_added, 1);
        assert_eq!(report.edges_removed, 2);
        assert_eq!(dropped, vec![NodeId::external("requests")]);
        let snap = store.snapshot();
        assert!(!snap.contains("external:requests"));
        // Placeholder b stays; only externals are collected.
        assert!(snap.contains("b"));
        assert_eq!(snap.edge_count(), 1);
    }

    #[test]
    fn invalid_batch_changes_nothing() {
        let store = GraphStore::new();
        store.upsert_edge(&import("a", "b")).unwrap();
        let before = store.snapshot();

        let mut batch = GraphBatch::new();
        batch.remove(id("b"));
        batch.replace(file("c"), vec![import("c", "c")]);
        assert!(store.apply(batch, |_| {}).is_err());

        let after = store.snapshot();
        assert_eq!(after.generation(), before.generation());
        assert!(after.contains("b"));
        assert_eq!(after.edge_count(), 1);
    }

    #[test]
    fn snapshot_is_isolated_from_later_writes() {
        let store = GraphStore::new();
        store.upsert_edge(&import("a", "b")).unwrap();
        let snap = store.snapshot();

        store.remove_node("a");
        store.upsert_edge(&import("x", "y")).unwrap();

        assert!(snap.contains("a"));
        assert_eq!(snap.edge_count(), 1);
        assert!(!store.contains("a"));
        assert!(snap.generation() < store.snapshot().generation());
    }

    #[test]
    fn lifecycle_transitions() {
        let store = GraphStore::new();
        assert_eq!(store.state(), GraphState::Empty);
        assert!(!store.mark_stale());

        let prior = store.begin_scan();
        assert_eq!(store.state(), GraphState::Scanning);
        store.abort_scan(prior);
        assert_eq!(store.state(), GraphState::Empty);

        store.begin_scan();
        store.finish_scan();
        assert_eq!(store.state(), GraphState::Ready);
        assert!(store.mark_stale());
        assert_eq!(store.state(), GraphState::Stale);
        assert!(!store.mark_stale());
    }
}
