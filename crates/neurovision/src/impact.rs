//! Impact analysis: which files are affected when one file changes.
//!
//! The ripple set of a node is every node that transitively depends on it,
//! i.e. everything reachable over *incoming* edges. [`ImpactAnalyzer`] walks
//! it breadth-first from the changed node:
//!
//! - each node is enqueued at most once, with its minimum hop distance
//! - incoming edges are visited in ascending source-id order, so the
//!   discovery order (and therefore the result order) is deterministic
//! - every predecessor at distance − 1 is recorded, which yields the witness
//!   paths and the confidence score
//!
//! ## Confidence
//!
//! The changed node scores 1.0. Every other node scores the maximum, over
//! its predecessors, of `pred_score × edge_weight × hop_decay`, where the
//! edge weight depends on whether the edge was resolved to a project file.
//! Nodes reached only through unresolved edges therefore score strictly
//! lower than nodes reached through resolved ones.

use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::{EdgeRef, VisitMap, Visitable};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ImpactDefaults;
use crate::store::Topology;
use crate::types::{NodeId, NodeKind, normalize_path};

/// Risk points per direct dependent.
const DIRECT_RISK: usize = 10;

/// Risk points per transitive dependent.
const TRANSITIVE_RISK: usize = 2;

/// Upper bound of the risk score.
const MAX_RISK: usize = 100;

/// Weights used to score how likely a node is really affected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfidencePolicy {
    /// Weight of an edge to a project file
    pub resolved_weight: f64,
    /// Weight of an edge to an external node
    pub unresolved_weight: f64,
    /// Multiplier applied per hop
    pub hop_decay: f64,
    /// Scores at or above this are `high`
    pub high_threshold: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            resolved_weight: 1.0,
            unresolved_weight: 0.5,
            hop_decay: 1.0,
            high_threshold: 0.75,
        }
    }
}

impl ConfidencePolicy {
    /// Check every weight lies in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns a description of the first out-of-range weight.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("resolved_weight", self.resolved_weight),
            ("unresolved_weight", self.unresolved_weight),
            ("hop_decay", self.hop_decay),
            ("high_threshold", self.high_threshold),
        ];
        for (name, value) in fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("confidence.{name} must be within [0, 1], got {value}"));
            }
        }
        Ok(())
    }

    fn level(&self, score: f64) -> ConfidenceLevel {
        if score >= self.high_threshold {
            ConfidenceLevel::High
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Coarse confidence bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    /// At or above the policy threshold
    High,
    /// Below the policy threshold
    Low,
}

/// Per-query options.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactOptions {
    /// Stop expanding beyond this distance (`None` = unbounded)
    pub max_hops: Option<u32>,
    /// Drop results scoring below this (they are still traversed)
    pub min_confidence: f64,
    /// Witness paths reported per node
    pub max_paths: usize,
    /// Scoring weights
    pub confidence: ConfidencePolicy,
    /// Fall back to matching node ids by path suffix
    pub suffix_match: bool,
}

impl Default for ImpactOptions {
    fn default() -> Self {
        Self {
            max_hops: None,
            min_confidence: 0.0,
            max_paths: 1,
            confidence: ConfidencePolicy::default(),
            suffix_match: true,
        }
    }
}

impl From<&ImpactDefaults> for ImpactOptions {
    fn from(defaults: &ImpactDefaults) -> Self {
        Self {
            max_hops: defaults.max_hops,
            max_paths: defaults.max_paths,
            confidence: defaults.confidence.clone(),
            ..Self::default()
        }
    }
}

/// One affected node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactedNode {
    /// The affected node
    pub node: NodeId,
    /// Node kind
    pub kind: NodeKind,
    /// Minimum number of hops from the changed node
    pub distance: u32,
    /// Witness paths, each running from this node to the changed node
    pub paths: Vec<Vec<NodeId>>,
    /// Confidence score in `[0, 1]`
    pub confidence: f64,
    /// Confidence bucket
    pub level: ConfidenceLevel,
}

/// The ripple set of a changed node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactResult {
    /// The changed node
    pub root: NodeId,
    /// Affected nodes by distance, ties in discovery order
    pub impacted: Vec<ImpactedNode>,
    /// Reported nodes at distance 1, excluding the changed node
    pub direct_count: usize,
    /// Reported nodes at distance 2 or more, excluding the changed node
    pub transitive_count: usize,
    /// `min(100, 10 × direct + 2 × transitive)`
    pub risk_score: u32,
    /// Largest distance discovered
    pub max_depth_reached: u32,
    /// Whether `max_hops` cut the traversal short
    pub truncated: bool,
}

impl ImpactResult {
    /// Affected node ids in result order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.impacted.iter().map(|n| &n.node)
    }
}

/// Outcome of an impact query. A missing target is not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImpactOutcome {
    /// The target was found
    Found(ImpactResult),
    /// No node matches the target
    NotFound {
        /// The target as requested
        target: String,
    },
}

/// BFS bookkeeping for one discovered node.
struct Visit {
    distance: u32,
    preds: Vec<NodeIndex>,
    score: f64,
}

/// Computes ripple sets over graph snapshots.
#[derive(Debug, Clone)]
pub struct ImpactAnalyzer {
    root: PathBuf,
}

impl ImpactAnalyzer {
    /// An analyzer resolving relative targets against `project_root`.
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self {
            root: project_root.to_path_buf(),
        }
    }

    /// Find the node a target string names.
    ///
    /// Tried in order: exact node id, path relative to the project root,
    /// then (if enabled) the shortest node id ending in `/target`, ties
    /// broken lexicographically.
    #[must_use]
    pub fn resolve_target(
        &self,
        topology: &Topology,
        target: &str,
        suffix_match: bool,
    ) -> Option<NodeIndex> {
        let target = target.trim();
        if target.is_empty() {
            return None;
        }
        if let Some(idx) = topology.index_of(target) {
            return Some(idx);
        }
        let path = Path::new(target);
        let absolute = if path.is_absolute() {
            normalize_path(path)
        } else {
            normalize_path(&self.root.join(path))
        };
        if let Some(idx) = topology.index_of(&absolute.to_string_lossy()) {
            return Some(idx);
        }
        if !suffix_match {
            return None;
        }
        let suffix = format!("/{}", target.trim_start_matches("./"));
        topology
            .graph()
            .node_indices()
            .filter(|&idx| topology.graph()[idx].id.as_str().ends_with(&suffix))
            .min_by(|&a, &b| {
                let (a, b) = (topology.graph()[a].id.as_str(), topology.graph()[b].id.as_str());
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            })
    }

    /// Compute the ripple set of `target`.
    #[must_use]
    pub fn analyze(&self, topology: &Topology, target: &str, options: &ImpactOptions) -> ImpactOutcome {
        let Some(root) = self.resolve_target(topology, target, options.suffix_match) else {
            debug!(target, "Impact target not found");
            return ImpactOutcome::NotFound {
                target: target.to_string(),
            };
        };
        let graph = topology.graph();
        let policy = &options.confidence;

        let mut visited = graph.visit_map();
        visited.visit(root);
        let mut visits: HashMap<NodeIndex, Visit> = HashMap::new();
        let mut root_cycle: Option<Visit> = None;
        let mut order: Vec<NodeIndex> = Vec::new();
        let mut queue: VecDeque<(NodeIndex, u32)> = VecDeque::from([(root, 0)]);
        let mut truncated = false;

        while let Some((node, distance)) = queue.pop_front() {
            // Every predecessor at distance - 1 has been merged by now.
            let score = visits.get(&node).map_or(1.0, |v| v.score);
            let mut incoming: Vec<_> = graph
                .edges_directed(node, Direction::Incoming)
                .map(|e| (e.source(), *e.weight()))
                .collect();
            incoming.sort_by(|a, b| graph[a.0].id.cmp(&graph[b.0].id));

            if options.max_hops.is_some_and(|max| distance >= max) {
                truncated |= incoming.iter().any(|(src, _)| {
                    !visited.is_visited(src) || (*src == root && root_cycle.is_none())
                });
                continue;
            }

            let next = distance + 1;
            for (src, edge) in incoming {
                let weight = if edge.resolved {
                    policy.resolved_weight
                } else {
                    policy.unresolved_weight
                };
                let candidate = score * weight * policy.hop_decay;

                if src == root {
                    match &mut root_cycle {
                        None => {
                            root_cycle = Some(Visit {
                                distance: next,
                                preds: vec![node],
                                score: candidate,
                            });
                            order.push(root);
                        }
                        Some(visit) => merge_pred(visit, next, node, candidate),
                    }
                    continue;
                }

                if visited.visit(src) {
                    visits.insert(
                        src,
                        Visit {
                            distance: next,
                            preds: vec![node],
                            score: candidate,
                        },
                    );
                    order.push(src);
                    queue.push_back((src, next));
                } else if let Some(visit) = visits.get_mut(&src) {
                    merge_pred(visit, next, node, candidate);
                }
            }
        }

        let lookup = |idx: NodeIndex| -> Option<&Visit> {
            if idx == root {
                root_cycle.as_ref()
            } else {
                visits.get(&idx)
            }
        };

        let max_depth_reached = order
            .iter()
            .filter_map(|&idx| lookup(idx).map(|v| v.distance))
            .max()
            .unwrap_or(0);

        let mut impacted = Vec::new();
        for &idx in &order {
            let Some(visit) = lookup(idx) else { continue };
            if visit.score < options.min_confidence {
                continue;
            }
            let paths = witness_paths(idx, root, options.max_paths, |n| {
                if n == idx && idx == root {
                    root_cycle.as_ref().map_or(&[][..], |v| &v.preds[..])
                } else {
                    visits.get(&n).map_or(&[][..], |v| &v.preds[..])
                }
            });
            impacted.push(ImpactedNode {
                node: graph[idx].id.clone(),
                kind: graph[idx].kind,
                distance: visit.distance,
                paths: paths
                    .into_iter()
                    .map(|p| p.into_iter().map(|n| graph[n].id.clone()).collect())
                    .collect(),
                confidence: visit.score,
                level: policy.level(visit.score),
            });
        }
        // Discovery order is already distance-major except for a root
        // reached through a cycle, which is recorded on first sight.
        impacted.sort_by_key(|n| n.distance);

        let root_id = &graph[root].id;
        let dependents = impacted.iter().filter(|n| &n.node != root_id);
        let direct_count = dependents.clone().filter(|n| n.distance == 1).count();
        let transitive_count = dependents.filter(|n| n.distance > 1).count();
        let risk = (DIRECT_RISK * direct_count + TRANSITIVE_RISK * transitive_count).min(MAX_RISK);

        debug!(
            root = %graph[root].id,
            impacted = impacted.len(),
            max_depth_reached,
            truncated,
            "Impact analysis complete"
        );

        ImpactOutcome::Found(ImpactResult {
            root: graph[root].id.clone(),
            impacted,
            direct_count,
            transitive_count,
            risk_score: u32::try_from(risk).unwrap_or(u32::MAX),
            max_depth_reached,
            truncated,
        })
    }
}

fn merge_pred(visit: &mut Visit, distance: u32, pred: NodeIndex, score: f64) {
    if visit.distance != distance {
        return;
    }
    if !visit.preds.contains(&pred) {
        visit.preds.push(pred);
    }
    if score > visit.score {
        visit.score = score;
    }
}

/// Up to `limit` paths from `start` back to `root` through recorded
/// predecessors, first predecessors first.
fn witness_paths<'a>(
    start: NodeIndex,
    root: NodeIndex,
    limit: usize,
    preds: impl Fn(NodeIndex) -> &'a [NodeIndex],
) -> Vec<Vec<NodeIndex>> {
    let mut paths = Vec::new();
    let mut stack = vec![vec![start]];
    while let Some(path) = stack.pop() {
        if paths.len() >= limit {
            break;
        }
        let Some(&last) = path.last() else { continue };
        if last == root && path.len() > 1 {
            paths.push(path);
            continue;
        }
        let step = if path.len() == 1 { preds(start) } else { preds(last) };
        for &pred in step.iter().rev() {
            let mut next = path.clone();
            next.push(pred);
            stack.push(next);
        }
    }
    paths
}
