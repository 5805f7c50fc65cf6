//! Property tests for the graph store and impact traversal.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use neurovision::{
    EdgeKind, EdgeSpec, GraphBatch, GraphStore, ImpactAnalyzer, ImpactOptions, ImpactOutcome,
    NodeData, NodeId,
};
use proptest::prelude::*;

const NODES: u8 = 8;

fn name(n: u8) -> NodeId {
    NodeId::new(format!("/p/n{n}.py"))
}

fn edges_strategy() -> impl Strategy<Value = Vec<(u8, u8)>> {
    prop::collection::vec((0..NODES, 0..NODES), 0..24)
        .prop_map(|edges| edges.into_iter().filter(|(a, b)| a != b).collect())
}

fn build(edges: &[(u8, u8)]) -> GraphStore {
    let store = GraphStore::new();
    for &(a, b) in edges {
        store
            .upsert_edge(&EdgeSpec::resolved(name(a), name(b), EdgeKind::Import))
            .expect("non-self edges are valid");
    }
    store
}

/// Shortest distance from each dependent to `target` by plain BFS over the
/// reversed edge list.
fn expected_distances(edges: &[(u8, u8)], target: u8) -> HashMap<u8, u32> {
    let mut dependents: HashMap<u8, Vec<u8>> = HashMap::new();
    for &(a, b) in edges {
        dependents.entry(b).or_default().push(a);
    }
    let mut distances = HashMap::new();
    let mut queue = VecDeque::from([(target, 0)]);
    let mut seen = HashSet::from([target]);
    while let Some((node, d)) = queue.pop_front() {
        for &dep in dependents.get(&node).into_iter().flatten() {
            if seen.insert(dep) {
                distances.insert(dep, d + 1);
                queue.push_back((dep, d + 1));
            }
        }
    }
    distances
}

proptest! {
    #[test]
    fn removing_nodes_never_leaves_dangling_edges(
        edges in edges_strategy(),
        removals in prop::collection::vec(0..NODES, 0..6),
    ) {
        let store = build(&edges);
        let mut batch = GraphBatch::new();
        for &r in &removals {
            batch.remove(name(r));
        }
        store.apply(batch, |_| {}).expect("removal batch is valid");

        let snapshot = store.snapshot();
        let removed: HashSet<NodeId> = removals.iter().map(|&r| name(r)).collect();
        for (source, target, _) in snapshot.edges() {
            prop_assert!(snapshot.contains(source.as_str()));
            prop_assert!(snapshot.contains(target.as_str()));
            prop_assert!(!removed.contains(source) && !removed.contains(target));
        }
        for id in &removed {
            prop_assert!(!snapshot.contains(id.as_str()));
        }
    }

    #[test]
    fn impact_visits_each_dependent_once_at_minimum_distance(
        edges in edges_strategy(),
        target in 0..NODES,
    ) {
        let store = build(&edges);
        let snapshot = store.snapshot();
        let analyzer = ImpactAnalyzer::new(Path::new("/p"));

        let outcome = analyzer.analyze(&snapshot, name(target).as_str(), &ImpactOptions::default());
        let expected = expected_distances(&edges, target);

        match outcome {
            ImpactOutcome::NotFound { .. } => {
                prop_assert!(!edges.iter().any(|&(a, b)| a == target || b == target));
            }
            ImpactOutcome::Found(result) => {
                let actual: HashMap<NodeId, u32> = result
                    .impacted
                    .iter()
                    .filter(|n| n.node != result.root)
                    .map(|n| (n.node.clone(), n.distance))
                    .collect();
                let dependents = result.impacted.iter().filter(|n| n.node != result.root).count();
                prop_assert_eq!(dependents, actual.len(), "a node was reported twice");
                prop_assert_eq!(actual.len(), expected.len());
                for (node, distance) in &expected {
                    prop_assert_eq!(actual.get(&name(*node)), Some(distance));
                }
                let distances: Vec<u32> = result.impacted.iter().map(|n| n.distance).collect();
                let mut sorted = distances.clone();
                sorted.sort_unstable();
                prop_assert_eq!(distances, sorted);
            }
        }
    }

    #[test]
    fn disjoint_concurrent_commits_all_land(
        groups in prop::collection::vec(prop::collection::vec(0u8..4, 1..4), 2..5),
    ) {
        let store = GraphStore::new();
        std::thread::scope(|scope| {
            for (g, targets) in groups.iter().enumerate() {
                let store = &store;
                scope.spawn(move || {
                    let source = NodeId::new(format!("/p/g{g}/main.py"));
                    let edges = targets
                        .iter()
                        .map(|t| {
                            EdgeSpec::resolved(
                                source.clone(),
                                NodeId::new(format!("/p/g{g}/dep{t}.py")),
                                EdgeKind::Import,
                            )
                        })
                        .collect();
                    store
                        .replace_outgoing(NodeData::placeholder(source.clone()), edges, |_| {})
                        .expect("valid edges");
                });
            }
        });

        let expected: usize = groups
            .iter()
            .map(|targets| targets.iter().collect::<HashSet<_>>().len())
            .sum();
        prop_assert_eq!(store.edge_count(), expected);
    }
}
