//! Structural analysis over the declared topology.
//!
//! Converts the edge list into a petgraph `DiGraph` (conditional slots
//! contribute one edge per mapping value) and exposes the few algorithms
//! the crate needs: reachability from `START` and cycle detection. The
//! compiler uses reachability to warn about orphan nodes; tests use it to
//! assert the reachability invariant.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use rustc_hash::{FxHashMap, FxHashSet};

use super::edges::{Edge, EdgeValue};
use crate::types::START;

/// Petgraph view of a workflow topology, node ids as weights.
pub struct TopologyGraph {
    graph: DiGraph<String, ()>,
    indices: FxHashMap<String, NodeIndex>,
}

impl TopologyGraph {
    /// Build the petgraph view from declared edges. Every id appearing as
    /// a source, direct target, or mapping value becomes a node.
    #[must_use]
    pub fn from_edges(edges: &[Edge]) -> Self {
        let mut graph = DiGraph::new();
        let mut indices: FxHashMap<String, NodeIndex> = FxHashMap::default();

        let mut index_of = |graph: &mut DiGraph<String, ()>, id: &str| -> NodeIndex {
            if let Some(idx) = indices.get(id) {
                return *idx;
            }
            let idx = graph.add_node(id.to_string());
            indices.insert(id.to_string(), idx);
            idx
        };

        for edge in edges {
            let source = index_of(&mut graph, edge.source());
            for slot in edge.targets() {
                match slot {
                    EdgeValue::Direct(target) => {
                        let target = index_of(&mut graph, target);
                        graph.add_edge(source, target, ());
                    }
                    EdgeValue::Conditional(condition) => {
                        for target in condition.mapping().values() {
                            let target = index_of(&mut graph, target);
                            graph.add_edge(source, target, ());
                        }
                    }
                }
            }
        }

        Self { graph, indices }
    }

    /// Ids reachable from `START` by following declared edges.
    #[must_use]
    pub fn reachable_from_start(&self) -> FxHashSet<String> {
        let mut reached = FxHashSet::default();
        let Some(start) = self.indices.get(START) else {
            return reached;
        };
        let mut dfs = Dfs::new(&self.graph, *start);
        while let Some(idx) = dfs.next(&self.graph) {
            reached.insert(self.graph[idx].clone());
        }
        reached
    }

    /// `true` if the declared topology contains a directed cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }
}
