//! Pre-compile structural validation.
//!
//! Checks run against the declarative model before lowering:
//!
//! 1. an entry edge leaves `START`;
//! 2. every edge target (direct slot or mapping value) names an existing
//!    node or `END`;
//! 3. every non-`START` edge source names an existing node;
//! 4. a parallel (multi-target) edge is fully unconditional and free of
//!    duplicate targets.
//!
//! Fanout convergence and interruption-node checks need the flattened
//! topology and live in the compiler.

use rustc_hash::FxHashSet;

use super::builder::GraphStateError;
use super::edges::{Edge, EdgeValue};
use super::nodes::GraphNode;
use crate::types::{END, START};

pub(crate) fn validate(nodes: &[GraphNode], edges: &[Edge]) -> Result<(), GraphStateError> {
    let known: FxHashSet<&str> = nodes.iter().map(GraphNode::id).collect();

    edges
        .iter()
        .find(|edge| edge.source() == START)
        .ok_or(GraphStateError::MissingEntryPoint)?;

    for edge in edges {
        if edge.source() != START && !known.contains(edge.source()) {
            return Err(GraphStateError::UnknownEdgeSource(edge.source().to_string()));
        }

        for slot in edge.targets() {
            match slot {
                EdgeValue::Direct(target) => {
                    check_target(&known, edge.source(), target)?;
                }
                EdgeValue::Conditional(condition) => {
                    for target in condition.mapping().values() {
                        check_target(&known, edge.source(), target)?;
                    }
                }
            }
        }

        if edge.is_parallel() {
            let mut seen = FxHashSet::default();
            for slot in edge.targets() {
                let target = slot.direct_target().ok_or_else(|| {
                    GraphStateError::ConditionalInParallelEdge(edge.source().to_string())
                })?;
                if !seen.insert(target) {
                    return Err(GraphStateError::DuplicateParallelTarget {
                        from: edge.source().to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn check_target(
    known: &FxHashSet<&str>,
    source: &str,
    target: &str,
) -> Result<(), GraphStateError> {
    if target == END || known.contains(target) {
        Ok(())
    } else {
        Err(GraphStateError::UnknownEdgeTarget {
            from: source.to_string(),
            target: target.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{edge_fn_sync, node_fn_sync};
    use crate::channels::Schema;
    use crate::graphs::StateGraph;
    use crate::state::StateUpdate;
    use rustc_hash::FxHashMap;
    use std::sync::Arc;

    fn graph() -> StateGraph {
        StateGraph::with_schema(Schema::default())
    }

    fn noop() -> Arc<dyn crate::action::NodeAction> {
        node_fn_sync(|_state| Ok(StateUpdate::default()))
    }

    #[test]
    fn missing_entry_point_detected() {
        let g = graph().add_node("a", noop()).unwrap();
        let err = validate(&g.nodes, &g.edges).unwrap_err();
        assert!(matches!(err, GraphStateError::MissingEntryPoint));
    }

    #[test]
    fn dangling_target_detected() {
        let g = graph().add_edge(START, "ghost").unwrap();
        let err = validate(&g.nodes, &g.edges).unwrap_err();
        assert!(matches!(err, GraphStateError::UnknownEdgeTarget { .. }));
    }

    #[test]
    fn dangling_mapping_target_detected() {
        let g = graph()
            .add_node("a", noop())
            .unwrap()
            .add_edge(START, "a")
            .unwrap()
            .add_conditional_edges(
                "a",
                edge_fn_sync(|_state| Ok("x".to_string())),
                FxHashMap::from_iter([("x".to_string(), "ghost".to_string())]),
            )
            .unwrap();
        let err = validate(&g.nodes, &g.edges).unwrap_err();
        assert!(matches!(err, GraphStateError::UnknownEdgeTarget { .. }));
    }

    #[test]
    fn unknown_edge_source_detected() {
        let g = graph()
            .add_node("a", noop())
            .unwrap()
            .add_edge(START, "a")
            .unwrap()
            .add_edge("ghost", "a")
            .unwrap();
        let err = validate(&g.nodes, &g.edges).unwrap_err();
        assert!(matches!(err, GraphStateError::UnknownEdgeSource(_)));
    }

    #[test]
    fn duplicate_parallel_target_detected() {
        let g = graph()
            .add_node("a", noop())
            .unwrap()
            .add_edge(START, "a")
            .unwrap()
            .add_edge(START, "a")
            .unwrap();
        let err = validate(&g.nodes, &g.edges).unwrap_err();
        assert!(matches!(err, GraphStateError::DuplicateParallelTarget { .. }));
    }

    #[test]
    fn valid_linear_graph_passes() {
        let g = graph()
            .add_node("a", noop())
            .unwrap()
            .add_edge(START, "a")
            .unwrap()
            .add_edge("a", END)
            .unwrap();
        assert!(validate(&g.nodes, &g.edges).is_ok());
    }
}
