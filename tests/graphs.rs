mod common;

use common::*;
use graphflow::channels::Schema;
use graphflow::graphs::analysis::TopologyGraph;
use graphflow::graphs::{GraphStateError, StateGraph};
use graphflow::runtimes::CompileConfig;
use graphflow::types::{END, START};
use rustc_hash::FxHashMap;

fn mapping(pairs: &[(&str, &str)]) -> FxHashMap<String, String> {
    pairs
        .iter()
        .map(|(label, target)| (label.to_string(), target.to_string()))
        .collect()
}

fn route_to(label: &'static str) -> std::sync::Arc<dyn graphflow::action::CommandAction> {
    graphflow::action::edge_fn_sync(move |_state| Ok(label.to_string()))
}

#[test]
fn compile_rejects_missing_entry_point() {
    let err = StateGraph::with_schema(Schema::default())
        .add_node("a", noop())
        .unwrap()
        .compile(CompileConfig::default())
        .unwrap_err();
    assert!(matches!(err, GraphStateError::MissingEntryPoint));
}

#[test]
fn compile_rejects_dangling_target() {
    let err = StateGraph::with_schema(Schema::default())
        .add_node("a", noop())
        .unwrap()
        .add_edge(START, "a")
        .unwrap()
        .add_edge("a", "ghost")
        .unwrap()
        .compile(CompileConfig::default())
        .unwrap_err();
    assert!(matches!(err, GraphStateError::UnknownEdgeTarget { .. }));
}

#[test]
fn compile_rejects_conditional_slot_in_fanout() {
    let err = StateGraph::with_schema(Schema::default())
        .add_node("a", noop())
        .unwrap()
        .add_node("b", noop())
        .unwrap()
        .add_node("c", noop())
        .unwrap()
        .add_edge(START, "a")
        .unwrap()
        .add_conditional_edges("a", route_to("go"), mapping(&[("go", "b")]))
        .unwrap()
        // second target on a conditional edge makes it a mixed fanout
        .add_edge("a", "c")
        .unwrap()
        .compile(CompileConfig::default())
        .unwrap_err();
    assert!(matches!(err, GraphStateError::ConditionalInParallelEdge(_)));
}

#[test]
fn compile_rejects_divergent_fanout_branches() {
    let err = StateGraph::with_schema(Schema::default())
        .add_node("a", noop())
        .unwrap()
        .add_node("b", noop())
        .unwrap()
        .add_node("c", noop())
        .unwrap()
        .add_node("d", noop())
        .unwrap()
        .add_edge(START, "a")
        .unwrap()
        .add_edge("a", "b")
        .unwrap()
        .add_edge("a", "c")
        .unwrap()
        .add_edge("b", "d")
        .unwrap()
        .add_edge("c", END)
        .unwrap()
        .add_edge("d", END)
        .unwrap()
        .compile(CompileConfig::default())
        .unwrap_err();
    assert!(matches!(err, GraphStateError::DivergentParallelBranches(_)));
}

#[test]
fn compile_rejects_fanout_branch_without_outgoing_edge() {
    let err = StateGraph::with_schema(Schema::default())
        .add_node("a", noop())
        .unwrap()
        .add_node("b", noop())
        .unwrap()
        .add_node("c", noop())
        .unwrap()
        .add_edge(START, "a")
        .unwrap()
        .add_edge("a", "b")
        .unwrap()
        .add_edge("a", "c")
        .unwrap()
        .add_edge("b", END)
        .unwrap()
        .compile(CompileConfig::default())
        .unwrap_err();
    assert!(matches!(err, GraphStateError::InvalidParallelBranch { .. }));
}

#[test]
fn compile_rejects_unknown_interrupt_node() {
    let err = StateGraph::with_schema(Schema::default())
        .add_node("a", noop())
        .unwrap()
        .add_edge(START, "a")
        .unwrap()
        .add_edge("a", END)
        .unwrap()
        .compile(CompileConfig::builder().interrupt_before(["ghost"]).build())
        .unwrap_err();
    assert!(matches!(err, GraphStateError::UnknownInterruptNode(_)));
}

#[test]
fn compile_accepts_converging_fanout() {
    let compiled = StateGraph::with_schema(Schema::default())
        .add_node("a", noop())
        .unwrap()
        .add_node("b", noop())
        .unwrap()
        .add_node("c", noop())
        .unwrap()
        .add_edge(START, "a")
        .unwrap()
        .add_edge("a", "b")
        .unwrap()
        .add_edge("a", "c")
        .unwrap()
        .add_edge("b", END)
        .unwrap()
        .add_edge("c", END)
        .unwrap()
        .compile(CompileConfig::default());
    assert!(compiled.is_ok());
}

#[test]
fn every_edge_target_exists_and_nodes_are_reachable() {
    let graph = StateGraph::with_schema(Schema::default())
        .add_node("a", noop())
        .unwrap()
        .add_node("b", noop())
        .unwrap()
        .add_node("c", noop())
        .unwrap()
        .add_edge(START, "a")
        .unwrap()
        .add_conditional_edges("a", route_to("both"), mapping(&[("both", "b"), ("other", "c")]))
        .unwrap()
        .add_edge("b", END)
        .unwrap()
        .add_edge("c", END)
        .unwrap();

    let topo = TopologyGraph::from_edges(graph.edges());
    let reached = topo.reachable_from_start();
    for id in graph.node_ids() {
        assert!(reached.contains(id), "node '{id}' not reachable from START");
    }
    assert!(reached.contains(END));
    assert!(!topo.is_cyclic());
}
