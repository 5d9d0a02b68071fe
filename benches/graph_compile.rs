//! Benchmarks for graph building and compilation.
//!
//! Measures builder assembly plus validation, flattening, and lowering
//! for linear chains and fanout shapes of increasing size.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use graphflow::action::{node_fn_sync, NodeAction};
use graphflow::channels::Schema;
use graphflow::graphs::StateGraph;
use graphflow::runtimes::CompileConfig;
use graphflow::state::StateUpdate;
use graphflow::types::{END, START};
use std::sync::Arc;

fn bench_node() -> Arc<dyn NodeAction> {
    node_fn_sync(|_state| Ok(StateUpdate::default()))
}

/// START -> node_0 -> node_1 -> ... -> node_{n-1} -> END
fn build_linear_graph(node_count: usize) -> StateGraph {
    let mut graph = StateGraph::with_schema(Schema::default());
    for i in 0..node_count {
        graph = graph.add_node(format!("node_{i}"), bench_node()).unwrap();
    }
    graph = graph.add_edge(START, "node_0").unwrap();
    for i in 0..node_count - 1 {
        graph = graph
            .add_edge(format!("node_{i}"), format!("node_{}", i + 1))
            .unwrap();
    }
    graph
        .add_edge(format!("node_{}", node_count - 1), END)
        .unwrap()
}

/// START -> splitter -> [width parallel workers] -> sink -> END
fn build_fanout_graph(width: usize) -> StateGraph {
    let mut graph = StateGraph::with_schema(Schema::default())
        .add_node("splitter", bench_node())
        .unwrap()
        .add_node("sink", bench_node())
        .unwrap()
        .add_edge(START, "splitter")
        .unwrap();
    for i in 0..width {
        let worker = format!("worker_{i}");
        graph = graph
            .add_node(worker.clone(), bench_node())
            .unwrap()
            .add_edge("splitter", worker.clone())
            .unwrap()
            .add_edge(worker, "sink")
            .unwrap();
    }
    graph.add_edge("sink", END).unwrap()
}

fn bench_graph_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph_compile");

    for size in [10, 50, 100, 200] {
        group.bench_with_input(BenchmarkId::new("linear", size), &size, |b, &size| {
            b.iter(|| {
                build_linear_graph(size)
                    .compile(CompileConfig::default())
                    .expect("compilation should succeed")
            });
        });
    }

    for width in [10, 50, 100] {
        group.bench_with_input(BenchmarkId::new("fanout", width), &width, |b, &width| {
            b.iter(|| {
                build_fanout_graph(width)
                    .compile(CompileConfig::default())
                    .expect("compilation should succeed")
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_graph_compile);
criterion_main!(benches);
