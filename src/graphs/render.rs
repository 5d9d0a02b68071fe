//! Textual diagram projections of a graph.
//!
//! Pure projection of the declarative model into Mermaid flowchart or
//! PlantUML source. Node and edge labels are the user-supplied ids; the
//! surrounding syntax is presentation only.

use std::fmt::Write;

use super::edges::{Edge, EdgeValue};
use super::nodes::GraphNode;
use crate::types::{END, START};

/// Diagram dialect to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderKind {
    /// Mermaid `flowchart TD` source.
    Mermaid,
    /// PlantUML source.
    PlantUml,
}

/// A rendered diagram: the dialect plus its textual content.
#[derive(Clone, Debug)]
pub struct GraphRepresentation {
    pub kind: RenderKind,
    pub content: String,
}

pub(crate) fn render(
    kind: RenderKind,
    title: &str,
    print_conditional: bool,
    nodes: &[GraphNode],
    edges: &[Edge],
) -> GraphRepresentation {
    let content = match kind {
        RenderKind::Mermaid => mermaid(title, print_conditional, nodes, edges),
        RenderKind::PlantUml => plantuml(title, print_conditional, nodes, edges),
    };
    GraphRepresentation { kind, content }
}

fn mermaid(title: &str, print_conditional: bool, nodes: &[GraphNode], edges: &[Edge]) -> String {
    let mut out = String::new();
    if !title.is_empty() {
        writeln!(out, "---\ntitle: {title}\n---").unwrap();
    }
    writeln!(out, "flowchart TD").unwrap();
    writeln!(out, "\t{START}((start))").unwrap();
    writeln!(out, "\t{END}((stop))").unwrap();
    for node in nodes {
        writeln!(out, "\t{id}(\"{id}\")", id = node.id()).unwrap();
    }
    for edge in edges {
        for slot in edge.targets() {
            match slot {
                EdgeValue::Direct(target) => {
                    writeln!(out, "\t{} --> {}", edge.source(), target).unwrap();
                }
                EdgeValue::Conditional(condition) => {
                    let mut labels: Vec<_> = condition.mapping().iter().collect();
                    labels.sort();
                    for (label, target) in labels {
                        if print_conditional {
                            writeln!(out, "\t{} -.->|{label}| {target}", edge.source()).unwrap();
                        } else {
                            writeln!(out, "\t{} -.-> {target}", edge.source()).unwrap();
                        }
                    }
                }
            }
        }
    }
    out
}

fn plantuml(title: &str, print_conditional: bool, nodes: &[GraphNode], edges: &[Edge]) -> String {
    let mut out = String::new();
    writeln!(out, "@startuml {}", title.replace(' ', "_")).unwrap();
    writeln!(out, "skinparam usecaseFontSize 14").unwrap();
    writeln!(out, "circle start<<input>> as {START}").unwrap();
    writeln!(out, "circle stop as {END}").unwrap();
    for node in nodes {
        writeln!(out, "usecase \"{id}\"<<Node>>", id = node.id()).unwrap();
    }
    for edge in edges {
        for slot in edge.targets() {
            match slot {
                EdgeValue::Direct(target) => {
                    writeln!(out, "{} --> {}", label(edge.source()), label(target)).unwrap();
                }
                EdgeValue::Conditional(condition) => {
                    let mut entries: Vec<_> = condition.mapping().iter().collect();
                    entries.sort();
                    for (cond, target) in entries {
                        if print_conditional {
                            writeln!(
                                out,
                                "{} -[dashed]-> {}: \"{cond}\"",
                                label(edge.source()),
                                label(target)
                            )
                            .unwrap();
                        } else {
                            writeln!(
                                out,
                                "{} -[dashed]-> {}",
                                label(edge.source()),
                                label(target)
                            )
                            .unwrap();
                        }
                    }
                }
            }
        }
    }
    writeln!(out, "@enduml").unwrap();
    out
}

fn label(id: &str) -> String {
    if id == START || id == END {
        id.to_string()
    } else {
        format!("\"{id}\"")
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

    fn sample() -> StateGraph {
        StateGraph::with_schema(Schema::default())
            .add_node("a", node_fn_sync(|_s| Ok(StateUpdate::default())))
            .unwrap()
            .add_node("b", node_fn_sync(|_s| Ok(StateUpdate::default())))
            .unwrap()
            .add_edge(START, "a")
            .unwrap()
            .add_conditional_edges(
                "a",
                edge_fn_sync(|_s| Ok("next".to_string())),
                FxHashMap::from_iter([("next".to_string(), "b".to_string())]),
            )
            .unwrap()
            .add_edge("b", END)
            .unwrap()
    }

    #[test]
    fn mermaid_contains_nodes_and_edges() {
        let repr = sample().get_graph(RenderKind::Mermaid, "demo", true);
        assert!(repr.content.contains("flowchart TD"));
        assert!(repr.content.contains("title: demo"));
        assert!(repr.content.contains("a(\"a\")"));
        assert!(repr.content.contains(&format!("{START} --> a")));
        assert!(repr.content.contains("a -.->|next| b"));
        assert!(repr.content.contains(&format!("b --> {END}")));
    }

    #[test]
    fn mermaid_hides_condition_labels_when_disabled() {
        let repr = sample().get_graph(RenderKind::Mermaid, "", false);
        assert!(!repr.content.contains("|next|"));
        assert!(repr.content.contains("a -.-> b"));
    }

    #[test]
    fn plantuml_is_bracketed() {
        let repr = sample().get_graph(RenderKind::PlantUml, "demo graph", true);
        assert!(repr.content.starts_with("@startuml demo_graph"));
        assert!(repr.content.trim_end().ends_with("@enduml"));
        assert!(repr.content.contains("usecase \"a\"<<Node>>"));
        assert!(repr.content.contains("\"a\" -[dashed]-> \"b\": \"next\""));
    }
}
