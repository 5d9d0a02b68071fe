//! The graph builder: declarative assembly of nodes and edges.
//!
//! [`StateGraph`] collects nodes, edges, the channel schema, and the state
//! serializer, then compiles into a
//! [`CompiledGraph`](crate::runtimes::CompiledGraph). Builder methods are
//! fluent and fail fast with [`GraphStateError`] on structural mistakes
//! (duplicate ids, reserved endpoints misused, empty mappings).
//!
//! # Examples
//!
//! ```rust
//! use graphflow::action::node_fn_sync;
//! use graphflow::channels::Schema;
//! use graphflow::graphs::StateGraph;
//! use graphflow::runtimes::CompileConfig;
//! use graphflow::state::UpdateBuilder;
//! use graphflow::types::{END, START};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = StateGraph::with_schema(Schema::default())
//!     .add_node("work", node_fn_sync(|_state| {
//!         Ok(UpdateBuilder::new().set("done", json!(true)).build())
//!     }))?
//!     .add_edge(START, "work")?
//!     .add_edge("work", END)?
//!     .compile(CompileConfig::default())?;
//! # let _ = graph;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use super::edges::{Edge, EdgeCondition, EdgeValue};
use super::nodes::{factory_of, GraphNode};
use super::render::{render, GraphRepresentation, RenderKind};
use crate::action::{Command, CommandAction, NodeAction, NodeError};
use crate::channels::Schema;
use crate::runtimes::{
    compile as compile_graph, CompileConfig, CompiledGraph, JsonStateSerializer, RunnableConfig,
    StateSerializer,
};
use crate::state::{AgentState, StateUpdate, UpdateValue};
use crate::types::{END, START};

/// Structural errors raised while building, validating, or compiling a
/// graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphStateError {
    /// A node id is empty or uses a reserved endpoint id.
    #[error("'{0}' is not a valid node id")]
    #[diagnostic(code(graphflow::graph::invalid_node_id))]
    InvalidNodeId(String),

    /// An edge uses `END` as its source.
    #[error("'{0}' is not a valid edge source")]
    #[diagnostic(
        code(graphflow::graph::invalid_edge_source),
        help("END terminates an invocation; nothing can leave it.")
    )]
    InvalidEdgeSource(String),

    /// A node with the same id already exists.
    #[error("node with id '{0}' already exists")]
    #[diagnostic(code(graphflow::graph::duplicate_node))]
    DuplicateNode(String),

    /// A conditional edge from this source already exists.
    #[error("conditional edge from '{0}' already exists")]
    #[diagnostic(code(graphflow::graph::duplicate_conditional_edge))]
    DuplicateConditionalEdge(String),

    /// A conditional edge was declared with an empty mapping.
    #[error("edge mapping for '{0}' is empty")]
    #[diagnostic(code(graphflow::graph::empty_edge_mapping))]
    EmptyEdgeMapping(String),

    /// No edge leaves `START`.
    #[error("missing entry point")]
    #[diagnostic(
        code(graphflow::graph::missing_entry_point),
        help("Add an edge from START to the first node.")
    )]
    MissingEntryPoint,

    /// An edge references a target node that does not exist.
    #[error("edge from '{from}' targets unknown node '{target}'")]
    #[diagnostic(code(graphflow::graph::unknown_edge_target))]
    UnknownEdgeTarget { from: String, target: String },

    /// An edge's source node does not exist.
    #[error("edge source '{0}' refers to an undefined node")]
    #[diagnostic(code(graphflow::graph::unknown_edge_source))]
    UnknownEdgeSource(String),

    /// A parallel edge lists the same target twice.
    #[error("parallel edge from '{from}' has duplicate target '{target}'")]
    #[diagnostic(code(graphflow::graph::duplicate_parallel_target))]
    DuplicateParallelTarget { from: String, target: String },

    /// A parallel edge contains a conditional slot.
    #[error("parallel edge from '{0}' must not contain a conditional branch")]
    #[diagnostic(code(graphflow::graph::conditional_in_parallel_edge))]
    ConditionalInParallelEdge(String),

    /// A fanout branch lacks the single unconditional outgoing edge the
    /// engine needs to merge the fanout back.
    #[error("parallel branch '{target}' of '{from}' must have exactly one unconditional outgoing edge")]
    #[diagnostic(code(graphflow::graph::invalid_parallel_branch))]
    InvalidParallelBranch { from: String, target: String },

    /// Fanout branches do not converge on a single node.
    #[error("parallel branches of '{0}' must converge on a single node")]
    #[diagnostic(code(graphflow::graph::divergent_parallel_branches))]
    DivergentParallelBranches(String),

    /// An interruption config names a node that does not exist.
    #[error("node '{0}' configured as interruption does not exist")]
    #[diagnostic(code(graphflow::graph::unknown_interrupt_node))]
    UnknownInterruptNode(String),
}

/// Declarative workflow graph under construction.
///
/// Frozen by [`compile`](Self::compile); the compiled artifact is
/// immutable, stateless across invocations, and shareable.
#[derive(Clone)]
pub struct StateGraph {
    pub(crate) schema: Schema,
    pub(crate) serializer: Arc<dyn StateSerializer>,
    pub(crate) nodes: Vec<GraphNode>,
    pub(crate) edges: Vec<Edge>,
}

impl std::fmt::Debug for StateGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateGraph")
            .field("nodes", &self.nodes)
            .field("edges", &self.edges)
            .finish_non_exhaustive()
    }
}

impl StateGraph {
    /// Graph over `schema`, persisting state through `serializer`.
    #[must_use]
    pub fn new(schema: Schema, serializer: Arc<dyn StateSerializer>) -> Self {
        Self {
            schema,
            serializer,
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Graph over `schema` with the JSON state serializer.
    #[must_use]
    pub fn with_schema(schema: Schema) -> Self {
        Self::new(schema, Arc::new(JsonStateSerializer))
    }

    /// The channel schema this graph runs over.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Ids of all registered nodes.
    #[must_use]
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(GraphNode::id).collect()
    }

    /// Declared edges, one per source, in declaration order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub(crate) fn has_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id() == id)
    }

    fn check_node_id(&self, id: &str) -> Result<(), GraphStateError> {
        if id.is_empty() || id == END || id == START {
            return Err(GraphStateError::InvalidNodeId(id.to_string()));
        }
        if self.has_node(id) {
            return Err(GraphStateError::DuplicateNode(id.to_string()));
        }
        Ok(())
    }

    /// Register an executable node.
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        action: Arc<dyn NodeAction>,
    ) -> Result<Self, GraphStateError> {
        let id = id.into();
        self.check_node_id(&id)?;
        self.nodes.push(GraphNode::Action {
            id,
            factory: factory_of(action),
        });
        Ok(self)
    }

    /// Register a routing node: the action's command picks the next node
    /// through `mapping`, and its update is applied before the jump.
    ///
    /// Sugar for a node plus conditional edges. The chosen label travels
    /// through a synthetic state key that the installed edge consumes and
    /// erases, so the command's `goto` is honored.
    pub fn add_command_node(
        self,
        id: impl Into<String>,
        action: Arc<dyn CommandAction>,
        mapping: FxHashMap<String, String>,
    ) -> Result<Self, GraphStateError> {
        let id = id.into();
        let route_key = format!("{id}_next_node");
        let runner: Arc<dyn NodeAction> = Arc::new(CommandNodeAction {
            action,
            route_key: route_key.clone(),
        });
        let router: Arc<dyn CommandAction> = Arc::new(SyntheticRouteAction { route_key });
        self.add_node(id.clone(), runner)?
            .add_conditional_edges(id, router, mapping)
    }

    /// Register an uncompiled subgraph as a node. It shares the parent's
    /// schema and is validated now, then flattened into the parent at
    /// compile time.
    pub fn add_subgraph(
        mut self,
        id: impl Into<String>,
        subgraph: StateGraph,
    ) -> Result<Self, GraphStateError> {
        let id = id.into();
        self.check_node_id(&id)?;
        super::validation::validate(&subgraph.nodes, &subgraph.edges)?;
        self.nodes.push(GraphNode::SubGraph {
            id,
            graph: Box::new(subgraph),
        });
        Ok(self)
    }

    /// Register an already compiled graph as an opaque nested node.
    pub fn add_compiled_subgraph(
        mut self,
        id: impl Into<String>,
        subgraph: Arc<CompiledGraph>,
    ) -> Result<Self, GraphStateError> {
        let id = id.into();
        self.check_node_id(&id)?;
        self.nodes.push(GraphNode::SubCompiled { id, graph: subgraph });
        Ok(self)
    }

    /// Declare a direct transition. Declaring a second target for the same
    /// source turns the edge into a parallel fanout.
    pub fn add_edge(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<Self, GraphStateError> {
        let source = source.into();
        let target = target.into();
        if source == END {
            return Err(GraphStateError::InvalidEdgeSource(source));
        }
        match self.edges.iter_mut().find(|edge| edge.source() == source) {
            Some(edge) => edge.push_target(EdgeValue::Direct(target)),
            None => self.edges.push(Edge::new(source, EdgeValue::Direct(target))),
        }
        Ok(self)
    }

    /// Declare a conditional transition: `condition` runs against the
    /// current state and its command label is resolved through `mapping`.
    pub fn add_conditional_edges(
        mut self,
        source: impl Into<String>,
        condition: Arc<dyn CommandAction>,
        mapping: FxHashMap<String, String>,
    ) -> Result<Self, GraphStateError> {
        let source = source.into();
        if source == END {
            return Err(GraphStateError::InvalidEdgeSource(source));
        }
        if mapping.is_empty() {
            return Err(GraphStateError::EmptyEdgeMapping(source));
        }
        if self.edges.iter().any(|edge| edge.source() == source) {
            return Err(GraphStateError::DuplicateConditionalEdge(source));
        }
        self.edges.push(Edge::new(
            source,
            EdgeValue::Conditional(EdgeCondition::new(condition, mapping)),
        ));
        Ok(self)
    }

    /// Validate and lower the graph into an executable [`CompiledGraph`].
    pub fn compile(self, config: CompileConfig) -> Result<CompiledGraph, GraphStateError> {
        compile_graph(self, config)
    }

    /// Project the graph into a textual diagram description.
    #[must_use]
    pub fn get_graph(
        &self,
        kind: RenderKind,
        title: &str,
        print_conditional: bool,
    ) -> GraphRepresentation {
        render(kind, title, print_conditional, &self.nodes, &self.edges)
    }
}

/// Node half of the command-node sugar: runs the user's command action and
/// stashes the chosen label under the synthetic route key.
struct CommandNodeAction {
    action: Arc<dyn CommandAction>,
    route_key: String,
}

#[async_trait]
impl NodeAction for CommandNodeAction {
    async fn run(
        &self,
        state: AgentState,
        config: RunnableConfig,
    ) -> Result<StateUpdate, NodeError> {
        let command = self.action.run(state, config).await?;
        let (goto, mut update) = command.into_parts();
        if let Some(label) = goto {
            update.insert(self.route_key.clone(), UpdateValue::Set(Value::String(label)));
        }
        Ok(update)
    }
}

/// Edge half of the command-node sugar: reads the synthetic route key and
/// erases it with the removal sentinel.
struct SyntheticRouteAction {
    route_key: String,
}

#[async_trait]
impl CommandAction for SyntheticRouteAction {
    async fn run(&self, state: AgentState, _config: RunnableConfig) -> Result<Command, NodeError> {
        let label = state
            .value_str(&self.route_key)
            .ok_or(NodeError::MissingInput {
                what: "command node route key",
            })?
            .to_string();
        let mut update = StateUpdate::default();
        update.insert(self.route_key.clone(), UpdateValue::Remove);
        Ok(Command::goto_with_update(label, update))
    }
}
