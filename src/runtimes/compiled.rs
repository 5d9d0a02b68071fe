//! Graph lowering and the compiled execution surface.
//!
//! [`compile`] validates the declarative model, flattens sub-state-graph
//! nodes into the parent (namespacing child ids), wraps pre-compiled
//! subgraphs as opaque nested runners, and produces the dispatch tables
//! the engine consumes. The resulting [`CompiledGraph`] is immutable,
//! cheap to clone, and shareable across concurrent invocations; all
//! per-invocation state lives inside the step loop.

use async_trait::async_trait;
use futures_util::StreamExt;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::instrument;

use super::checkpoint::{Checkpoint, CheckpointSaver};
use super::config::{CompileConfig, RunnableConfig};
use super::errors::RunError;
use super::stream::{Frontier, Next};
use crate::action::{NodeAction, NodeError};
use crate::channels::Schema;
use crate::graphs::analysis::TopologyGraph;
use crate::graphs::{
    validate, Edge, EdgeCondition, EdgeValue, GraphNode, GraphStateError, StateGraph,
};
use crate::runtimes::StateSerializer;
use crate::state::{update_state, AgentState, StateData, StateUpdate, UpdateValue};
use crate::types::{StateSnapshot, END, START};

/// Resolved outgoing transition for one source node.
#[derive(Clone)]
pub(crate) enum Route {
    /// Unconditional single target.
    Single(String),
    /// Parallel fanout targets, in declaration order.
    Parallel(Vec<String>),
    /// Runtime-decided target.
    Conditional(EdgeCondition),
}

/// An executable, reusable workflow graph.
#[derive(Clone)]
pub struct CompiledGraph {
    pub(crate) schema: Schema,
    pub(crate) serializer: Arc<dyn StateSerializer>,
    pub(crate) nodes: FxHashMap<String, Arc<dyn NodeAction>>,
    pub(crate) routes: FxHashMap<String, Route>,
    pub(crate) compile_config: CompileConfig,
}

impl std::fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("compile_config", &self.compile_config)
            .finish_non_exhaustive()
    }
}

/// Validate and lower a [`StateGraph`] into a [`CompiledGraph`].
#[instrument(skip(graph, config), err)]
pub(crate) fn compile(
    graph: StateGraph,
    config: CompileConfig,
) -> Result<CompiledGraph, GraphStateError> {
    validate(&graph.nodes, &graph.edges)?;

    let StateGraph {
        schema,
        serializer,
        nodes,
        edges,
    } = graph;
    let (nodes, edges) = flatten(nodes, edges);
    validate(&nodes, &edges)?;

    let mut node_map: FxHashMap<String, Arc<dyn NodeAction>> = FxHashMap::default();
    for node in nodes {
        match node {
            GraphNode::Action { id, factory } => {
                let action = factory(&config);
                node_map.insert(id, action);
            }
            GraphNode::SubCompiled { id, graph } => {
                let runner: Arc<dyn NodeAction> = Arc::new(SubgraphRunner {
                    node_id: id.clone(),
                    graph,
                });
                node_map.insert(id, runner);
            }
            GraphNode::SubGraph { .. } => unreachable!("subgraphs are flattened before lowering"),
        }
    }

    let mut routes: FxHashMap<String, Route> = FxHashMap::default();
    for edge in &edges {
        let route = match edge.targets() {
            [EdgeValue::Direct(target)] => Route::Single(target.clone()),
            [EdgeValue::Conditional(condition)] => Route::Conditional(condition.clone()),
            slots => Route::Parallel(
                slots
                    .iter()
                    .filter_map(EdgeValue::direct_target)
                    .map(str::to_string)
                    .collect(),
            ),
        };
        routes.insert(edge.source().to_string(), route);
    }

    check_parallel_branches(&routes)?;

    for id in config
        .interrupt_before()
        .iter()
        .chain(config.interrupt_after())
    {
        if !node_map.contains_key(id) {
            return Err(GraphStateError::UnknownInterruptNode(id.clone()));
        }
    }

    let reachable = TopologyGraph::from_edges(&edges).reachable_from_start();
    for id in node_map.keys() {
        if !reachable.contains(id) {
            tracing::warn!(node = %id, "node is not reachable from START");
        }
    }

    Ok(CompiledGraph {
        schema,
        serializer,
        nodes: node_map,
        routes,
        compile_config: config,
    })
}

/// Every fanout branch needs a single unconditional outgoing edge, and all
/// branches of one fanout must converge on the same node.
fn check_parallel_branches(routes: &FxHashMap<String, Route>) -> Result<(), GraphStateError> {
    for (source, route) in routes {
        let Route::Parallel(targets) = route else {
            continue;
        };
        let mut convergence: Option<&str> = None;
        for target in targets {
            if target == END {
                return Err(GraphStateError::InvalidParallelBranch {
                    from: source.clone(),
                    target: target.clone(),
                });
            }
            let next = match routes.get(target) {
                Some(Route::Single(next)) => next.as_str(),
                _ => {
                    return Err(GraphStateError::InvalidParallelBranch {
                        from: source.clone(),
                        target: target.clone(),
                    })
                }
            };
            match convergence {
                None => convergence = Some(next),
                Some(existing) if existing == next => {}
                Some(_) => {
                    return Err(GraphStateError::DivergentParallelBranches(source.clone()))
                }
            }
        }
    }
    Ok(())
}

fn prefixed(parent: &str, child: &str) -> String {
    format!("{parent}-{child}")
}

/// Inline every sub-state-graph node: child nodes and edges join the
/// parent under namespaced ids, edges that targeted the subgraph node are
/// spliced onto the child's entry, and child edges reaching `END` take
/// over the parent node's outgoing edge.
fn flatten(mut nodes: Vec<GraphNode>, mut edges: Vec<Edge>) -> (Vec<GraphNode>, Vec<Edge>) {
    while let Some(pos) = nodes
        .iter()
        .position(|node| matches!(node, GraphNode::SubGraph { .. }))
    {
        let GraphNode::SubGraph {
            id: parent_id,
            graph: sub,
        } = nodes.remove(pos)
        else {
            unreachable!()
        };
        let sub = *sub;

        // The parent's outgoing edge becomes the child's exit.
        let exit_slots = match edges.iter().position(|edge| edge.source() == parent_id) {
            Some(index) => edges.remove(index).targets().to_vec(),
            None => vec![EdgeValue::Direct(END.to_string())],
        };
        let exit_single = exit_slots
            .iter()
            .find_map(EdgeValue::direct_target)
            .map(str::to_string);

        let mut sub_edges = sub.edges;
        let entry_index = sub_edges
            .iter()
            .position(|edge| edge.source() == START)
            .expect("subgraph was validated on insertion");
        let entry = sub_edges.remove(entry_index);
        let entry_slots: Vec<EdgeValue> = entry
            .targets()
            .iter()
            .flat_map(|slot| prefix_slot(&parent_id, slot, &exit_slots, exit_single.as_deref()))
            .collect();

        for child in sub.nodes {
            nodes.push(match child {
                GraphNode::Action { id, factory } => GraphNode::Action {
                    id: prefixed(&parent_id, &id),
                    factory,
                },
                GraphNode::SubGraph { id, graph } => GraphNode::SubGraph {
                    id: prefixed(&parent_id, &id),
                    graph,
                },
                GraphNode::SubCompiled { id, graph } => GraphNode::SubCompiled {
                    id: prefixed(&parent_id, &id),
                    graph,
                },
            });
        }

        for edge in sub_edges {
            let source = prefixed(&parent_id, edge.source());
            let slots: Vec<EdgeValue> = edge
                .targets()
                .iter()
                .flat_map(|slot| prefix_slot(&parent_id, slot, &exit_slots, exit_single.as_deref()))
                .collect();
            edges.push(Edge::with_targets(source, slots));
        }

        for edge in edges.iter_mut() {
            edge.retarget(&parent_id, &entry_slots);
        }
    }
    (nodes, edges)
}

/// Namespace one edge slot of a subgraph; `END` targets are replaced with
/// the parent's exit.
fn prefix_slot(
    parent_id: &str,
    slot: &EdgeValue,
    exit_slots: &[EdgeValue],
    exit_single: Option<&str>,
) -> Vec<EdgeValue> {
    match slot {
        EdgeValue::Direct(target) if target == END => exit_slots.to_vec(),
        EdgeValue::Direct(target) => vec![EdgeValue::Direct(prefixed(parent_id, target))],
        EdgeValue::Conditional(condition) => {
            let mapping = condition
                .mapping()
                .iter()
                .map(|(label, target)| {
                    let target = if target == END {
                        exit_single.unwrap_or(END).to_string()
                    } else {
                        prefixed(parent_id, target)
                    };
                    (label.clone(), target)
                })
                .collect();
            vec![EdgeValue::Conditional(EdgeCondition::new(
                condition.action.clone(),
                mapping,
            ))]
        }
    }
}

/// Opaque nested runner wrapping a pre-compiled subgraph.
///
/// Runs the child to completion on the parent's state and returns the
/// child's final state as the update. Checkpoints of the child are scoped
/// under a derived thread id so parent and child logs never collide.
struct SubgraphRunner {
    node_id: String,
    graph: Arc<CompiledGraph>,
}

#[async_trait]
impl NodeAction for SubgraphRunner {
    async fn run(
        &self,
        state: AgentState,
        config: RunnableConfig,
    ) -> Result<StateUpdate, NodeError> {
        let child_config =
            RunnableConfig::for_thread(format!("{}#{}", config.thread_id(), self.node_id))
                .with_cancel_token(config.cancel_token().clone());
        let final_state = self
            .graph
            .invoke(state.into_data(), child_config)
            .await
            .map_err(|err| NodeError::Provider {
                provider: "subgraph",
                message: err.to_string(),
            })?;
        Ok(final_state
            .into_data()
            .into_iter()
            .map(|(key, value)| (key, UpdateValue::Set(value)))
            .collect())
    }
}

impl CompiledGraph {
    /// The channel schema this graph runs over.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Ids of all executable nodes.
    #[must_use]
    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    /// Seed a run: schema defaults first, then the caller's input folded
    /// through the update algebra.
    #[must_use]
    pub(crate) fn initial_state(&self, input: StateData) -> AgentState {
        let mut data = StateData::default();
        for (key, channel) in &self.schema {
            if let Some(default) = channel.default_value() {
                data.insert(key.clone(), default);
            }
        }
        let seed = AgentState::new(data);
        let update: StateUpdate = input
            .into_iter()
            .map(|(key, value)| (key, UpdateValue::Set(value)))
            .collect();
        update_state(&seed, update, &self.schema)
    }

    /// Run to completion, returning the final state.
    ///
    /// Consumes [`stream`](Self::stream); with no outputs (for instance a
    /// graph routing straight to `END`) the initial state is returned.
    #[instrument(skip(self, input, config), err)]
    pub async fn invoke(
        &self,
        input: StateData,
        config: RunnableConfig,
    ) -> Result<AgentState, RunError> {
        let fallback = self.initial_state(input.clone());
        let mut stream = Box::pin(self.stream(input, config));
        let mut last = None;
        while let Some(output) = stream.next().await {
            last = Some(output?.state);
        }
        Ok(last.unwrap_or(fallback))
    }

    /// Latest persisted position of the thread (or the position named by
    /// the config's checkpoint id).
    #[instrument(skip(self, config), err)]
    pub async fn get_state(&self, config: &RunnableConfig) -> Result<StateSnapshot, RunError> {
        let saver = self.require_saver(config)?;
        let checkpoint = saver
            .get(config.thread_id(), config.checkpoint_id())
            .await?
            .ok_or_else(|| RunError::NoCheckpoint {
                thread_id: config.thread_id().to_string(),
            })?;
        self.snapshot_of(checkpoint, config)
    }

    /// All persisted positions of the thread, newest first.
    #[instrument(skip(self, config), err)]
    pub async fn state_history(
        &self,
        config: &RunnableConfig,
    ) -> Result<Vec<StateSnapshot>, RunError> {
        let saver = self.require_saver(config)?;
        let checkpoints = saver.list(config.thread_id()).await?;
        checkpoints
            .into_iter()
            .rev()
            .map(|checkpoint| self.snapshot_of(checkpoint, config))
            .collect()
    }

    /// Fold `values` into the thread's persisted state and append the
    /// result as a synthetic checkpoint, attributed to `as_node` when
    /// given. Returns a config pointing at the new checkpoint.
    #[instrument(skip(self, config, values), err)]
    pub async fn update_state(
        &self,
        config: &RunnableConfig,
        values: StateUpdate,
        as_node: Option<&str>,
    ) -> Result<RunnableConfig, RunError> {
        let saver = Arc::clone(self.require_saver(config)?);
        let checkpoint = saver
            .get(config.thread_id(), config.checkpoint_id())
            .await?
            .ok_or_else(|| RunError::NoCheckpoint {
                thread_id: config.thread_id().to_string(),
            })?;

        let mut state = self.serializer.deserialize(&checkpoint.state)?;
        state = update_state(&state, values, &self.schema);

        let node_id = as_node.unwrap_or(&checkpoint.node_id).to_string();
        let next_node = match as_node {
            Some(node) => match self.resolve_next(node, &mut state, config).await? {
                Next::End => None,
                Next::Frontier(frontier) => Some(frontier.label()),
            },
            None => checkpoint.next_node.clone(),
        };

        let bytes = self.serializer.serialize(&state)?;
        let id = saver
            .put(
                config.thread_id(),
                Checkpoint::new(node_id, next_node.clone(), bytes),
            )
            .await?;
        Ok(config
            .clone()
            .with_checkpoint_id(id)
            .with_next_node(next_node))
    }

    pub(crate) fn require_saver(
        &self,
        config: &RunnableConfig,
    ) -> Result<&Arc<dyn CheckpointSaver>, RunError> {
        self.compile_config
            .saver()
            .ok_or_else(|| RunError::NoCheckpoint {
                thread_id: config.thread_id().to_string(),
            })
    }

    fn snapshot_of(
        &self,
        checkpoint: Checkpoint,
        config: &RunnableConfig,
    ) -> Result<StateSnapshot, RunError> {
        let state = self.serializer.deserialize(&checkpoint.state)?;
        let snapshot_config = config
            .clone()
            .with_checkpoint_id(checkpoint.id)
            .with_next_node(checkpoint.next_node);
        Ok(StateSnapshot {
            node_id: checkpoint.node_id,
            state,
            config: snapshot_config,
        })
    }

    pub(crate) async fn resolve_next(
        &self,
        source: &str,
        state: &mut AgentState,
        config: &RunnableConfig,
    ) -> Result<Next, RunError> {
        let route = self
            .routes
            .get(source)
            .ok_or_else(|| RunError::MissingOutgoingEdge {
                node: source.to_string(),
            })?;
        match route {
            Route::Single(target) if target.as_str() == END => Ok(Next::End),
            Route::Single(target) => Ok(Next::Frontier(Frontier::single(target.clone()))),
            Route::Parallel(targets) => Ok(Next::Frontier(Frontier::parallel(targets.clone()))),
            Route::Conditional(condition) => {
                tracing::debug!(node = %source, "evaluating conditional edge");
                let command = condition
                    .action
                    .run(state.clone(), config.clone())
                    .await
                    .map_err(|err| RunError::NodeFailed {
                        node: source.to_string(),
                        source: err,
                    })?;
                let (goto, update) = command.into_parts();
                if !update.is_empty() {
                    *state = update_state(state, update, &self.schema);
                }
                let label = goto.ok_or_else(|| RunError::UnresolvedRoute {
                    node: source.to_string(),
                    label: "<empty>".to_string(),
                })?;
                let target =
                    condition
                        .mapping
                        .get(&label)
                        .ok_or_else(|| RunError::UnresolvedRoute {
                            node: source.to_string(),
                            label: label.clone(),
                        })?;
                tracing::debug!(node = %source, label = %label, target = %target, "conditional edge resolved");
                if target.as_str() == END {
                    Ok(Next::End)
                } else {
                    Ok(Next::Frontier(Frontier::single(target.clone())))
                }
            }
        }
    }
}
