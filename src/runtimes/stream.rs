//! The step-loop engine behind [`CompiledGraph::stream`].
//!
//! One logical step at a time: resolve the frontier, dispatch its node
//! actions (concurrently for a fanout), fold the returned updates in
//! declaration order, checkpoint, emit outputs, then route onward. The
//! loop ends at `END`, at a configured interruption point, on the first
//! error, or when cancellation is observed at a step boundary.

use async_stream::try_stream;
use futures_util::future::join_all;
use futures_util::Stream;
use std::sync::Arc;

use super::checkpoint::Checkpoint;
use super::compiled::CompiledGraph;
use super::config::RunnableConfig;
use super::errors::RunError;
use crate::action::NodeAction;
use crate::state::{update_state, AgentState, StateData, StateUpdate};
use crate::types::{NodeOutput, END, START};

/// Separator joining fanout member ids into one checkpoint label.
const FANOUT_SEPARATOR: char = '+';

/// The set of nodes a step executes: one node, or a parallel fanout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Frontier {
    members: Vec<String>,
}

impl Frontier {
    pub(crate) fn single(member: String) -> Self {
        Self {
            members: vec![member],
        }
    }

    pub(crate) fn parallel(members: Vec<String>) -> Self {
        Self { members }
    }

    /// Member ids in edge-declaration order.
    pub(crate) fn members(&self) -> &[String] {
        &self.members
    }

    /// Stable label for checkpoints; fanout members join with `+`.
    pub(crate) fn label(&self) -> String {
        self.members.join(&FANOUT_SEPARATOR.to_string())
    }

    /// Inverse of [`label`](Self::label), used when resuming.
    pub(crate) fn from_label(label: &str) -> Self {
        Self {
            members: label.split(FANOUT_SEPARATOR).map(str::to_string).collect(),
        }
    }
}

/// Routing outcome: terminate, or continue with a frontier.
pub(crate) enum Next {
    End,
    Frontier(Frontier),
}

fn ensure_not_cancelled(config: &RunnableConfig) -> Result<(), RunError> {
    if config.cancel_token().is_cancelled() {
        Err(RunError::Cancelled)
    } else {
        Ok(())
    }
}

async fn run_node(
    node: String,
    action: Arc<dyn NodeAction>,
    state: AgentState,
    config: RunnableConfig,
) -> Result<StateUpdate, RunError> {
    tracing::debug!(node = %node, "dispatching node");
    action
        .run(state, config)
        .await
        .map_err(|source| RunError::NodeFailed { node, source })
}

impl CompiledGraph {
    /// Drive `input` through the graph, yielding one [`NodeOutput`] per
    /// executed node until `END`, an interruption point, or an error.
    ///
    /// A config carrying a checkpoint id resumes from that checkpoint
    /// instead of seeding fresh state from `input`; the node recorded as
    /// `next_node` runs first, and an interrupt-before on it is skipped
    /// once so the resume makes progress.
    pub fn stream(
        &self,
        input: StateData,
        config: RunnableConfig,
    ) -> impl Stream<Item = Result<NodeOutput, RunError>> + Send + 'static {
        let graph = self.clone();
        try_stream! {
            let saver = graph.compile_config.saver().cloned();
            let mut state: AgentState;
            let mut frontier: Frontier;
            let mut last_label = START.to_string();
            let mut skip_interrupt_once = false;
            let mut last_saved_next: Option<String> = None;

            if let Some(checkpoint_id) = config.checkpoint_id().map(str::to_string) {
                let saver_ref = saver.as_ref().ok_or_else(|| RunError::NoCheckpoint {
                    thread_id: config.thread_id().to_string(),
                })?;
                let checkpoint = saver_ref
                    .get(config.thread_id(), Some(checkpoint_id.as_str()))
                    .await?
                    .ok_or_else(|| RunError::NoCheckpoint {
                        thread_id: config.thread_id().to_string(),
                    })?;
                state = graph.serializer.deserialize(&checkpoint.state)?;
                last_label = checkpoint.node_id.clone();
                let next = config
                    .next_node()
                    .map(str::to_string)
                    .or_else(|| checkpoint.next_node.clone());
                tracing::debug!(
                    thread = %config.thread_id(),
                    checkpoint = %checkpoint_id,
                    next = ?next,
                    "resuming from checkpoint"
                );
                match next {
                    Some(label) if label != END => {
                        frontier = Frontier::from_label(&label);
                        skip_interrupt_once = true;
                    }
                    _ => return,
                }
            } else {
                state = graph.initial_state(input);
                match graph.resolve_next(START, &mut state, &config).await? {
                    Next::End => return,
                    Next::Frontier(entry) => frontier = entry,
                }
            }

            loop {
                ensure_not_cancelled(&config)?;

                if !skip_interrupt_once
                    && frontier
                        .members()
                        .iter()
                        .any(|member| graph.compile_config.interrupt_before().contains(member))
                {
                    if let Some(saver) = &saver {
                        let label = frontier.label();
                        if last_saved_next.as_deref() != Some(label.as_str()) {
                            let bytes = graph.serializer.serialize(&state)?;
                            saver
                                .put(
                                    config.thread_id(),
                                    Checkpoint::new(last_label.clone(), Some(label), bytes),
                                )
                                .await?;
                        }
                    }
                    tracing::debug!(frontier = %frontier.label(), "paused before dispatch");
                    return;
                }
                skip_interrupt_once = false;

                // Dispatch: every member sees the same pre-step state.
                let members = frontier.members().to_vec();
                let mut futures = Vec::with_capacity(members.len());
                for member in &members {
                    let action = graph
                        .nodes
                        .get(member)
                        .ok_or_else(|| RunError::UnknownNode {
                            node: member.clone(),
                        })?;
                    futures.push(run_node(
                        member.clone(),
                        Arc::clone(action),
                        state.clone(),
                        config.clone(),
                    ));
                }
                let results = join_all(futures).await;

                // Merge in declaration order, regardless of completion order.
                for (member, result) in members.iter().zip(results) {
                    let update = result?;
                    tracing::debug!(node = %member, keys = update.len(), "merging node update");
                    state = update_state(&state, update, &graph.schema);
                }

                // Route immediately so the checkpoint knows where to resume.
                let next = graph.resolve_next(&members[0], &mut state, &config).await?;
                let next_label = match &next {
                    Next::End => None,
                    Next::Frontier(frontier) => Some(frontier.label()),
                };

                let step_label = frontier.label();
                if let Some(saver) = &saver {
                    let bytes = graph.serializer.serialize(&state)?;
                    saver
                        .put(
                            config.thread_id(),
                            Checkpoint::new(step_label.clone(), next_label.clone(), bytes),
                        )
                        .await?;
                    last_saved_next = next_label.clone();
                }

                for member in &members {
                    yield NodeOutput {
                        node_id: member.clone(),
                        state: state.clone(),
                    };
                }

                if members
                    .iter()
                    .any(|member| graph.compile_config.interrupt_after().contains(member))
                {
                    tracing::debug!(step = %step_label, "paused after merge");
                    return;
                }

                match next {
                    Next::End => {
                        if graph.compile_config.release_thread_after_execution() {
                            if let Some(saver) = &saver {
                                saver.release(config.thread_id()).await?;
                            }
                        }
                        tracing::debug!(step = %step_label, "run complete");
                        return;
                    }
                    Next::Frontier(next_frontier) => {
                        last_label = step_label;
                        frontier = next_frontier;
                    }
                }
            }
        }
    }
}
