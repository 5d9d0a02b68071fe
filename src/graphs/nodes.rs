//! Node records stored by the graph builder.
//!
//! A node is an id plus an action factory; the factory receives the
//! compile config and returns the async action the engine will dispatch.
//! Subgraph nodes wrap either an uncompiled [`StateGraph`] (flattened into
//! the parent at compile time) or an already compiled graph (kept as an
//! opaque nested runner).

use std::fmt;
use std::sync::Arc;

use crate::action::NodeAction;
use crate::graphs::StateGraph;
use crate::runtimes::{CompileConfig, CompiledGraph};

/// Factory producing a node's action for a given compile config.
pub type ActionFactory = Arc<dyn Fn(&CompileConfig) -> Arc<dyn NodeAction> + Send + Sync>;

/// Wrap a ready action into a factory that ignores the config.
#[must_use]
pub fn factory_of(action: Arc<dyn NodeAction>) -> ActionFactory {
    Arc::new(move |_config| Arc::clone(&action))
}

/// A node registered with a graph builder.
#[derive(Clone)]
pub(crate) enum GraphNode {
    /// Plain executable node.
    Action { id: String, factory: ActionFactory },
    /// Uncompiled subgraph, flattened into the parent at compile time.
    SubGraph { id: String, graph: Box<StateGraph> },
    /// Pre-compiled subgraph, executed as an opaque nested runner.
    SubCompiled {
        id: String,
        graph: Arc<CompiledGraph>,
    },
}

impl GraphNode {
    /// The node's id; node equality is by id.
    #[must_use]
    pub(crate) fn id(&self) -> &str {
        match self {
            GraphNode::Action { id, .. }
            | GraphNode::SubGraph { id, .. }
            | GraphNode::SubCompiled { id, .. } => id,
        }
    }
}

impl PartialEq for GraphNode {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for GraphNode {}

impl fmt::Debug for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphNode::Action { id, .. } => f.debug_tuple("Action").field(id).finish(),
            GraphNode::SubGraph { id, .. } => f.debug_tuple("SubGraph").field(id).finish(),
            GraphNode::SubCompiled { id, .. } => f.debug_tuple("SubCompiled").field(id).finish(),
        }
    }
}
