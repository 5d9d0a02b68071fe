//! Execution-time error taxonomy.
//!
//! Configuration mistakes surface earlier as
//! [`GraphStateError`](crate::graphs::GraphStateError); everything that can
//! go wrong while a compiled graph runs lands here. All variants are
//! terminal for the invocation; the engine performs no local recovery.

use miette::Diagnostic;
use thiserror::Error;

use super::checkpoint::CheckpointError;
use super::serializer::SerializerError;
use crate::action::NodeError;

/// Errors surfaced through a compiled graph's stream and surface methods.
#[derive(Debug, Error, Diagnostic)]
pub enum RunError {
    /// A node or condition action failed.
    #[error("node '{node}' failed: {source}")]
    #[diagnostic(code(graphflow::run::node_failed))]
    NodeFailed {
        node: String,
        #[source]
        source: NodeError,
    },

    /// A condition returned a label absent from its mapping.
    #[error("condition at '{node}' returned label '{label}' not present in the mapping")]
    #[diagnostic(
        code(graphflow::run::unresolved_route),
        help("Every label a condition can return must be a key of the edge mapping.")
    )]
    UnresolvedRoute { node: String, label: String },

    /// Routing reached a node with no outgoing edge.
    #[error("node '{node}' has no outgoing edge")]
    #[diagnostic(code(graphflow::run::missing_outgoing_edge))]
    MissingOutgoingEdge { node: String },

    /// Routing targeted a node id absent from the dispatch table.
    #[error("unknown node '{node}'")]
    #[diagnostic(code(graphflow::run::unknown_node))]
    UnknownNode { node: String },

    /// A resume was requested without a usable checkpoint.
    #[error("no checkpoint available for thread '{thread_id}'")]
    #[diagnostic(
        code(graphflow::run::no_checkpoint),
        help("Configure a checkpoint saver at compile time and run at least one step.")
    )]
    NoCheckpoint { thread_id: String },

    /// The checkpoint store failed.
    #[error(transparent)]
    #[diagnostic(code(graphflow::run::checkpoint))]
    Checkpoint(#[from] CheckpointError),

    /// The state codec failed.
    #[error(transparent)]
    #[diagnostic(code(graphflow::run::serializer))]
    Serializer(#[from] SerializerError),

    /// Cooperative cancellation was honored.
    #[error("invocation cancelled")]
    #[diagnostic(code(graphflow::run::cancelled))]
    Cancelled,
}
