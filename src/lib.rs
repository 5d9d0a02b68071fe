//! ```text
//! StateGraph ─┬─► StateGraph::compile ─► CompiledGraph
//!             │                          │
//!             │                          ├─► step loop ─► NodeAction ─► StateUpdate
//!             │                          │                              │
//!             │                          │                              └─► Channels → AgentState
//!             │                          │
//!             │                          └─► CheckpointSaver (in-memory / pluggable)
//!             │
//!             └─► CompileConfig & channel schema wire behaviour end-to-end
//! ```
//!
//! Graphflow is a stateful graph execution engine for multi-step agent
//! workflows: declare nodes (async computations over a shared keyed state)
//! and edges (direct, parallel-fanout, or conditional), compile the graph,
//! and drive an input through it as a lazy stream of state snapshots.

pub mod action;
pub mod channels;
pub mod graphs;
pub mod runtimes;
pub mod state;
pub mod types;
