//! Execution runtime: compilation, the step loop, checkpointing, and
//! invocation configuration.
//!
//! A validated [`StateGraph`](crate::graphs::StateGraph) lowers into a
//! [`CompiledGraph`], the reusable runner. Each invocation streams
//! [`NodeOutput`](crate::types::NodeOutput) values and, when a
//! [`CheckpointSaver`] is configured, leaves a per-thread append-only log
//! of [`Checkpoint`] records behind for inspection
//! ([`CompiledGraph::get_state`], [`CompiledGraph::state_history`]),
//! manual intervention ([`CompiledGraph::update_state`]), and resumption.
//!
//! # Usage
//!
//! ```rust,no_run
//! use graphflow::channels::Schema;
//! use graphflow::graphs::StateGraph;
//! use graphflow::runtimes::{CompileConfig, MemorySaver, RunnableConfig};
//! use graphflow::state::StateData;
//! use std::sync::Arc;
//!
//! # async fn example(graph: StateGraph) -> Result<(), Box<dyn std::error::Error>> {
//! let compiled = graph.compile(
//!     CompileConfig::builder().saver(Arc::new(MemorySaver::new())).build(),
//! )?;
//! let config = RunnableConfig::for_thread("session-1");
//! let final_state = compiled.invoke(StateData::default(), config).await?;
//! # let _ = final_state;
//! # Ok(())
//! # }
//! ```

mod checkpoint;
mod compiled;
mod config;
mod errors;
mod serializer;
mod stream;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointSaver, MemorySaver};
pub use compiled::CompiledGraph;
pub use config::{
    CancelToken, CompileConfig, CompileConfigBuilder, RunnableConfig,
};
pub use errors::RunError;
pub use serializer::{JsonStateSerializer, SerializerError, StateSerializer};

pub(crate) use compiled::compile;
