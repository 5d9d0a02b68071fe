//! Node and edge actions: the async computations attached to a graph.
//!
//! A [`NodeAction`] consumes an immutable state view and produces a partial
//! update. A [`CommandAction`] is the conditional-routing counterpart: it
//! produces a [`Command`] bundling an optional jump label with an optional
//! update. The engine only ever sees these two async traits; plain
//! closures and synchronous functions are lifted through the `*_fn`
//! adapters at the bottom of this module.
//!
//! # Examples
//!
//! ```rust
//! use graphflow::action::{node_fn_sync, edge_fn_sync};
//! use graphflow::state::UpdateBuilder;
//! use serde_json::json;
//!
//! let greet = node_fn_sync(|_state| {
//!     Ok(UpdateBuilder::new().set("greeting", json!("hello")).build())
//! });
//!
//! let route = edge_fn_sync(|state| {
//!     Ok(if state.value("greeting").is_some() { "greeted" } else { "silent" }.to_string())
//! });
//! # let _ = (greet, route);
//! ```

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use miette::Diagnostic;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::runtimes::RunnableConfig;
use crate::state::{AgentState, StateUpdate};

/// Fatal errors raised by node and edge actions.
///
/// Returning an error halts the invocation; the engine wraps it with the
/// failing node's id and surfaces it through the stream.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// Expected input data is missing from the state.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(graphflow::action::missing_input),
        help("Check that an upstream node produced the required key.")
    )]
    MissingInput { what: &'static str },

    /// External provider or service error.
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(graphflow::action::provider))]
    Provider {
        provider: &'static str,
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    #[diagnostic(code(graphflow::action::serde_json))]
    Serde(#[from] serde_json::Error),

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(code(graphflow::action::validation))]
    ValidationFailed(String),
}

/// An executable workflow node.
///
/// Implementations should be stateless: all inputs arrive through the
/// state view and config, all effects leave through the returned update.
#[async_trait]
pub trait NodeAction: Send + Sync {
    /// Execute against an immutable state view, returning a partial update.
    async fn run(
        &self,
        state: AgentState,
        config: RunnableConfig,
    ) -> Result<StateUpdate, NodeError>;
}

/// A conditional-routing action.
///
/// Runs where an edge needs a decision; the returned [`Command`] names the
/// mapping label to follow and may carry a state update, which the engine
/// applies before taking the jump.
#[async_trait]
pub trait CommandAction: Send + Sync {
    /// Decide the route (and optionally update state) for the given state.
    async fn run(&self, state: AgentState, config: RunnableConfig) -> Result<Command, NodeError>;
}

/// Routing directive returned by a [`CommandAction`].
///
/// At most one jump label and one update; an empty command is a no-op.
#[derive(Clone, Debug, Default)]
pub struct Command {
    goto: Option<String>,
    update: StateUpdate,
}

impl Command {
    /// A command with no jump and no update.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Jump to `node` with no state update.
    #[must_use]
    pub fn goto(node: impl Into<String>) -> Self {
        Self {
            goto: Some(node.into()),
            update: StateUpdate::default(),
        }
    }

    /// Update state without a jump.
    #[must_use]
    pub fn update(update: StateUpdate) -> Self {
        Self { goto: None, update }
    }

    /// Jump to `node` and apply `update` before the jump is taken.
    #[must_use]
    pub fn goto_with_update(node: impl Into<String>, update: StateUpdate) -> Self {
        Self {
            goto: Some(node.into()),
            update,
        }
    }

    /// The jump label, if any.
    #[must_use]
    pub fn goto_node(&self) -> Option<&str> {
        self.goto.as_deref()
    }

    /// The bundled state update (possibly empty).
    #[must_use]
    pub fn state_update(&self) -> &StateUpdate {
        &self.update
    }

    /// Split into jump label and update.
    #[must_use]
    pub fn into_parts(self) -> (Option<String>, StateUpdate) {
        (self.goto, self.update)
    }
}

struct FnNode {
    f: Box<dyn Fn(AgentState, RunnableConfig) -> BoxFuture<'static, Result<StateUpdate, NodeError>> + Send + Sync>,
}

#[async_trait]
impl NodeAction for FnNode {
    async fn run(
        &self,
        state: AgentState,
        config: RunnableConfig,
    ) -> Result<StateUpdate, NodeError> {
        (self.f)(state, config).await
    }
}

struct SyncFnNode<F> {
    f: F,
}

#[async_trait]
impl<F> NodeAction for SyncFnNode<F>
where
    F: Fn(AgentState) -> Result<StateUpdate, NodeError> + Send + Sync,
{
    async fn run(
        &self,
        state: AgentState,
        _config: RunnableConfig,
    ) -> Result<StateUpdate, NodeError> {
        (self.f)(state)
    }
}

struct FnEdge {
    f: Box<dyn Fn(AgentState) -> BoxFuture<'static, Result<String, NodeError>> + Send + Sync>,
}

#[async_trait]
impl CommandAction for FnEdge {
    async fn run(&self, state: AgentState, _config: RunnableConfig) -> Result<Command, NodeError> {
        Ok(Command::goto((self.f)(state).await?))
    }
}

struct SyncFnEdge<F> {
    f: F,
}

#[async_trait]
impl<F> CommandAction for SyncFnEdge<F>
where
    F: Fn(AgentState) -> Result<String, NodeError> + Send + Sync,
{
    async fn run(&self, state: AgentState, _config: RunnableConfig) -> Result<Command, NodeError> {
        Ok(Command::goto((self.f)(state)?))
    }
}

struct FnCommand {
    f: Box<dyn Fn(AgentState, RunnableConfig) -> BoxFuture<'static, Result<Command, NodeError>> + Send + Sync>,
}

#[async_trait]
impl CommandAction for FnCommand {
    async fn run(&self, state: AgentState, config: RunnableConfig) -> Result<Command, NodeError> {
        (self.f)(state, config).await
    }
}

/// Lift an async closure over state into a [`NodeAction`].
pub fn node_fn<F, Fut>(f: F) -> Arc<dyn NodeAction>
where
    F: Fn(AgentState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateUpdate, NodeError>> + Send + 'static,
{
    Arc::new(FnNode {
        f: Box::new(move |state, _config| Box::pin(f(state))),
    })
}

/// Lift an async closure over state and config into a [`NodeAction`].
pub fn node_fn_with_config<F, Fut>(f: F) -> Arc<dyn NodeAction>
where
    F: Fn(AgentState, RunnableConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateUpdate, NodeError>> + Send + 'static,
{
    Arc::new(FnNode {
        f: Box::new(move |state, config| Box::pin(f(state, config))),
    })
}

/// Lift a synchronous closure into a [`NodeAction`]. The body runs inline;
/// a thrown error completes the action's future with that error.
pub fn node_fn_sync<F>(f: F) -> Arc<dyn NodeAction>
where
    F: Fn(AgentState) -> Result<StateUpdate, NodeError> + Send + Sync + 'static,
{
    Arc::new(SyncFnNode { f })
}

/// Lift an async label-returning closure into a [`CommandAction`].
pub fn edge_fn<F, Fut>(f: F) -> Arc<dyn CommandAction>
where
    F: Fn(AgentState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, NodeError>> + Send + 'static,
{
    Arc::new(FnEdge {
        f: Box::new(move |state| Box::pin(f(state))),
    })
}

/// Lift a synchronous label-returning closure into a [`CommandAction`].
pub fn edge_fn_sync<F>(f: F) -> Arc<dyn CommandAction>
where
    F: Fn(AgentState) -> Result<String, NodeError> + Send + Sync + 'static,
{
    Arc::new(SyncFnEdge { f })
}

/// Lift an async [`Command`]-returning closure into a [`CommandAction`].
pub fn command_fn<F, Fut>(f: F) -> Arc<dyn CommandAction>
where
    F: Fn(AgentState, RunnableConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Command, NodeError>> + Send + 'static,
{
    Arc::new(FnCommand {
        f: Box::new(move |state, config| Box::pin(f(state, config))),
    })
}
