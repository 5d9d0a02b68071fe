//! Compile-time and invocation-time configuration.
//!
//! [`CompileConfig`] is fixed when a graph is compiled: checkpoint store,
//! interruption points, and thread-release behavior. [`RunnableConfig`]
//! travels with a single invocation: the thread id scoping checkpoints, an
//! optional resume cursor, free-form metadata, and the cooperative
//! [`CancelToken`].

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::checkpoint::CheckpointSaver;

/// Cooperative cancellation signal for an invocation.
///
/// Cloning shares the underlying flag. The engine checks the token at
/// step boundaries; node actions may clone it and poll it themselves.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Fresh, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// `true` once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Configuration frozen into a compiled graph.
#[derive(Clone, Default)]
pub struct CompileConfig {
    saver: Option<Arc<dyn CheckpointSaver>>,
    interrupt_before: FxHashSet<String>,
    interrupt_after: FxHashSet<String>,
    release_thread_after_execution: bool,
}

impl std::fmt::Debug for CompileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileConfig")
            .field("saver", &self.saver.is_some())
            .field("interrupt_before", &self.interrupt_before)
            .field("interrupt_after", &self.interrupt_after)
            .field(
                "release_thread_after_execution",
                &self.release_thread_after_execution,
            )
            .finish()
    }
}

impl CompileConfig {
    /// Start building a compile config.
    #[must_use]
    pub fn builder() -> CompileConfigBuilder {
        CompileConfigBuilder::default()
    }

    /// The configured checkpoint store, if any.
    #[must_use]
    pub fn saver(&self) -> Option<&Arc<dyn CheckpointSaver>> {
        self.saver.as_ref()
    }

    /// Nodes to pause before dispatching.
    #[must_use]
    pub fn interrupt_before(&self) -> &FxHashSet<String> {
        &self.interrupt_before
    }

    /// Nodes to pause after merging.
    #[must_use]
    pub fn interrupt_after(&self) -> &FxHashSet<String> {
        &self.interrupt_after
    }

    /// Whether the thread's checkpoints are deleted once a run completes.
    #[must_use]
    pub fn release_thread_after_execution(&self) -> bool {
        self.release_thread_after_execution
    }
}

/// Builder for [`CompileConfig`].
#[derive(Default)]
pub struct CompileConfigBuilder {
    config: CompileConfig,
}

impl CompileConfigBuilder {
    /// Persist checkpoints through `saver`.
    #[must_use]
    pub fn saver(mut self, saver: Arc<dyn CheckpointSaver>) -> Self {
        self.config.saver = Some(saver);
        self
    }

    /// Pause before dispatching any of `nodes`.
    #[must_use]
    pub fn interrupt_before<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .interrupt_before
            .extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Pause after merging the output of any of `nodes`.
    #[must_use]
    pub fn interrupt_after<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config
            .interrupt_after
            .extend(nodes.into_iter().map(Into::into));
        self
    }

    /// Delete the thread's checkpoints when a run reaches `END`.
    #[must_use]
    pub fn release_thread_after_execution(mut self, release: bool) -> Self {
        self.config.release_thread_after_execution = release;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> CompileConfig {
        self.config
    }
}

/// Per-invocation configuration.
#[derive(Clone, Debug)]
pub struct RunnableConfig {
    thread_id: String,
    checkpoint_id: Option<String>,
    next_node: Option<String>,
    metadata: FxHashMap<String, Value>,
    cancel: CancelToken,
}

impl Default for RunnableConfig {
    fn default() -> Self {
        Self {
            thread_id: "default".to_string(),
            checkpoint_id: None,
            next_node: None,
            metadata: FxHashMap::default(),
            cancel: CancelToken::new(),
        }
    }
}

impl RunnableConfig {
    /// Config scoped to `thread_id`.
    #[must_use]
    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            ..Self::default()
        }
    }

    /// The thread id scoping checkpoints for this invocation.
    #[must_use]
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// The resume cursor, if this config points at a checkpoint.
    #[must_use]
    pub fn checkpoint_id(&self) -> Option<&str> {
        self.checkpoint_id.as_deref()
    }

    /// Override for the next node to execute on resume.
    #[must_use]
    pub fn next_node(&self) -> Option<&str> {
        self.next_node.as_deref()
    }

    /// Free-form metadata attached by the caller.
    #[must_use]
    pub fn metadata(&self) -> &FxHashMap<String, Value> {
        &self.metadata
    }

    /// The invocation's cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Point this config at a checkpoint.
    #[must_use]
    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    /// Set or clear the next-node override.
    #[must_use]
    pub fn with_next_node(mut self, next_node: Option<String>) -> Self {
        self.next_node = next_node;
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Use `token` as the cancellation signal.
    #[must_use]
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
}
