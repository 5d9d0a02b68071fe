//! State serialization for checkpoint persistence.
//!
//! Checkpoints store state as opaque bytes; the codec is pluggable through
//! [`StateSerializer`]. The crate ships [`JsonStateSerializer`], which
//! round-trips the keyed state through compact JSON. This module performs
//! no I/O.

use miette::Diagnostic;
use thiserror::Error;

use crate::state::AgentState;

/// Codec failures while persisting or restoring state.
#[derive(Debug, Error, Diagnostic)]
pub enum SerializerError {
    #[error("state serialization failed: {source}")]
    #[diagnostic(code(graphflow::serializer::encode))]
    Encode {
        #[source]
        source: serde_json::Error,
    },

    #[error("state deserialization failed: {source}")]
    #[diagnostic(
        code(graphflow::serializer::decode),
        help("Ensure the checkpoint was written by the same serializer.")
    )]
    Decode {
        #[source]
        source: serde_json::Error,
    },
}

/// Byte-level codec for workflow state.
pub trait StateSerializer: Send + Sync {
    /// Encode `state` into bytes.
    fn serialize(&self, state: &AgentState) -> Result<Vec<u8>, SerializerError>;

    /// Decode bytes previously produced by [`serialize`](Self::serialize).
    fn deserialize(&self, bytes: &[u8]) -> Result<AgentState, SerializerError>;
}

/// Compact-JSON state codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonStateSerializer;

impl StateSerializer for JsonStateSerializer {
    fn serialize(&self, state: &AgentState) -> Result<Vec<u8>, SerializerError> {
        serde_json::to_vec(state).map_err(|source| SerializerError::Encode { source })
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<AgentState, SerializerError> {
        serde_json::from_slice(bytes).map_err(|source| SerializerError::Decode { source })
    }
}
