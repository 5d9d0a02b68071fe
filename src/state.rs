//! Keyed workflow state and the update algebra that evolves it.
//!
//! State is a mapping from string keys to JSON values. Nodes never mutate
//! state in place: they receive an immutable view ([`AgentState`]) and
//! return a partial update ([`StateUpdate`]) which the engine folds into a
//! fresh mapping via [`update_state`].
//!
//! Update entries are [`UpdateValue`] variants rather than bare values so
//! the reset/removal sentinels (and the appender-channel wrappers) can
//! never collide with legitimate data:
//!
//! - [`UpdateValue::Set`]: overwrite or reduce, per the key's channel. A
//!   literal `null` value behaves as a reset; state never holds nulls.
//! - [`UpdateValue::Reset`]: restore the channel default, or drop the key.
//! - [`UpdateValue::Remove`]: drop the key from the state.
//! - [`UpdateValue::ReplaceAll`] / [`UpdateValue::RemoveByHash`]: sequence
//!   operations understood by appender channels.
//!
//! # Examples
//!
//! ```rust
//! use graphflow::state::{AgentState, UpdateBuilder, update_state};
//! use graphflow::channels::Schema;
//! use serde_json::json;
//!
//! let state = AgentState::default();
//! let update = UpdateBuilder::new()
//!     .set("count", json!(1))
//!     .set("label", json!("first"))
//!     .build();
//!
//! let next = update_state(&state, update, &Schema::default());
//! assert_eq!(next.value("count"), Some(&json!(1)));
//! assert_eq!(state.value("count"), None);
//! ```

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channels::{BaseChannel, Channel, Schema};

/// Raw backing map for state data.
pub type StateData = FxHashMap<String, Value>;

/// A partial state update returned by a node or carried by a command.
pub type StateUpdate = FxHashMap<String, UpdateValue>;

/// A single entry of a partial update.
///
/// `Reset` and `Remove` play the role of the process-wide reset/removal
/// sentinels: they are distinct variants, so they compare unequal to every
/// legitimate value by construction and can never leak into persisted
/// state.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateValue {
    /// A new value for the key. Channels apply their reducer (or plain
    /// overwrite) to it; appender channels coerce scalars into a
    /// singleton sequence. Setting `Value::Null` is equivalent to
    /// [`Reset`](Self::Reset).
    Set(Value),
    /// Reset the key to its channel default. Keys without a default are
    /// dropped from the state.
    Reset,
    /// Remove the key from the state.
    Remove,
    /// Replace an appender channel's whole sequence with the given items.
    ReplaceAll(Vec<Value>),
    /// Remove the first element of an appender channel's sequence whose
    /// canonical-JSON hash equals the hash of the given value.
    RemoveByHash(Value),
}

impl UpdateValue {
    /// Wrap any JSON-convertible value as a `Set` entry.
    pub fn of(value: impl Into<Value>) -> Self {
        UpdateValue::Set(value.into())
    }
}

/// Immutable keyed state flowing through a graph.
///
/// Nodes receive a clone of the current state and must treat it as
/// read-only input; all mutation happens through the update algebra.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    data: StateData,
}

impl AgentState {
    /// Wrap an existing data map.
    #[must_use]
    pub fn new(data: StateData) -> Self {
        Self { data }
    }

    /// Read-only view of the backing map.
    #[must_use]
    pub fn data(&self) -> &StateData {
        &self.data
    }

    /// Consume the state, returning the backing map.
    #[must_use]
    pub fn into_data(self) -> StateData {
        self.data
    }

    /// Value stored under `key`, if any.
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// String value stored under `key`, if present and a string.
    #[must_use]
    pub fn value_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Integer value stored under `key`, if present and an integer.
    #[must_use]
    pub fn value_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }

    /// Array value stored under `key`, if present and an array.
    #[must_use]
    pub fn value_array(&self, key: &str) -> Option<&Vec<Value>> {
        self.data.get(key).and_then(Value::as_array)
    }

    /// Number of keys in the state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` if the state holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<StateData> for AgentState {
    fn from(data: StateData) -> Self {
        Self::new(data)
    }
}

/// Fluent constructor for [`StateUpdate`] maps.
///
/// # Examples
///
/// ```rust
/// use graphflow::state::UpdateBuilder;
/// use serde_json::json;
///
/// let update = UpdateBuilder::new()
///     .set("status", json!("done"))
///     .remove("scratch")
///     .build();
/// assert_eq!(update.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct UpdateBuilder {
    entries: StateUpdate,
}

impl UpdateBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries
            .insert(key.into(), UpdateValue::Set(value.into()));
        self
    }

    /// Reset `key` to its channel default.
    #[must_use]
    pub fn reset(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), UpdateValue::Reset);
        self
    }

    /// Remove `key` from the state.
    #[must_use]
    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.entries.insert(key.into(), UpdateValue::Remove);
        self
    }

    /// Replace an appender sequence wholesale.
    #[must_use]
    pub fn replace_all(mut self, key: impl Into<String>, items: Vec<Value>) -> Self {
        self.entries.insert(key.into(), UpdateValue::ReplaceAll(items));
        self
    }

    /// Remove the first matching element of an appender sequence.
    #[must_use]
    pub fn remove_by_hash(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries
            .insert(key.into(), UpdateValue::RemoveByHash(value.into()));
        self
    }

    /// Finish, producing the update map.
    #[must_use]
    pub fn build(self) -> StateUpdate {
        self.entries
    }
}

/// Fold a partial update into `state`, producing a fresh state.
///
/// Each update entry is first transformed by the key's channel (keys
/// absent from the schema get plain overwrite semantics), then merged:
/// an effective value of `None` or `Value::Null` drops the key, anything
/// else replaces it. The input state is never mutated, neither sentinels
/// nor nulls survive the round, and an empty update returns an equal
/// state.
#[must_use]
pub fn update_state(state: &AgentState, update: StateUpdate, schema: &Schema) -> AgentState {
    if update.is_empty() {
        return state.clone();
    }

    let fallback = BaseChannel::overwrite();
    let mut next = state.data().clone();
    for (key, incoming) in update {
        let channel: &dyn Channel = schema
            .get(&key)
            .map(|c| c.as_ref())
            .unwrap_or(&fallback);
        // A null effective value never persists: the key is dropped, just
        // like the removal sentinel.
        match channel.update(&key, next.get(&key), incoming) {
            Some(value) if !value.is_null() => {
                next.insert(key, value);
            }
            _ => {
                next.remove(&key);
            }
        }
    }
    AgentState::new(next)
}
