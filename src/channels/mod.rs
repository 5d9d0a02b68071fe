//! Per-key update policies for workflow state.
//!
//! A [`Channel`] decides how an incoming update entry combines with the
//! value already stored under a key: plain overwrite, reduction through a
//! binary [`Reducer`], or sequence accumulation
//! ([`AppenderChannel`](appender::AppenderChannel)). Channels also supply
//! the optional default a key starts from and returns to on reset.
//!
//! A [`Schema`] maps state keys to their channels. Keys without a schema
//! entry get overwrite semantics.
//!
//! # Examples
//!
//! ```rust
//! use graphflow::channels::{self, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::from_iter([
//!     ("count".to_string(), channels::base_with_default(
//!         std::sync::Arc::new(|old, new| {
//!             json!(old.as_i64().unwrap_or(0) + new.as_i64().unwrap_or(0))
//!         }),
//!         std::sync::Arc::new(|| json!(0)),
//!     )),
//!     ("msgs".to_string(), channels::appender()),
//! ]);
//! assert_eq!(schema.len(), 2);
//! ```

pub mod appender;

pub use appender::AppenderChannel;

use rustc_hash::FxHashMap;
use serde_json::Value;
use std::sync::Arc;

use crate::state::UpdateValue;

/// Binary merge function: `(old, new) -> merged`.
pub type Reducer = Arc<dyn Fn(Value, Value) -> Value + Send + Sync>;

/// Supplier of a channel's default value.
pub type DefaultProvider = Arc<dyn Fn() -> Value + Send + Sync>;

/// Mapping from state key to the channel governing it.
pub type Schema = FxHashMap<String, Arc<dyn Channel>>;

/// Per-key update policy.
///
/// `update` receives the stored value (if any) and the incoming update
/// entry and returns the effective value, or `None` to drop the key.
/// Implementations must map the reset sentinel to the default (or `None`)
/// and the removal sentinel to `None`, so sentinels never persist.
pub trait Channel: Send + Sync {
    /// The default value for this channel's key, if one is configured.
    fn default_value(&self) -> Option<Value>;

    /// Compute the effective value for `key` given the stored `old` value
    /// and the `incoming` update entry.
    fn update(&self, key: &str, old: Option<&Value>, incoming: UpdateValue) -> Option<Value>;
}

/// Overwrite-or-reduce channel with an optional default.
///
/// Without a reducer the incoming value replaces the stored one. With a
/// reducer, the stored value (or the default when the key is unset) is
/// merged with the incoming value.
#[derive(Clone, Default)]
pub struct BaseChannel {
    default: Option<DefaultProvider>,
    reducer: Option<Reducer>,
}

impl BaseChannel {
    /// Channel with neither default nor reducer: last write wins.
    #[must_use]
    pub fn overwrite() -> Self {
        Self::default()
    }

    /// Channel with a reducer and no default.
    #[must_use]
    pub fn with_reducer(reducer: Reducer) -> Self {
        Self {
            default: None,
            reducer: Some(reducer),
        }
    }

    /// Channel with a default and no reducer.
    #[must_use]
    pub fn with_default(default: DefaultProvider) -> Self {
        Self {
            default: Some(default),
            reducer: None,
        }
    }

    /// Channel with both a reducer and a default.
    #[must_use]
    pub fn new(reducer: Reducer, default: DefaultProvider) -> Self {
        Self {
            default: Some(default),
            reducer: Some(reducer),
        }
    }

    fn reduce(&self, old: Option<&Value>, new: Value) -> Value {
        match &self.reducer {
            Some(reducer) => {
                // The reducer runs even on the first write: the stored
                // value, else the default, else a null seed.
                let left = old
                    .cloned()
                    .or_else(|| self.default_value())
                    .unwrap_or(Value::Null);
                reducer(left, new)
            }
            None => new,
        }
    }
}

impl Channel for BaseChannel {
    fn default_value(&self) -> Option<Value> {
        self.default.as_ref().map(|provider| provider())
    }

    fn update(&self, _key: &str, old: Option<&Value>, incoming: UpdateValue) -> Option<Value> {
        match incoming {
            // A literal null marks a reset, same as the sentinel.
            UpdateValue::Set(Value::Null) | UpdateValue::Reset => self.default_value(),
            UpdateValue::Remove => None,
            UpdateValue::Set(new) => Some(self.reduce(old, new)),
            UpdateValue::ReplaceAll(items) => Some(self.reduce(old, Value::Array(items))),
            UpdateValue::RemoveByHash(target) => match old {
                Some(Value::Array(items)) => Some(Value::Array(
                    appender::remove_first_by_hash(items.clone(), &target),
                )),
                Some(other) => Some(other.clone()),
                None => None,
            },
        }
    }
}

/// Overwrite channel with no default: the semantics of keys absent from
/// the schema.
#[must_use]
pub fn overwrite() -> Arc<dyn Channel> {
    Arc::new(BaseChannel::overwrite())
}

/// Channel reducing updates with `reducer`, no default.
#[must_use]
pub fn base(reducer: Reducer) -> Arc<dyn Channel> {
    Arc::new(BaseChannel::with_reducer(reducer))
}

/// Channel reducing updates with `reducer`, defaulting to `default`.
#[must_use]
pub fn base_with_default(reducer: Reducer, default: DefaultProvider) -> Arc<dyn Channel> {
    Arc::new(BaseChannel::new(reducer, default))
}

/// Overwrite channel defaulting to `default`.
#[must_use]
pub fn value_with_default(default: DefaultProvider) -> Arc<dyn Channel> {
    Arc::new(BaseChannel::with_default(default))
}

/// Appender channel that skips duplicate elements, defaulting to an empty
/// sequence.
#[must_use]
pub fn appender() -> Arc<dyn Channel> {
    Arc::new(AppenderChannel::disallow_duplicates())
}

/// Appender channel that keeps duplicate elements, defaulting to an empty
/// sequence.
#[must_use]
pub fn appender_with_duplicates() -> Arc<dyn Channel> {
    Arc::new(AppenderChannel::allow_duplicates())
}
