//! Sequence-accumulating channel.
//!
//! An [`AppenderChannel`] stores an ordered JSON array under its key and
//! folds incoming updates into it: scalars become singleton appends,
//! arrays append element-wise, [`UpdateValue::ReplaceAll`] swaps the whole
//! sequence, and [`UpdateValue::RemoveByHash`] drops the first element
//! whose canonical-JSON hash matches.
//!
//! Two duplicate policies exist. The duplicate-rejecting variant compares
//! incoming elements against the stored sequence by value equality and
//! skips elements already present; the permissive variant appends
//! unconditionally.

use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::{Channel, DefaultProvider};
use crate::state::UpdateValue;

/// How the appender treats incoming elements already present in the
/// stored sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Append every incoming element.
    Allow,
    /// Skip incoming elements equal to an element already stored.
    Reject,
}

/// Channel accumulating an ordered sequence of values.
#[derive(Clone)]
pub struct AppenderChannel {
    policy: DuplicatePolicy,
    default: Option<DefaultProvider>,
}

impl AppenderChannel {
    /// Appender that skips elements already present, starting from an
    /// empty sequence.
    #[must_use]
    pub fn disallow_duplicates() -> Self {
        Self {
            policy: DuplicatePolicy::Reject,
            default: None,
        }
    }

    /// Appender that keeps duplicates, starting from an empty sequence.
    #[must_use]
    pub fn allow_duplicates() -> Self {
        Self {
            policy: DuplicatePolicy::Allow,
            default: None,
        }
    }

    /// Override the default sequence produced on reset and first append.
    #[must_use]
    pub fn with_default(mut self, default: DefaultProvider) -> Self {
        self.default = Some(default);
        self
    }

    fn default_items(&self) -> Vec<Value> {
        match self.default.as_ref().map(|provider| provider()) {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => Vec::new(),
        }
    }

    fn fold(&self, mut left: Vec<Value>, right: Vec<Value>) -> Vec<Value> {
        match self.policy {
            DuplicatePolicy::Allow => {
                left.extend(right);
                left
            }
            DuplicatePolicy::Reject => {
                for item in right {
                    if !left.contains(&item) {
                        left.push(item);
                    }
                }
                left
            }
        }
    }
}

impl Channel for AppenderChannel {
    fn default_value(&self) -> Option<Value> {
        Some(Value::Array(self.default_items()))
    }

    fn update(&self, _key: &str, old: Option<&Value>, incoming: UpdateValue) -> Option<Value> {
        match incoming {
            // A literal null marks a reset, same as the sentinel.
            UpdateValue::Set(Value::Null) | UpdateValue::Reset => self.default_value(),
            UpdateValue::Remove => None,
            UpdateValue::ReplaceAll(items) => Some(Value::Array(items)),
            UpdateValue::RemoveByHash(target) => {
                let items = match old {
                    Some(Value::Array(items)) => items.clone(),
                    Some(other) => vec![other.clone()],
                    None => self.default_items(),
                };
                Some(Value::Array(remove_first_by_hash(items, &target)))
            }
            UpdateValue::Set(new) => {
                let incoming_items = match new {
                    Value::Array(items) => items,
                    scalar => vec![scalar],
                };
                if incoming_items.is_empty() {
                    return old.cloned().or_else(|| self.default_value());
                }
                let left = match old {
                    Some(Value::Array(items)) => items.clone(),
                    Some(scalar) => vec![scalar.clone()],
                    None => self.default_items(),
                };
                Some(Value::Array(self.fold(left, incoming_items)))
            }
        }
    }
}

/// Canonical-JSON hash of a value, used by [`UpdateValue::RemoveByHash`].
#[must_use]
pub fn value_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    hasher.finish()
}

/// Remove the first element of `items` whose hash matches `target`.
///
/// First match wins by iteration order; the remaining elements keep their
/// relative order.
#[must_use]
pub fn remove_first_by_hash(mut items: Vec<Value>, target: &Value) -> Vec<Value> {
    let needle = value_hash(target);
    if let Some(pos) = items.iter().position(|item| value_hash(item) == needle) {
        items.remove(pos);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_coerces_to_singleton() {
        let channel = AppenderChannel::disallow_duplicates();
        let got = channel.update("k", None, UpdateValue::Set(json!("x")));
        assert_eq!(got, Some(json!(["x"])));
    }

    #[test]
    fn array_appends_elementwise() {
        let channel = AppenderChannel::allow_duplicates();
        let got = channel.update("k", Some(&json!(["a"])), UpdateValue::Set(json!(["b", "c"])));
        assert_eq!(got, Some(json!(["a", "b", "c"])));
    }

    #[test]
    fn duplicates_skipped_by_equality() {
        let channel = AppenderChannel::disallow_duplicates();
        let once = channel.update("k", None, UpdateValue::Set(json!("x"))).unwrap();
        let twice = channel.update("k", Some(&once), UpdateValue::Set(json!("x")));
        assert_eq!(twice, Some(json!(["x"])));
    }

    #[test]
    fn duplicates_kept_when_allowed() {
        let channel = AppenderChannel::allow_duplicates();
        let once = channel.update("k", None, UpdateValue::Set(json!("x"))).unwrap();
        let twice = channel.update("k", Some(&once), UpdateValue::Set(json!("x")));
        assert_eq!(twice, Some(json!(["x", "x"])));
    }

    #[test]
    fn replace_all_swaps_sequence() {
        let channel = AppenderChannel::disallow_duplicates();
        let got = channel.update(
            "k",
            Some(&json!(["a", "b", "c"])),
            UpdateValue::ReplaceAll(vec![json!("x"), json!("y")]),
        );
        assert_eq!(got, Some(json!(["x", "y"])));
    }

    #[test]
    fn remove_by_hash_drops_first_match() {
        let channel = AppenderChannel::disallow_duplicates();
        let got = channel.update(
            "k",
            Some(&json!(["a", "b", "a"])),
            UpdateValue::RemoveByHash(json!("a")),
        );
        assert_eq!(got, Some(json!(["b", "a"])));
    }

    #[test]
    fn remove_by_hash_without_match_is_noop() {
        let channel = AppenderChannel::disallow_duplicates();
        let got = channel.update(
            "k",
            Some(&json!(["a"])),
            UpdateValue::RemoveByHash(json!("z")),
        );
        assert_eq!(got, Some(json!(["a"])));
    }

    #[test]
    fn empty_incoming_keeps_old() {
        let channel = AppenderChannel::disallow_duplicates();
        let got = channel.update("k", Some(&json!(["a"])), UpdateValue::Set(json!([])));
        assert_eq!(got, Some(json!(["a"])));
    }

    #[test]
    fn reset_restores_default_sequence() {
        let channel = AppenderChannel::disallow_duplicates();
        let got = channel.update("k", Some(&json!(["a"])), UpdateValue::Reset);
        assert_eq!(got, Some(json!([])));
    }

    #[test]
    fn null_update_resets_sequence() {
        let channel = AppenderChannel::disallow_duplicates();
        let got = channel.update("k", Some(&json!(["a"])), UpdateValue::Set(Value::Null));
        assert_eq!(got, Some(json!([])));
    }

    #[test]
    fn equal_values_hash_equal() {
        assert_eq!(value_hash(&json!({"a": 1})), value_hash(&json!({"a": 1})));
        assert_ne!(value_hash(&json!("a")), value_hash(&json!("b")));
    }
}
