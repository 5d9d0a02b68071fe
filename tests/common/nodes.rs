use graphflow::action::{node_fn, node_fn_sync, NodeAction};
use graphflow::state::{StateUpdate, UpdateBuilder, UpdateValue};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Node that does nothing.
pub fn noop() -> Arc<dyn NodeAction> {
    node_fn_sync(|_state| Ok(StateUpdate::default()))
}

/// Node setting `key` to a fixed value.
pub fn set_value(key: &'static str, value: Value) -> Arc<dyn NodeAction> {
    node_fn_sync(move |_state| Ok(UpdateBuilder::new().set(key, value.clone()).build()))
}

/// Node contributing `n` to the `count` key (relies on a sum reducer).
pub fn add_count(n: i64) -> Arc<dyn NodeAction> {
    node_fn_sync(move |_state| Ok(UpdateBuilder::new().set("count", n).build()))
}

/// Node appending a value to the `msgs` appender key.
pub fn append_msg(value: Value) -> Arc<dyn NodeAction> {
    node_fn_sync(move |_state| Ok(UpdateBuilder::new().set("msgs", value.clone()).build()))
}

/// Node removing a `msgs` element by hash.
pub fn remove_msg(value: Value) -> Arc<dyn NodeAction> {
    node_fn_sync(move |_state| {
        let mut update = StateUpdate::default();
        update.insert("msgs".to_string(), UpdateValue::RemoveByHash(value.clone()));
        Ok(update)
    })
}

/// Node that sleeps before setting `key`, for scrambling completion order.
pub fn slow_set_value(key: &'static str, value: Value, delay_ms: u64) -> Arc<dyn NodeAction> {
    node_fn(move |_state| {
        let value = value.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(UpdateBuilder::new().set(key, value).build())
        }
    })
}

/// Node that sleeps before contributing to `count`.
pub fn slow_add_count(n: i64, delay_ms: u64) -> Arc<dyn NodeAction> {
    node_fn(move |_state| async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(UpdateBuilder::new().set("count", n).build())
    })
}
