use graphflow::channels::{self, Schema};
use serde_json::json;
use std::sync::Arc;

/// Schema with a `count` key: sum reducer, default 0.
pub fn count_schema() -> Schema {
    Schema::from_iter([(
        "count".to_string(),
        channels::base_with_default(
            Arc::new(|old, new| json!(old.as_i64().unwrap_or(0) + new.as_i64().unwrap_or(0))),
            Arc::new(|| json!(0)),
        ),
    )])
}

/// Schema with a `count` key: plain overwrite, default 0.
pub fn overwrite_count_schema() -> Schema {
    Schema::from_iter([(
        "count".to_string(),
        channels::value_with_default(Arc::new(|| json!(0))),
    )])
}

/// Schema with a duplicate-rejecting `msgs` appender, default empty.
pub fn msgs_schema() -> Schema {
    Schema::from_iter([("msgs".to_string(), channels::appender())])
}
