mod common;

use common::*;
use graphflow::channels::{self, Schema};
use graphflow::state::{update_state, AgentState, StateData, UpdateBuilder, UpdateValue};
use serde_json::json;
use std::sync::Arc;

fn state_of(entries: impl IntoIterator<Item = (&'static str, serde_json::Value)>) -> AgentState {
    AgentState::new(StateData::from_iter(
        entries.into_iter().map(|(k, v)| (k.to_string(), v)),
    ))
}

#[test]
fn empty_update_is_identity() {
    let state = state_of([("a", json!(1)), ("b", json!("x"))]);
    let next = update_state(&state, Default::default(), &count_schema());
    assert_eq!(next, state);
}

#[test]
fn overwrite_channel_set_reset_remove() {
    let schema = overwrite_count_schema();
    let state = state_of([]);

    // update(null, v) == v
    let set = update_state(&state, UpdateBuilder::new().set("count", 5).build(), &schema);
    assert_eq!(set.value_i64("count"), Some(5));

    // update(v, MARK_FOR_RESET) == default
    let reset = update_state(&set, UpdateBuilder::new().reset("count").build(), &schema);
    assert_eq!(reset.value_i64("count"), Some(0));

    // update(v, MARK_FOR_REMOVAL) == null, key absent
    let removed = update_state(&set, UpdateBuilder::new().remove("count").build(), &schema);
    assert!(removed.value("count").is_none());
}

#[test]
fn reducer_channel_accumulates() {
    let schema = count_schema();
    let state = state_of([]);
    let once = update_state(&state, UpdateBuilder::new().set("count", 3).build(), &schema);
    let twice = update_state(&once, UpdateBuilder::new().set("count", 4).build(), &schema);
    assert_eq!(twice.value_i64("count"), Some(7));
}

#[test]
fn appender_same_element_twice_yields_length_one() {
    let schema = msgs_schema();
    let state = state_of([]);
    let once = update_state(&state, UpdateBuilder::new().set("msgs", "x").build(), &schema);
    let twice = update_state(&once, UpdateBuilder::new().set("msgs", "x").build(), &schema);
    assert_eq!(twice.value("msgs"), Some(&json!(["x"])));
}

#[test]
fn appender_replace_all_ignores_previous_contents() {
    let schema = msgs_schema();
    let state = state_of([("msgs", json!(["a", "b", "c"]))]);
    let update = UpdateBuilder::new()
        .replace_all("msgs", vec![json!("x"), json!("y")])
        .build();
    let next = update_state(&state, update, &schema);
    assert_eq!(next.value("msgs"), Some(&json!(["x", "y"])));
}

#[test]
fn appender_remove_by_hash_drops_first_match() {
    let schema = msgs_schema();
    let state = state_of([("msgs", json!(["x", "y"]))]);
    let update = UpdateBuilder::new().remove_by_hash("msgs", "x").build();
    let next = update_state(&state, update, &schema);
    assert_eq!(next.value("msgs"), Some(&json!(["y"])));
}

#[test]
fn appender_with_duplicates_keeps_repeats() {
    let schema = Schema::from_iter([(
        "msgs".to_string(),
        channels::appender_with_duplicates(),
    )]);
    let state = state_of([]);
    let once = update_state(&state, UpdateBuilder::new().set("msgs", "x").build(), &schema);
    let twice = update_state(&once, UpdateBuilder::new().set("msgs", "x").build(), &schema);
    assert_eq!(twice.value("msgs"), Some(&json!(["x", "x"])));
}

#[test]
fn sentinels_never_survive_an_update_round() {
    let schema = count_schema();
    let state = state_of([("a", json!(1))]);
    let update = UpdateBuilder::new()
        .reset("a")
        .remove("b")
        .set("count", 1)
        .build();
    let next = update_state(&state, update, &schema);
    // "a" has no channel and no default: reset drops it entirely.
    assert!(next.value("a").is_none());
    assert!(next.value("b").is_none());
    assert_eq!(next.value_i64("count"), Some(1));
}

#[test]
fn null_values_never_persist() {
    // Without a channel, a null update drops the key.
    let state = state_of([("a", json!(1))]);
    let next = update_state(
        &state,
        UpdateBuilder::new().set("a", json!(null)).build(),
        &Schema::default(),
    );
    assert!(next.value("a").is_none());

    // With a defaulted channel, a null update resets to the default.
    let schema = overwrite_count_schema();
    let state = state_of([("count", json!(42))]);
    let next = update_state(
        &state,
        UpdateBuilder::new().set("count", json!(null)).build(),
        &schema,
    );
    assert_eq!(next.value_i64("count"), Some(0));
}

#[test]
fn update_produces_fresh_mapping() {
    let schema = Schema::default();
    let state = state_of([("a", json!(1))]);
    let next = update_state(&state, UpdateBuilder::new().set("a", 2).build(), &schema);
    assert_eq!(state.value_i64("a"), Some(1));
    assert_eq!(next.value_i64("a"), Some(2));
}

#[test]
fn channel_default_seeds_reducer_left_side() {
    let schema = Schema::from_iter([(
        "total".to_string(),
        channels::base_with_default(
            Arc::new(|old, new| json!(old.as_i64().unwrap_or(0) + new.as_i64().unwrap_or(0))),
            Arc::new(|| json!(100)),
        ),
    )]);
    let next = update_state(
        &AgentState::default(),
        UpdateBuilder::new().set("total", 1).build(),
        &schema,
    );
    assert_eq!(next.value_i64("total"), Some(101));
}
