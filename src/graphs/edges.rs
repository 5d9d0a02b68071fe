//! Edge types: direct transitions, parallel fanout, and conditional
//! routing.
//!
//! An [`Edge`] records every declared transition out of one source node.
//! Each target slot is an [`EdgeValue`]: either a direct node id or an
//! [`EdgeCondition`] pairing a [`CommandAction`] with a label-to-node
//! mapping. A single edge with multiple direct targets is a parallel
//! fanout.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

use crate::action::CommandAction;

/// Conditional routing attached to an edge slot.
///
/// At runtime the action runs against the current state; the returned
/// command's jump label is looked up in `mapping` to pick the target node.
#[derive(Clone)]
pub struct EdgeCondition {
    pub(crate) action: Arc<dyn CommandAction>,
    pub(crate) mapping: FxHashMap<String, String>,
}

impl EdgeCondition {
    /// Pair a routing action with its label mapping.
    #[must_use]
    pub fn new(action: Arc<dyn CommandAction>, mapping: FxHashMap<String, String>) -> Self {
        Self { action, mapping }
    }

    /// The label-to-target mapping.
    #[must_use]
    pub fn mapping(&self) -> &FxHashMap<String, String> {
        &self.mapping
    }
}

impl fmt::Debug for EdgeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeCondition")
            .field("mapping", &self.mapping)
            .finish_non_exhaustive()
    }
}

/// One target slot of an edge.
#[derive(Clone, Debug)]
pub enum EdgeValue {
    /// Transition straight to the named node.
    Direct(String),
    /// Transition decided at runtime by a condition.
    Conditional(EdgeCondition),
}

impl EdgeValue {
    /// The direct target id, if this slot is unconditional.
    #[must_use]
    pub fn direct_target(&self) -> Option<&str> {
        match self {
            EdgeValue::Direct(target) => Some(target),
            EdgeValue::Conditional(_) => None,
        }
    }

    /// `true` if this slot is a condition.
    #[must_use]
    pub fn is_conditional(&self) -> bool {
        matches!(self, EdgeValue::Conditional(_))
    }
}

/// All declared transitions out of one source node.
///
/// Two edges compare equal when they share a source id; a graph holds at
/// most one edge per source.
#[derive(Clone, Debug)]
pub struct Edge {
    source: String,
    targets: Vec<EdgeValue>,
}

impl Edge {
    /// Edge with a single target slot.
    #[must_use]
    pub fn new(source: impl Into<String>, target: EdgeValue) -> Self {
        Self {
            source: source.into(),
            targets: vec![target],
        }
    }

    /// Edge with explicit target slots.
    #[must_use]
    pub fn with_targets(source: impl Into<String>, targets: Vec<EdgeValue>) -> Self {
        Self {
            source: source.into(),
            targets,
        }
    }

    /// The source node id.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The target slots, in declaration order.
    #[must_use]
    pub fn targets(&self) -> &[EdgeValue] {
        &self.targets
    }

    /// `true` when the edge declares more than one target (fanout).
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.targets.len() > 1
    }

    /// Append another target slot (builds up a fanout).
    pub(crate) fn push_target(&mut self, target: EdgeValue) {
        self.targets.push(target);
    }

    /// Replace every slot and mapping entry that points at `node` using
    /// the supplied slots. Used when a subgraph node is spliced out.
    pub(crate) fn retarget(&mut self, node: &str, replacement: &[EdgeValue]) {
        let mut rewritten = Vec::with_capacity(self.targets.len());
        for slot in self.targets.drain(..) {
            match slot {
                EdgeValue::Direct(target) if target == node => {
                    rewritten.extend(replacement.iter().cloned());
                }
                EdgeValue::Conditional(mut condition) => {
                    if let Some(single) = replacement
                        .iter()
                        .find_map(EdgeValue::direct_target)
                        .map(str::to_string)
                    {
                        for target in condition.mapping.values_mut() {
                            if target == node {
                                *target = single.clone();
                            }
                        }
                    }
                    rewritten.push(EdgeValue::Conditional(condition));
                }
                other => rewritten.push(other),
            }
        }
        self.targets = rewritten;
    }

    /// `true` if any slot or mapping entry points at `node`.
    #[must_use]
    pub fn targets_node(&self, node: &str) -> bool {
        self.targets.iter().any(|slot| match slot {
            EdgeValue::Direct(target) => target == node,
            EdgeValue::Conditional(condition) => {
                condition.mapping.values().any(|target| target == node)
            }
        })
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Edge {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::edge_fn_sync;

    #[test]
    fn edges_compare_by_source() {
        let a = Edge::new("a", EdgeValue::Direct("x".into()));
        let b = Edge::new("a", EdgeValue::Direct("y".into()));
        let c = Edge::new("c", EdgeValue::Direct("x".into()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn retarget_rewrites_direct_and_mapping_slots() {
        let condition = EdgeCondition::new(
            edge_fn_sync(|_state| Ok("go".to_string())),
            FxHashMap::from_iter([("go".to_string(), "old".to_string())]),
        );
        let mut edge = Edge::with_targets(
            "src",
            vec![
                EdgeValue::Direct("old".into()),
                EdgeValue::Conditional(condition),
            ],
        );
        edge.retarget("old", &[EdgeValue::Direct("new".into())]);
        assert_eq!(edge.targets()[0].direct_target(), Some("new"));
        match &edge.targets()[1] {
            EdgeValue::Conditional(c) => assert_eq!(c.mapping()["go"], "new"),
            EdgeValue::Direct(_) => panic!("expected conditional slot"),
        }
    }
}
