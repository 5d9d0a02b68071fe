//! Graph definition: nodes, edges, validation, analysis, and rendering.
//!
//! The main entry point is [`StateGraph`], a fluent builder that collects
//! nodes and edges over a channel schema and compiles into an executable
//! [`CompiledGraph`](crate::runtimes::CompiledGraph).
//!
//! # Core concepts
//!
//! - **Nodes**: async computations implementing
//!   [`NodeAction`](crate::action::NodeAction), registered under unique ids.
//! - **Edges**: direct transitions, parallel fanouts (one edge, several
//!   direct targets), or conditional routes driven by a
//!   [`CommandAction`](crate::action::CommandAction).
//! - **Virtual endpoints**: [`START`](crate::types::START) and
//!   [`END`](crate::types::END) anchor entry and termination and are never
//!   executed.
//! - **Subgraphs**: uncompiled subgraphs flatten into the parent at
//!   compile time; compiled ones nest as opaque runners.

mod builder;
mod edges;
mod nodes;
mod validation;

pub mod analysis;
pub mod render;

pub use builder::{GraphStateError, StateGraph};
pub use edges::{Edge, EdgeCondition, EdgeValue};
pub use nodes::{factory_of, ActionFactory};
pub use render::{GraphRepresentation, RenderKind};

pub(crate) use nodes::GraphNode;
pub(crate) use validation::validate;
