//! # flowgraph-core
//!
//! A dataflow + control-flow graph execution engine. Graphs mix two
//! orthogonal kinds of ports on every node — typed data ports whose values
//! flow along edges, and control ports carrying execution signals (branch
//! selection, loop-back) — and nest arbitrarily through subgraphs whose
//! in-out tunnel ports relay values across the boundary.
//!
//! The [`executor::Executor`] drives a graph from an entry node while
//! honouring:
//!
//! - lazy data-dependency resolution (dirty upstream producers cook first),
//! - control-signal propagation across the mixed topology,
//! - correct nesting of looping nodes via a LIFO deferred stack
//!   (`LOOP_AGAIN` / `COMPLETED`),
//! - tunneling of values through subgraph containers,
//! - concurrent execution of each independent ready batch,
//! - a checkpoint after every batch, resumable mid-run,
//! - optional single-stepping through the awaited `before` hook.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use flowgraph_core::{Executor, GraphArena, ValueType, Port};
//! use flowgraph_core::nodes::{fn_node, subgraph_node};
//! use serde_json::json;
//! use std::collections::BTreeMap;
//!
//! let mut arena = GraphArena::new();
//! arena.insert_node(subgraph_node("root", "root"))?;
//!
//! let mut a = fn_node("a", "A", |ctx| {
//!     let val = ctx.require_data("val")?.as_i64().unwrap_or(0);
//!     Ok(BTreeMap::from([("out".to_string(), json!(val * 2))]))
//! })
//! .with_parent("root");
//! a.inputs.get_mut("val").unwrap().set_value(json!(3));
//! arena.insert_node(a)?;
//!
//! let b = fn_node("b", "B", |ctx| {
//!     let val = ctx.require_data("val")?.as_i64().unwrap_or(0);
//!     Ok(BTreeMap::from([("out".to_string(), json!(val * 2))]))
//! })
//! .with_parent("root");
//! arena.insert_node(b)?;
//! arena.insert_edge("a", "out", "b", "val")?;
//!
//! let mut executor = Executor::new(arena);
//! executor.cook_data("b").await?;
//! assert_eq!(executor.arena().get("b").unwrap().outputs["out"].value, Some(json!(12)));
//! ```
//!
//! # Crate layout
//!
//! - [`port`], [`node`], [`arena`] — the graph primitives: typed ports,
//!   the `compute` contract, the flat indexed node/edge store with
//!   tunnel-aware traversal and path addressing.
//! - [`executor`] — the scheduler.
//! - [`trace`] — the four observation hooks and the step controller.
//! - [`nodes`] — built-in behaviors (constants, closures, loops, the
//!   counting probe, subgraph containers).
//! - [`registry`] — the explicit node-kind factory table.
//!
//! Checkpoint wire types and stores live in the `flowgraph-checkpoint`
//! crate; the most common ones are re-exported here.

pub mod arena;
pub mod error;
pub mod executor;
pub mod node;
pub mod nodes;
pub mod port;
pub mod registry;
pub mod result;
pub mod trace;
pub mod value;

pub use arena::{Edge, EdgeClass, GraphArena, PortRef};
pub use error::{GraphError, Result};
pub use executor::{Executor, ExecutorOptions, RunReport};
pub use node::{ComputeContext, Node, NodeBehavior, NodeId, SUBGRAPH_KIND};
pub use port::{Port, PortDirection, PortFunction};
pub use registry::{NodeFactory, NodeRegistry};
pub use result::{ExecutionCommand, ExecutionResult};
pub use trace::{AfterHook, BeforeHook, CheckpointHook, EdgeDataHook, StepController, TraceHooks};
pub use value::ValueType;

pub use flowgraph_checkpoint::{
    CheckpointStore, ExecutionCheckpoint, InMemoryCheckpointStore, NodeStateMap,
};
