//! The scheduler
//!
//! [`Executor`] drives a graph from a designated entry node to completion.
//! Two public operations:
//!
//! - [`Executor::cook_data`] — pure data evaluation: compute the entry's
//!   dirty data ancestors in dependency order, then the entry itself. No
//!   control propagation, no checkpoints.
//! - [`Executor::cook_flow`] — flow execution: maintain the ready list,
//!   the pending dependency map and the LIFO deferred stack; run each
//!   ready batch concurrently; apply results sequentially in batch order;
//!   checkpoint after every batch and once more at the end.
//!
//! The LIFO deferred stack is what makes nested loops compose: a loop
//! returning `LOOP_AGAIN` is pushed and only popped once the ready list
//! drains, so the innermost loop (pushed last) finishes all its remaining
//! iterations before an outer loop advances. Popping in FIFO order would
//! let the outer loop re-fire early and collapse the iteration product.
//!
//! Failure semantics: if any node of a batch fails, nothing from that
//! batch commits; an error checkpoint is emitted whose ready list is
//! exactly the failed batch, then the error surfaces to the caller. A
//! later `cook_flow` with that checkpoint re-runs the batch.

use crate::arena::{EdgeClass, GraphArena, PortRef};
use crate::error::{GraphError, Result};
use crate::node::{ComputeContext, NodeBehavior, NodeId};
use crate::result::{ExecutionCommand, ExecutionResult};
use crate::trace::TraceHooks;
use flowgraph_checkpoint::{CheckpointError, CheckpointStore, ExecutionCheckpoint};
use futures::future::{join_all, BoxFuture};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;


/// Tunable behavior of an [`Executor`].
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Emit a checkpoint after every batch (and a terminal snapshot).
    /// Error checkpoints are emitted regardless.
    pub emit_checkpoints: bool,
    /// Fail the run with `BatchLimitExceeded` after this many batches.
    /// Guards against loops whose exit condition never fires.
    pub max_batches: Option<usize>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            emit_checkpoints: true,
            max_batches: None,
        }
    }
}

/// Summary of a completed flow run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run identity, also stamped on results and checkpoints.
    pub run_id: String,
    /// Number of batches executed.
    pub batches: u64,
    /// Commit log, in commit order.
    pub completed: Vec<NodeId>,
}

/// Scheduler state of one flow run.
struct RunState {
    root: NodeId,
    subgraph: Option<NodeId>,
    run_id: String,
    /// Nodes whose dependencies are satisfied, drained as the next batch.
    ready: Vec<NodeId>,
    /// Node -> dirty data producers it still waits on.
    pending: BTreeMap<NodeId, BTreeSet<NodeId>>,
    /// LIFO stack of loop re-entries; last element is the top.
    deferred: Vec<NodeId>,
    /// Commit log.
    completed: Vec<NodeId>,
    /// Every node that has entered the run; snapshot coverage.
    touched: BTreeSet<NodeId>,
    /// Batch counter; checkpoint sequence.
    step: u64,
}

impl RunState {
    fn new(root: NodeId, subgraph: Option<NodeId>, run_id: String) -> Self {
        Self {
            root,
            subgraph,
            run_id,
            ready: Vec::new(),
            pending: BTreeMap::new(),
            deferred: Vec::new(),
            completed: Vec::new(),
            touched: BTreeSet::new(),
            step: 0,
        }
    }

    fn is_scheduled(&self, id: &str) -> bool {
        self.ready.iter().any(|r| r == id)
            || self.pending.contains_key(id)
            || self.deferred.iter().any(|d| d == id)
    }
}

/// Drives a [`GraphArena`] to completion.
///
/// The executor owns the arena for the duration of its runs — no other
/// caller may mutate the graph while a run is active — and gives it back
/// through [`Executor::into_arena`]. Cancellation is modelled as dropping
/// the run and starting a new one, resuming from a checkpoint if needed.
pub struct Executor {
    arena: GraphArena,
    hooks: TraceHooks,
    store: Option<Arc<dyn CheckpointStore>>,
    options: ExecutorOptions,
}

impl Executor {
    /// Take ownership of an arena.
    pub fn new(arena: GraphArena) -> Self {
        Self {
            arena,
            hooks: TraceHooks::new(),
            store: None,
            options: ExecutorOptions::default(),
        }
    }

    /// Attach trace hooks.
    pub fn with_hooks(mut self, hooks: TraceHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Persist every emitted checkpoint into a store.
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Override the default options.
    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    /// The owned arena.
    pub fn arena(&self) -> &GraphArena {
        &self.arena
    }

    /// Mutable access between runs (presetting inputs, swapping nodes).
    pub fn arena_mut(&mut self) -> &mut GraphArena {
        &mut self.arena
    }

    /// Give the arena back.
    pub fn into_arena(self) -> GraphArena {
        self.arena
    }

    /// Force computation of a node's data inputs, recursively, then the
    /// node itself.
    ///
    /// Every transitively reachable dirty data ancestor computes exactly
    /// once, sources before sinks. Flow-control ancestors are not data
    /// producers and are skipped.
    pub async fn cook_data(&mut self, entry: &str) -> Result<()> {
        self.arena.node(entry)?;
        let run_id = Uuid::new_v4().to_string();
        let order = self.data_resolution_order(entry)?;
        debug!(run = %run_id, entry = %entry, order = ?order, "Data resolution order");
        for id in order {
            let mut results = self.execute_batch(&run_id, std::slice::from_ref(&id)).await;
            if let Some((_, outcome)) = results.pop() {
                let result = outcome?;
                self.arena.node_mut(&id)?.dirty = false;
                self.apply_data_outputs(&id, &result.data_outputs)?;
            }
        }
        Ok(())
    }

    /// Drive flow execution from `entry` until both the ready batch and
    /// the deferred stack are empty.
    ///
    /// With `resume`, scheduler state and node states are restored from
    /// the checkpoint first and the run continues under its original run
    /// id; the failed batch of an error checkpoint re-runs. A checkpoint
    /// rooted at a different entry node is rejected with `RootMismatch`.
    pub async fn cook_flow(
        &mut self,
        entry: &str,
        resume: Option<ExecutionCheckpoint>,
    ) -> Result<RunReport> {
        self.arena.node(entry)?;
        let mut run = match resume {
            Some(checkpoint) => self.restore_run(entry, checkpoint)?,
            None => {
                let subgraph = self.arena.node(entry)?.parent.clone();
                let mut run =
                    RunState::new(entry.to_string(), subgraph, Uuid::new_v4().to_string());
                self.build_flow_stack(entry, &mut run)?;
                run
            }
        };

        let mut batches_run: u64 = 0;
        loop {
            if run.ready.is_empty() {
                match run.deferred.pop() {
                    Some(id) => run.ready.push(id),
                    None => break,
                }
            }
            if let Some(limit) = self.options.max_batches {
                if batches_run as usize >= limit {
                    return Err(GraphError::BatchLimitExceeded { limit });
                }
            }

            let batch: Vec<NodeId> = std::mem::take(&mut run.ready);
            batches_run += 1;
            debug!(run = %run.run_id, step = run.step, batch = ?batch, "Executing batch");

            let results = self.execute_batch(&run.run_id, &batch).await;

            // First failure in batch order wins; nothing from a failed
            // batch commits.
            let mut failure: Option<(NodeId, GraphError)> = None;
            let mut successes: Vec<(NodeId, ExecutionResult)> = Vec::with_capacity(results.len());
            for (id, outcome) in results {
                match outcome {
                    Ok(result) => successes.push((id, result)),
                    Err(error) if failure.is_none() => failure = Some((id, error)),
                    Err(_) => {}
                }
            }
            if let Some((failed_id, error)) = failure {
                run.ready = batch;
                let checkpoint = self.build_checkpoint(&run, Some((failed_id.as_str(), &error)));
                if let Err(store_error) = self.emit_checkpoint(checkpoint).await {
                    warn!(run = %run.run_id, error = %store_error, "Failed to persist error checkpoint");
                }
                return Err(error);
            }

            let mut committed: Vec<NodeId> = Vec::new();
            for (id, result) in successes {
                self.apply_result(&id, result, &mut run, &mut committed)?;
            }

            // Promote pending nodes whose remaining dependencies just
            // committed.
            if !committed.is_empty() {
                let mut promoted = Vec::new();
                for (id, deps) in run.pending.iter_mut() {
                    for done in &committed {
                        deps.remove(done);
                    }
                    if deps.is_empty() {
                        promoted.push(id.clone());
                    }
                }
                for id in &promoted {
                    run.pending.remove(id);
                }
                run.ready.extend(promoted);
            }

            if self.options.emit_checkpoints {
                let checkpoint = self.build_checkpoint(&run, None);
                self.emit_checkpoint(checkpoint).await?;
            }
            run.step += 1;
        }

        if !run.pending.is_empty() {
            let nodes: Vec<NodeId> = run.pending.keys().cloned().collect();
            return Err(GraphError::UnsatisfiedDependency { nodes });
        }

        // Terminal snapshot.
        if self.options.emit_checkpoints {
            let checkpoint = self.build_checkpoint(&run, None);
            self.emit_checkpoint(checkpoint).await?;
        }

        Ok(RunReport {
            run_id: run.run_id,
            batches: batches_run,
            completed: run.completed,
        })
    }

    /// Execute a batch concurrently; results come back in batch order.
    async fn execute_batch(
        &self,
        run_id: &str,
        batch: &[NodeId],
    ) -> Vec<(NodeId, Result<ExecutionResult>)> {
        let mut tasks: Vec<BoxFuture<'static, (NodeId, Result<ExecutionResult>)>> =
            Vec::with_capacity(batch.len());
        for id in batch {
            let id = id.clone();
            match self.prepare_compute(run_id, &id) {
                Ok((behavior, ctx, name)) => {
                    let hooks = self.hooks.clone();
                    let run_id = run_id.to_string();
                    let node_path = ctx.node_path.clone();
                    let subgraph_id = ctx.subgraph_id.clone();
                    tasks.push(Box::pin(async move {
                        hooks.fire_before(&id, &name).await;
                        let started = Instant::now();
                        let mut outcome = behavior.compute(ctx).await.map_err(|error| match error {
                            contextual @ GraphError::NodeExecution { .. } => contextual,
                            other => GraphError::node_execution(&id, other.to_string()),
                        });
                        hooks.fire_after(&id, &name, started.elapsed(), outcome.as_ref().err());
                        if let Ok(result) = &mut outcome {
                            result.stamp_identity(
                                &run_id,
                                &id,
                                subgraph_id.as_deref(),
                                &node_path,
                            );
                        }
                        (id, outcome)
                    }));
                }
                Err(error) => {
                    tasks.push(Box::pin(async move { (id, Err(error)) }));
                }
            }
        }
        join_all(tasks).await
    }

    /// Snapshot a node's behavior and input values for computation.
    fn prepare_compute(
        &self,
        run_id: &str,
        id: &str,
    ) -> Result<(Arc<dyn NodeBehavior>, ComputeContext, String)> {
        let node = self.arena.node(id)?;
        let node_path = self.arena.node_path(id)?;
        let ctx = ComputeContext {
            run_id: run_id.to_string(),
            node_id: id.to_string(),
            subgraph_id: node.parent.clone(),
            node_path,
            data_inputs: node.data_input_values(),
            control_inputs: node.control_input_values(),
        };
        Ok((node.behavior(), ctx, node.name.clone()))
    }

    /// Apply one result to the arena and the run state. Called in batch
    /// order, so the last writer to any port within a batch is
    /// deterministic.
    fn apply_result(
        &mut self,
        id: &str,
        result: ExecutionResult,
        run: &mut RunState,
        committed: &mut Vec<NodeId>,
    ) -> Result<()> {
        match result.command {
            ExecutionCommand::LoopAgain => {
                debug!(node = %id, "Loop re-entry deferred");
                run.deferred.push(id.to_string());
            }
            ExecutionCommand::Wait => {
                // Parked: no propagation, no commit, no retry. External
                // input has to re-introduce the node.
                warn!(node = %id, "Node parked awaiting external input");
                self.arena.node_mut(id)?.dirty = false;
                return Ok(());
            }
            ExecutionCommand::Continue | ExecutionCommand::Completed => {
                run.completed.push(id.to_string());
                committed.push(id.to_string());
            }
        }
        self.arena.node_mut(id)?.dirty = false;

        // Control first: targets are scheduled now, and see the data
        // written just below when their batch executes.
        for (port, value) in &result.control_outputs {
            if value.is_null() {
                continue;
            }
            match self.arena.node_mut(id)?.port_mut(port) {
                Some(own) => own.commit_value(value.clone()),
                None => {
                    warn!(node = %id, port = %port, "Result names an unknown control output");
                    continue;
                }
            }
            let mut targets = Vec::new();
            self.propagate_control(&PortRef::new(id, port.clone()), value, &mut targets)?;
            for target in targets {
                self.build_flow_stack(&target, run)?;
            }
        }

        for (port, value) in &result.data_outputs {
            match self.arena.node_mut(id)?.port_mut(port) {
                Some(own) => own.commit_value(value.clone()),
                None => {
                    warn!(node = %id, port = %port, "Result names an unknown data output");
                    continue;
                }
            }
            self.propagate_data(&PortRef::new(id, port.clone()), value)?;
        }
        Ok(())
    }

    /// Commit a node's data outputs and push them along outgoing edges.
    /// Used by `cook_data`, which never touches control.
    fn apply_data_outputs(&mut self, id: &str, outputs: &BTreeMap<String, Value>) -> Result<()> {
        for (port, value) in outputs {
            match self.arena.node_mut(id)?.port_mut(port) {
                Some(own) => own.commit_value(value.clone()),
                None => {
                    warn!(node = %id, port = %port, "Result names an unknown data output");
                    continue;
                }
            }
            self.propagate_data(&PortRef::new(id, port.clone()), value)?;
        }
        Ok(())
    }

    /// Copy a value into every data edge target, relaying through tunnel
    /// ports into and out of subgraphs.
    fn propagate_data(&mut self, from: &PortRef, value: &Value) -> Result<()> {
        let edges: Vec<_> = self
            .arena
            .edges_outgoing(&from.node, &from.port)
            .into_iter()
            .filter(|e| e.class == EdgeClass::Data)
            .cloned()
            .collect();
        for edge in edges {
            let target = self.arena.node_mut(&edge.to)?;
            let is_tunnel = match target.port_mut(&edge.to_port) {
                Some(port) => {
                    port.commit_value(value.clone());
                    port.is_tunnel()
                }
                None => {
                    warn!(node = %edge.to, port = %edge.to_port, "Data edge targets an unknown port");
                    continue;
                }
            };
            self.hooks
                .fire_edge_data(&edge.from, &edge.from_port, &edge.to, &edge.to_port);
            if is_tunnel {
                self.propagate_data(&PortRef::new(edge.to, edge.to_port), value)?;
            }
        }
        Ok(())
    }

    /// Write a control activation into every control edge target; tunnel
    /// targets relay, leaf targets are collected for scheduling.
    fn propagate_control(
        &mut self,
        from: &PortRef,
        value: &Value,
        targets: &mut Vec<NodeId>,
    ) -> Result<()> {
        let edges: Vec<_> = self
            .arena
            .edges_outgoing(&from.node, &from.port)
            .into_iter()
            .filter(|e| e.class == EdgeClass::Control)
            .cloned()
            .collect();
        for edge in edges {
            let target = self.arena.node_mut(&edge.to)?;
            let is_tunnel = match target.port_mut(&edge.to_port) {
                Some(port) => {
                    port.commit_value(value.clone());
                    port.is_tunnel()
                }
                None => {
                    warn!(node = %edge.to, port = %edge.to_port, "Control edge targets an unknown port");
                    continue;
                }
            };
            if is_tunnel {
                self.propagate_control(&PortRef::new(edge.to, edge.to_port), value, targets)?;
            } else {
                targets.push(edge.to);
            }
        }
        Ok(())
    }

    /// Introduce a node to the run: register its dirty data producers as
    /// pending dependencies (recursively), or move it straight to ready.
    fn build_flow_stack(&self, id: &str, run: &mut RunState) -> Result<()> {
        if run.is_scheduled(id) {
            return Ok(());
        }
        let deps = self.data_dependencies(id)?;
        run.touched.insert(id.to_string());
        if deps.is_empty() {
            run.ready.push(id.to_string());
        } else {
            run.pending
                .insert(id.to_string(), deps.iter().cloned().collect());
        }
        // Registration happens before recursion so dependency cycles
        // settle as unsatisfied pending entries instead of recursing
        // forever; the terminal check reports them.
        for dep in deps {
            self.build_flow_stack(&dep, run)?;
        }
        Ok(())
    }

    /// Dirty data producers one hop upstream of a node's input ports,
    /// crossing tunnels. Flow-control producers participate via control
    /// signals, not data cooking, and are excluded.
    fn data_dependencies(&self, id: &str) -> Result<Vec<NodeId>> {
        let node = self.arena.node(id)?;
        let mut deps = Vec::new();
        let mut seen = HashSet::new();
        for port_name in node.inputs.keys() {
            let producers = self
                .arena
                .upstream_ports(&PortRef::new(id, port_name.clone()), false)?;
            for producer_ref in producers {
                if producer_ref.node == id || !seen.insert(producer_ref.node.clone()) {
                    continue;
                }
                let producer = self.arena.node(&producer_ref.node)?;
                if producer.dirty && !producer.flow_control {
                    deps.push(producer_ref.node);
                }
            }
        }
        Ok(deps)
    }

    /// Post-order over the dirty data ancestry of `entry`; the entry
    /// itself comes last. Fails on cyclic data wiring.
    fn data_resolution_order(&self, entry: &str) -> Result<Vec<NodeId>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        self.visit_data(entry, &mut order, &mut visited, &mut on_stack)?;
        Ok(order)
    }

    fn visit_data(
        &self,
        id: &str,
        order: &mut Vec<NodeId>,
        visited: &mut HashSet<NodeId>,
        on_stack: &mut HashSet<NodeId>,
    ) -> Result<()> {
        if visited.contains(id) {
            return Ok(());
        }
        if !on_stack.insert(id.to_string()) {
            return Err(GraphError::UnsatisfiedDependency {
                nodes: vec![id.to_string()],
            });
        }
        for dep in self.data_dependencies(id)? {
            self.visit_data(&dep, order, visited, on_stack)?;
        }
        on_stack.remove(id);
        visited.insert(id.to_string());
        order.push(id.to_string());
        Ok(())
    }

    /// Build the checkpoint for the current run state. Snapshots cover
    /// every node that has entered the run, deferred loops included, so a
    /// restore is faithful.
    fn build_checkpoint(
        &self,
        run: &RunState,
        failure: Option<(&str, &GraphError)>,
    ) -> ExecutionCheckpoint {
        let mut snapshot_ids = run.touched.clone();
        snapshot_ids.extend(run.ready.iter().cloned());
        snapshot_ids.extend(run.deferred.iter().cloned());
        snapshot_ids.extend(run.pending.keys().cloned());
        snapshot_ids.extend(run.completed.iter().cloned());

        let mut node_states = BTreeMap::new();
        for id in snapshot_ids {
            if let Some(node) = self.arena.get(&id) {
                node_states.insert(id, node.serialize_state());
            }
        }

        let pending = run
            .pending
            .iter()
            .map(|(id, deps)| (id.clone(), deps.iter().cloned().collect()))
            .collect();

        let mut checkpoint = ExecutionCheckpoint::new(run.run_id.clone(), run.root.clone())
            .with_ready(run.ready.clone())
            .with_deferred(run.deferred.clone())
            .with_pending(pending)
            .with_completed(run.completed.clone())
            .with_node_states(node_states)
            .with_step(run.step);
        if let Some(subgraph) = &run.subgraph {
            checkpoint = checkpoint.with_subgraph(subgraph.clone());
        }
        if let Some((failed_id, error)) = failure {
            checkpoint = checkpoint.with_failure(failed_id, error.to_string());
        }
        checkpoint
    }

    async fn emit_checkpoint(&self, checkpoint: ExecutionCheckpoint) -> Result<()> {
        self.hooks.fire_checkpoint(&checkpoint);
        if let Some(store) = &self.store {
            store.put(checkpoint).await?;
        }
        Ok(())
    }

    /// Rebuild run state from a checkpoint and restore node states into
    /// the arena. Admission fails when the checkpoint was taken under a
    /// different root, or when a snapshot entry is malformed.
    fn restore_run(&mut self, entry: &str, checkpoint: ExecutionCheckpoint) -> Result<RunState> {
        if checkpoint.root_node_id != entry {
            return Err(CheckpointError::RootMismatch {
                requested_root: entry.to_string(),
                checkpoint_root: checkpoint.root_node_id,
            }
            .into());
        }
        for (id, state) in &checkpoint.node_states {
            match self.arena.get_mut(id) {
                Some(node) => node.restore_state(state)?,
                None => warn!(node = %id, "Checkpoint state for a node missing from the arena"),
            }
        }
        // Node-level dirtiness is derived: committed nodes reflect the
        // run, everything else still needs to compute.
        for id in &checkpoint.completed {
            if let Some(node) = self.arena.get_mut(id) {
                node.dirty = false;
            }
        }

        let mut run = RunState::new(
            checkpoint.root_node_id.clone(),
            checkpoint.subgraph_id.clone(),
            checkpoint.run_id.clone(),
        );
        run.ready = checkpoint.ready;
        run.deferred = checkpoint.deferred;
        run.pending = checkpoint
            .pending
            .into_iter()
            .map(|(id, deps)| (id, deps.into_iter().collect()))
            .collect();
        run.completed = checkpoint.completed;
        run.touched = checkpoint.node_states.keys().cloned().collect();
        run.step = checkpoint.step + 1;
        Ok(run)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("arena", &self.arena)
            .field("hooks", &self.hooks)
            .field("store", &self.store.is_some())
            .field("options", &self.options)
            .finish()
    }
}
