//! Run observation hooks
//!
//! Four observation points the executor invokes during a run; each is a
//! no-op when unset. The `before` hook is awaited, so it can hold a node
//! back until an external signal arrives — that is the whole of step mode,
//! and [`StepController`] packages it.
//!
//! - `before(node_id, node_name)` — awaited before `compute`.
//! - `after(node_id, node_name, duration, error?)` — once `compute`
//!   resolves or fails.
//! - `edge_data(from, from_port, to, to_port)` — for every data edge that
//!   actually carried a value.
//! - `checkpoint(checkpoint)` — after each checkpoint is built.

use crate::error::GraphError;
use flowgraph_checkpoint::ExecutionCheckpoint;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Awaited before a node computes; may block for step mode.
pub type BeforeHook = Arc<dyn Fn(&str, &str) -> BoxFuture<'static, ()> + Send + Sync>;

/// Fired when a node's `compute` resolves or fails.
pub type AfterHook = Arc<dyn Fn(&str, &str, Duration, Option<&GraphError>) + Send + Sync>;

/// Fired per data edge carrying a value: `(from, from_port, to, to_port)`.
pub type EdgeDataHook = Arc<dyn Fn(&str, &str, &str, &str) + Send + Sync>;

/// Fired after each checkpoint is built.
pub type CheckpointHook = Arc<dyn Fn(&ExecutionCheckpoint) + Send + Sync>;

/// The four optional observation points of a run.
#[derive(Clone, Default)]
pub struct TraceHooks {
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
    edge_data: Option<EdgeDataHook>,
    checkpoint: Option<CheckpointHook>,
}

impl TraceHooks {
    /// No hooks set; every observation point is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `before` hook.
    pub fn with_before(mut self, hook: BeforeHook) -> Self {
        self.before = Some(hook);
        self
    }

    /// Set the `after` hook.
    pub fn with_after(mut self, hook: AfterHook) -> Self {
        self.after = Some(hook);
        self
    }

    /// Set the `edge_data` hook.
    pub fn with_edge_data(mut self, hook: EdgeDataHook) -> Self {
        self.edge_data = Some(hook);
        self
    }

    /// Set the `checkpoint` hook.
    pub fn with_checkpoint(mut self, hook: CheckpointHook) -> Self {
        self.checkpoint = Some(hook);
        self
    }

    pub(crate) async fn fire_before(&self, node_id: &str, node_name: &str) {
        if let Some(hook) = &self.before {
            hook(node_id, node_name).await;
        }
    }

    pub(crate) fn fire_after(
        &self,
        node_id: &str,
        node_name: &str,
        duration: Duration,
        error: Option<&GraphError>,
    ) {
        if let Some(hook) = &self.after {
            hook(node_id, node_name, duration, error);
        }
    }

    pub(crate) fn fire_edge_data(&self, from: &str, from_port: &str, to: &str, to_port: &str) {
        if let Some(hook) = &self.edge_data {
            hook(from, from_port, to, to_port);
        }
    }

    pub(crate) fn fire_checkpoint(&self, checkpoint: &ExecutionCheckpoint) {
        if let Some(hook) = &self.checkpoint {
            hook(checkpoint);
        }
    }
}

impl std::fmt::Debug for TraceHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceHooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .field("edge_data", &self.edge_data.is_some())
            .field("checkpoint", &self.checkpoint.is_some())
            .finish()
    }
}

/// External single-stepping over the `before` hook.
///
/// Each node blocks in `before` until a permit arrives; `step()` releases
/// exactly one node, `release(n)` several, `resume_all()` effectively turns
/// stepping off. Clones share the same gate.
///
/// ```rust,ignore
/// let stepper = StepController::new();
/// let hooks = TraceHooks::new().with_before(stepper.before_hook());
/// // elsewhere: stepper.step() each time the UI's "step" button is hit
/// ```
#[derive(Clone)]
pub struct StepController {
    permits: Arc<Semaphore>,
}

impl StepController {
    /// A controller with no permits: every node waits.
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    /// Let exactly one node proceed.
    pub fn step(&self) {
        self.permits.add_permits(1);
    }

    /// Let `n` nodes proceed.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    /// Effectively disable stepping for the rest of the run.
    pub fn resume_all(&self) {
        self.permits.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    /// The `before` hook enforcing the gate.
    pub fn before_hook(&self) -> BeforeHook {
        let permits = Arc::clone(&self.permits);
        Arc::new(move |_node_id, _node_name| {
            let permits = Arc::clone(&permits);
            Box::pin(async move {
                if let Ok(permit) = permits.acquire().await {
                    permit.forget();
                }
            })
        })
    }
}

impl Default for StepController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_unset_hooks_are_noops() {
        let hooks = TraceHooks::new();
        hooks.fire_before("a", "A").await;
        hooks.fire_after("a", "A", Duration::from_millis(1), None);
        hooks.fire_edge_data("a", "out", "b", "val");
    }

    #[tokio::test]
    async fn test_after_hook_sees_errors() {
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&errors);
        let hooks = TraceHooks::new().with_after(Arc::new(move |_, _, _, error| {
            if error.is_some() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        hooks.fire_after("a", "A", Duration::ZERO, None);
        let err = GraphError::node_execution("a", "boom");
        hooks.fire_after("a", "A", Duration::ZERO, Some(&err));
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_step_controller_gates_before() {
        let stepper = StepController::new();
        let hooks = TraceHooks::new().with_before(stepper.before_hook());

        let done = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&done);
        let waiting = tokio::spawn(async move {
            hooks.fire_before("a", "A").await;
            seen.fetch_add(1, Ordering::SeqCst);
        });

        tokio::task::yield_now().await;
        assert_eq!(done.load(Ordering::SeqCst), 0);

        stepper.step();
        waiting.await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_resume_all_unblocks_everything() {
        let stepper = StepController::new();
        stepper.resume_all();
        let hook = stepper.before_hook();
        // Should not block.
        hook("a", "A").await;
        hook("b", "B").await;
    }
}
