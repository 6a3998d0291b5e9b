//! `MockExecutor` — a test double for `ActionExecutor`.
//!
//! Records every call it receives and returns a programmer-specified result
//! per node id. Nodes without a registered behaviour succeed with
//! `{ "node": <id>, "action": <actionType> }`. A node can also be made slow,
//! which delays its result on the tokio clock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{ActionError, ActionExecutor, ActionType, ExecutionContext};

/// Behaviour injected into `MockExecutor` for a given node id.
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with a `Retryable` error.
    FailRetryable(String),
    /// Fail with a `Fatal` error.
    FailFatal(String),
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub node_id: String,
    pub action_type: ActionType,
    pub config: Value,
    pub data: Value,
}

#[derive(Default)]
pub struct MockExecutor {
    behaviours: HashMap<String, MockBehaviour>,
    latency: HashMap<String, Duration>,
    /// All calls seen by this executor (in call order).
    calls: Arc<Mutex<Vec<MockCall>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Succeed with `value` when `node_id` is dispatched.
    pub fn returning(mut self, node_id: impl Into<String>, value: Value) -> Self {
        self.behaviours.insert(node_id.into(), MockBehaviour::ReturnValue(value));
        self
    }

    /// Fail fatally when `node_id` is dispatched.
    pub fn failing(mut self, node_id: impl Into<String>, msg: impl Into<String>) -> Self {
        self.behaviours.insert(node_id.into(), MockBehaviour::FailFatal(msg.into()));
        self
    }

    /// Fail with a retryable error when `node_id` is dispatched.
    pub fn failing_retryable(mut self, node_id: impl Into<String>, msg: impl Into<String>) -> Self {
        self.behaviours.insert(node_id.into(), MockBehaviour::FailRetryable(msg.into()));
        self
    }

    /// Take `delay` before answering for `node_id`.
    pub fn slow(mut self, node_id: impl Into<String>, delay: Duration) -> Self {
        self.latency.insert(node_id.into(), delay);
        self
    }

    /// Shared handle to the call log, usable after the executor is moved.
    pub fn calls_handle(&self) -> Arc<Mutex<Vec<MockCall>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of times `node_id` has been dispatched.
    pub fn call_count(&self, node_id: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.node_id == node_id).count()
    }
}

#[async_trait]
impl ActionExecutor for MockExecutor {
    async fn execute(
        &self,
        action_type: ActionType,
        config: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        self.calls.lock().unwrap().push(MockCall {
            node_id: ctx.node_id.clone(),
            action_type,
            config: config.clone(),
            data: ctx.data.clone(),
        });

        if let Some(delay) = self.latency.get(&ctx.node_id) {
            tokio::time::sleep(*delay).await;
        }

        match self.behaviours.get(&ctx.node_id) {
            Some(MockBehaviour::ReturnValue(v)) => Ok(v.clone()),
            Some(MockBehaviour::FailRetryable(msg)) => Err(ActionError::Retryable(msg.clone())),
            Some(MockBehaviour::FailFatal(msg)) => Err(ActionError::Fatal(msg.clone())),
            None => Ok(json!({ "node": ctx.node_id, "action": action_type.as_str() })),
        }
    }
}
