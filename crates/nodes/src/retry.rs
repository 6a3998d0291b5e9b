//! Retry decorator for action executors.
//!
//! The engine itself never retries a failed action. Deployments that want
//! transient failures smoothed over wrap their executor in [`Retrying`].

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::{ActionError, ActionExecutor, ActionType, ExecutionContext};

/// Tuning knobs for [`Retrying`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of times a retryable failure will be retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// Wraps an executor and retries `ActionError::Retryable` failures with
/// exponential back-off. `Fatal` errors are returned immediately.
pub struct Retrying<E> {
    inner: E,
    policy: RetryPolicy,
}

impl<E> Retrying<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<E: ActionExecutor> ActionExecutor for Retrying<E> {
    async fn execute(
        &self,
        action_type: ActionType,
        config: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let mut attempts = 0u32;

        loop {
            match self.inner.execute(action_type, config, ctx).await {
                Ok(output) => return Ok(output),
                Err(ActionError::Retryable(msg)) => {
                    attempts += 1;
                    if attempts > self.policy.max_retries {
                        return Err(ActionError::Fatal(format!(
                            "retry limit exceeded after {} attempts: {msg}",
                            attempts
                        )));
                    }

                    let delay = self.policy.base_delay * 2u32.pow(attempts.saturating_sub(1));

                    warn!(
                        node_id = %ctx.node_id,
                        action_type = %action_type,
                        "retryable error (attempt {}/{}), retrying in {:?}: {}",
                        attempts, self.policy.max_retries, delay, msg
                    );

                    tokio::time::sleep(delay).await;
                }
                Err(fatal) => return Err(fatal),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockExecutor;
    use serde_json::json;
    use uuid::Uuid;

    fn ctx(node_id: &str) -> ExecutionContext {
        ExecutionContext {
            workflow_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            node_id: node_id.into(),
            data: json!({}),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failure_is_retried_until_the_limit() {
        let mock = MockExecutor::new().failing_retryable("flaky", "timeout");
        let calls = mock.calls_handle();
        let exec = Retrying::new(mock, RetryPolicy { max_retries: 2, base_delay: Duration::from_millis(10) });

        let result = exec.execute(ActionType::SendEmail, &json!({}), &ctx("flaky")).await;

        assert!(matches!(result, Err(ActionError::Fatal(msg)) if msg.contains("timeout")));
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn fatal_failure_is_not_retried() {
        let mock = MockExecutor::new().failing("boom", "bad address");
        let calls = mock.calls_handle();
        let exec = Retrying::new(mock, RetryPolicy::default());

        let result = exec.execute(ActionType::SendEmail, &json!({}), &ctx("boom")).await;

        assert_eq!(result, Err(ActionError::Fatal("bad address".into())));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn success_passes_through() {
        let exec = Retrying::new(
            MockExecutor::new().returning("ok", json!({ "sent": true })),
            RetryPolicy::default(),
        );
        let out = exec.execute(ActionType::SendEmail, &json!({}), &ctx("ok")).await.unwrap();
        assert_eq!(out["sent"], true);
    }
}
