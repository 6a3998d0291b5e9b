//! An executor that performs no external side effect and reports each action
//! through `tracing`. Used by the CLI and by servers started without a real
//! integration backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::{ActionError, ActionExecutor, ActionType, ExecutionContext};

#[derive(Debug, Default, Clone)]
pub struct LoggingExecutor;

impl LoggingExecutor {
    pub fn new() -> Self {
        Self
    }
}

fn field<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

/// Replace `{{ path }}` placeholders with values looked up in `data`.
fn render(text: &str, data: &Value) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        let Some(len) = rest[start..].find("}}") else { break };
        out.push_str(&rest[..start]);

        let path = rest[start + 2..start + len].trim();
        let value = path
            .split('.')
            .try_fold(data, |v, seg| v.get(seg))
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_default();
        out.push_str(&value);

        rest = &rest[start + len + 2..];
    }
    out.push_str(rest);
    out
}

#[async_trait]
impl ActionExecutor for LoggingExecutor {
    async fn execute(
        &self,
        action_type: ActionType,
        config: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, ActionError> {
        let target = field(config, "target").map(|t| render(t, &ctx.data));
        let message = field(config, "message").map(|m| render(m, &ctx.data));
        let template = field(config, "template");

        match action_type {
            ActionType::LogMessage => {
                let message = message
                    .ok_or_else(|| ActionError::Fatal("log_message requires a message".into()))?;
                info!(run_id = %ctx.run_id, node_id = %ctx.node_id, "{message}");
                Ok(json!({ "logged": message }))
            }
            other => {
                info!(
                    run_id = %ctx.run_id,
                    node_id = %ctx.node_id,
                    action_type = %other,
                    target = ?target,
                    template = ?template,
                    "action dispatched"
                );
                Ok(json!({
                    "action": other.as_str(),
                    "target": target,
                    "template": template,
                    "message": message,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn render_substitutes_dotted_paths() {
        let data = json!({ "employee": { "name": "Ada" }, "count": 3 });
        assert_eq!(render("Hi {{ employee.name }} ({{count}})", &data), "Hi Ada (3)");
        assert_eq!(render("missing {{ nope }}!", &data), "missing !");
        assert_eq!(render("unterminated {{ x", &data), "unterminated {{ x");
    }

    #[tokio::test]
    async fn log_message_requires_message() {
        let ctx = ExecutionContext {
            workflow_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            node_id: "log".into(),
            data: json!({ "who": "ops" }),
        };
        let exec = LoggingExecutor::new();

        let out = exec
            .execute(ActionType::LogMessage, &json!({ "message": "hello {{who}}" }), &ctx)
            .await
            .unwrap();
        assert_eq!(out["logged"], "hello ops");

        let err = exec.execute(ActionType::LogMessage, &json!({}), &ctx).await;
        assert!(matches!(err, Err(ActionError::Fatal(_))));
    }
}
