//! The `ActionExecutor` trait — the contract every side-effect backend must fulfil.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ActionError;

/// The closed set of side effects an Action node can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    SendEmail,
    CreateRecord,
    SendMessage,
    GenerateDocument,
    LogMessage,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::SendEmail,
        ActionType::CreateRecord,
        ActionType::SendMessage,
        ActionType::GenerateDocument,
        ActionType::LogMessage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SendEmail => "send_email",
            Self::CreateRecord => "create_record",
            Self::SendMessage => "send_message",
            Self::GenerateDocument => "generate_document",
            Self::LogMessage => "log_message",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown action type: {s}"))
    }
}

/// Per-invocation context handed to the executor.
///
/// Defined here (in the nodes crate) so both the engine and individual
/// executors can import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the workflow being run.
    pub workflow_id: Uuid,
    /// ID of the current run.
    pub run_id: Uuid,
    /// ID of the Action node being dispatched.
    pub node_id: String,
    /// Snapshot of the run context at dispatch time.
    pub data: Value,
}

/// The side-effect boundary of the engine.
///
/// Implementations must support every [`ActionType`]. Retry policy, if any,
/// belongs to the implementation; the engine never retries.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Perform the action described by `config` and return its output.
    ///
    /// `config` is the node's action configuration serialised as JSON
    /// (`actionType`, `target`, `template`, `message`).
    async fn execute(
        &self,
        action_type: ActionType,
        config: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, ActionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_type_parses_its_wire_name() {
        for t in ActionType::ALL {
            assert_eq!(t.as_str().parse::<ActionType>().unwrap(), t);
        }
        assert!("send_fax".parse::<ActionType>().is_err());
    }

    #[test]
    fn action_type_serialises_snake_case() {
        let v = serde_json::to_value(ActionType::GenerateDocument).unwrap();
        assert_eq!(v, Value::String("generate_document".into()));
    }
}
