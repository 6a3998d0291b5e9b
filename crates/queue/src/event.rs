//! The trigger event envelope delivered by external event sources.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `{ "triggerType": "...", "payload": { ... } }`
///
/// Sources that put event fields next to `triggerType` instead of inside
/// `payload` are accepted too; those fields land in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEvent {
    /// Identifies the external event class (e.g. `employee_created`).
    pub trigger_type: String,
    /// Event body; becomes the initial run context.
    #[serde(default)]
    pub payload: Value,
    /// Any other top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TriggerEvent {
    pub fn new(trigger_type: impl Into<String>, payload: Value) -> Self {
        Self {
            trigger_type: trigger_type.into(),
            payload,
            extra: Map::new(),
        }
    }
}
