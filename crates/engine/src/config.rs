//! Per-kind node configuration.
//!
//! Each node kind has a closed configuration shape. Every field is optional
//! at authoring time so half-finished drafts can be saved; a node whose
//! required fields are missing is simply not `configured`. Unknown fields are
//! ignored on input. Unknown enum values (`actionType`, `operator`, `unit`)
//! are rejected when the node is deserialised.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use nodes::ActionType;

use crate::models::NodeKind;

// ---------------------------------------------------------------------------
// NodeConfig
// ---------------------------------------------------------------------------

/// Configuration of a node, one variant per node kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeConfig {
    Trigger(TriggerConfig),
    Action(ActionConfig),
    Condition(ConditionConfig),
    Delay(DelayConfig),
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Trigger(_) => NodeKind::Trigger,
            Self::Action(_) => NodeKind::Action,
            Self::Condition(_) => NodeKind::Condition,
            Self::Delay(_) => NodeKind::Delay,
        }
    }

    /// An empty configuration for `kind`.
    pub fn empty(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Trigger => Self::Trigger(TriggerConfig::default()),
            NodeKind::Action => Self::Action(ActionConfig::default()),
            NodeKind::Condition => Self::Condition(ConditionConfig::default()),
            NodeKind::Delay => Self::Delay(DelayConfig::default()),
        }
    }

    /// Parse the wire `data` object of a node of the given kind.
    pub fn from_data(kind: NodeKind, data: Value) -> Result<Self, serde_json::Error> {
        let data = match data {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        Ok(match kind {
            NodeKind::Trigger => Self::Trigger(serde_json::from_value(data)?),
            NodeKind::Action => Self::Action(serde_json::from_value(data)?),
            NodeKind::Condition => Self::Condition(serde_json::from_value(data)?),
            NodeKind::Delay => Self::Delay(serde_json::from_value(data)?),
        })
    }

    /// Serialise back to the wire `data` object.
    pub fn to_data(&self) -> Value {
        let data = match self {
            Self::Trigger(c) => serde_json::to_value(c),
            Self::Action(c) => serde_json::to_value(c),
            Self::Condition(c) => serde_json::to_value(c),
            Self::Delay(c) => serde_json::to_value(c),
        };
        data.unwrap_or_default()
    }

    /// Names of required fields that are absent.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        match self {
            Self::Trigger(c) => c.missing_fields(),
            Self::Action(c) => c.missing_fields(),
            Self::Condition(c) => c.missing_fields(),
            Self::Delay(c) => c.missing_fields(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

impl From<TriggerConfig> for NodeConfig {
    fn from(c: TriggerConfig) -> Self {
        Self::Trigger(c)
    }
}

impl From<ActionConfig> for NodeConfig {
    fn from(c: ActionConfig) -> Self {
        Self::Action(c)
    }
}

impl From<ConditionConfig> for NodeConfig {
    fn from(c: ConditionConfig) -> Self {
        Self::Condition(c)
    }
}

impl From<DelayConfig> for NodeConfig {
    fn from(c: DelayConfig) -> Self {
        Self::Delay(c)
    }
}

fn blank(s: &Option<String>) -> bool {
    s.as_deref().map_or(true, |s| s.trim().is_empty())
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    /// External event class this trigger fires on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_type: Option<String>,
}

impl TriggerConfig {
    pub fn new(trigger_type: impl Into<String>) -> Self {
        Self { trigger_type: Some(trigger_type.into()) }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        if blank(&self.trigger_type) { vec!["triggerType"] } else { vec![] }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    /// Recipient, channel or record type, depending on the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionConfig {
    pub fn new(action_type: ActionType) -> Self {
        Self { action_type: Some(action_type), ..Self::default() }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let Some(action_type) = self.action_type else {
            return vec!["actionType"];
        };

        let required: &[&'static str] = match action_type {
            ActionType::SendEmail => &["target", "template"],
            ActionType::CreateRecord => &["target"],
            ActionType::SendMessage => &["target", "message"],
            ActionType::GenerateDocument => &["template"],
            ActionType::LogMessage => &["message"],
        };

        required
            .iter()
            .copied()
            .filter(|f| match *f {
                "target" => blank(&self.target),
                "template" => blank(&self.template),
                _ => blank(&self.message),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    GreaterThan,
    LessThan,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionConfig {
    /// Dotted path into the run context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,
    /// Right-hand operand. JSON `null` counts as missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl ConditionConfig {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: Some(field.into()),
            operator: Some(operator),
            value: Some(value.into()),
        }
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if blank(&self.field) {
            missing.push("field");
        }
        if self.operator.is_none() {
            missing.push("operator");
        }
        if self.value.as_ref().map_or(true, Value::is_null) {
            missing.push("value");
        }
        missing
    }
}

// ---------------------------------------------------------------------------
// Delay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DelayUnit {
    pub fn millis(&self) -> f64 {
        match self {
            Self::Seconds => 1_000.0,
            Self::Minutes => 60_000.0,
            Self::Hours => 3_600_000.0,
            Self::Days => 86_400_000.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    /// Kept as raw JSON so drafts may hold anything the editor produced;
    /// numeric validity is checked at activation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<DelayUnit>,
}

impl DelayConfig {
    pub fn new(duration: f64, unit: DelayUnit) -> Self {
        Self {
            duration: serde_json::Number::from_f64(duration).map(Value::Number),
            unit: Some(unit),
        }
    }

    /// The duration as a number, accepting JSON numbers and numeric strings.
    pub fn numeric_duration(&self) -> Option<f64> {
        match self.duration.as_ref()? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|d| d.is_finite())
    }

    /// Resolve to a wall-clock duration.
    ///
    /// # Errors
    /// A human-readable reason when the duration is missing, non-numeric,
    /// not strictly positive or too large to represent, or the unit is missing.
    pub fn resolve(&self) -> Result<Duration, String> {
        let unit = self.unit.ok_or_else(|| "missing unit".to_string())?;
        let amount = self
            .numeric_duration()
            .ok_or_else(|| format!("{} is not a number", self.duration.clone().unwrap_or_default()))?;
        if amount <= 0.0 {
            return Err(format!("{amount} is not positive"));
        }
        Duration::try_from_secs_f64(amount * unit.millis() / 1_000.0)
            .map_err(|_| format!("{amount} is too large"))
    }

    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.duration.as_ref().map_or(true, Value::is_null) {
            missing.push("duration");
        }
        if self.unit.is_none() {
            missing.push("unit");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_fields_are_ignored() {
        let cfg = NodeConfig::from_data(
            NodeKind::Trigger,
            json!({ "triggerType": "employee_created", "label": "New hire" }),
        )
        .unwrap();
        assert_eq!(cfg, NodeConfig::Trigger(TriggerConfig::new("employee_created")));
        assert!(cfg.is_complete());
    }

    #[test]
    fn unknown_action_type_is_rejected() {
        let err = NodeConfig::from_data(NodeKind::Action, json!({ "actionType": "send_fax" }));
        assert!(err.is_err());
    }

    #[test]
    fn action_requirements_depend_on_type() {
        let cfg = ActionConfig::new(ActionType::SendEmail).with_target("a@b.c");
        assert_eq!(cfg.missing_fields(), vec!["template"]);

        let cfg = ActionConfig::new(ActionType::SendMessage);
        assert_eq!(cfg.missing_fields(), vec!["target", "message"]);

        let cfg = ActionConfig::new(ActionType::LogMessage).with_message("hi");
        assert!(cfg.missing_fields().is_empty());

        assert_eq!(ActionConfig::default().missing_fields(), vec!["actionType"]);
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let cfg = NodeConfig::from_data(NodeKind::Trigger, json!({ "triggerType": "  " })).unwrap();
        assert_eq!(cfg.missing_fields(), vec!["triggerType"]);
    }

    #[test]
    fn null_condition_value_is_missing() {
        let cfg = NodeConfig::from_data(
            NodeKind::Condition,
            json!({ "field": "priority", "operator": "equals", "value": null }),
        )
        .unwrap();
        assert_eq!(cfg.missing_fields(), vec!["value"]);
    }

    #[test]
    fn delay_resolves_with_fixed_multipliers() {
        assert_eq!(DelayConfig::new(1.0, DelayUnit::Days).resolve().unwrap(), Duration::from_secs(86_400));
        assert_eq!(DelayConfig::new(90.0, DelayUnit::Seconds).resolve().unwrap(), Duration::from_secs(90));
        assert_eq!(DelayConfig::new(1.5, DelayUnit::Hours).resolve().unwrap(), Duration::from_secs(5_400));

        let from_string = DelayConfig { duration: Some(json!("2")), unit: Some(DelayUnit::Minutes) };
        assert_eq!(from_string.resolve().unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn delay_rejects_non_positive_and_non_numeric() {
        assert!(DelayConfig::new(0.0, DelayUnit::Seconds).resolve().is_err());
        assert!(DelayConfig::new(-3.0, DelayUnit::Hours).resolve().is_err());

        let words = DelayConfig { duration: Some(json!("soon")), unit: Some(DelayUnit::Days) };
        assert!(words.resolve().is_err());
        // Present but non-numeric still counts as configured; activation rejects it.
        assert!(words.missing_fields().is_empty());
    }

    #[test]
    fn data_round_trips_in_camel_case() {
        let cfg = NodeConfig::from(ActionConfig::new(ActionType::CreateRecord).with_target("tickets"));
        assert_eq!(cfg.to_data(), json!({ "actionType": "create_record", "target": "tickets" }));
    }
}
