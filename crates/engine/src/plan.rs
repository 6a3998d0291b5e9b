//! Immutable run-time snapshot of a validated graph.
//!
//! Runs never read the authoring [`Graph`]: a plan is compiled once (which
//! fully validates the graph) and shared by every run started from it, so
//! later edits to the workflow cannot reach runs already in flight.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use nodes::ActionType;

use crate::condition::ConditionSpec;
use crate::config::NodeConfig;
use crate::dag::{validate_with_limits, ValidationLimits};
use crate::models::{Branch, Graph};
use crate::{EngineError, ValidationError};

/// What a node does when a branch reaches it.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Trigger { trigger_type: String },
    Action { action_type: ActionType, config: Value },
    Condition(ConditionSpec),
    Delay { duration: Duration },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanNode {
    pub id: String,
    pub step: Step,
    successors: Vec<String>,
    on_true: Option<String>,
    on_false: Option<String>,
}

impl PlanNode {
    /// Unlabelled successors, in edge declaration order.
    pub fn successors(&self) -> &[String] {
        &self.successors
    }

    /// The node a Condition continues to for the given outcome.
    pub fn branch_target(&self, outcome: bool) -> Option<&str> {
        if outcome { self.on_true.as_deref() } else { self.on_false.as_deref() }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub workflow_id: Uuid,
    /// The authoring graph this plan was compiled from, stored on each run.
    pub graph: Graph,
    nodes: HashMap<String, PlanNode>,
    triggers: Vec<String>,
}

impl ExecutionPlan {
    /// Validate `graph` and build its plan.
    ///
    /// # Errors
    /// [`EngineError::Validation`] for any activation rule violation.
    pub fn compile(
        workflow_id: Uuid,
        graph: &Graph,
        limits: &ValidationLimits,
    ) -> Result<Self, EngineError> {
        validate_with_limits(graph, limits)?;

        let mut nodes = HashMap::with_capacity(graph.nodes.len());
        let mut triggers = Vec::new();

        for node in &graph.nodes {
            let step = compile_step(&node.id, node.config())?;
            if matches!(step, Step::Trigger { .. }) {
                triggers.push(node.id.clone());
            }

            let mut plan_node = PlanNode {
                id: node.id.clone(),
                step,
                successors: Vec::new(),
                on_true: None,
                on_false: None,
            };
            for edge in graph.outgoing_edges(&node.id) {
                match edge.branch {
                    Some(Branch::True) => plan_node.on_true = Some(edge.target.clone()),
                    Some(Branch::False) => plan_node.on_false = Some(edge.target.clone()),
                    None => plan_node.successors.push(edge.target.clone()),
                }
            }
            nodes.insert(node.id.clone(), plan_node);
        }

        Ok(Self { workflow_id, graph: graph.clone(), nodes, triggers })
    }

    pub fn node(&self, id: &str) -> Option<&PlanNode> {
        self.nodes.get(id)
    }

    /// Whether any trigger of this plan fires on `trigger_type`.
    pub fn matches(&self, trigger_type: &str) -> bool {
        !self.entry_triggers(trigger_type).is_empty()
    }

    /// Successors of every trigger matching `trigger_type`, deduplicated.
    pub fn entry_targets(&self, trigger_type: &str) -> Vec<String> {
        let mut targets: Vec<String> = Vec::new();
        for trigger in self.entry_triggers(trigger_type) {
            for next in trigger.successors() {
                if !targets.contains(next) {
                    targets.push(next.clone());
                }
            }
        }
        targets
    }

    fn entry_triggers(&self, trigger_type: &str) -> Vec<&PlanNode> {
        self.triggers
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| matches!(&n.step, Step::Trigger { trigger_type: t } if t == trigger_type))
            .collect()
    }
}

fn compile_step(node_id: &str, config: &NodeConfig) -> Result<Step, ValidationError> {
    let unconfigured = || ValidationError::Unconfigured {
        node_id: node_id.to_owned(),
        missing: config.missing_fields(),
    };

    // Validation already guarantees every node is reachable and configured.
    Ok(match config {
        NodeConfig::Trigger(c) => Step::Trigger {
            trigger_type: c.trigger_type.clone().ok_or_else(unconfigured)?,
        },
        NodeConfig::Action(c) => Step::Action {
            action_type: c.action_type.ok_or_else(unconfigured)?,
            config: config.to_data(),
        },
        NodeConfig::Condition(c) => Step::Condition(ConditionSpec {
            field: c.field.clone().ok_or_else(unconfigured)?,
            operator: c.operator.ok_or_else(unconfigured)?,
            value: c.value.clone().ok_or_else(unconfigured)?,
        }),
        NodeConfig::Delay(c) => Step::Delay {
            duration: c.resolve().map_err(|reason| ValidationError::InvalidDelay {
                node_id: node_id.to_owned(),
                reason,
            })?,
        },
    })
}
