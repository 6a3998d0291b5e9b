//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like
//! in memory. They serialise to/from the JSONB `graph` column of the
//! `workflows` table and to the import/export format.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use db::{RunRow, RunStatus, WorkflowRow, WorkflowStatus};
use nodes::ActionType;

use crate::config::NodeConfig;
use crate::EngineError;

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    Action,
    Condition,
    Delay,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trigger => write!(f, "trigger"),
            Self::Action => write!(f, "action"),
            Self::Condition => write!(f, "condition"),
            Self::Delay => write!(f, "delay"),
        }
    }
}

/// Canvas position. Layout only; never read by execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A single step in the workflow graph.
///
/// Wire shape: `{ "id", "kind", "position", "data", "configured" }`.
/// `configured` is derived from `data` whenever a node is built or parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawNode", into = "RawNode")]
pub struct Node {
    /// Unique identifier within the graph (referenced by edges).
    pub id: String,
    pub position: Position,
    config: NodeConfig,
    configured: bool,
}

impl Node {
    pub fn new(id: impl Into<String>, config: impl Into<NodeConfig>) -> Self {
        let config = config.into();
        Self {
            id: id.into(),
            position: Position::default(),
            configured: config.is_complete(),
            config,
        }
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Replace the configuration and recompute `configured`.
    pub fn set_config(&mut self, config: impl Into<NodeConfig>) {
        self.config = config.into();
        self.configured = self.config.is_complete();
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }
}

#[derive(Serialize, Deserialize)]
struct RawNode {
    id: String,
    kind: NodeKind,
    #[serde(default)]
    position: Position,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    configured: bool,
}

impl TryFrom<RawNode> for Node {
    type Error = serde_json::Error;

    fn try_from(raw: RawNode) -> Result<Self, Self::Error> {
        let config = NodeConfig::from_data(raw.kind, raw.data)?;
        Ok(Node::new(raw.id, config).at(raw.position.x, raw.position.y))
    }
}

impl From<Node> for RawNode {
    fn from(node: Node) -> Self {
        RawNode {
            kind: node.kind(),
            data: node.config.to_data(),
            id: node.id,
            position: node.position,
            configured: node.configured,
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Label on an edge leaving a Condition node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    #[serde(rename = "true")]
    True,
    #[serde(rename = "false")]
    False,
}

impl From<bool> for Branch {
    fn from(b: bool) -> Self {
        if b { Self::True } else { Self::False }
    }
}

/// Directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<Branch>,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            branch: None,
        }
    }

    pub fn on(mut self, branch: impl Into<Branch>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn outgoing_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.source == node_id).collect()
    }

    pub fn incoming_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.target == node_id).collect()
    }

    pub fn triggers(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.kind() == NodeKind::Trigger)
    }

    /// Whether two graphs differ in anything execution can observe.
    /// Node positions and ordering are ignored.
    pub fn same_structure(&self, other: &Graph) -> bool {
        fn nodes(g: &Graph) -> HashSet<(String, String)> {
            g.nodes
                .iter()
                .map(|n| (n.id.clone(), format!("{}:{}", n.kind(), n.config().to_data())))
                .collect()
        }
        fn edges(g: &Graph) -> HashSet<(&str, &str, &str, Option<Branch>)> {
            g.edges
                .iter()
                .map(|e| (e.id.as_str(), e.source.as_str(), e.target.as_str(), e.branch))
                .collect()
        }

        self.nodes.len() == other.nodes.len()
            && self.edges.len() == other.edges.len()
            && nodes(self) == nodes(other)
            && edges(self) == edges(other)
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A persisted, user-authored workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub status: WorkflowStatus,
    /// Incremented on every structural save.
    pub version: i32,
    pub graph: Graph,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// A fresh draft at version 1.
    pub fn draft(name: impl Into<String>, description: impl Into<String>, graph: Graph) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            status: WorkflowStatus::Draft,
            version: 1,
            graph,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_row(&self) -> Result<WorkflowRow, EngineError> {
        Ok(WorkflowRow {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            status: self.status.to_string(),
            version: self.version,
            graph: serde_json::to_value(&self.graph)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<WorkflowRow> for WorkflowDefinition {
    type Error = EngineError;

    fn try_from(row: WorkflowRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse().map_err(EngineError::Corrupt)?,
            graph: serde_json::from_value(row.graph)?,
            id: row.id,
            name: row.name,
            description: row.description,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// ---------------------------------------------------------------------------
// WorkflowRun
// ---------------------------------------------------------------------------

/// One action result recorded on a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutput {
    pub node_id: String,
    pub action_type: ActionType,
    pub output: Value,
    pub completed_at: DateTime<Utc>,
}

/// One execution of a workflow against one triggering event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    pub input_data: Value,
    /// Action results in completion order.
    pub output_data: Vec<ActionOutput>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
}

impl TryFrom<RunRow> for WorkflowRun {
    type Error = EngineError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.run_status().map_err(EngineError::Corrupt)?,
            output_data: serde_json::from_value(row.output_data)?,
            id: row.id,
            workflow_id: row.workflow_id,
            input_data: row.input_data,
            error_message: row.error_message,
            started_at: row.started_at,
            completed_at: row.completed_at,
            execution_time_ms: row.execution_time_ms,
        })
    }
}

// ---------------------------------------------------------------------------
// Export / import
// ---------------------------------------------------------------------------

/// Portable workflow format: `{ name, nodes, edges }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowExport {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowExport {
    pub fn from_definition(def: &WorkflowDefinition) -> Self {
        Self {
            name: def.name.clone(),
            nodes: def.graph.nodes.clone(),
            edges: def.graph.edges.clone(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn into_graph(self) -> (String, Graph) {
        (self.name, Graph::new(self.nodes, self.edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionConfig, TriggerConfig};
    use serde_json::json;

    #[test]
    fn node_parses_wire_shape_and_derives_configured() {
        let node: Node = serde_json::from_value(json!({
            "id": "t1",
            "kind": "trigger",
            "position": { "x": 10.0, "y": 20.0 },
            "data": { "triggerType": "employee_created" },
            "configured": false
        }))
        .unwrap();

        assert_eq!(node.kind(), NodeKind::Trigger);
        assert_eq!(node.position, Position { x: 10.0, y: 20.0 });
        assert!(node.is_configured());
    }

    #[test]
    fn node_missing_required_fields_is_unconfigured() {
        let node: Node = serde_json::from_value(json!({
            "id": "a1",
            "kind": "action",
            "data": { "actionType": "send_email", "target": "ops@example.com" },
            "configured": true
        }))
        .unwrap();
        assert!(!node.is_configured());
    }

    #[test]
    fn set_config_recomputes_configured() {
        let mut node = Node::new("a1", ActionConfig::default());
        assert!(!node.is_configured());
        node.set_config(ActionConfig::new(ActionType::LogMessage).with_message("done"));
        assert!(node.is_configured());
    }

    #[test]
    fn node_serialises_with_data_object() {
        let v = serde_json::to_value(Node::new("t", TriggerConfig::new("ping"))).unwrap();
        assert_eq!(v["kind"], "trigger");
        assert_eq!(v["data"]["triggerType"], "ping");
        assert_eq!(v["configured"], true);
    }

    #[test]
    fn branch_labels_use_string_booleans() {
        let e: Edge = serde_json::from_value(json!({
            "id": "e", "source": "c", "target": "x", "branch": "false"
        }))
        .unwrap();
        assert_eq!(e.branch, Some(Branch::False));

        let plain: Edge = serde_json::from_value(json!({ "id": "e", "source": "a", "target": "b" })).unwrap();
        assert_eq!(plain.branch, None);
    }

    #[test]
    fn adjacency_queries() {
        let g = Graph::new(
            vec![
                Node::new("t", TriggerConfig::new("x")),
                Node::new("a", ActionConfig::new(ActionType::LogMessage).with_message("m")),
                Node::new("b", ActionConfig::new(ActionType::LogMessage).with_message("m")),
            ],
            vec![Edge::new("e1", "t", "a"), Edge::new("e2", "t", "b"), Edge::new("e3", "a", "b")],
        );

        assert_eq!(g.outgoing_edges("t").len(), 2);
        assert_eq!(g.incoming_edges("b").len(), 2);
        assert!(g.incoming_edges("t").is_empty());
        assert_eq!(g.triggers().count(), 1);
    }

    #[test]
    fn moving_nodes_keeps_structure() {
        let g = Graph::new(vec![Node::new("t", TriggerConfig::new("x"))], vec![]);
        let mut moved = g.clone();
        moved.nodes[0].position = Position { x: 300.0, y: 40.0 };
        assert!(g.same_structure(&moved));

        let mut edited = g.clone();
        edited.nodes[0].set_config(TriggerConfig::new("y"));
        assert!(!g.same_structure(&edited));
    }

    #[test]
    fn export_round_trip_keeps_graph() {
        let def = WorkflowDefinition::draft(
            "wf",
            "",
            Graph::new(vec![Node::new("t", TriggerConfig::new("x"))], vec![]),
        );
        let json = WorkflowExport::from_definition(&def).to_json().unwrap();
        let (name, graph) = WorkflowExport::from_json(&json).unwrap().into_graph();
        assert_eq!(name, "wf");
        assert_eq!(graph, def.graph);
    }
}
