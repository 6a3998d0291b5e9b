//! Graph validation — run this before activating a workflow.
//!
//! Rules enforced, in order (the first violation is returned):
//! 1. Node and edge IDs are unique within the graph.
//! 2. Every edge references existing nodes on both ends.
//! 3. At least one Trigger exists and no Trigger has incoming edges.
//! 4. Every non-Trigger node has at least one incoming edge.
//! 5. Branch labels appear only on edges leaving a Condition, and every
//!    Condition has exactly one "true" and one "false" outgoing edge.
//! 6. A Delay has at most one outgoing edge.
//! 7. The directed graph is acyclic (topological sort must succeed).
//! 8. Every node reachable from a Trigger is configured.
//! 9. Every Delay resolves to a positive duration within the allowed maximum.
//!
//! Saving a draft never runs these checks; only activation does.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use uuid::Uuid;

use crate::config::NodeConfig;
use crate::models::{Branch, Edge, Graph, Node, NodeKind};
use crate::ValidationError;

/// Upper bounds applied during activation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationLimits {
    /// Longest single Delay a workflow may contain.
    pub max_delay: Duration,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_secs(365 * 86_400),
        }
    }
}

/// Validate `graph` with the default limits.
pub fn validate_for_activation(graph: &Graph) -> Result<(), ValidationError> {
    validate_with_limits(graph, &ValidationLimits::default())
}

/// Validate `graph` for activation.
///
/// # Errors
/// The first [`ValidationError`] found, in the order listed in the module docs.
pub fn validate_with_limits(graph: &Graph, limits: &ValidationLimits) -> Result<(), ValidationError> {
    // -----------------------------------------------------------------------
    // 1. Ensure IDs are unique
    // -----------------------------------------------------------------------
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(ValidationError::DuplicateNodeId(node.id.clone()));
        }
    }

    let mut seen_edges: HashSet<&str> = HashSet::new();
    for edge in &graph.edges {
        if !seen_edges.insert(edge.id.as_str()) {
            return Err(ValidationError::DuplicateEdgeId(edge.id.clone()));
        }
    }

    let nodes: HashMap<&str, &Node> = graph.nodes.iter().map(|n| (n.id.as_str(), n)).collect();

    // -----------------------------------------------------------------------
    // 2. Validate edge endpoints
    // -----------------------------------------------------------------------
    for edge in &graph.edges {
        for (node_id, side) in [(&edge.source, "source"), (&edge.target, "target")] {
            if !nodes.contains_key(node_id.as_str()) {
                return Err(ValidationError::UnknownNodeReference {
                    edge_id: edge.id.clone(),
                    node_id: node_id.clone(),
                    side,
                });
            }
        }
    }

    let mut incoming: HashMap<&str, usize> = HashMap::new();
    let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
    for edge in &graph.edges {
        *incoming.entry(edge.target.as_str()).or_insert(0) += 1;
        outgoing.entry(edge.source.as_str()).or_default().push(edge);
    }

    // -----------------------------------------------------------------------
    // 3–4. Entry points
    // -----------------------------------------------------------------------
    if graph.triggers().next().is_none() {
        return Err(ValidationError::MissingTrigger);
    }

    let has_incoming = |id: &str| incoming.get(id).copied().unwrap_or(0) > 0;

    if let Some(t) = graph.triggers().find(|t| has_incoming(t.id.as_str())) {
        return Err(ValidationError::TriggerHasIncomingEdges(t.id.clone()));
    }

    if let Some(orphan) = graph
        .nodes
        .iter()
        .find(|n| n.kind() != NodeKind::Trigger && !has_incoming(n.id.as_str()))
    {
        return Err(ValidationError::NoIncomingEdges(orphan.id.clone()));
    }

    // -----------------------------------------------------------------------
    // 5–6. Per-kind edge shape
    // -----------------------------------------------------------------------
    for node in &graph.nodes {
        let out = outgoing.get(node.id.as_str()).map(Vec::as_slice).unwrap_or(&[]);

        match node.kind() {
            NodeKind::Condition => check_condition_edges(&node.id, out)?,
            kind => {
                if let Some(edge) = out.iter().find(|e| e.branch.is_some()) {
                    return Err(ValidationError::UnexpectedBranchLabel {
                        edge_id: edge.id.clone(),
                        source_id: node.id.clone(),
                    });
                }
                if kind == NodeKind::Delay && out.len() > 1 {
                    return Err(ValidationError::DelayFanOut {
                        node_id: node.id.clone(),
                        count: out.len(),
                    });
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // 7. Acyclicity
    // -----------------------------------------------------------------------
    topological_order(graph)?;

    // -----------------------------------------------------------------------
    // 8–9. Configuration of reachable nodes
    // -----------------------------------------------------------------------
    for node_id in reachable_from_triggers(graph, &outgoing) {
        let node = nodes[node_id];

        if !node.is_configured() {
            return Err(ValidationError::Unconfigured {
                node_id: node.id.clone(),
                missing: node.config().missing_fields(),
            });
        }

        if let NodeConfig::Delay(delay) = node.config() {
            let duration = delay.resolve().map_err(|reason| ValidationError::InvalidDelay {
                node_id: node.id.clone(),
                reason,
            })?;
            if duration > limits.max_delay {
                return Err(ValidationError::InvalidDelay {
                    node_id: node.id.clone(),
                    reason: format!(
                        "{}s exceeds the maximum of {}s",
                        duration.as_secs(),
                        limits.max_delay.as_secs()
                    ),
                });
            }
        }
    }

    Ok(())
}

fn check_condition_edges(node_id: &str, out: &[&Edge]) -> Result<(), ValidationError> {
    let malformed = |reason: String| ValidationError::MalformedCondition {
        node_id: node_id.to_owned(),
        reason,
    };

    if out.len() != 2 {
        return Err(malformed(format!("has {} outgoing edges (exactly two required)", out.len())));
    }

    let labels: Vec<Option<Branch>> = out.iter().map(|e| e.branch).collect();
    if labels.contains(&None) {
        return Err(malformed("has an unlabelled outgoing edge".into()));
    }
    if !labels.contains(&Some(Branch::True)) || !labels.contains(&Some(Branch::False)) {
        return Err(malformed("needs one \"true\" and one \"false\" edge".into()));
    }

    Ok(())
}

/// Node IDs reachable from any trigger, in breadth-first order.
fn reachable_from_triggers<'a>(
    graph: &'a Graph,
    outgoing: &HashMap<&'a str, Vec<&'a Edge>>,
) -> Vec<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut order = Vec::new();
    let mut queue: VecDeque<&str> = graph.triggers().map(|n| n.id.as_str()).collect();

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        order.push(id);
        for edge in outgoing.get(id).into_iter().flatten() {
            queue.push_back(edge.target.as_str());
        }
    }

    order
}

/// Return node IDs in topological order (Kahn's algorithm).
///
/// # Errors
/// [`ValidationError::CycleDetected`] if the graph is not acyclic.
pub fn topological_order(graph: &Graph) -> Result<Vec<String>, ValidationError> {
    // Build adjacency list and in-degree map.
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for node in &graph.nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }

    for edge in &graph.edges {
        adjacency
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
        *in_degree.entry(edge.target.as_str()).or_insert(0) += 1;
    }

    // Seed in declaration order so the result is deterministic.
    let mut queue: VecDeque<&str> = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();

    let mut sorted: Vec<String> = Vec::with_capacity(graph.nodes.len());

    while let Some(node_id) = queue.pop_front() {
        sorted.push(node_id.to_owned());

        if let Some(neighbours) = adjacency.get(node_id) {
            for &neighbour in neighbours {
                let deg = in_degree.entry(neighbour).or_insert(0);
                *deg -= 1;
                if *deg == 0 {
                    queue.push_back(neighbour);
                }
            }
        }
    }

    // If we didn't visit every node the graph contains a cycle.
    if sorted.len() != in_degree.len() {
        return Err(ValidationError::CycleDetected);
    }

    Ok(sorted)
}

/// Copy `graph`, giving every node and edge a fresh UUID.
///
/// Topology, configuration, positions and `configured` flags are preserved.
/// Edges pointing at unknown nodes keep their dangling reference.
pub fn clone_with_fresh_ids(graph: &Graph) -> Graph {
    let remap: HashMap<&str, String> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), Uuid::new_v4().to_string()))
        .collect();

    let nodes = graph
        .nodes
        .iter()
        .map(|n| {
            let mut node = n.clone();
            node.id = remap[n.id.as_str()].clone();
            node
        })
        .collect();

    let edges = graph
        .edges
        .iter()
        .map(|e| Edge {
            id: Uuid::new_v4().to_string(),
            source: remap.get(e.source.as_str()).cloned().unwrap_or_else(|| e.source.clone()),
            target: remap.get(e.target.as_str()).cloned().unwrap_or_else(|| e.target.clone()),
            branch: e.branch,
        })
        .collect();

    Graph::new(nodes, edges)
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ActionConfig, ConditionConfig, DelayConfig, DelayUnit, Operator, TriggerConfig,
    };
    use nodes::ActionType;
    use serde_json::json;

    fn trigger(id: &str) -> Node {
        Node::new(id, TriggerConfig::new("ticket_created"))
    }

    fn action(id: &str) -> Node {
        Node::new(id, ActionConfig::new(ActionType::LogMessage).with_message("hi"))
    }

    fn condition(id: &str) -> Node {
        Node::new(id, ConditionConfig::new("priority", Operator::Equals, "high"))
    }

    fn delay(id: &str, amount: f64) -> Node {
        Node::new(id, DelayConfig::new(amount, DelayUnit::Minutes))
    }

    fn edge(id: &str, from: &str, to: &str) -> Edge {
        Edge::new(id, from, to)
    }

    fn branching() -> Graph {
        Graph::new(
            vec![trigger("t"), condition("c"), action("yes"), action("no")],
            vec![
                edge("e1", "t", "c"),
                edge("e2", "c", "yes").on(true),
                edge("e3", "c", "no").on(false),
            ],
        )
    }

    #[test]
    fn valid_branching_graph_passes() {
        assert_eq!(validate_for_activation(&branching()), Ok(()));
    }

    #[test]
    fn valid_linear_graph_with_delay_passes() {
        let g = Graph::new(
            vec![trigger("t"), action("a"), delay("d", 5.0), action("b")],
            vec![edge("e1", "t", "a"), edge("e2", "a", "d"), edge("e3", "d", "b")],
        );
        assert_eq!(validate_for_activation(&g), Ok(()));
    }

    #[test]
    fn multiple_triggers_are_allowed() {
        let g = Graph::new(
            vec![trigger("t1"), trigger("t2"), action("a")],
            vec![edge("e1", "t1", "a"), edge("e2", "t2", "a")],
        );
        assert_eq!(validate_for_activation(&g), Ok(()));
    }

    #[test]
    fn missing_trigger_is_rejected() {
        let g = Graph::new(vec![action("a")], vec![]);
        assert_eq!(validate_for_activation(&g), Err(ValidationError::MissingTrigger));
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let g = Graph::new(vec![trigger("a"), action("a")], vec![]);
        assert!(matches!(
            validate_for_activation(&g),
            Err(ValidationError::DuplicateNodeId(id)) if id == "a"
        ));
    }

    #[test]
    fn duplicate_edge_id_is_rejected() {
        let g = Graph::new(
            vec![trigger("t"), action("a"), action("b")],
            vec![edge("e", "t", "a"), edge("e", "t", "b")],
        );
        assert!(matches!(validate_for_activation(&g), Err(ValidationError::DuplicateEdgeId(_))));
    }

    #[test]
    fn edge_referencing_missing_node_is_rejected() {
        let g = Graph::new(vec![trigger("t")], vec![edge("e", "t", "ghost")]);
        assert!(matches!(
            validate_for_activation(&g),
            Err(ValidationError::UnknownNodeReference { node_id, side: "target", .. }) if node_id == "ghost"
        ));
    }

    #[test]
    fn trigger_with_incoming_edge_is_rejected() {
        let g = Graph::new(
            vec![trigger("t"), action("a")],
            vec![edge("e1", "t", "a"), edge("e2", "a", "t")],
        );
        assert_eq!(
            validate_for_activation(&g),
            Err(ValidationError::TriggerHasIncomingEdges("t".into()))
        );
    }

    #[test]
    fn orphan_action_is_rejected() {
        let g = Graph::new(vec![trigger("t"), action("a"), action("orphan")], vec![edge("e", "t", "a")]);
        assert_eq!(
            validate_for_activation(&g),
            Err(ValidationError::NoIncomingEdges("orphan".into()))
        );
    }

    #[test]
    fn condition_without_both_branches_is_rejected() {
        let mut g = branching();
        g.edges[2].branch = Some(Branch::True);
        assert!(matches!(
            validate_for_activation(&g),
            Err(ValidationError::MalformedCondition { node_id, .. }) if node_id == "c"
        ));

        // "no" stays reachable from the trigger, so only the condition is at fault.
        let mut g = branching();
        g.edges.pop();
        g.edges.push(edge("e4", "t", "no"));
        assert!(matches!(
            validate_for_activation(&g),
            Err(ValidationError::MalformedCondition { node_id, .. }) if node_id == "c"
        ));

        let mut g = branching();
        g.edges[1].branch = None;
        assert!(matches!(validate_for_activation(&g), Err(ValidationError::MalformedCondition { .. })));
    }

    #[test]
    fn condition_with_no_edges_is_rejected() {
        let g = Graph::new(vec![trigger("t"), condition("c")], vec![edge("e", "t", "c")]);
        assert!(matches!(validate_for_activation(&g), Err(ValidationError::MalformedCondition { .. })));
    }

    #[test]
    fn branch_label_outside_condition_is_rejected() {
        let g = Graph::new(vec![trigger("t"), action("a")], vec![edge("e", "t", "a").on(true)]);
        assert!(matches!(
            validate_for_activation(&g),
            Err(ValidationError::UnexpectedBranchLabel { source_id, .. }) if source_id == "t"
        ));
    }

    #[test]
    fn delay_fan_out_is_rejected() {
        let g = Graph::new(
            vec![trigger("t"), delay("d", 1.0), action("a"), action("b")],
            vec![edge("e1", "t", "d"), edge("e2", "d", "a"), edge("e3", "d", "b")],
        );
        assert_eq!(
            validate_for_activation(&g),
            Err(ValidationError::DelayFanOut { node_id: "d".into(), count: 2 })
        );
    }

    #[test]
    fn cycle_is_detected() {
        // t → a → b → c → a  (cycle!)
        let g = Graph::new(
            vec![trigger("t"), action("a"), action("b"), action("c")],
            vec![
                edge("e1", "t", "a"),
                edge("e2", "a", "b"),
                edge("e3", "b", "c"),
                edge("e4", "c", "a"), // back-edge
            ],
        );
        assert_eq!(validate_for_activation(&g), Err(ValidationError::CycleDetected));
    }

    #[test]
    fn unconfigured_node_blocks_activation() {
        let g = Graph::new(
            vec![trigger("t"), Node::new("a", ActionConfig::new(ActionType::SendEmail))],
            vec![edge("e", "t", "a")],
        );
        assert_eq!(
            validate_for_activation(&g),
            Err(ValidationError::Unconfigured { node_id: "a".into(), missing: vec!["target", "template"] })
        );
    }

    #[test]
    fn bad_delay_duration_blocks_activation() {
        let mut words = delay("d", 1.0);
        words.set_config(DelayConfig { duration: Some(json!("tomorrow")), unit: Some(DelayUnit::Days) });

        for bad in [delay("d", 0.0), delay("d", -5.0), words] {
            let g = Graph::new(vec![trigger("t"), bad], vec![edge("e", "t", "d")]);
            assert!(matches!(validate_for_activation(&g), Err(ValidationError::InvalidDelay { .. })));
        }
    }

    #[test]
    fn delay_above_limit_is_rejected() {
        let g = Graph::new(
            vec![trigger("t"), Node::new("d", DelayConfig::new(2.0, DelayUnit::Hours))],
            vec![edge("e", "t", "d")],
        );
        let limits = ValidationLimits { max_delay: Duration::from_secs(3_600) };
        assert!(matches!(validate_with_limits(&g, &limits), Err(ValidationError::InvalidDelay { .. })));
        assert_eq!(validate_for_activation(&g), Ok(()));
    }

    #[test]
    fn oversized_delay_is_reported_not_panicked() {
        let g = Graph::new(
            vec![trigger("t"), Node::new("d", DelayConfig::new(1e300, DelayUnit::Days))],
            vec![edge("e", "t", "d")],
        );
        assert!(matches!(
            validate_for_activation(&g),
            Err(ValidationError::InvalidDelay { node_id, .. }) if node_id == "d"
        ));
    }

    #[test]
    fn topological_order_is_deterministic() {
        let g = Graph::new(
            vec![trigger("t"), action("a"), action("b"), action("c")],
            vec![edge("e1", "t", "a"), edge("e2", "t", "b"), edge("e3", "a", "c"), edge("e4", "b", "c")],
        );
        assert_eq!(topological_order(&g).unwrap(), vec!["t", "a", "b", "c"]);
    }

    #[test]
    fn fresh_ids_preserve_topology() {
        let original = branching();
        let copy = clone_with_fresh_ids(&original);

        let old_ids: HashSet<_> = original.nodes.iter().map(|n| n.id.clone()).collect();
        assert!(copy.nodes.iter().all(|n| !old_ids.contains(&n.id)));
        let old_edges: HashSet<_> = original.edges.iter().map(|e| e.id.clone()).collect();
        assert!(copy.edges.iter().all(|e| !old_edges.contains(&e.id)));

        let cond = copy.nodes.iter().find(|n| n.kind() == NodeKind::Condition).unwrap();
        let out = copy.outgoing_edges(&cond.id);
        assert_eq!(out.len(), 2);
        assert_eq!(copy.nodes[0].config(), original.nodes[0].config());
        assert_eq!(validate_for_activation(&copy), Ok(()));
    }
}
