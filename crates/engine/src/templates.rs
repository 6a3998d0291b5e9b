//! Workflow templates.
//!
//! Templates are prototype graphs that are never executed directly. Using
//! one clones its graph with fresh IDs into a new draft workflow.

use serde::{Deserialize, Serialize};

use nodes::ActionType;

use crate::config::{ActionConfig, ConditionConfig, DelayConfig, DelayUnit, Operator, TriggerConfig};
use crate::dag::clone_with_fresh_ids;
use crate::models::{Edge, Graph, Node, WorkflowDefinition};

/// A reusable workflow prototype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Stable identifier (e.g., "ticket-escalation")
    pub id: String,
    pub name: String,
    pub description: String,
    /// Grouping shown in the template picker (e.g., "HR", "Finance")
    pub category: String,
    pub graph: Graph,
}

/// Selects templates by category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilter {
    All,
    Named(String),
}

impl From<Option<String>> for CategoryFilter {
    /// `None` and `"All"` both select everything.
    fn from(category: Option<String>) -> Self {
        match category {
            Some(c) if !c.eq_ignore_ascii_case("all") => Self::Named(c),
            _ => Self::All,
        }
    }
}

/// Template catalog. Construct one at startup and pass it to consumers.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl TemplateRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in catalog.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for template in builtin_templates() {
            registry.register(template);
        }
        registry
    }

    /// Add a template, replacing any existing one with the same ID.
    pub fn register(&mut self, template: Template) {
        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => self.templates.push(template),
        }
    }

    pub fn list_by_category(&self, filter: &CategoryFilter) -> Vec<&Template> {
        self.templates
            .iter()
            .filter(|t| match filter {
                CategoryFilter::All => true,
                CategoryFilter::Named(c) => t.category.eq_ignore_ascii_case(c),
            })
            .collect()
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Distinct categories in registration order.
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for t in &self.templates {
            if !out.contains(&t.category.as_str()) {
                out.push(&t.category);
            }
        }
        out
    }

    /// A new draft (version 1) whose graph is a fresh-ID copy of the template's.
    pub fn instantiate(&self, template: &Template) -> WorkflowDefinition {
        WorkflowDefinition::draft(
            template.name.clone(),
            template.description.clone(),
            clone_with_fresh_ids(&template.graph),
        )
    }
}

// ---------------------------------------------------------------------------
// Built-in catalog
// ---------------------------------------------------------------------------

fn template(id: &str, name: &str, category: &str, description: &str, graph: Graph) -> Template {
    Template {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        category: category.into(),
        graph,
    }
}

fn chain(pairs: &[(&str, &str)]) -> Vec<Edge> {
    pairs
        .iter()
        .map(|(from, to)| Edge::new(format!("{from}-{to}"), *from, *to))
        .collect()
}

fn branches(condition: &str, on_true: &str, on_false: &str) -> [Edge; 2] {
    [
        Edge::new(format!("{condition}-true"), condition, on_true).on(true),
        Edge::new(format!("{condition}-false"), condition, on_false).on(false),
    ]
}

fn builtin_templates() -> Vec<Template> {
    vec![
        template(
            "employee-onboarding",
            "Employee Onboarding",
            "HR",
            "Welcome a new hire, notify HR, and open onboarding tasks the next day",
            Graph::new(
                vec![
                    Node::new("trigger", TriggerConfig::new("employee_created")).at(80.0, 200.0),
                    Node::new(
                        "welcome",
                        ActionConfig::new(ActionType::SendEmail)
                            .with_target("{{email}}")
                            .with_template("welcome_email"),
                    )
                    .at(320.0, 200.0),
                    Node::new(
                        "notify-hr",
                        ActionConfig::new(ActionType::SendMessage)
                            .with_target("#hr")
                            .with_message("New hire starting: {{name}}"),
                    )
                    .at(560.0, 80.0),
                    Node::new("wait", DelayConfig::new(1.0, DelayUnit::Days)).at(560.0, 320.0),
                    Node::new(
                        "tasks",
                        ActionConfig::new(ActionType::CreateRecord).with_target("onboarding_tasks"),
                    )
                    .at(800.0, 320.0),
                ],
                chain(&[
                    ("trigger", "welcome"),
                    ("welcome", "notify-hr"),
                    ("welcome", "wait"),
                    ("wait", "tasks"),
                ]),
            ),
        ),
        template(
            "leave-request-routing",
            "Leave Request Routing",
            "HR",
            "Send long leave requests to the manager and auto-file short ones",
            Graph::new(
                vec![
                    Node::new("trigger", TriggerConfig::new("leave_requested")).at(80.0, 200.0),
                    Node::new("long-leave", ConditionConfig::new("days", Operator::GreaterThan, 5))
                        .at(320.0, 200.0),
                    Node::new(
                        "ask-manager",
                        ActionConfig::new(ActionType::SendMessage)
                            .with_target("{{manager}}")
                            .with_message("{{employee}} requested {{days}} days of leave"),
                    )
                    .at(560.0, 80.0),
                    Node::new(
                        "file",
                        ActionConfig::new(ActionType::CreateRecord).with_target("leave_approvals"),
                    )
                    .at(560.0, 320.0),
                ],
                [
                    chain(&[("trigger", "long-leave")]),
                    branches("long-leave", "ask-manager", "file").to_vec(),
                ]
                .concat(),
            ),
        ),
        template(
            "ticket-escalation",
            "Ticket Escalation",
            "Support",
            "Escalate high-priority tickets to on-call and assign the rest",
            Graph::new(
                vec![
                    Node::new("trigger", TriggerConfig::new("ticket_created")).at(80.0, 200.0),
                    Node::new("is-high", ConditionConfig::new("priority", Operator::Equals, "high"))
                        .at(320.0, 200.0),
                    Node::new(
                        "escalate",
                        ActionConfig::new(ActionType::SendMessage)
                            .with_target("#support-escalations")
                            .with_message("High priority ticket {{id}}: {{subject}}"),
                    )
                    .at(560.0, 80.0),
                    Node::new(
                        "assign",
                        ActionConfig::new(ActionType::CreateRecord).with_target("ticket_assignments"),
                    )
                    .at(560.0, 320.0),
                ],
                [
                    chain(&[("trigger", "is-high")]),
                    branches("is-high", "escalate", "assign").to_vec(),
                ]
                .concat(),
            ),
        ),
        template(
            "invoice-reminder",
            "Invoice Reminder",
            "Finance",
            "Remind the customer about an overdue invoice and escalate large amounts",
            Graph::new(
                vec![
                    Node::new("trigger", TriggerConfig::new("invoice_overdue")).at(80.0, 200.0),
                    Node::new(
                        "remind",
                        ActionConfig::new(ActionType::SendEmail)
                            .with_target("{{customer_email}}")
                            .with_template("invoice_reminder"),
                    )
                    .at(320.0, 200.0),
                    Node::new("grace", DelayConfig::new(3.0, DelayUnit::Days)).at(560.0, 200.0),
                    Node::new("is-large", ConditionConfig::new("amount", Operator::GreaterThan, 1000))
                        .at(800.0, 200.0),
                    Node::new(
                        "escalate",
                        ActionConfig::new(ActionType::SendEmail)
                            .with_target("{{account_manager}}")
                            .with_template("invoice_escalation"),
                    )
                    .at(1040.0, 80.0),
                    Node::new(
                        "note",
                        ActionConfig::new(ActionType::LogMessage)
                            .with_message("Second reminder pending for invoice {{invoice_id}}"),
                    )
                    .at(1040.0, 320.0),
                ],
                [
                    chain(&[("trigger", "remind"), ("remind", "grace"), ("grace", "is-large")]),
                    branches("is-large", "escalate", "note").to_vec(),
                ]
                .concat(),
            ),
        ),
        template(
            "daily-report",
            "Daily Report",
            "Operations",
            "Generate the daily operations report and mail it to the team",
            Graph::new(
                vec![
                    Node::new("trigger", TriggerConfig::new("daily_schedule")).at(80.0, 200.0),
                    Node::new(
                        "generate",
                        ActionConfig::new(ActionType::GenerateDocument).with_template("daily_report"),
                    )
                    .at(320.0, 200.0),
                    Node::new(
                        "send",
                        ActionConfig::new(ActionType::SendEmail)
                            .with_target("ops@company.com")
                            .with_template("daily_report_email"),
                    )
                    .at(560.0, 200.0),
                ],
                chain(&[("trigger", "generate"), ("generate", "send")]),
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::config::NodeConfig;
    use crate::dag::validate_for_activation;
    use crate::WorkflowStatus;

    #[test]
    fn builtins_are_activatable() {
        let registry = TemplateRegistry::with_builtins();
        assert_eq!(registry.list_by_category(&CategoryFilter::All).len(), 5);
        for t in registry.list_by_category(&CategoryFilter::All) {
            assert_eq!(validate_for_activation(&t.graph), Ok(()), "template {}", t.id);
        }
    }

    #[test]
    fn filters_by_category() {
        let registry = TemplateRegistry::with_builtins();
        let hr: Vec<_> = registry
            .list_by_category(&CategoryFilter::Named("hr".into()))
            .into_iter()
            .map(|t| t.id.as_str())
            .collect();
        assert_eq!(hr, vec!["employee-onboarding", "leave-request-routing"]);
        assert_eq!(registry.categories(), vec!["HR", "Support", "Finance", "Operations"]);
        assert_eq!(CategoryFilter::from(Some("All".to_string())), CategoryFilter::All);
        assert!(registry.list_by_category(&CategoryFilter::Named("Legal".into())).is_empty());
    }

    #[test]
    fn lookup_by_id() {
        let registry = TemplateRegistry::with_builtins();
        assert_eq!(registry.get_by_id("daily-report").map(|t| t.category.as_str()), Some("Operations"));
        assert!(registry.get_by_id("missing").is_none());
    }

    #[test]
    fn register_replaces_same_id() {
        let mut registry = TemplateRegistry::with_builtins();
        let mut custom = registry.get_by_id("daily-report").unwrap().clone();
        custom.name = "Nightly Report".into();
        registry.register(custom);

        assert_eq!(registry.list_by_category(&CategoryFilter::All).len(), 5);
        assert_eq!(registry.get_by_id("daily-report").unwrap().name, "Nightly Report");
    }

    #[test]
    fn instances_are_isolated() {
        let registry = TemplateRegistry::with_builtins();
        let template = registry.get_by_id("ticket-escalation").unwrap();

        let mut a = registry.instantiate(template);
        let b = registry.instantiate(template);

        assert_eq!(a.status, WorkflowStatus::Draft);
        assert_eq!(a.version, 1);
        assert_ne!(a.id, b.id);

        let ids = |d: &WorkflowDefinition| -> HashSet<String> {
            d.graph
                .nodes
                .iter()
                .map(|n| n.id.clone())
                .chain(d.graph.edges.iter().map(|e| e.id.clone()))
                .collect()
        };
        assert!(ids(&a).is_disjoint(&ids(&b)));
        let original: HashSet<String> = template.graph.nodes.iter().map(|n| n.id.clone()).collect();
        assert!(ids(&a).is_disjoint(&original));

        a.graph.nodes[0].set_config(TriggerConfig::new("ticket_updated"));
        assert_eq!(b.graph.nodes[0].config(), template.graph.nodes[0].config());
        assert_eq!(
            registry.get_by_id("ticket-escalation").unwrap().graph.nodes[0].config(),
            &NodeConfig::from(TriggerConfig::new("ticket_created"))
        );
    }
}
