//! Workflow lifecycle: drafts, saves, activation and import/export.
//!
//! Saving never validates a draft; only [`WorkflowManager::activate`] (and
//! saving an already active workflow) runs the full activation checks.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use db::{DbError, WorkflowStore};

use crate::dag::ValidationLimits;
use crate::models::{Graph, WorkflowDefinition, WorkflowExport};
use crate::plan::ExecutionPlan;
use crate::{EngineError, WorkflowStatus};

#[derive(Clone)]
pub struct WorkflowManager {
    store: Arc<dyn WorkflowStore>,
    limits: ValidationLimits,
}

impl WorkflowManager {
    pub fn new(store: Arc<dyn WorkflowStore>, limits: ValidationLimits) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> &ValidationLimits {
        &self.limits
    }

    /// Persist a new draft at version 1.
    #[instrument(skip(self, description, graph))]
    pub async fn create_draft(
        &self,
        name: &str,
        description: &str,
        graph: Graph,
    ) -> Result<WorkflowDefinition, EngineError> {
        let def = WorkflowDefinition::draft(name, description, graph);
        self.store.create_workflow(&def.to_row()?).await?;
        info!(workflow_id = %def.id, "draft created");
        Ok(def)
    }

    /// Store an already built definition (e.g. a template instance).
    pub async fn insert(&self, def: WorkflowDefinition) -> Result<WorkflowDefinition, EngineError> {
        self.store.create_workflow(&def.to_row()?).await?;
        Ok(def)
    }

    pub async fn get(&self, id: Uuid) -> Result<WorkflowDefinition, EngineError> {
        let row = self.store.get_workflow(id).await.map_err(not_found(id))?;
        row.try_into()
    }

    /// All workflows, newest first.
    pub async fn list(&self) -> Result<Vec<WorkflowDefinition>, EngineError> {
        self.store
            .list_workflows()
            .await?
            .into_iter()
            .map(WorkflowDefinition::try_from)
            .collect()
    }

    /// Save an edit made against `expected_version`.
    ///
    /// The version is bumped only when the structure changed; moving nodes
    /// around the canvas keeps it.
    ///
    /// # Errors
    /// - [`EngineError::VersionConflict`] if someone saved in between.
    /// - [`EngineError::InvalidStatus`] for archived workflows.
    /// - [`EngineError::Validation`] when editing an active workflow into an
    ///   invalid shape.
    #[instrument(skip(self, name, description, graph))]
    pub async fn save(
        &self,
        id: Uuid,
        expected_version: i32,
        name: &str,
        description: &str,
        graph: Graph,
    ) -> Result<WorkflowDefinition, EngineError> {
        let mut def = self.get(id).await?;

        if def.version != expected_version {
            return Err(EngineError::VersionConflict { id, expected: expected_version, actual: def.version });
        }

        match def.status {
            WorkflowStatus::Archived => {
                return Err(EngineError::InvalidStatus { id, status: def.status, operation: "edit" });
            }
            WorkflowStatus::Active => {
                ExecutionPlan::compile(id, &graph, &self.limits)?;
            }
            WorkflowStatus::Draft | WorkflowStatus::Paused => {}
        }

        let structural = !def.graph.same_structure(&graph);
        let stored_version = def.version;

        def.name = name.to_owned();
        def.description = description.to_owned();
        def.graph = graph;
        def.updated_at = Utc::now();
        if structural {
            def.version += 1;
        }

        self.update(&def, stored_version).await?;
        info!(workflow_id = %id, version = def.version, structural, "workflow saved");
        Ok(def)
    }

    /// Validate and activate.
    ///
    /// # Errors
    /// [`EngineError::Validation`] leaves the workflow in its current status.
    #[instrument(skip(self))]
    pub async fn activate(&self, id: Uuid) -> Result<WorkflowDefinition, EngineError> {
        let def = self.get(id).await?;
        if def.status == WorkflowStatus::Archived {
            return Err(EngineError::InvalidStatus { id, status: def.status, operation: "activate" });
        }

        if let Err(e) = ExecutionPlan::compile(id, &def.graph, &self.limits) {
            warn!(workflow_id = %id, error = %e, "activation rejected");
            return Err(e);
        }

        self.transition(def, WorkflowStatus::Active).await
    }

    #[instrument(skip(self))]
    pub async fn pause(&self, id: Uuid) -> Result<WorkflowDefinition, EngineError> {
        let def = self.get(id).await?;
        if def.status != WorkflowStatus::Active {
            return Err(EngineError::InvalidStatus { id, status: def.status, operation: "pause" });
        }
        self.transition(def, WorkflowStatus::Paused).await
    }

    #[instrument(skip(self))]
    pub async fn archive(&self, id: Uuid) -> Result<WorkflowDefinition, EngineError> {
        let def = self.get(id).await?;
        if def.status == WorkflowStatus::Archived {
            return Err(EngineError::InvalidStatus { id, status: def.status, operation: "archive" });
        }
        self.transition(def, WorkflowStatus::Archived).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), EngineError> {
        self.store.delete_workflow(id).await.map_err(not_found(id))?;
        info!(workflow_id = %id, "workflow deleted");
        Ok(())
    }

    /// Serialise to the portable `{ name, nodes, edges }` format.
    pub async fn export(&self, id: Uuid) -> Result<String, EngineError> {
        let def = self.get(id).await?;
        Ok(WorkflowExport::from_definition(&def).to_json()?)
    }

    /// Create a draft from exported JSON. Imported graphs are never trusted:
    /// they must pass activation like any other draft.
    #[instrument(skip(self, json))]
    pub async fn import(&self, json: &str) -> Result<WorkflowDefinition, EngineError> {
        let (name, graph) = WorkflowExport::from_json(json)?.into_graph();
        self.create_draft(&name, "", graph).await
    }

    /// Plans of every active workflow with a trigger on `trigger_type`.
    ///
    /// Workflows whose stored graph no longer compiles are skipped with a
    /// warning rather than failing the whole lookup.
    pub async fn active_plans_for(&self, trigger_type: &str) -> Result<Vec<Arc<ExecutionPlan>>, EngineError> {
        let rows = self.store.list_workflows_by_status(WorkflowStatus::Active).await?;

        let mut plans = Vec::new();
        for row in rows {
            let id = row.id;
            let compiled = WorkflowDefinition::try_from(row)
                .and_then(|def| ExecutionPlan::compile(def.id, &def.graph, &self.limits));
            match compiled {
                Ok(plan) if plan.matches(trigger_type) => plans.push(Arc::new(plan)),
                Ok(_) => {}
                Err(e) => warn!(workflow_id = %id, error = %e, "skipping active workflow"),
            }
        }
        Ok(plans)
    }

    async fn transition(
        &self,
        mut def: WorkflowDefinition,
        status: WorkflowStatus,
    ) -> Result<WorkflowDefinition, EngineError> {
        let from = def.status;
        def.status = status;
        def.updated_at = Utc::now();
        self.update(&def, def.version).await?;
        info!(workflow_id = %def.id, %from, to = %status, "status changed");
        Ok(def)
    }

    async fn update(&self, def: &WorkflowDefinition, expected_version: i32) -> Result<(), EngineError> {
        match self.store.update_workflow(&def.to_row()?, expected_version).await {
            Ok(()) => Ok(()),
            Err(DbError::VersionConflict { expected, actual }) => {
                Err(EngineError::VersionConflict { id: def.id, expected, actual })
            }
            Err(e) => Err(not_found(def.id)(e)),
        }
    }
}

fn not_found(id: Uuid) -> impl Fn(DbError) -> EngineError {
    move |e| match e {
        DbError::NotFound => EngineError::WorkflowNotFound(id),
        other => EngineError::Database(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionConfig, TriggerConfig};
    use crate::models::{Edge, Node, Position};
    use crate::ValidationError;
    use db::MemoryStore;
    use nodes::ActionType;

    fn manager() -> WorkflowManager {
        WorkflowManager::new(Arc::new(MemoryStore::new()), ValidationLimits::default())
    }

    fn valid_graph(trigger_type: &str) -> Graph {
        Graph::new(
            vec![
                Node::new("t", TriggerConfig::new(trigger_type)),
                Node::new("a", ActionConfig::new(ActionType::LogMessage).with_message("hello")),
            ],
            vec![Edge::new("e", "t", "a")],
        )
    }

    #[tokio::test]
    async fn drafts_start_at_version_one() {
        let m = manager();
        let def = m.create_draft("wf", "desc", Graph::default()).await.unwrap();
        assert_eq!(def.status, WorkflowStatus::Draft);
        assert_eq!(def.version, 1);
        assert_eq!(m.get(def.id).await.unwrap(), def);
    }

    #[tokio::test]
    async fn structural_saves_bump_version_but_layout_edits_do_not() {
        let m = manager();
        let def = m.create_draft("wf", "", valid_graph("ping")).await.unwrap();

        let mut moved = def.graph.clone();
        moved.nodes[1].position = Position { x: 400.0, y: 120.0 };
        let saved = m.save(def.id, 1, "wf", "", moved).await.unwrap();
        assert_eq!(saved.version, 1);
        assert_eq!(saved.graph.nodes[1].position.x, 400.0);

        let mut edited = saved.graph.clone();
        edited.nodes[1].set_config(ActionConfig::new(ActionType::LogMessage).with_message("bye"));
        let saved = m.save(def.id, 1, "renamed", "", edited).await.unwrap();
        assert_eq!(saved.version, 2);
        assert_eq!(m.get(def.id).await.unwrap().name, "renamed");
    }

    #[tokio::test]
    async fn stale_save_is_rejected() {
        let m = manager();
        let def = m.create_draft("wf", "", valid_graph("ping")).await.unwrap();
        m.save(def.id, 1, "wf", "", valid_graph("pong")).await.unwrap();

        let err = m.save(def.id, 1, "wf", "", valid_graph("other")).await.unwrap_err();
        assert!(matches!(err, EngineError::VersionConflict { expected: 1, actual: 2, .. }));
    }

    #[tokio::test]
    async fn drafts_may_be_invalid_but_cannot_activate() {
        let m = manager();
        let def = m.create_draft("wf", "", Graph::new(vec![Node::new("a", ActionConfig::default())], vec![]))
            .await
            .unwrap();

        let err = m.activate(def.id).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::MissingTrigger)));
        assert_eq!(m.get(def.id).await.unwrap().status, WorkflowStatus::Draft);
    }

    #[tokio::test]
    async fn lifecycle_transitions() {
        let m = manager();
        let def = m.create_draft("wf", "", valid_graph("ping")).await.unwrap();

        assert!(matches!(m.pause(def.id).await, Err(EngineError::InvalidStatus { .. })));
        assert_eq!(m.activate(def.id).await.unwrap().status, WorkflowStatus::Active);
        assert_eq!(m.pause(def.id).await.unwrap().status, WorkflowStatus::Paused);
        assert_eq!(m.activate(def.id).await.unwrap().status, WorkflowStatus::Active);
        assert_eq!(m.archive(def.id).await.unwrap().status, WorkflowStatus::Archived);

        assert!(matches!(m.activate(def.id).await, Err(EngineError::InvalidStatus { .. })));
        assert!(matches!(
            m.save(def.id, 1, "wf", "", valid_graph("ping")).await,
            Err(EngineError::InvalidStatus { operation: "edit", .. })
        ));
    }

    #[tokio::test]
    async fn active_workflows_reject_invalid_edits() {
        let m = manager();
        let def = m.create_draft("wf", "", valid_graph("ping")).await.unwrap();
        m.activate(def.id).await.unwrap();

        let mut broken = def.graph.clone();
        broken.edges.clear();
        assert!(matches!(
            m.save(def.id, 1, "wf", "", broken).await,
            Err(EngineError::Validation(ValidationError::NoIncomingEdges(_)))
        ));
    }

    #[tokio::test]
    async fn active_plans_match_on_trigger_type() {
        let m = manager();
        let ping = m.create_draft("ping", "", valid_graph("ping")).await.unwrap();
        let pong = m.create_draft("pong", "", valid_graph("pong")).await.unwrap();
        let _draft = m.create_draft("draft", "", valid_graph("ping")).await.unwrap();
        m.activate(ping.id).await.unwrap();
        m.activate(pong.id).await.unwrap();

        let plans = m.active_plans_for("ping").await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].workflow_id, ping.id);
        assert!(m.active_plans_for("unknown").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn export_then_import_creates_a_fresh_draft() {
        let m = manager();
        let def = m.create_draft("onboarding", "", valid_graph("employee_created")).await.unwrap();
        m.activate(def.id).await.unwrap();

        let json = m.export(def.id).await.unwrap();
        let imported = m.import(&json).await.unwrap();

        assert_ne!(imported.id, def.id);
        assert_eq!(imported.name, "onboarding");
        assert_eq!(imported.status, WorkflowStatus::Draft);
        assert_eq!(imported.graph, def.graph);
    }

    #[tokio::test]
    async fn delete_missing_workflow_is_not_found() {
        let m = manager();
        let id = Uuid::new_v4();
        assert!(matches!(m.delete(id).await, Err(EngineError::WorkflowNotFound(x)) if x == id));
        assert!(matches!(m.get(id).await, Err(EngineError::WorkflowNotFound(_))));
    }
}
