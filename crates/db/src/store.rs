//! The storage traits the engine depends on.
//!
//! Implementations only need read-your-writes consistency for a single
//! workflow or run.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{DbError, RunPatch, RunRow, WakeupRow, WorkflowRow, WorkflowStatus};

/// CRUD for workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn create_workflow(&self, row: &WorkflowRow) -> Result<(), DbError>;

    /// # Errors
    /// [`DbError::NotFound`] if no workflow has this id.
    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError>;

    /// All workflows, newest first.
    async fn list_workflows(&self) -> Result<Vec<WorkflowRow>, DbError>;

    async fn list_workflows_by_status(
        &self,
        status: WorkflowStatus,
    ) -> Result<Vec<WorkflowRow>, DbError>;

    /// Overwrite a workflow if its stored version still equals `expected_version`.
    ///
    /// # Errors
    /// [`DbError::VersionConflict`] when another save got there first,
    /// [`DbError::NotFound`] if the workflow is gone.
    async fn update_workflow(&self, row: &WorkflowRow, expected_version: i32) -> Result<(), DbError>;

    /// # Errors
    /// [`DbError::NotFound`] if nothing was deleted.
    async fn delete_workflow(&self, id: Uuid) -> Result<(), DbError>;
}

/// Run history and suspended-branch bookkeeping.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &RunRow) -> Result<(), DbError>;

    /// Apply `patch` to a running run.
    ///
    /// # Errors
    /// [`DbError::RunFinalized`] if the run is already terminal.
    async fn update_run(&self, id: Uuid, patch: &RunPatch) -> Result<(), DbError>;

    /// Append one entry to the run's `output_data` array.
    ///
    /// # Errors
    /// [`DbError::RunFinalized`] if the run is already terminal.
    async fn append_output(&self, id: Uuid, partial: serde_json::Value) -> Result<(), DbError>;

    async fn get_run(&self, id: Uuid) -> Result<RunRow, DbError>;

    /// Runs of one workflow, newest first.
    async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<RunRow>, DbError>;

    async fn save_wakeup(&self, wakeup: &WakeupRow) -> Result<(), DbError>;

    async fn delete_wakeup(&self, id: Uuid) -> Result<(), DbError>;

    async fn delete_wakeups_for_run(&self, run_id: Uuid) -> Result<(), DbError>;

    /// Every persisted wake-up, earliest first.
    async fn list_wakeups(&self) -> Result<Vec<WakeupRow>, DbError>;
}
