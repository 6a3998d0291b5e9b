//! Postgres-backed store delegating to the repository functions.

use async_trait::async_trait;
use uuid::Uuid;

use crate::repository::{runs, wakeups, workflows};
use crate::{
    DbError, DbPool, RunPatch, RunRow, RunStore, WakeupRow, WorkflowRow, WorkflowStatus,
    WorkflowStore,
};

pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn create_workflow(&self, row: &WorkflowRow) -> Result<(), DbError> {
        workflows::create_workflow(&self.pool, row).await
    }

    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError> {
        workflows::get_workflow(&self.pool, id).await
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRow>, DbError> {
        workflows::list_workflows(&self.pool).await
    }

    async fn list_workflows_by_status(
        &self,
        status: WorkflowStatus,
    ) -> Result<Vec<WorkflowRow>, DbError> {
        workflows::list_workflows_by_status(&self.pool, &status.to_string()).await
    }

    async fn update_workflow(&self, row: &WorkflowRow, expected_version: i32) -> Result<(), DbError> {
        workflows::update_workflow(&self.pool, row, expected_version).await
    }

    async fn delete_workflow(&self, id: Uuid) -> Result<(), DbError> {
        workflows::delete_workflow(&self.pool, id).await
    }
}

#[async_trait]
impl RunStore for PgStore {
    async fn create_run(&self, run: &RunRow) -> Result<(), DbError> {
        runs::create_run(&self.pool, run).await
    }

    async fn update_run(&self, id: Uuid, patch: &RunPatch) -> Result<(), DbError> {
        runs::update_run(&self.pool, id, patch).await
    }

    async fn append_output(&self, id: Uuid, partial: serde_json::Value) -> Result<(), DbError> {
        runs::append_output(&self.pool, id, &partial).await
    }

    async fn get_run(&self, id: Uuid) -> Result<RunRow, DbError> {
        runs::get_run(&self.pool, id).await
    }

    async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<RunRow>, DbError> {
        runs::list_runs(&self.pool, workflow_id).await
    }

    async fn save_wakeup(&self, wakeup: &WakeupRow) -> Result<(), DbError> {
        wakeups::save_wakeup(&self.pool, wakeup).await
    }

    async fn delete_wakeup(&self, id: Uuid) -> Result<(), DbError> {
        wakeups::delete_wakeup(&self.pool, id).await
    }

    async fn delete_wakeups_for_run(&self, run_id: Uuid) -> Result<(), DbError> {
        wakeups::delete_wakeups_for_run(&self.pool, run_id).await
    }

    async fn list_wakeups(&self) -> Result<Vec<WakeupRow>, DbError> {
        wakeups::list_wakeups(&self.pool).await
    }
}
