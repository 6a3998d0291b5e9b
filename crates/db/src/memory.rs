//! In-process store. State lives for the lifetime of the value.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    DbError, RunPatch, RunRow, RunStore, WakeupRow, WorkflowRow, WorkflowStatus, WorkflowStore,
};

#[derive(Default)]
struct Tables {
    workflows: HashMap<Uuid, WorkflowRow>,
    runs: HashMap<Uuid, RunRow>,
    wakeups: HashMap<Uuid, WakeupRow>,
}

/// `WorkflowStore` + `RunStore` backed by in-memory maps.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_running(run: &RunRow) -> Result<(), DbError> {
    let status = run.run_status().map_err(DbError::Corrupt)?;
    if status.is_terminal() {
        return Err(DbError::RunFinalized(run.id));
    }
    Ok(())
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn create_workflow(&self, row: &WorkflowRow) -> Result<(), DbError> {
        self.tables.write().await.workflows.insert(row.id, row.clone());
        Ok(())
    }

    async fn get_workflow(&self, id: Uuid) -> Result<WorkflowRow, DbError> {
        self.tables
            .read()
            .await
            .workflows
            .get(&id)
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn list_workflows(&self) -> Result<Vec<WorkflowRow>, DbError> {
        let mut rows: Vec<_> = self.tables.read().await.workflows.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_workflows_by_status(
        &self,
        status: WorkflowStatus,
    ) -> Result<Vec<WorkflowRow>, DbError> {
        let status = status.to_string();
        let mut rows = self.list_workflows().await?;
        rows.retain(|r| r.status == status);
        Ok(rows)
    }

    async fn update_workflow(&self, row: &WorkflowRow, expected_version: i32) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let stored = tables.workflows.get_mut(&row.id).ok_or(DbError::NotFound)?;

        if stored.version != expected_version {
            return Err(DbError::VersionConflict {
                expected: expected_version,
                actual: stored.version,
            });
        }

        *stored = row.clone();
        Ok(())
    }

    async fn delete_workflow(&self, id: Uuid) -> Result<(), DbError> {
        self.tables
            .write()
            .await
            .workflows
            .remove(&id)
            .map(|_| ())
            .ok_or(DbError::NotFound)
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_run(&self, run: &RunRow) -> Result<(), DbError> {
        self.tables.write().await.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn update_run(&self, id: Uuid, patch: &RunPatch) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let run = tables.runs.get_mut(&id).ok_or(DbError::NotFound)?;
        ensure_running(run)?;

        if let Some(status) = patch.status {
            run.status = status.to_string();
        }
        if let Some(msg) = &patch.error_message {
            run.error_message = Some(msg.clone());
        }
        if let Some(at) = patch.completed_at {
            run.completed_at = Some(at);
        }
        if let Some(ms) = patch.execution_time_ms {
            run.execution_time_ms = Some(ms);
        }
        Ok(())
    }

    async fn append_output(&self, id: Uuid, partial: Value) -> Result<(), DbError> {
        let mut tables = self.tables.write().await;
        let run = tables.runs.get_mut(&id).ok_or(DbError::NotFound)?;
        ensure_running(run)?;

        match &mut run.output_data {
            Value::Array(items) => items.push(partial),
            other => *other = Value::Array(vec![partial]),
        }
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<RunRow, DbError> {
        self.tables
            .read()
            .await
            .runs
            .get(&id)
            .cloned()
            .ok_or(DbError::NotFound)
    }

    async fn list_runs(&self, workflow_id: Uuid) -> Result<Vec<RunRow>, DbError> {
        let mut rows: Vec<_> = self
            .tables
            .read()
            .await
            .runs
            .values()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(rows)
    }

    async fn save_wakeup(&self, wakeup: &WakeupRow) -> Result<(), DbError> {
        self.tables.write().await.wakeups.insert(wakeup.id, wakeup.clone());
        Ok(())
    }

    async fn delete_wakeup(&self, id: Uuid) -> Result<(), DbError> {
        self.tables.write().await.wakeups.remove(&id);
        Ok(())
    }

    async fn delete_wakeups_for_run(&self, run_id: Uuid) -> Result<(), DbError> {
        self.tables.write().await.wakeups.retain(|_, w| w.run_id != run_id);
        Ok(())
    }

    async fn list_wakeups(&self) -> Result<Vec<WakeupRow>, DbError> {
        let mut rows: Vec<_> = self.tables.read().await.wakeups.values().cloned().collect();
        rows.sort_by(|a, b| a.wake_at.cmp(&b.wake_at));
        Ok(rows)
    }
}
