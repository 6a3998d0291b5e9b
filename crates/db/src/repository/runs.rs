//! Workflow run operations.
//!
//! Updates are guarded by `status = 'running'` so terminal runs stay immutable.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    DbError,
    models::{RunPatch, RunRow},
};

const COLUMNS: &str = "id, workflow_id, status, input_data, output_data, error_message, \
                       graph_snapshot, started_at, completed_at, execution_time_ms";

/// Insert a new run record.
pub async fn create_run(pool: &PgPool, run: &RunRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflow_runs
            (id, workflow_id, status, input_data, output_data, error_message,
             graph_snapshot, started_at, completed_at, execution_time_ms)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(run.id)
    .bind(run.workflow_id)
    .bind(&run.status)
    .bind(&run.input_data)
    .bind(&run.output_data)
    .bind(&run.error_message)
    .bind(&run.graph_snapshot)
    .bind(run.started_at)
    .bind(run.completed_at)
    .bind(run.execution_time_ms)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a single run by its primary key.
pub async fn get_run(pool: &PgPool, id: Uuid) -> Result<RunRow, DbError> {
    let row = sqlx::query_as::<_, RunRow>(&format!("SELECT {COLUMNS} FROM workflow_runs WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Runs of one workflow, newest first.
pub async fn list_runs(pool: &PgPool, workflow_id: Uuid) -> Result<Vec<RunRow>, DbError> {
    let rows = sqlx::query_as::<_, RunRow>(&format!(
        "SELECT {COLUMNS} FROM workflow_runs WHERE workflow_id = $1 ORDER BY started_at DESC"
    ))
    .bind(workflow_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Apply a partial update to a running run.
pub async fn update_run(pool: &PgPool, id: Uuid, patch: &RunPatch) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE workflow_runs
        SET status            = COALESCE($2, status),
            error_message     = COALESCE($3, error_message),
            completed_at      = COALESCE($4, completed_at),
            execution_time_ms = COALESCE($5, execution_time_ms)
        WHERE id = $1 AND status = 'running'
        "#,
    )
    .bind(id)
    .bind(patch.status.map(|s| s.to_string()))
    .bind(&patch.error_message)
    .bind(patch.completed_at)
    .bind(patch.execution_time_ms)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_running(pool, id).await);
    }

    Ok(())
}

/// Append one entry to the `output_data` JSON array of a running run.
pub async fn append_output(pool: &PgPool, id: Uuid, partial: &serde_json::Value) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE workflow_runs
        SET output_data = output_data || jsonb_build_array($2::jsonb)
        WHERE id = $1 AND status = 'running'
        "#,
    )
    .bind(id)
    .bind(partial)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(not_running(pool, id).await);
    }

    Ok(())
}

/// Explain why a guarded update touched no rows.
async fn not_running(pool: &PgPool, id: Uuid) -> DbError {
    match get_run(pool, id).await {
        Ok(_) => DbError::RunFinalized(id),
        Err(e) => e,
    }
}
