//! Workflow CRUD operations.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::WorkflowRow};

const COLUMNS: &str = "id, name, description, status, version, graph, created_at, updated_at";

/// Insert a new workflow into the database.
pub async fn create_workflow(pool: &PgPool, row: &WorkflowRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO workflows (id, name, description, status, version, graph, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(row.id)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.status)
    .bind(row.version)
    .bind(&row.graph)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetch a single workflow by its primary key.
pub async fn get_workflow(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as::<_, WorkflowRow>(&format!("SELECT {COLUMNS} FROM workflows WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Return all workflows ordered by creation time (newest first).
pub async fn list_workflows(pool: &PgPool) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
        "SELECT {COLUMNS} FROM workflows ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Return workflows in the given status (newest first).
pub async fn list_workflows_by_status(pool: &PgPool, status: &str) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = sqlx::query_as::<_, WorkflowRow>(&format!(
        "SELECT {COLUMNS} FROM workflows WHERE status = $1 ORDER BY created_at DESC"
    ))
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Overwrite a workflow guarded by an optimistic version check.
pub async fn update_workflow(
    pool: &PgPool,
    row: &WorkflowRow,
    expected_version: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        r#"
        UPDATE workflows
        SET name = $2, description = $3, status = $4, version = $5, graph = $6, updated_at = $7
        WHERE id = $1 AND version = $8
        "#,
    )
    .bind(row.id)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.status)
    .bind(row.version)
    .bind(&row.graph)
    .bind(row.updated_at)
    .bind(expected_version)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let current = get_workflow(pool, row.id).await?;
        return Err(DbError::VersionConflict {
            expected: expected_version,
            actual: current.version,
        });
    }

    Ok(())
}

/// Permanently delete a workflow by its primary key.
///
/// Returns `DbError::NotFound` if no row was deleted.
pub async fn delete_workflow(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
