//! Persisted wake-up times for Delay-suspended branches.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::WakeupRow};

pub async fn save_wakeup(pool: &PgPool, wakeup: &WakeupRow) -> Result<(), DbError> {
    sqlx::query(
        r#"
        INSERT INTO run_wakeups (id, run_id, node_id, wake_at, context)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO UPDATE SET wake_at = EXCLUDED.wake_at, context = EXCLUDED.context
        "#,
    )
    .bind(wakeup.id)
    .bind(wakeup.run_id)
    .bind(&wakeup.node_id)
    .bind(wakeup.wake_at)
    .bind(&wakeup.context)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_wakeup(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    sqlx::query("DELETE FROM run_wakeups WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_wakeups_for_run(pool: &PgPool, run_id: Uuid) -> Result<(), DbError> {
    sqlx::query("DELETE FROM run_wakeups WHERE run_id = $1")
        .bind(run_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All pending wake-ups, earliest first.
pub async fn list_wakeups(pool: &PgPool) -> Result<Vec<WakeupRow>, DbError> {
    let rows = sqlx::query_as::<_, WakeupRow>(
        "SELECT id, run_id, node_id, wake_at, context FROM run_wakeups ORDER BY wake_at ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
