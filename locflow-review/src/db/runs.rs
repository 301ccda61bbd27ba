//! Workflow run persistence
//!
//! One row per run. The `snapshot` column holds the serialized
//! [`RunSnapshot`]; the other columns are denormalized for listing.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use locflow_common::{Error, Result};

use crate::workflow::RunSnapshot;

/// Insert or replace a run snapshot
///
/// A stored snapshot with a higher revision is kept. Returns `false` when the
/// write was skipped for that reason.
pub async fn save_run(pool: &SqlitePool, snapshot: &RunSnapshot) -> Result<bool> {
    let run_id = snapshot.run_id.to_string();
    let json = serde_json::to_string(snapshot)
        .map_err(|e| Error::Internal(format!("Failed to serialize run snapshot: {}", e)))?;
    let finalized = snapshot.final_document.is_some();

    let result = sqlx::query(
        r#"
        INSERT INTO workflow_runs (
            run_id, revision, active_phase, finalized, snapshot, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(run_id) DO UPDATE SET
            revision = excluded.revision,
            active_phase = excluded.active_phase,
            finalized = excluded.finalized,
            snapshot = excluded.snapshot,
            updated_at = excluded.updated_at
        WHERE workflow_runs.revision <= excluded.revision
        "#,
    )
    .bind(&run_id)
    .bind(snapshot.revision as i64)
    .bind(snapshot.active_phase.as_str())
    .bind(finalized)
    .bind(&json)
    .bind(snapshot.created_at.to_rfc3339())
    .bind(snapshot.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    let written = result.rows_affected() > 0;
    if written {
        tracing::debug!(
            run_id = %run_id,
            revision = snapshot.revision,
            active_phase = %snapshot.active_phase,
            "Run snapshot saved"
        );
    } else {
        tracing::debug!(run_id = %run_id, revision = snapshot.revision, "Stale run snapshot skipped");
    }

    Ok(written)
}

/// Load one run snapshot
pub async fn load_run(pool: &SqlitePool, run_id: Uuid) -> Result<Option<RunSnapshot>> {
    let row = sqlx::query("SELECT snapshot FROM workflow_runs WHERE run_id = ?")
        .bind(run_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|row| parse_snapshot(row.get("snapshot"))).transpose()
}

/// Load every stored run, oldest first
pub async fn load_all_runs(pool: &SqlitePool) -> Result<Vec<RunSnapshot>> {
    let rows = sqlx::query("SELECT snapshot FROM workflow_runs ORDER BY created_at ASC")
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|row| parse_snapshot(row.get("snapshot")))
        .collect()
}

/// Delete a run. Returns `true` if a row was removed.
pub async fn delete_run(pool: &SqlitePool, run_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM workflow_runs WHERE run_id = ?")
        .bind(run_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn parse_snapshot(json: String) -> Result<RunSnapshot> {
    serde_json::from_str(&json)
        .map_err(|e| Error::Internal(format!("Failed to deserialize run snapshot: {}", e)))
}
