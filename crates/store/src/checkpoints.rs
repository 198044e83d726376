use chrono::{DateTime, Utc};

use cadence_core::{CheckpointStatus, RunCounts};

use crate::error::{StoreError, backend};
use crate::store::Store;

/// A checkpoint row read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointRow {
    pub scheduler_run_id: String,
    pub status: String,
    pub contacts_processed: Option<i64>,
    pub emails_scheduled: Option<i64>,
    pub emails_skipped: Option<i64>,
    pub error_message: Option<String>,
    pub completed_at: Option<String>,
}

impl Store {
    /// Record the start of a run. One row per run identifier.
    pub async fn checkpoint_started(
        &self,
        scheduler_run_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO scheduler_checkpoints (scheduler_run_id, run_timestamp, status)
             VALUES (?, ?, ?)",
        )
        .bind(scheduler_run_id)
        .bind(started_at.to_rfc3339())
        .bind(CheckpointStatus::Started.as_str())
        .execute(self.pool())
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Update the run's checkpoint in place with its terminal status,
    /// counts, and optional error text.
    pub async fn checkpoint_finished(
        &self,
        scheduler_run_id: &str,
        status: CheckpointStatus,
        counts: RunCounts,
        error_message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE scheduler_checkpoints
             SET status = ?, contacts_processed = ?, emails_scheduled = ?,
                 emails_skipped = ?, error_message = ?, completed_at = ?
             WHERE scheduler_run_id = ?",
        )
        .bind(status.as_str())
        .bind(counts.contacts_processed)
        .bind(counts.emails_scheduled)
        .bind(counts.emails_skipped)
        .bind(error_message)
        .bind(completed_at.to_rfc3339())
        .bind(scheduler_run_id)
        .execute(self.pool())
        .await
        .map_err(backend)?;
        Ok(())
    }

    /// Read a checkpoint back by run identifier.
    pub async fn checkpoint(
        &self,
        scheduler_run_id: &str,
    ) -> Result<Option<CheckpointRow>, StoreError> {
        let row: Option<(
            String,
            String,
            Option<i64>,
            Option<i64>,
            Option<i64>,
            Option<String>,
            Option<String>,
        )> = sqlx::query_as(
            "SELECT scheduler_run_id, status, contacts_processed, emails_scheduled,
                    emails_skipped, error_message, completed_at
             FROM scheduler_checkpoints
             WHERE scheduler_run_id = ?",
        )
        .bind(scheduler_run_id)
        .fetch_optional(self.pool())
        .await
        .map_err(backend)?;

        Ok(row.map(
            |(
                scheduler_run_id,
                status,
                contacts_processed,
                emails_scheduled,
                emails_skipped,
                error_message,
                completed_at,
            )| CheckpointRow {
                scheduler_run_id,
                status,
                contacts_processed,
                emails_scheduled,
                emails_skipped,
                error_message,
                completed_at,
            },
        ))
    }
}
