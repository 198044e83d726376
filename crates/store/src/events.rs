use chrono::NaiveDate;

use crate::error::{StoreError, backend};
use crate::store::Store;

impl Store {
    /// Timestamp of the most recent tracked click for a contact on or
    /// after `since`.
    pub async fn last_click_since(
        &self,
        contact_id: i64,
        since: NaiveDate,
    ) -> Result<Option<String>, StoreError> {
        let (last,): (Option<String>,) = sqlx::query_as(
            "SELECT MAX(clicked_at) FROM tracking_clicks
             WHERE contact_id = ? AND clicked_at >= ?",
        )
        .bind(contact_id)
        .bind(since)
        .fetch_one(self.pool())
        .await
        .map_err(backend)?;
        Ok(last)
    }

    /// Metadata and timestamp of the most recent eligibility-answered
    /// event for a contact on or after `since`.
    pub async fn latest_eligibility_since(
        &self,
        contact_id: i64,
        since: NaiveDate,
    ) -> Result<Option<(Option<String>, String)>, StoreError> {
        let row: Option<(Option<String>, String)> = sqlx::query_as(
            "SELECT metadata, created_at FROM contact_events
             WHERE contact_id = ?
             AND event_type = 'eligibility_answered'
             AND created_at >= ?
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(contact_id)
        .bind(since)
        .fetch_optional(self.pool())
        .await
        .map_err(backend)?;
        Ok(row)
    }
}
