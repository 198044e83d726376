use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;

use cadence_core::{EmailSchedule, SentEmail, SkipReason};

use crate::error::{StoreError, backend};
use crate::store::{Store, parse_stored_date};

/// Upper bound on bind variables per statement keeps chunks well inside
/// SQLite's parameter limit.
const ID_CHUNK: usize = 500;

/// Rows inserted per transaction.
const INSERT_CHUNK: usize = 500;

impl Store {
    /// Delete the pending output of earlier runs for a set of contacts.
    /// Historical `sent`/`delivered` rows are never touched.
    pub async fn clear_pending_schedules(&self, contact_ids: &[i64]) -> Result<u64, StoreError> {
        let mut cleared = 0;
        for chunk in contact_ids.chunks(ID_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "DELETE FROM email_schedules
                 WHERE status IN ('pre-scheduled', 'skipped')
                 AND contact_id IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            let result = query.execute(self.pool()).await.map_err(backend)?;
            cleared += result.rows_affected();
        }
        Ok(cleared)
    }

    /// Insert schedule rows in transactional chunks, silently ignoring
    /// duplicates of `(contact_id, email_type, scheduled_send_date)`.
    /// Returns the number of rows actually inserted.
    pub async fn insert_schedules(&self, schedules: &[EmailSchedule]) -> Result<u64, StoreError> {
        let mut inserted = 0;
        for chunk in schedules.chunks(INSERT_CHUNK) {
            let mut tx = self.pool().begin().await.map_err(backend)?;
            for row in chunk {
                let result = sqlx::query(
                    "INSERT OR IGNORE INTO email_schedules (
                        contact_id, email_type, scheduled_send_date, scheduled_send_time,
                        status, skip_reason, priority, campaign_instance_id,
                        email_template, sms_template, scheduler_run_id,
                        event_year, event_month, event_day, metadata
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(row.contact_id)
                .bind(&row.email_type)
                .bind(row.scheduled_send_date)
                .bind(row.scheduled_send_time.format("%H:%M:%S").to_string())
                .bind(row.status.as_str())
                .bind(row.skip_reason.map(SkipReason::as_str))
                .bind(row.priority)
                .bind(row.campaign_instance_id)
                .bind(&row.email_template)
                .bind(&row.sms_template)
                .bind(&row.scheduler_run_id)
                .bind(row.event_year)
                .bind(row.event_month)
                .bind(row.event_day)
                .bind(&row.metadata)
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
                inserted += result.rows_affected();
            }
            tx.commit().await.map_err(backend)?;
        }
        Ok(inserted)
    }

    /// Per-contact counts of non-follow-up messages with a send date in
    /// `[period_start, today)` and status sent, delivered, or
    /// pre-scheduled. The carry-over input of the frequency limiter.
    pub async fn recent_send_counts(
        &self,
        period_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<HashMap<i64, i64>, StoreError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT contact_id, COUNT(*)
             FROM email_schedules
             WHERE scheduled_send_date >= ?
             AND scheduled_send_date < ?
             AND status IN ('sent', 'delivered', 'pre-scheduled')
             AND email_type NOT LIKE 'followup_%'
             GROUP BY contact_id",
        )
        .bind(period_start)
        .bind(today)
        .fetch_all(self.pool())
        .await
        .map_err(backend)?;

        Ok(rows.into_iter().collect())
    }

    /// Sent or delivered messages in `[lookback_start, today]` that can
    /// seed a follow-up: anniversary mail, or campaign mail with an
    /// instance attached. Contacts that already have any follow-up
    /// scheduled since `lookback_start` are excluded wholesale.
    pub async fn followup_candidates(
        &self,
        lookback_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<Vec<SentEmail>, StoreError> {
        let rows: Vec<(
            i64,
            i64,
            String,
            String,
            Option<i64>,
            Option<i32>,
            Option<u32>,
            Option<u32>,
        )> = sqlx::query_as(
            "SELECT id, contact_id, email_type, scheduled_send_date,
                    campaign_instance_id, event_year, event_month, event_day
             FROM email_schedules
             WHERE status IN ('sent', 'delivered')
             AND scheduled_send_date >= ?
             AND scheduled_send_date <= ?
             AND (
                 email_type IN ('birthday', 'effective_date', 'aep', 'post_window')
                 OR (email_type LIKE 'campaign_%' AND campaign_instance_id IS NOT NULL)
             )
             AND contact_id NOT IN (
                 SELECT DISTINCT contact_id FROM email_schedules
                 WHERE email_type LIKE 'followup_%'
                 AND scheduled_send_date >= ?
             )
             ORDER BY scheduled_send_date, id",
        )
        .bind(lookback_start)
        .bind(today)
        .bind(lookback_start)
        .fetch_all(self.pool())
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .filter_map(
                |(id, contact_id, email_type, date, instance, year, month, day)| {
                    match date.parse::<NaiveDate>() {
                        Ok(scheduled_send_date) => Some(SentEmail {
                            id,
                            contact_id,
                            email_type,
                            scheduled_send_date,
                            campaign_instance_id: instance,
                            event_year: year,
                            event_month: month,
                            event_day: day,
                        }),
                        Err(_) => {
                            warn!(schedule_id = id, value = %date, "skipping row with malformed send date");
                            None
                        }
                    }
                },
            )
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveTime};

    use cadence_core::ScheduleStatus;

    use super::*;
    use crate::store::tests::seed_contact;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn row(contact_id: i64, email_type: &str, send: NaiveDate) -> EmailSchedule {
        EmailSchedule {
            contact_id,
            email_type: email_type.into(),
            scheduled_send_date: send,
            scheduled_send_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap(),
            status: ScheduleStatus::PreScheduled,
            skip_reason: None,
            priority: 5,
            campaign_instance_id: None,
            email_template: Some("birthday_default".into()),
            sms_template: None,
            scheduler_run_id: "run-1".into(),
            event_year: Some(send.year()),
            event_month: None,
            event_day: None,
            metadata: None,
        }
    }

    async fn set_status(store: &Store, schedule_id: i64, status: &str) {
        sqlx::query("UPDATE email_schedules SET status = ? WHERE id = ?")
            .bind(status)
            .bind(schedule_id)
            .execute(store.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn insert_ignores_duplicates() {
        let store = Store::open_in_memory().await.unwrap();
        let rows = vec![row(1, "birthday", date(2024, 6, 17))];

        assert_eq!(store.insert_schedules(&rows).await.unwrap(), 1);
        // Re-running the identical insert is a no-op.
        assert_eq!(store.insert_schedules(&rows).await.unwrap(), 0);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_schedules")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn send_time_stored_as_plain_text() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .insert_schedules(&[row(1, "birthday", date(2024, 6, 17))])
            .await
            .unwrap();

        let (time,): (String,) =
            sqlx::query_as("SELECT scheduled_send_time FROM email_schedules")
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(time, "08:30:00");
    }

    #[tokio::test]
    async fn clear_pending_spares_history() {
        let store = Store::open_in_memory().await.unwrap();
        store
            .insert_schedules(&[
                row(1, "birthday", date(2024, 6, 17)),
                row(1, "aep", date(2024, 9, 15)),
                row(2, "birthday", date(2024, 7, 1)),
            ])
            .await
            .unwrap();
        set_status(&store, 1, "sent").await;

        let cleared = store.clear_pending_schedules(&[1]).await.unwrap();
        assert_eq!(cleared, 1);

        let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_schedules")
            .fetch_one(store.pool())
            .await
            .unwrap();
        // The sent row for contact 1 and the pending row for contact 2 stay.
        assert_eq!(remaining, 2);
    }

    #[tokio::test]
    async fn recent_counts_window_and_exemptions() {
        let store = Store::open_in_memory().await.unwrap();
        let today = date(2024, 6, 1);

        store
            .insert_schedules(&[
                row(1, "birthday", date(2024, 5, 10)),
                row(1, "aep", date(2024, 5, 20)),
                row(1, "followup_1_cold", date(2024, 5, 21)),
                // On `today`, outside the half-open window.
                row(1, "post_window", today),
                // Before the window.
                row(1, "effective_date", date(2024, 4, 1)),
                row(2, "birthday", date(2024, 5, 15)),
            ])
            .await
            .unwrap();
        set_status(&store, 1, "sent").await;
        set_status(&store, 2, "delivered").await;

        let counts = store
            .recent_send_counts(today - chrono::Duration::days(30), today)
            .await
            .unwrap();
        assert_eq!(counts.get(&1), Some(&2));
        assert_eq!(counts.get(&2), Some(&1));
    }

    #[tokio::test]
    async fn followup_candidates_selection() {
        let store = Store::open_in_memory().await.unwrap();
        seed_contact(&store, 1, "TX", None, None).await;
        let today = date(2024, 6, 20);
        let lookback = today - chrono::Duration::days(35);

        let mut campaign_row = row(1, "campaign_rate_increase", date(2024, 6, 10));
        campaign_row.campaign_instance_id = Some(9);
        let orphan_campaign = row(2, "campaign_rate_increase", date(2024, 6, 10));

        store
            .insert_schedules(&[
                row(1, "birthday", date(2024, 6, 17)),
                campaign_row,
                orphan_campaign,
                // Still pending, not a candidate.
                row(3, "birthday", date(2024, 6, 12)),
                // Too old.
                row(4, "birthday", date(2024, 1, 1)),
            ])
            .await
            .unwrap();
        for id in [1, 2, 3, 5] {
            set_status(&store, id, "sent").await;
        }

        let candidates = store.followup_candidates(lookback, today).await.unwrap();
        let types: Vec<(i64, String)> = candidates
            .iter()
            .map(|c| (c.contact_id, c.email_type.clone()))
            .collect();
        // Contact 1 twice (campaign then birthday, date order); the
        // campaign row without an instance and the unsent/old rows are out.
        assert_eq!(
            types,
            vec![
                (1, "campaign_rate_increase".to_owned()),
                (1, "birthday".to_owned()),
            ]
        );
    }

    #[tokio::test]
    async fn followup_candidates_skip_contacts_with_existing_followups() {
        let store = Store::open_in_memory().await.unwrap();
        let today = date(2024, 6, 20);
        let lookback = today - chrono::Duration::days(35);

        store
            .insert_schedules(&[
                row(1, "birthday", date(2024, 6, 10)),
                row(1, "followup_2_clicked_no_hq", date(2024, 6, 13)),
            ])
            .await
            .unwrap();
        set_status(&store, 1, "sent").await;

        assert!(store
            .followup_candidates(lookback, today)
            .await
            .unwrap()
            .is_empty());
    }
}
