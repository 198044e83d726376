use chrono::{Duration, NaiveDate};
use tracing::info;

use crate::error::{StoreError, backend};
use crate::store::Store;

/// How many contacts the demo membership seeding targets.
const DEMO_TARGET_CONTACTS: i64 = 50;

impl Store {
    /// Seed demo campaign types, two bounded instances, and pending
    /// memberships for the first [`DEMO_TARGET_CONTACTS`] contacts.
    /// Re-runnable; existing rows are replaced.
    pub async fn seed_demo_campaigns(&self, today: NaiveDate) -> Result<(), StoreError> {
        let campaign_types: [(&str, bool, bool, i64, bool, i64); 3] = [
            ("rate_increase", true, true, 14, false, 1),
            ("seasonal_promo", true, true, 7, false, 5),
            ("initial_blast", false, false, 0, true, 10),
        ];

        for (name, respect, followups, days_before, target_all, priority) in campaign_types {
            sqlx::query(
                "INSERT INTO campaign_types (
                    name, respect_exclusion_windows, enable_followups, days_before_event,
                    target_all_contacts, priority, active
                ) VALUES (?, ?, ?, ?, ?, ?, 1)
                ON CONFLICT (name) DO UPDATE SET
                    respect_exclusion_windows = excluded.respect_exclusion_windows,
                    enable_followups = excluded.enable_followups,
                    days_before_event = excluded.days_before_event,
                    target_all_contacts = excluded.target_all_contacts,
                    priority = excluded.priority,
                    active = excluded.active",
            )
            .bind(name)
            .bind(respect)
            .bind(followups)
            .bind(days_before)
            .bind(target_all)
            .bind(priority)
            .execute(self.pool())
            .await
            .map_err(backend)?;
        }

        let window_end = today + Duration::days(90);
        let rate_metadata = serde_json::json!({
            "followup_templates": {
                "followup_4_hq_with_yes": {
                    "email": "rate_increase_hq_yes_followup",
                    "sms": "rate_increase_hq_yes_sms"
                }
            }
        })
        .to_string();

        let instances: [(&str, &str, &str, Option<&str>); 2] = [
            (
                "rate_increase",
                "rate_increase_q1",
                "rate_increase_template_v1",
                Some(rate_metadata.as_str()),
            ),
            (
                "seasonal_promo",
                "spring_enrollment",
                "spring_promo_template",
                None,
            ),
        ];

        for (campaign_type, instance_name, template, metadata) in instances {
            // Upsert keeps the instance id stable so memberships from an
            // earlier seeding stay attached.
            sqlx::query(
                "INSERT INTO campaign_instances (
                    campaign_type, instance_name, email_template, sms_template,
                    active_start_date, active_end_date, metadata
                ) VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT (campaign_type, instance_name) DO UPDATE SET
                    email_template = excluded.email_template,
                    sms_template = excluded.sms_template,
                    active_start_date = excluded.active_start_date,
                    active_end_date = excluded.active_end_date,
                    metadata = excluded.metadata",
            )
            .bind(campaign_type)
            .bind(instance_name)
            .bind(template)
            .bind(format!("{template}_sms"))
            .bind(today)
            .bind(window_end)
            .bind(metadata)
            .execute(self.pool())
            .await
            .map_err(backend)?;
        }

        let rate_instance = self.instance_id_by_name("rate_increase_q1").await?;
        let promo_instance = self.instance_id_by_name("spring_enrollment").await?;

        let contact_ids: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM contacts ORDER BY id LIMIT ?")
                .bind(DEMO_TARGET_CONTACTS)
                .fetch_all(self.pool())
                .await
                .map_err(backend)?;

        let trigger = today + Duration::days(30);
        let split = contact_ids.len() / 2;
        for (index, (contact_id,)) in contact_ids.iter().enumerate() {
            let instance = if index < split {
                rate_instance
            } else {
                promo_instance
            };
            sqlx::query(
                "INSERT OR REPLACE INTO contact_campaigns (
                    contact_id, campaign_instance_id, trigger_date, status
                ) VALUES (?, ?, ?, 'pending')",
            )
            .bind(contact_id)
            .bind(instance)
            .bind(trigger)
            .execute(self.pool())
            .await
            .map_err(backend)?;
        }

        info!(
            contacts = contact_ids.len(),
            "seeded demo campaign data"
        );
        Ok(())
    }

    async fn instance_id_by_name(&self, instance_name: &str) -> Result<i64, StoreError> {
        let (id,): (i64,) =
            sqlx::query_as("SELECT id FROM campaign_instances WHERE instance_name = ?")
                .bind(instance_name)
                .fetch_one(self.pool())
                .await
                .map_err(backend)?;
        Ok(id)
    }
}
