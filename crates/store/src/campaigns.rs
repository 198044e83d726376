use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;

use cadence_core::{CampaignInstance, CampaignType};

use crate::error::{StoreError, backend};
use crate::store::{Store, parse_stored_date};

/// Follow-up-relevant view of a campaign instance joined with its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignFollowupInfo {
    pub enable_followups: bool,
    /// Priority of the campaign type (lower is more important).
    pub type_priority: i64,
    pub instance_name: String,
    pub metadata: Option<String>,
}

impl Store {
    /// Campaign instances whose activity bounds contain `today`. Null
    /// bounds are open-ended.
    pub async fn active_campaign_instances(
        &self,
        today: NaiveDate,
    ) -> Result<Vec<CampaignInstance>, StoreError> {
        let rows: Vec<(
            i64,
            String,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
        )> = sqlx::query_as(
            "SELECT id, campaign_type, instance_name, email_template, sms_template,
                    active_start_date, active_end_date, metadata
             FROM campaign_instances
             WHERE (active_start_date IS NULL OR active_start_date <= ?)
             AND (active_end_date IS NULL OR active_end_date >= ?)
             ORDER BY id",
        )
        .bind(today)
        .bind(today)
        .fetch_all(self.pool())
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(
                |(id, campaign_type, instance_name, email, sms, start, end, metadata)| {
                    CampaignInstance {
                        id,
                        campaign_type,
                        instance_name,
                        email_template: email,
                        sms_template: sms,
                        active_start_date: parse_campaign_date(start, id, "active_start_date"),
                        active_end_date: parse_campaign_date(end, id, "active_end_date"),
                        metadata,
                    }
                },
            )
            .collect())
    }

    /// Look up an active campaign type by name.
    pub async fn campaign_type(&self, name: &str) -> Result<Option<CampaignType>, StoreError> {
        let row: Option<(String, bool, bool, i64, bool, i64, bool)> = sqlx::query_as(
            "SELECT name, respect_exclusion_windows, enable_followups, days_before_event,
                    target_all_contacts, priority, active
             FROM campaign_types
             WHERE name = ? AND active = 1",
        )
        .bind(name)
        .fetch_optional(self.pool())
        .await
        .map_err(backend)?;

        Ok(row.map(
            |(
                name,
                respect_exclusion_windows,
                enable_followups,
                days_before_event,
                target_all_contacts,
                priority,
                active,
            )| CampaignType {
                name,
                respect_exclusion_windows,
                enable_followups,
                days_before_event,
                target_all_contacts,
                priority,
                active,
            },
        ))
    }

    /// Pending membership targets of a campaign instance, keyed by contact
    /// id. A membership without a trigger date maps to `None`.
    pub async fn pending_campaign_targets(
        &self,
        campaign_instance_id: i64,
    ) -> Result<HashMap<i64, Option<NaiveDate>>, StoreError> {
        let rows: Vec<(i64, Option<String>)> = sqlx::query_as(
            "SELECT contact_id, trigger_date
             FROM contact_campaigns
             WHERE campaign_instance_id = ? AND status = 'pending'",
        )
        .bind(campaign_instance_id)
        .fetch_all(self.pool())
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|(contact_id, trigger)| {
                (
                    contact_id,
                    parse_stored_date(trigger, contact_id, "trigger_date"),
                )
            })
            .collect())
    }

    /// Join a campaign instance with its type for the follow-up pass.
    pub async fn campaign_followup_info(
        &self,
        campaign_instance_id: i64,
    ) -> Result<Option<CampaignFollowupInfo>, StoreError> {
        let row: Option<(bool, i64, String, Option<String>)> = sqlx::query_as(
            "SELECT ct.enable_followups, ct.priority, ci.instance_name, ci.metadata
             FROM campaign_instances ci
             JOIN campaign_types ct ON ci.campaign_type = ct.name
             WHERE ci.id = ?",
        )
        .bind(campaign_instance_id)
        .fetch_optional(self.pool())
        .await
        .map_err(backend)?;

        Ok(row.map(
            |(enable_followups, type_priority, instance_name, metadata)| CampaignFollowupInfo {
                enable_followups,
                type_priority,
                instance_name,
                metadata,
            },
        ))
    }
}

fn parse_campaign_date(raw: Option<String>, instance_id: i64, column: &str) -> Option<NaiveDate> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<NaiveDate>() {
        Ok(date) => Some(date),
        Err(_) => {
            warn!(instance_id, column, value = %raw, "ignoring malformed campaign date");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) async fn seed_campaign_type(
        store: &Store,
        name: &str,
        respect_exclusions: bool,
        enable_followups: bool,
        days_before: i64,
        priority: i64,
        active: bool,
    ) {
        sqlx::query(
            "INSERT INTO campaign_types (
                name, respect_exclusion_windows, enable_followups, days_before_event,
                target_all_contacts, priority, active
            ) VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(name)
        .bind(respect_exclusions)
        .bind(enable_followups)
        .bind(days_before)
        .bind(priority)
        .bind(active)
        .execute(store.pool())
        .await
        .unwrap();
    }

    pub(crate) async fn seed_instance(
        store: &Store,
        campaign_type: &str,
        instance_name: &str,
        start: Option<&str>,
        end: Option<&str>,
        metadata: Option<&str>,
    ) -> i64 {
        let result = sqlx::query(
            "INSERT INTO campaign_instances (
                campaign_type, instance_name, email_template, sms_template,
                active_start_date, active_end_date, metadata
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(campaign_type)
        .bind(instance_name)
        .bind(format!("{instance_name}_email"))
        .bind(format!("{instance_name}_sms"))
        .bind(start)
        .bind(end)
        .bind(metadata)
        .execute(store.pool())
        .await
        .unwrap();
        result.last_insert_rowid()
    }

    pub(crate) async fn seed_membership(
        store: &Store,
        contact_id: i64,
        instance_id: i64,
        trigger: Option<&str>,
        status: &str,
    ) {
        sqlx::query(
            "INSERT INTO contact_campaigns (contact_id, campaign_instance_id, trigger_date, status)
             VALUES (?, ?, ?, ?)",
        )
        .bind(contact_id)
        .bind(instance_id)
        .bind(trigger)
        .bind(status)
        .execute(store.pool())
        .await
        .unwrap();
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn active_instances_by_date_containment() {
        let store = Store::open_in_memory().await.unwrap();
        seed_campaign_type(&store, "rate_increase", true, true, 14, 1, true).await;
        seed_instance(
            &store,
            "rate_increase",
            "q2",
            Some("2024-04-01"),
            Some("2024-06-30"),
            None,
        )
        .await;
        seed_instance(&store, "rate_increase", "open_ended", None, None, None).await;
        seed_instance(
            &store,
            "rate_increase",
            "expired",
            Some("2023-01-01"),
            Some("2023-12-31"),
            None,
        )
        .await;

        let active = store
            .active_campaign_instances(date(2024, 5, 1))
            .await
            .unwrap();
        let names: Vec<&str> = active.iter().map(|i| i.instance_name.as_str()).collect();
        assert_eq!(names, vec!["q2", "open_ended"]);
        assert_eq!(active[0].active_start_date, Some(date(2024, 4, 1)));
        assert_eq!(active[1].active_start_date, None);
    }

    #[tokio::test]
    async fn campaign_type_lookup_requires_active() {
        let store = Store::open_in_memory().await.unwrap();
        seed_campaign_type(&store, "seasonal_promo", true, true, 7, 5, true).await;
        seed_campaign_type(&store, "retired", true, true, 0, 5, false).await;

        let promo = store.campaign_type("seasonal_promo").await.unwrap().unwrap();
        assert_eq!(promo.days_before_event, 7);
        assert_eq!(promo.priority, 5);
        assert!(promo.respect_exclusion_windows);

        assert!(store.campaign_type("retired").await.unwrap().is_none());
        assert!(store.campaign_type("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn pending_targets_only() {
        let store = Store::open_in_memory().await.unwrap();
        for id in 1..=3 {
            crate::store::tests::seed_contact(&store, id, "TX", None, None).await;
        }
        seed_campaign_type(&store, "rate_increase", true, true, 14, 1, true).await;
        let instance = seed_instance(&store, "rate_increase", "q2", None, None, None).await;

        seed_membership(&store, 1, instance, Some("2024-06-01"), "pending").await;
        seed_membership(&store, 2, instance, None, "pending").await;
        seed_membership(&store, 3, instance, Some("2024-06-01"), "processed").await;

        let targets = store.pending_campaign_targets(instance).await.unwrap();
        assert_eq!(targets.len(), 2);
        assert_eq!(targets.get(&1), Some(&Some(date(2024, 6, 1))));
        assert_eq!(targets.get(&2), Some(&None));
        assert!(!targets.contains_key(&3));
    }

    #[tokio::test]
    async fn followup_info_joins_instance_and_type() {
        let store = Store::open_in_memory().await.unwrap();
        seed_campaign_type(&store, "rate_increase", true, true, 14, 1, true).await;
        let instance = seed_instance(
            &store,
            "rate_increase",
            "q2",
            None,
            None,
            Some(r#"{"followup_templates": {}}"#),
        )
        .await;

        let info = store.campaign_followup_info(instance).await.unwrap().unwrap();
        assert!(info.enable_followups);
        assert_eq!(info.type_priority, 1);
        assert_eq!(info.instance_name, "q2");
        assert!(info.metadata.is_some());

        assert!(store.campaign_followup_info(404).await.unwrap().is_none());
    }
}
