use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, Local, NaiveDate, Utc};
use tracing::{error, info};
use uuid::Uuid;

use cadence_core::{
    CheckpointStatus, ContactBehavior, EmailSchedule, FollowupTier, RunCounts, ScheduleStatus,
    SchedulerConfig, SentEmail, StateRule, followup_template_override, is_excluded,
    metadata_indicates_conditions,
};
use cadence_store::{CampaignFollowupInfo, Store};

use crate::error::SchedulerError;
use crate::run::RunSummary;

/// The behaviour-classified follow-up pass.
///
/// Selects recently sent anniversary and campaign mail, classifies each
/// source message by the contact's observed behaviour since the send, and
/// schedules one follow-up per source. Follow-ups always honour exclusion
/// windows; a suppressed follow-up writes no row.
pub struct FollowupScheduler {
    store: Store,
    config: SchedulerConfig,
}

impl FollowupScheduler {
    #[must_use]
    pub fn new(store: Store, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Run the pass as of the local calendar date.
    pub async fn run(&self) -> Result<RunSummary, SchedulerError> {
        self.run_as_of(Local::now().date_naive()).await
    }

    /// Run the pass with an explicit reference date, checkpointing start
    /// and outcome under its own run identifier.
    pub async fn run_as_of(&self, today: NaiveDate) -> Result<RunSummary, SchedulerError> {
        let run_id = Uuid::new_v4().to_string();
        info!(%run_id, %today, "starting follow-up run");
        self.store.checkpoint_started(&run_id, Utc::now()).await?;

        match self.execute(&run_id, today).await {
            Ok(summary) => {
                self.store
                    .checkpoint_finished(
                        &run_id,
                        CheckpointStatus::Completed,
                        summary.counts(),
                        None,
                        Utc::now(),
                    )
                    .await?;
                info!(
                    sources = summary.contacts_processed,
                    scheduled = summary.emails_scheduled,
                    "follow-up run completed"
                );
                Ok(summary)
            }
            Err(e) => {
                let message = e.to_string();
                error!(%run_id, error = %message, "follow-up run failed");
                if let Err(checkpoint_error) = self
                    .store
                    .checkpoint_finished(
                        &run_id,
                        CheckpointStatus::Failed,
                        RunCounts::default(),
                        Some(&message),
                        Utc::now(),
                    )
                    .await
                {
                    error!(%run_id, error = %checkpoint_error, "failed to record failure checkpoint");
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, run_id: &str, today: NaiveDate) -> Result<RunSummary, SchedulerError> {
        let lookback_start = today - Duration::days(self.config.followup_lookback_days);
        let sources = self
            .store
            .followup_candidates(lookback_start, today)
            .await?;
        info!(count = sources.len(), "found follow-up candidates");

        let mut campaign_cache: HashMap<i64, Option<CampaignFollowupInfo>> = HashMap::new();
        let mut schedules = Vec::new();

        for source in &sources {
            let campaign = match source.campaign_instance_id {
                Some(instance_id) => {
                    match self.campaign_info(&mut campaign_cache, instance_id).await? {
                        Some(info) if info.enable_followups => Some(info),
                        // Follow-ups disabled on the type, or the
                        // instance vanished since the send.
                        _ => continue,
                    }
                }
                None => None,
            };

            let behavior = self.contact_behavior(source).await?;
            let tier = FollowupTier::classify(&behavior);

            let tomorrow = today + Duration::days(1);
            let send = (source.scheduled_send_date + Duration::days(self.config.followup_days_after))
                .max(tomorrow);

            if self.followup_excluded(source.contact_id, send, today).await? {
                info!(
                    contact_id = source.contact_id,
                    "follow-up suppressed by exclusion window"
                );
                continue;
            }

            let mut email_template = tier.default_email_template().to_owned();
            let mut sms_template = None;
            if let Some(metadata) = campaign.as_ref().and_then(|c| c.metadata.as_deref()) {
                if let Some((email, sms)) = followup_template_override(metadata, tier.email_type())
                {
                    if let Some(email) = email {
                        email_template = email;
                    }
                    sms_template = sms;
                }
            }

            let priority = campaign.as_ref().map_or(tier.priority(), |c| {
                tier.priority().min(c.type_priority + 1)
            });

            let metadata = serde_json::json!({
                "initial_email_id": source.id,
                "initial_email_type": source.email_type,
                "followup_behavior": {
                    "clicked_links": behavior.clicked_links,
                    "answered_health_questions": behavior.answered_health_questions,
                    "has_medical_conditions": behavior.has_medical_conditions,
                    "last_click_date": behavior.last_click_date,
                    "last_eligibility_date": behavior.last_eligibility_date,
                },
                "campaign_name": campaign.as_ref().map(|c| c.instance_name.clone()),
            });

            schedules.push(EmailSchedule {
                contact_id: source.contact_id,
                email_type: tier.email_type().to_owned(),
                scheduled_send_date: send,
                scheduled_send_time: self.config.send_time,
                status: ScheduleStatus::PreScheduled,
                skip_reason: None,
                priority,
                campaign_instance_id: source.campaign_instance_id,
                email_template: Some(email_template),
                sms_template,
                scheduler_run_id: run_id.to_owned(),
                event_year: None,
                event_month: None,
                event_day: None,
                metadata: Some(metadata.to_string()),
            });
        }

        let inserted = self.store.insert_schedules(&schedules).await?;

        let mut by_type: BTreeMap<&str, i64> = BTreeMap::new();
        for schedule in &schedules {
            *by_type.entry(schedule.email_type.as_str()).or_default() += 1;
        }
        for (email_type, count) in by_type {
            info!(email_type, count, "follow-up tier breakdown");
        }

        let mut summary = RunSummary::new(run_id);
        summary.contacts_processed = i64::try_from(sources.len()).unwrap_or(i64::MAX);
        summary.emails_scheduled = i64::try_from(inserted).unwrap_or(i64::MAX);
        Ok(summary)
    }

    async fn campaign_info(
        &self,
        cache: &mut HashMap<i64, Option<CampaignFollowupInfo>>,
        instance_id: i64,
    ) -> Result<Option<CampaignFollowupInfo>, SchedulerError> {
        if let Some(info) = cache.get(&instance_id) {
            return Ok(info.clone());
        }
        let info = self.store.campaign_followup_info(instance_id).await?;
        cache.insert(instance_id, info.clone());
        Ok(info)
    }

    /// Build the behaviour snapshot for a source message from click and
    /// eligibility events recorded since its send date.
    async fn contact_behavior(&self, source: &SentEmail) -> Result<ContactBehavior, SchedulerError> {
        let mut behavior = ContactBehavior::new(source.contact_id);

        if let Some(clicked_at) = self
            .store
            .last_click_since(source.contact_id, source.scheduled_send_date)
            .await?
        {
            behavior.clicked_links = true;
            behavior.last_click_date = Some(clicked_at);
        }

        if let Some((metadata, created_at)) = self
            .store
            .latest_eligibility_since(source.contact_id, source.scheduled_send_date)
            .await?
        {
            behavior.answered_health_questions = true;
            behavior.last_eligibility_date = Some(created_at);
            if let Some(raw) = metadata {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) {
                    behavior.has_medical_conditions = metadata_indicates_conditions(&value);
                }
            }
        }

        Ok(behavior)
    }

    async fn followup_excluded(
        &self,
        contact_id: i64,
        send: NaiveDate,
        today: NaiveDate,
    ) -> Result<bool, SchedulerError> {
        let Some(contact) = self.store.contact(contact_id).await? else {
            return Ok(false);
        };
        if self.config.followup_full_exclusion_check {
            Ok(is_excluded(send, &contact, &self.config, today))
        } else {
            // Reduced legacy check: only year-round states suppress.
            Ok(matches!(
                self.config.rule_for(&contact.state),
                Some(StateRule::YearRound)
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_contact(store: &Store, id: i64, state: &str, birth_date: Option<&str>) {
        sqlx::query(
            "INSERT INTO contacts (id, email, state, zip_code, birth_date)
             VALUES (?, ?, ?, '73301', ?)",
        )
        .bind(id)
        .bind(format!("contact{id}@example.com"))
        .bind(state)
        .bind(birth_date)
        .execute(store.pool())
        .await
        .unwrap();
    }

    async fn seed_sent_email(
        store: &Store,
        contact_id: i64,
        email_type: &str,
        send_date: &str,
        campaign_instance_id: Option<i64>,
    ) -> i64 {
        let result = sqlx::query(
            "INSERT INTO email_schedules (contact_id, email_type, scheduled_send_date,
                 scheduled_send_time, status, priority, campaign_instance_id)
             VALUES (?, ?, ?, '08:30:00', 'sent', 5, ?)",
        )
        .bind(contact_id)
        .bind(email_type)
        .bind(send_date)
        .bind(campaign_instance_id)
        .execute(store.pool())
        .await
        .unwrap();
        result.last_insert_rowid()
    }

    async fn seed_click(store: &Store, contact_id: i64, clicked_at: &str) {
        sqlx::query("INSERT INTO tracking_clicks (contact_id, clicked_at) VALUES (?, ?)")
            .bind(contact_id)
            .bind(clicked_at)
            .execute(store.pool())
            .await
            .unwrap();
    }

    async fn seed_eligibility(store: &Store, contact_id: i64, metadata: &str, created_at: &str) {
        sqlx::query(
            "INSERT INTO contact_events (contact_id, event_type, metadata, created_at)
             VALUES (?, 'eligibility_answered', ?, ?)",
        )
        .bind(contact_id)
        .bind(metadata)
        .bind(created_at)
        .execute(store.pool())
        .await
        .unwrap();
    }

    async fn followup_rows(
        store: &Store,
    ) -> Vec<(i64, String, String, i64, Option<String>, Option<String>)> {
        sqlx::query_as(
            "SELECT contact_id, email_type, scheduled_send_date, priority,
                    email_template, metadata
             FROM email_schedules
             WHERE email_type LIKE 'followup_%'
             ORDER BY contact_id",
        )
        .fetch_all(store.pool())
        .await
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn engaged_contact_lands_in_the_top_tier() {
        let store = Store::open_in_memory().await.unwrap();
        seed_contact(&store, 42, "TX", None).await;
        let source_id = seed_sent_email(&store, 42, "birthday", "2024-06-17", None).await;
        seed_click(&store, 42, "2024-06-18 10:00:00").await;
        seed_eligibility(
            &store,
            42,
            r#"{"main_questions_yes_count": 2}"#,
            "2024-06-19 09:00:00",
        )
        .await;

        let scheduler = FollowupScheduler::new(store.clone(), SchedulerConfig::default());
        let summary = scheduler.run_as_of(date(2024, 6, 20)).await.unwrap();
        assert_eq!(summary.contacts_processed, 1);
        assert_eq!(summary.emails_scheduled, 1);

        let rows = followup_rows(&store).await;
        let (contact_id, email_type, send_date, priority, template, metadata) = &rows[0];
        assert_eq!(*contact_id, 42);
        assert_eq!(email_type, "followup_4_hq_with_yes");
        // Source + 2 days is already past; clamped to tomorrow.
        assert_eq!(send_date, "2024-06-21");
        assert_eq!(*priority, 1);
        assert_eq!(
            template.as_deref(),
            Some("followup_hq_with_conditions_template")
        );

        let metadata: serde_json::Value =
            serde_json::from_str(metadata.as_deref().unwrap()).unwrap();
        assert_eq!(metadata["initial_email_id"], source_id);
        assert_eq!(metadata["initial_email_type"], "birthday");
        assert_eq!(metadata["followup_behavior"]["clicked_links"], true);
        assert_eq!(
            metadata["followup_behavior"]["has_medical_conditions"],
            true
        );
        assert_eq!(metadata["campaign_name"], serde_json::Value::Null);

        let checkpoint = store
            .checkpoint(&summary.scheduler_run_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.status, "completed");
    }

    #[tokio::test]
    async fn tier_ladder_follows_behaviour() {
        let store = Store::open_in_memory().await.unwrap();
        for id in 1..=3 {
            seed_contact(&store, id, "TX", None).await;
        }
        seed_sent_email(&store, 1, "aep", "2024-06-10", None).await;
        seed_sent_email(&store, 2, "aep", "2024-06-10", None).await;
        seed_sent_email(&store, 3, "aep", "2024-06-10", None).await;
        // Contact 1: cold. Contact 2: clicked only. Contact 3: answered,
        // no conditions.
        seed_click(&store, 2, "2024-06-11 10:00:00").await;
        seed_eligibility(&store, 3, r#"{"main_questions_yes_count": 0}"#, "2024-06-12 09:00:00")
            .await;

        let scheduler = FollowupScheduler::new(store.clone(), SchedulerConfig::default());
        scheduler.run_as_of(date(2024, 6, 15)).await.unwrap();

        let rows = followup_rows(&store).await;
        let types: Vec<(i64, &str, i64)> = rows
            .iter()
            .map(|(id, t, _, p, _, _)| (*id, t.as_str(), *p))
            .collect();
        assert_eq!(
            types,
            vec![
                (1, "followup_1_cold", 4),
                (2, "followup_2_clicked_no_hq", 3),
                (3, "followup_3_hq_no_yes", 2),
            ]
        );
    }

    #[tokio::test]
    async fn followup_send_keeps_its_offset_when_fresh() {
        let store = Store::open_in_memory().await.unwrap();
        seed_contact(&store, 1, "TX", None).await;
        seed_sent_email(&store, 1, "birthday", "2024-06-19", None).await;

        let scheduler = FollowupScheduler::new(store.clone(), SchedulerConfig::default());
        scheduler.run_as_of(date(2024, 6, 19)).await.unwrap();

        let rows = followup_rows(&store).await;
        assert_eq!(rows[0].2, "2024-06-21");
    }

    #[tokio::test]
    async fn year_round_state_suppresses_followups() {
        let store = Store::open_in_memory().await.unwrap();
        seed_contact(&store, 1, "NY", None).await;
        seed_sent_email(&store, 1, "birthday", "2024-06-17", None).await;

        let scheduler = FollowupScheduler::new(store.clone(), SchedulerConfig::default());
        let summary = scheduler.run_as_of(date(2024, 6, 20)).await.unwrap();

        assert_eq!(summary.contacts_processed, 1);
        assert_eq!(summary.emails_scheduled, 0);
        assert!(followup_rows(&store).await.is_empty());
    }

    #[tokio::test]
    async fn full_window_check_catches_birthday_states() {
        let store = Store::open_in_memory().await.unwrap();
        // CA window around the 1960-07-01 birthday covers late June.
        seed_contact(&store, 1, "CA", Some("1960-07-01")).await;
        seed_sent_email(&store, 1, "aep", "2024-06-17", None).await;

        let full = FollowupScheduler::new(store.clone(), SchedulerConfig::default());
        let summary = full.run_as_of(date(2024, 6, 20)).await.unwrap();
        assert_eq!(summary.emails_scheduled, 0);

        // The legacy reduced check only knows year-round states and lets
        // the same follow-up through.
        let legacy_config = SchedulerConfig {
            followup_full_exclusion_check: false,
            ..SchedulerConfig::default()
        };
        let legacy = FollowupScheduler::new(store.clone(), legacy_config);
        let summary = legacy.run_as_of(date(2024, 6, 20)).await.unwrap();
        assert_eq!(summary.emails_scheduled, 1);
    }

    #[tokio::test]
    async fn campaign_followups_blend_priority_and_templates() {
        let store = Store::open_in_memory().await.unwrap();
        seed_contact(&store, 1, "TX", None).await;
        sqlx::query(
            "INSERT INTO campaign_types (name, respect_exclusion_windows, enable_followups,
                 days_before_event, target_all_contacts, priority, active)
             VALUES ('rate_increase', 1, 1, 14, 0, 1, 1)",
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO campaign_instances (id, campaign_type, instance_name, metadata)
             VALUES (9, 'rate_increase', 'rate_increase_q2',
                     '{\"followup_templates\": {\"followup_1_cold\": {\"email\": \"ri_cold\", \"sms\": \"ri_cold_sms\"}}}')",
        )
        .execute(store.pool())
        .await
        .unwrap();
        seed_sent_email(&store, 1, "campaign_rate_increase", "2024-06-17", Some(9)).await;

        let scheduler = FollowupScheduler::new(store.clone(), SchedulerConfig::default());
        scheduler.run_as_of(date(2024, 6, 20)).await.unwrap();

        let rows = followup_rows(&store).await;
        let (_, email_type, _, priority, template, metadata) = &rows[0];
        assert_eq!(email_type, "followup_1_cold");
        // min(tier 4, campaign 1 + 1) = 2.
        assert_eq!(*priority, 2);
        assert_eq!(template.as_deref(), Some("ri_cold"));
        let metadata: serde_json::Value =
            serde_json::from_str(metadata.as_deref().unwrap()).unwrap();
        assert_eq!(metadata["campaign_name"], "rate_increase_q2");

        let (sms,): (Option<String>,) = sqlx::query_as(
            "SELECT sms_template FROM email_schedules WHERE email_type = 'followup_1_cold'",
        )
        .fetch_one(store.pool())
        .await
        .unwrap();
        assert_eq!(sms.as_deref(), Some("ri_cold_sms"));
    }

    #[tokio::test]
    async fn disabled_campaign_followups_are_dropped() {
        let store = Store::open_in_memory().await.unwrap();
        seed_contact(&store, 1, "TX", None).await;
        sqlx::query(
            "INSERT INTO campaign_types (name, respect_exclusion_windows, enable_followups,
                 days_before_event, target_all_contacts, priority, active)
             VALUES ('initial_blast', 0, 0, 0, 1, 10, 1)",
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO campaign_instances (id, campaign_type, instance_name)
             VALUES (9, 'initial_blast', 'blast_june')",
        )
        .execute(store.pool())
        .await
        .unwrap();
        seed_sent_email(&store, 1, "campaign_initial_blast", "2024-06-17", Some(9)).await;

        let scheduler = FollowupScheduler::new(store.clone(), SchedulerConfig::default());
        let summary = scheduler.run_as_of(date(2024, 6, 20)).await.unwrap();
        assert_eq!(summary.emails_scheduled, 0);
        assert!(followup_rows(&store).await.is_empty());
    }
}
