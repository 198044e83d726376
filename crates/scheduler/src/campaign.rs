use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use cadence_core::{
    CampaignInstance, CampaignType, Contact, EmailSchedule, ScheduleStatus, SchedulerConfig,
    SkipReason, is_excluded,
};
use cadence_store::Store;

use crate::error::SchedulerError;

/// All currently active campaign instances with their types and pending
/// membership targets, loaded once per run and applied per batch.
#[derive(Debug, Default)]
pub struct CampaignBook {
    entries: Vec<CampaignEntry>,
}

#[derive(Debug)]
struct CampaignEntry {
    instance: CampaignInstance,
    campaign_type: CampaignType,
    /// Pending targets by contact id. `None` means the membership has no
    /// usable trigger date.
    targets: HashMap<i64, Option<NaiveDate>>,
}

impl CampaignBook {
    /// Load active instances for `today`. Instances whose campaign type
    /// is missing or inactive are dropped with a warning.
    pub async fn load(store: &Store, today: NaiveDate) -> Result<Self, SchedulerError> {
        let instances = store.active_campaign_instances(today).await?;
        if instances.is_empty() {
            info!("no active campaign instances");
            return Ok(Self::default());
        }

        let mut entries = Vec::new();
        for instance in instances {
            let Some(campaign_type) = store.campaign_type(&instance.campaign_type).await? else {
                warn!(
                    campaign_type = %instance.campaign_type,
                    instance = %instance.instance_name,
                    "campaign type missing or inactive"
                );
                continue;
            };
            let targets = store.pending_campaign_targets(instance.id).await?;
            entries.push(CampaignEntry {
                instance,
                campaign_type,
                targets,
            });
        }
        Ok(Self { entries })
    }

    /// Generate campaign candidates for the contacts of one batch.
    ///
    /// A membership without a trigger date or whose send date has already
    /// passed is logged and dropped without a row.
    pub fn schedule_for(
        &self,
        contacts: &[Contact],
        config: &SchedulerConfig,
        today: NaiveDate,
        run_id: &str,
    ) -> Vec<EmailSchedule> {
        let mut schedules = Vec::new();

        for entry in &self.entries {
            for contact in contacts {
                let Some(target) = entry.targets.get(&contact.id) else {
                    continue;
                };
                let Some(trigger_date) = target else {
                    warn!(
                        contact_id = contact.id,
                        instance = %entry.instance.instance_name,
                        "membership has no usable trigger date"
                    );
                    continue;
                };

                let send = *trigger_date - Duration::days(entry.campaign_type.days_before_event);
                if send < today {
                    warn!(
                        contact_id = contact.id,
                        instance = %entry.instance.instance_name,
                        send_date = %send,
                        "campaign send date already passed"
                    );
                    continue;
                }

                let excluded = entry.campaign_type.respect_exclusion_windows
                    && is_excluded(send, contact, config, today);

                schedules.push(
                    EmailSchedule {
                        contact_id: contact.id,
                        email_type: format!("campaign_{}", entry.campaign_type.name),
                        scheduled_send_date: send,
                        scheduled_send_time: config.send_time,
                        status: if excluded {
                            ScheduleStatus::Skipped
                        } else {
                            ScheduleStatus::PreScheduled
                        },
                        skip_reason: excluded.then_some(SkipReason::ExclusionWindow),
                        priority: entry.campaign_type.priority,
                        campaign_instance_id: Some(entry.instance.id),
                        email_template: entry.instance.email_template.clone(),
                        sms_template: entry.instance.sms_template.clone(),
                        scheduler_run_id: run_id.to_owned(),
                        event_year: None,
                        event_month: None,
                        event_day: None,
                        metadata: None,
                    }
                    .with_event_date(*trigger_date),
                );
            }
        }

        schedules
    }
}
