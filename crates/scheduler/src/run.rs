use chrono::{Duration, Local, NaiveDate, Utc};
use tracing::{error, info};
use uuid::Uuid;

use cadence_core::{CheckpointStatus, RunCounts, ScheduleStatus, SchedulerConfig};
use cadence_store::Store;

use crate::anniversary::schedule_anniversary_emails;
use crate::balance::apply_load_balancing;
use crate::campaign::CampaignBook;
use crate::error::SchedulerError;
use crate::frequency::enforce_frequency_limits;

/// Outcome of a completed scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub scheduler_run_id: String,
    pub contacts_processed: i64,
    pub emails_scheduled: i64,
    pub emails_skipped: i64,
}

impl RunSummary {
    pub(crate) fn new(scheduler_run_id: &str) -> Self {
        Self {
            scheduler_run_id: scheduler_run_id.to_owned(),
            contacts_processed: 0,
            emails_scheduled: 0,
            emails_skipped: 0,
        }
    }

    #[must_use]
    pub fn counts(&self) -> RunCounts {
        RunCounts {
            contacts_processed: self.contacts_processed,
            emails_scheduled: self.emails_scheduled,
            emails_skipped: self.emails_skipped,
        }
    }
}

/// The main scheduling pass.
///
/// Streams eligible contacts in keyset batches; per batch it wipes the
/// contacts' pending rows, merges the anniversary and campaign candidate
/// sets, smooths and caps them, applies the frequency ceiling, and
/// persists the survivors transactionally. Carry-over counts and the
/// population cap base are computed once per run.
pub struct Scheduler {
    store: Store,
    config: SchedulerConfig,
}

impl Scheduler {
    #[must_use]
    pub fn new(store: Store, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    /// Run the pass as of the local calendar date.
    pub async fn run(&self) -> Result<RunSummary, SchedulerError> {
        self.run_as_of(Local::now().date_naive()).await
    }

    /// Run the pass with an explicit reference date. A `started`
    /// checkpoint is written up front and flipped to `completed` or
    /// `failed` on the way out.
    pub async fn run_as_of(&self, today: NaiveDate) -> Result<RunSummary, SchedulerError> {
        let run_id = Uuid::new_v4().to_string();
        info!(%run_id, %today, "starting schedule run");
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
                    contacts = summary.contacts_processed,
                    scheduled = summary.emails_scheduled,
                    skipped = summary.emails_skipped,
                    "schedule run completed"
                );
                Ok(summary)
            }
            Err(e) => {
                let message = e.to_string();
                error!(%run_id, error = %message, "schedule run failed");
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
        let total_contacts = self.store.total_contact_count().await?;
        let period_start = today - Duration::days(self.config.period_days);
        let carry_over = self.store.recent_send_counts(period_start, today).await?;
        let book = CampaignBook::load(&self.store, today).await?;

        let mut summary = RunSummary::new(run_id);
        let mut last_id = 0i64;
        loop {
            let contacts = self
                .store
                .eligible_contacts_page(last_id, self.config.batch_size)
                .await?;
            if contacts.is_empty() {
                break;
            }
            last_id = contacts.last().map_or(last_id, |c| c.id);
            let batch_len = i64::try_from(contacts.len()).unwrap_or(i64::MAX);

            let contact_ids: Vec<i64> = contacts.iter().map(|c| c.id).collect();
            let cleared = self.store.clear_pending_schedules(&contact_ids).await?;

            let mut schedules =
                schedule_anniversary_emails(&contacts, &self.config, today, run_id);
            schedules.extend(book.schedule_for(&contacts, &self.config, today, run_id));
            apply_load_balancing(&mut schedules, total_contacts, &self.config, today);
            enforce_frequency_limits(&mut schedules, &carry_over, &self.config);
            let inserted = self.store.insert_schedules(&schedules).await?;

            summary.contacts_processed += batch_len;
            for schedule in &schedules {
                match schedule.status {
                    ScheduleStatus::PreScheduled => summary.emails_scheduled += 1,
                    ScheduleStatus::Skipped => summary.emails_skipped += 1,
                    ScheduleStatus::Sent | ScheduleStatus::Delivered => {}
                }
            }
            info!(
                contacts = batch_len,
                cleared,
                generated = schedules.len(),
                inserted,
                "processed contact batch"
            );

            if batch_len < self.config.batch_size {
                break;
            }
        }

        Ok(summary)
    }
}
