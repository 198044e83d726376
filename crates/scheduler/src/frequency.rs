use std::collections::HashMap;

use cadence_core::{EmailSchedule, ScheduleStatus, SchedulerConfig, SkipReason};

/// Enforce the per-contact message ceiling over the rolling period.
///
/// `carry_over` holds each contact's count of non-follow-up messages
/// already occupying the period. Proposals are walked in
/// `(priority, send date)` order (stable, so equal keys keep their
/// pipeline order) and admitted while the combined count stays under the
/// ceiling; the rest become `skipped` rows with reason `frequency_limit`.
/// Rows already skipped upstream pass through untouched and consume no
/// budget.
pub fn enforce_frequency_limits(
    schedules: &mut Vec<EmailSchedule>,
    carry_over: &HashMap<i64, i64>,
    config: &SchedulerConfig,
) {
    schedules.sort_by(|a, b| {
        (a.priority, a.scheduled_send_date).cmp(&(b.priority, b.scheduled_send_date))
    });

    let mut admitted: HashMap<i64, i64> = HashMap::new();
    for schedule in schedules.iter_mut() {
        if schedule.status != ScheduleStatus::PreScheduled {
            continue;
        }
        let carried = carry_over.get(&schedule.contact_id).copied().unwrap_or(0);
        let run_count = admitted.entry(schedule.contact_id).or_insert(0);
        if carried + *run_count < config.max_emails_per_period {
            *run_count += 1;
        } else {
            schedule.status = ScheduleStatus::Skipped;
            schedule.skip_reason = Some(SkipReason::FrequencyLimit);
        }
    }
}
