use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use tracing::{info, warn};

use cadence_core::{EmailSchedule, ScheduleStatus, SchedulerConfig, smoothing_offset_days};

/// Share of the daily cap the effective-date soft limit may not exceed.
const ED_CAP_SHARE: f64 = 0.3;

/// Smooth over-dense effective-date days and warn on days that blow the
/// organisational cap.
///
/// Smoothing moves an effective-date send by a deterministic offset when
/// its day carries more rows than the soft limit; a shift into the past is
/// discarded. Days still above `daily_cap * overage_threshold` after
/// smoothing are logged, not redistributed.
pub fn apply_load_balancing(
    schedules: &mut [EmailSchedule],
    total_contacts: i64,
    config: &SchedulerConfig,
    today: NaiveDate,
) {
    if schedules.is_empty() {
        return;
    }

    let daily_cap = floor_share(total_contacts, config.daily_send_percentage_cap);
    let ed_soft_limit = config
        .ed_daily_soft_limit
        .min(floor_share(daily_cap, ED_CAP_SHARE));
    info!(daily_cap, ed_soft_limit, "applying load balancing");

    let mut ed_daily: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for schedule in schedules.iter() {
        if schedule.status == ScheduleStatus::PreScheduled
            && schedule.email_type == "effective_date"
        {
            *ed_daily.entry(schedule.scheduled_send_date).or_default() += 1;
        }
    }

    for schedule in schedules.iter_mut() {
        if schedule.status != ScheduleStatus::PreScheduled
            || schedule.email_type != "effective_date"
        {
            continue;
        }
        let day_count = ed_daily
            .get(&schedule.scheduled_send_date)
            .copied()
            .unwrap_or(0);
        if day_count <= ed_soft_limit {
            continue;
        }
        let Some(event_year) = schedule.event_year else {
            continue;
        };
        let offset = smoothing_offset_days(
            schedule.contact_id,
            &schedule.email_type,
            event_year,
            config.ed_smoothing_window_days,
        );
        let shifted = schedule.scheduled_send_date + Duration::days(offset);
        if shifted >= today {
            schedule.scheduled_send_date = shifted;
        }
    }

    let mut daily: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for schedule in schedules.iter() {
        if schedule.status == ScheduleStatus::PreScheduled {
            *daily.entry(schedule.scheduled_send_date).or_default() += 1;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let overage_limit = daily_cap as f64 * config.overage_threshold;
    for (send_date, count) in daily {
        #[allow(clippy::cast_precision_loss)]
        if count as f64 > overage_limit {
            warn!(%send_date, count, daily_cap, "daily send cap exceeded");
        }
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn floor_share(base: i64, share: f64) -> i64 {
    (base as f64 * share).floor() as i64
}
