use chrono::{Datelike, Duration, NaiveDate};

use cadence_core::{
    AnniversaryKind, Contact, EmailSchedule, ExclusionWindow, ScheduleStatus, SchedulerConfig,
    SkipReason, exclusion_window, next_anniversary,
};

/// Priority of the three standard anniversary mails.
const ANNIVERSARY_PRIORITY: i64 = 5;

/// Priority of the post-window catch-up mail. More important than the
/// anniversary mails it compensates for.
const POST_WINDOW_PRIORITY: i64 = 3;

/// Generate anniversary-driven candidates for a batch of contacts.
///
/// Per contact: a birthday mail and an effective-date mail when the anchor
/// date is known and the send has not already passed, an AEP mail always,
/// and a post-window mail when at least one of the others was suppressed
/// by the exclusion window. Suppressed candidates are still emitted as
/// `skipped` rows so the suppression is visible downstream.
pub fn schedule_anniversary_emails(
    contacts: &[Contact],
    config: &SchedulerConfig,
    today: NaiveDate,
    run_id: &str,
) -> Vec<EmailSchedule> {
    let mut schedules = Vec::new();

    for contact in contacts {
        let window = exclusion_window(contact, config, today);
        let mut contact_schedules = Vec::new();

        if let Some(birth_date) = contact.birth_date {
            let anchor = next_anniversary(birth_date, today);
            let send = anchor - Duration::days(config.birthday_email_days_before);
            if send >= today {
                contact_schedules.push(candidate(
                    contact,
                    AnniversaryKind::Birthday,
                    send,
                    anchor,
                    window,
                    config,
                    run_id,
                ));
            }
        }

        if let Some(effective_date) = contact.effective_date {
            let anchor = next_anniversary(effective_date, today);
            let send = anchor - Duration::days(config.effective_date_days_before);
            if send >= today {
                contact_schedules.push(candidate(
                    contact,
                    AnniversaryKind::EffectiveDate,
                    send,
                    anchor,
                    window,
                    config,
                    run_id,
                ));
            }
        }

        if let Some(aep) = next_aep_date(config, today) {
            contact_schedules.push(candidate(
                contact,
                AnniversaryKind::Aep,
                aep,
                aep,
                window,
                config,
                run_id,
            ));
        }

        let any_window_skip = contact_schedules
            .iter()
            .any(|s| s.status == ScheduleStatus::Skipped);
        if any_window_skip {
            if let Some(window) = window {
                let send = window.end + Duration::days(1);
                if send >= today {
                    contact_schedules.push(
                        EmailSchedule {
                            contact_id: contact.id,
                            email_type: AnniversaryKind::PostWindow.email_type().to_owned(),
                            scheduled_send_date: send,
                            scheduled_send_time: config.send_time,
                            status: ScheduleStatus::PreScheduled,
                            skip_reason: None,
                            priority: POST_WINDOW_PRIORITY,
                            campaign_instance_id: None,
                            email_template: Some(
                                AnniversaryKind::PostWindow.default_template().to_owned(),
                            ),
                            sms_template: None,
                            scheduler_run_id: run_id.to_owned(),
                            event_year: None,
                            event_month: None,
                            event_day: None,
                            metadata: None,
                        }
                        .with_event_date(send),
                    );
                }
            }
        }

        schedules.append(&mut contact_schedules);
    }

    schedules
}

fn candidate(
    contact: &Contact,
    kind: AnniversaryKind,
    send: NaiveDate,
    anchor: NaiveDate,
    window: Option<ExclusionWindow>,
    config: &SchedulerConfig,
    run_id: &str,
) -> EmailSchedule {
    let excluded = window.is_some_and(|w| w.contains(send));
    EmailSchedule {
        contact_id: contact.id,
        email_type: kind.email_type().to_owned(),
        scheduled_send_date: send,
        scheduled_send_time: config.send_time,
        status: if excluded {
            ScheduleStatus::Skipped
        } else {
            ScheduleStatus::PreScheduled
        },
        skip_reason: excluded.then_some(SkipReason::ExclusionWindow),
        priority: ANNIVERSARY_PRIORITY,
        campaign_instance_id: None,
        email_template: Some(kind.default_template().to_owned()),
        sms_template: None,
        scheduler_run_id: run_id.to_owned(),
        event_year: None,
        event_month: None,
        event_day: None,
        metadata: None,
    }
    .with_event_date(anchor)
}

/// The next annual enrolment period date on or after tomorrow.
fn next_aep_date(config: &SchedulerConfig, today: NaiveDate) -> Option<NaiveDate> {
    let this_year = NaiveDate::from_ymd_opt(today.year(), config.aep_month, config.aep_day)?;
    if this_year <= today {
        NaiveDate::from_ymd_opt(today.year() + 1, config.aep_month, config.aep_day)
    } else {
        Some(this_year)
    }
}
