use chrono::{Datelike, Duration, NaiveDate};

use crate::config::SchedulerConfig;
use crate::contact::Contact;
use crate::state_rule::StateRule;

/// The next occurrence of `event`'s month and day strictly after `today`.
///
/// A Feb 29 anchor collapses to Feb 28 in non-leap target years.
#[must_use]
pub fn next_anniversary(event: NaiveDate, today: NaiveDate) -> NaiveDate {
    let this_year = anniversary_in_year(event, today.year());
    if this_year > today {
        this_year
    } else {
        anniversary_in_year(event, today.year() + 1)
    }
}

fn anniversary_in_year(event: NaiveDate, year: i32) -> NaiveDate {
    event
        .with_year(year)
        .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
        .unwrap_or(event)
}

/// A closed calendar interval during which outbound marketing is
/// suppressed for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ExclusionWindow {
    /// Window membership. A window whose endpoints land in different
    /// years wraps the year boundary, so membership is either side of it.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        if self.start.year() == self.end.year() {
            self.start <= date && date <= self.end
        } else {
            date >= self.start || date <= self.end
        }
    }
}

/// Derive the exclusion window for a contact, or `None` when the state has
/// no rule or the rule needs a date the contact does not supply.
#[must_use]
pub fn exclusion_window(
    contact: &Contact,
    config: &SchedulerConfig,
    today: NaiveDate,
) -> Option<ExclusionWindow> {
    let rule = config.rule_for(&contact.state)?;

    let (anchor, days_before, days_after) = match rule {
        StateRule::YearRound => {
            return Some(ExclusionWindow {
                start: NaiveDate::from_ymd_opt(today.year(), 1, 1)?,
                end: NaiveDate::from_ymd_opt(today.year(), 12, 31)?,
            });
        }
        StateRule::BirthdayWindow {
            days_before,
            days_after,
            month_start,
        } => {
            let anniversary = next_anniversary(contact.birth_date?, today);
            let anchor = if *month_start {
                anniversary.with_day(1)?
            } else {
                anniversary
            };
            (anchor, *days_before, *days_after)
        }
        StateRule::EffectiveDateWindow {
            days_before,
            days_after,
        } => (
            next_anniversary(contact.effective_date?, today),
            *days_before,
            *days_after,
        ),
    };

    Some(ExclusionWindow {
        start: anchor - Duration::days(days_before + config.pre_window_exclusion_days),
        end: anchor + Duration::days(days_after),
    })
}

/// Whether a send on `send_date` falls inside the contact's exclusion
/// window. Contacts without a window are never excluded.
#[must_use]
pub fn is_excluded(
    send_date: NaiveDate,
    contact: &Contact,
    config: &SchedulerConfig,
    today: NaiveDate,
) -> bool {
    exclusion_window(contact, config, today).is_some_and(|window| window.contains(send_date))
}
