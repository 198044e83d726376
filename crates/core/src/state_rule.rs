use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A state-level quiet-period rule.
///
/// States without an entry in the registry have no exclusion window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateRule {
    /// The entire calendar year is excluded.
    YearRound,
    /// Window anchored on the next birth anniversary.
    BirthdayWindow {
        days_before: i64,
        days_after: i64,
        /// Relocate the anchor to the first day of the anniversary's month.
        #[serde(default)]
        month_start: bool,
    },
    /// Window anchored on the next effective-date anniversary.
    EffectiveDateWindow { days_before: i64, days_after: i64 },
}

/// The default per-state rule registry.
///
/// These are regulatory defaults; deployments override them through
/// [`SchedulerConfig`](crate::SchedulerConfig).
pub fn default_state_rules() -> HashMap<String, StateRule> {
    let birthday = |days_before, days_after| StateRule::BirthdayWindow {
        days_before,
        days_after,
        month_start: false,
    };

    let mut rules = HashMap::new();
    rules.insert("CA".to_owned(), birthday(30, 60));
    rules.insert("ID".to_owned(), birthday(0, 63));
    rules.insert("KY".to_owned(), birthday(0, 60));
    rules.insert("MD".to_owned(), birthday(0, 30));
    rules.insert(
        "NV".to_owned(),
        StateRule::BirthdayWindow {
            days_before: 0,
            days_after: 60,
            month_start: true,
        },
    );
    rules.insert("OK".to_owned(), birthday(0, 60));
    rules.insert("OR".to_owned(), birthday(0, 31));
    rules.insert("VA".to_owned(), birthday(0, 30));
    rules.insert(
        "MO".to_owned(),
        StateRule::EffectiveDateWindow {
            days_before: 30,
            days_after: 33,
        },
    );
    for state in ["CT", "MA", "NY", "WA"] {
        rules.insert(state.to_owned(), StateRule::YearRound);
    }
    rules
}
