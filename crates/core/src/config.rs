use std::collections::HashMap;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::state_rule::{StateRule, default_state_rules};

/// Tunable constants for both scheduling passes.
///
/// Every field has a production default; a TOML override file may set any
/// subset of them. The state-rule registry is part of the configuration so
/// regulatory changes ship as data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wall-clock send time stamped on every row.
    pub send_time: NaiveTime,
    /// Contacts fetched and processed per batch.
    pub batch_size: i64,
    /// Per-contact ceiling of non-follow-up messages per rolling period.
    pub max_emails_per_period: i64,
    /// Length of the rolling frequency period, in days.
    pub period_days: i64,
    /// Days before the birth anniversary to send the birthday email.
    pub birthday_email_days_before: i64,
    /// Days before the effective-date anniversary to send that email.
    pub effective_date_days_before: i64,
    /// Backward extension of every exclusion window, covering
    /// advance-notice sends that would land inside the quiet period.
    pub pre_window_exclusion_days: i64,
    /// Month of the annual enrolment period event.
    pub aep_month: u32,
    /// Day of the annual enrolment period event.
    pub aep_day: u32,
    /// Fraction of the contact population allowed per calendar day.
    pub daily_send_percentage_cap: f64,
    /// Soft per-day ceiling of effective-date sends before smoothing.
    pub ed_daily_soft_limit: i64,
    /// Width of the smoothing jitter window, in days.
    pub ed_smoothing_window_days: i64,
    /// Reserved for cap-overflow redistribution; not applied today.
    pub catch_up_spread_days: i64,
    /// Multiple of the daily cap above which a day draws a warning.
    pub overage_threshold: f64,
    /// Days after the source send to schedule a follow-up.
    pub followup_days_after: i64,
    /// How far back the follow-up pass looks for eligible sent mail.
    pub followup_lookback_days: i64,
    /// Apply the full exclusion-window test to follow-ups. `false`
    /// restores the reduced check that only honours year-round states.
    pub followup_full_exclusion_check: bool,
    /// Per-state quiet-period rules.
    pub state_rules: HashMap<String, StateRule>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            send_time: NaiveTime::from_hms_opt(8, 30, 0).unwrap_or_default(),
            batch_size: 10_000,
            max_emails_per_period: 5,
            period_days: 30,
            birthday_email_days_before: 14,
            effective_date_days_before: 30,
            pre_window_exclusion_days: 60,
            aep_month: 9,
            aep_day: 15,
            daily_send_percentage_cap: 0.07,
            ed_daily_soft_limit: 15,
            ed_smoothing_window_days: 5,
            catch_up_spread_days: 7,
            overage_threshold: 1.2,
            followup_days_after: 2,
            followup_lookback_days: 35,
            followup_full_exclusion_check: true,
            state_rules: default_state_rules(),
        }
    }
}

impl SchedulerConfig {
    /// Parse a TOML override document. Omitted fields keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Look up the quiet-period rule for a state code.
    #[must_use]
    pub fn rule_for(&self, state: &str) -> Option<&StateRule> {
        self.state_rules.get(state)
    }
}

/// Errors from configuration loading.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// The override document could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(String),
}
