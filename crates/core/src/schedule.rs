use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Prefix carried by every campaign-sourced email type.
pub const CAMPAIGN_EMAIL_PREFIX: &str = "campaign_";

/// Prefix carried by every follow-up email type.
pub const FOLLOWUP_EMAIL_PREFIX: &str = "followup_";

/// Lifecycle status of a schedule row.
///
/// The engine writes `pre-scheduled` and `skipped`; the downstream delivery
/// worker transitions rows to `sent` and `delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleStatus {
    #[serde(rename = "pre-scheduled")]
    PreScheduled,
    #[serde(rename = "skipped")]
    Skipped,
    #[serde(rename = "sent")]
    Sent,
    #[serde(rename = "delivered")]
    Delivered,
}

impl ScheduleStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreScheduled => "pre-scheduled",
            Self::Skipped => "skipped",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
        }
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a `skipped` row was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ExclusionWindow,
    FrequencyLimit,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ExclusionWindow => "exclusion_window",
            Self::FrequencyLimit => "frequency_limit",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four anniversary-driven email kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnniversaryKind {
    Birthday,
    EffectiveDate,
    Aep,
    PostWindow,
}

impl AnniversaryKind {
    #[must_use]
    pub fn email_type(self) -> &'static str {
        match self {
            Self::Birthday => "birthday",
            Self::EffectiveDate => "effective_date",
            Self::Aep => "aep",
            Self::PostWindow => "post_window",
        }
    }

    #[must_use]
    pub fn default_template(self) -> &'static str {
        match self {
            Self::Birthday => "birthday_default",
            Self::EffectiveDate => "effective_date_default",
            Self::Aep => "aep_default",
            Self::PostWindow => "post_window_default",
        }
    }
}

/// Whether an email type is one of the anniversary kinds.
#[must_use]
pub fn is_anniversary_email_type(email_type: &str) -> bool {
    matches!(
        email_type,
        "birthday" | "effective_date" | "aep" | "post_window"
    )
}

/// Whether an email type was emitted by the campaign pipeline.
#[must_use]
pub fn is_campaign_email_type(email_type: &str) -> bool {
    email_type.starts_with(CAMPAIGN_EMAIL_PREFIX)
}

/// Whether an email type was emitted by the follow-up pass.
#[must_use]
pub fn is_followup_email_type(email_type: &str) -> bool {
    email_type.starts_with(FOLLOWUP_EMAIL_PREFIX)
}

/// One output row of a scheduling pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailSchedule {
    pub contact_id: i64,
    pub email_type: String,
    pub scheduled_send_date: NaiveDate,
    pub scheduled_send_time: NaiveTime,
    pub status: ScheduleStatus,
    #[serde(default)]
    pub skip_reason: Option<SkipReason>,
    /// Lower is more important.
    pub priority: i64,
    #[serde(default)]
    pub campaign_instance_id: Option<i64>,
    #[serde(default)]
    pub email_template: Option<String>,
    #[serde(default)]
    pub sms_template: Option<String>,
    /// Opaque identifier of the pass that produced this row.
    pub scheduler_run_id: String,
    /// Anchor date of the driving event, when there is one.
    #[serde(default)]
    pub event_year: Option<i32>,
    #[serde(default)]
    pub event_month: Option<u32>,
    #[serde(default)]
    pub event_day: Option<u32>,
    /// Follow-up rows record their source message and behaviour snapshot
    /// here as a JSON document.
    #[serde(default)]
    pub metadata: Option<String>,
}

impl EmailSchedule {
    /// Stamp the event columns from an anchor date.
    #[must_use]
    pub fn with_event_date(mut self, anchor: NaiveDate) -> Self {
        use chrono::Datelike;
        self.event_year = Some(anchor.year());
        self.event_month = Some(anchor.month());
        self.event_day = Some(anchor.day());
        self
    }
}

/// Projection of a historical `sent`/`delivered` row, as read back by the
/// follow-up pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub id: i64,
    pub contact_id: i64,
    pub email_type: String,
    pub scheduled_send_date: NaiveDate,
    pub campaign_instance_id: Option<i64>,
    pub event_year: Option<i32>,
    pub event_month: Option<u32>,
    pub event_day: Option<u32>,
}

/// Status of a scheduler run checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Started,
    Completed,
    Failed,
}

impl CheckpointStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row counts recorded on a completed checkpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub contacts_processed: i64,
    pub emails_scheduled: i64,
    pub emails_skipped: i64,
}
