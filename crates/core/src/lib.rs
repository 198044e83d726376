//! Core types and pure scheduling calculus for the Cadence outreach engine.
//!
//! Everything in this crate is synchronous and storage-agnostic: domain
//! types, the anniversary/exclusion-window date arithmetic, behaviour
//! classification for follow-ups, the deterministic smoothing digest, and
//! the scheduler configuration.

pub mod behavior;
pub mod campaign;
pub mod config;
pub mod contact;
pub mod dates;
pub mod schedule;
pub mod smoothing;
pub mod state_rule;

pub use behavior::{ContactBehavior, FollowupTier, metadata_indicates_conditions};
pub use campaign::{CampaignInstance, CampaignType, followup_template_override};
pub use config::{ConfigError, SchedulerConfig};
pub use contact::Contact;
pub use dates::{ExclusionWindow, exclusion_window, is_excluded, next_anniversary};
pub use schedule::{
    AnniversaryKind, CheckpointStatus, EmailSchedule, RunCounts, ScheduleStatus, SentEmail,
    SkipReason, is_anniversary_email_type, is_campaign_email_type, is_followup_email_type,
};
pub use smoothing::smoothing_offset_days;
pub use state_rule::{StateRule, default_state_rules};
