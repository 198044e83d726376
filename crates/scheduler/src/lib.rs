//! The two scheduling passes of the Cadence outreach engine.
//!
//! The main pass generates anniversary and campaign candidates, smooths
//! and caps them, applies the per-contact frequency ceiling, and persists
//! the result. The follow-up pass classifies recently sent mail by
//! observed behaviour and schedules one follow-up per source message.
//! Both passes checkpoint their start and outcome for audit.

pub mod anniversary;
pub mod balance;
pub mod campaign;
pub mod error;
pub mod followup;
pub mod frequency;
pub mod run;

pub use campaign::CampaignBook;
pub use error::SchedulerError;
pub use followup::FollowupScheduler;
pub use run::{RunSummary, Scheduler};
