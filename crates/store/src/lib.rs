//! SQLite storage backend for the Cadence outreach engine.
//!
//! Owns the connection pool, the idempotent schema migrations, and every
//! query the scheduling passes issue. Dates are stored as ISO-8601 text; a
//! malformed stored date decodes to `None` with a warning instead of
//! failing the row.

pub mod campaigns;
pub mod checkpoints;
pub mod config;
pub mod error;
pub mod events;
pub mod migrations;
pub mod schedules;
pub mod seed;
pub mod store;

pub use campaigns::CampaignFollowupInfo;
pub use checkpoints::CheckpointRow;
pub use config::StoreConfig;
pub use error::StoreError;
pub use store::Store;
