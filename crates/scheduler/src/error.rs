use thiserror::Error;

use cadence_store::StoreError;

/// Errors that can occur during a scheduling pass.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// An error from the storage backend.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
