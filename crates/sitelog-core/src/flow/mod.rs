//! Optimistic save of daily worker entries.
//!
//! `SaveFlow` moves a project/date through
//! `Idle → Pending → Committed | RolledBack`, writing a provisional
//! summary to the cache while the request is in flight.

pub mod entries;
pub mod save;

use thiserror::Error;

use crate::api::ApiError;

pub use entries::{provisional_summary, EditedEntries};
pub use save::{SaveFlow, SaveReceipt, SaveState};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SaveError {
    /// Rejected before anything was written.
    #[error("{0}")]
    Validation(String),

    #[error("A save for {project} on {date} is already in progress")]
    InProgress { project: String, date: String },

    /// The network write failed and the cached summary was restored.
    #[error("Save failed and was rolled back: {source}")]
    Rollback { source: ApiError },
}

impl SaveError {
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, SaveError::Rollback { source } if source.is_session_invalid())
    }

    pub fn user_message(&self) -> String {
        match self {
            SaveError::Rollback { source } => source.user_message(),
            other => other.to_string(),
        }
    }
}
