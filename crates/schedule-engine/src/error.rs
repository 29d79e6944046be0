//! Error types for schedule-engine operations.
//!
//! Only the store boundary and the codec produce errors. Expansion, conflict
//! detection and layout degrade instead of failing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Event not found: {0}")]
    NotFound(String),

    #[error("Duplicate event id: {0}")]
    DuplicateId(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported export version: {0}")]
    UnsupportedVersion(String),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
