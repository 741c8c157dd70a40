//! Storage Layer
//!
//! Defines the persistence contract the monitoring pipeline writes to, and
//! an in-memory repository implementing it with retention caps.

mod repository;

pub use repository::{AlertRecord, Persistence, Repository, SampleRecord};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
}
