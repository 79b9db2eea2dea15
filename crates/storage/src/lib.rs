//! Storage Layer
//!
//! Keeps the reading history in memory with a retention bound, answers
//! live-window and analysis queries, and exports readings as CSV.

mod export;
mod repository;

pub use export::to_csv;
pub use repository::{ReadingFilter, Repository, DEFAULT_MAX_RECORDS};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Lock error: {0}")]
    LockError(String),
    #[error("Export error: {0}")]
    ExportError(String),
}
