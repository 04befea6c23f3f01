//! Logsift Core
//!
//! Core types, traits, and error handling shared across logsift components.
//!
//! This crate provides:
//! - Input/output types for log entries and classification outcomes
//! - The configuration-supplied category set with its mandatory
//!   `unclassified` fallback
//! - The tagged stage result type (`Matched`/`Miss`) used by every
//!   classification stage
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Category, CategorySet, ClassificationOutcome, LogEntry, Stage, StageOutcome};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{
        Category, CategorySet, ClassificationOutcome, LogEntry, Stage, StageOutcome,
    };
}
