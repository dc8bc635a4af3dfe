//! Unified error type for the marketplace core.
//!
//! Business failures are split into three kinds the caller must handle separately:
//! a referenced row is missing ([`Error::NotFound`]), a business rule was violated
//! ([`Error::Validation`]), or a concurrent writer won a race ([`Error::Conflict`]).
//! Store failures stay wrapped in [`Error::Database`] so the retry wrapper can classify them.

use crate::core::store::TransientClassifier;
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum Error {
    /// A referenced entity does not exist (or is not visible to the caller)
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of entity, e.g. `"product"`
        entity: &'static str,
        /// Identifier that was looked up
        id: i64,
    },

    /// A business rule was violated: bad state transition, missing permission, bad input
    #[error("Validation failed: {message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// A concurrent modification made the operation impossible (e.g. stock ran out)
    #[error("Conflict: {message}")]
    Conflict {
        /// Human-readable reason
        message: String,
    },

    /// Configuration could not be read or is invalid
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable reason
        message: String,
    },

    /// A time-boxed job exceeded its budget and was rolled back
    #[error("{operation} exceeded its {seconds}s time budget")]
    Timeout {
        /// Name of the job
        operation: &'static str,
        /// Budget that was exceeded
        seconds: u64,
    },

    /// Error reported by the persistent store
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    #[must_use]
    pub const fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::Conflict`].
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Whether this is a store error the given backend classifier considers retryable.
    #[must_use]
    pub fn is_transient(&self, classifier: &dyn TransientClassifier) -> bool {
        match self {
            Self::Database(err) => classifier.is_transient(err),
            _ => false,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
