//! Unified error type for the finance service.
//!
//! Every core operation returns [`Result`]. The HTTP layer maps each variant onto a
//! status code in `api::response`; nothing below the API layer knows about HTTP.

use sea_orm::DbErr;
use thiserror::Error;

/// Errors produced by configuration, persistence, and accounting rules.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Caller-supplied input was rejected
    #[error("{message}")]
    Validation {
        /// Human-readable reason
        message: String,
    },

    /// A monetary amount or rate was negative, zero where forbidden, or not finite
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected value
        amount: f64,
    },

    /// A referenced record does not exist
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record (e.g. "Order")
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// A status change is not allowed by the lifecycle rules
    #[error("Cannot move {entity} {id} from {from} to {to}")]
    InvalidTransition {
        /// Kind of record
        entity: &'static str,
        /// Record id
        id: i64,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// A unique business key is already taken
    #[error("Duplicate {entity}: {key}")]
    Duplicate {
        /// Kind of record
        entity: &'static str,
        /// The conflicting key
        key: String,
    },

    /// Another writer changed the records while the operation ran
    #[error("Conflict: {message}")]
    Conflict {
        /// What changed underneath the operation
        message: String,
    },

    /// Missing or invalid credentials
    #[error("Authentication required: {message}")]
    Unauthorized {
        /// Why the credentials were rejected
        message: String,
    },

    /// Authenticated but not allowed
    #[error("Admin access required")]
    Forbidden,

    /// Export serialization failure
    #[error("Export error: {message}")]
    Export {
        /// Underlying cause
        message: String,
    },

    /// I/O error (config file, listener)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a [`Error::Validation`] with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Error::NotFound`] keyed by a numeric id.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<csv::Error> for Error {
    fn from(value: csv::Error) -> Self {
        Self::Export {
            message: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Export {
            message: value.to_string(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
