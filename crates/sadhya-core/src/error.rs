// SPDX-FileCopyrightText: 2026 Sadhya Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sadhya ordering bot.

use thiserror::Error;

/// The primary error type used across all Sadhya adapter traits and core operations.
///
/// User input problems are never represented here: those are validation
/// outcomes handled by re-prompting inside the conversation flow.
#[derive(Debug, Error)]
pub enum SadhyaError {
    /// Configuration errors (invalid TOML, missing required fields, bad catalog).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Messaging channel errors (send failure, media download, rate limiting).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Spreadsheet / artifact synchronization errors.
    #[error("sync error: {message}")]
    Sync {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced entity does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Adapter health check failed.
    #[error("health check failed for {name}: {source}")]
    HealthCheckFailed {
        name: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SadhyaError {
    /// Shorthand for a storage error built from any displayable message.
    pub fn storage(message: impl Into<String>) -> Self {
        let message: String = message.into();
        SadhyaError::Storage {
            source: message.into(),
        }
    }

    /// Whether a retry of the failed collaborator call may succeed.
    ///
    /// Configuration and not-found errors are permanent; everything talking
    /// to an external system is considered transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SadhyaError::Storage { .. }
                | SadhyaError::Channel { .. }
                | SadhyaError::Sync { .. }
                | SadhyaError::Timeout { .. }
        )
    }
}
