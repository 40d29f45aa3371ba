//! Error taxonomy shared by the sheet adapter and the record store.

use std::time::Duration;

use crate::schema::ValidationError;
use crate::store::RecordId;

/// Failures of a single spreadsheet request.
#[derive(Debug, thiserror::Error)]
pub enum SheetError {
    /// Credential missing, invalid or expired. Fatal for the session.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Worksheet or row position does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote service throttled the client; retry later.
    #[error("rate limited by the spreadsheet service")]
    RateLimit { retry_after: Option<Duration> },

    #[error("spreadsheet API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SheetError {
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SheetError::RateLimit { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Failures of a record store operation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The id no longer resolves to a row, typically because another client
    /// changed the worksheet since it was read.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: RecordId },

    #[error(transparent)]
    Sheet(#[from] SheetError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. } | StoreError::Sheet(SheetError::NotFound(_))
        )
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, StoreError::Sheet(SheetError::Auth(_)))
    }

    /// Rate limiting is the only failure worth retrying automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Sheet(SheetError::RateLimit { .. }))
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            StoreError::Sheet(e) => e.retry_after(),
            _ => None,
        }
    }

    /// Text suitable for showing to the person who triggered the operation.
    pub fn user_message(&self) -> String {
        match self {
            StoreError::Validation(e) => format!("Please fix the form: {}", e),
            e if e.is_not_found() => {
                "The record was modified elsewhere, please reload and retry.".to_string()
            }
            e if e.is_auth() => format!(
                "Spreadsheet credentials were rejected; check the service account configuration ({})",
                e
            ),
            e if e.is_retryable() => {
                "The spreadsheet service is busy, please try again shortly.".to_string()
            }
            e => format!("Spreadsheet request failed: {}", e),
        }
    }
}
