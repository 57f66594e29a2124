use thiserror::Error;

use crate::types::FormField;

/// Message shown when a submission fails without a usable description.
pub const GENERIC_FAILURE_MESSAGE: &str = "Failed to generate image";

/// Errors returned by Lumina operations.
#[derive(Error, Debug)]
pub enum LuminaError {
    /// The prompt was empty or whitespace-only. No request was sent.
    #[error("Please enter a prompt")]
    EmptyPrompt,

    /// A form field received text that cannot be stored.
    #[error("Invalid value for {field}: {value:?}")]
    InvalidField { field: FormField, value: String },

    /// Unknown form field name.
    #[error("Unknown form field: {0}")]
    UnknownField(String),

    /// The generation endpoint returned a non-success HTTP status.
    #[error("HTTP error! status: {status}")]
    Http { status: u16 },

    /// The request could not complete (DNS, refused connection, timeout, truncated body).
    #[error("{0}")]
    Network(#[from] reqwest::Error),

    /// The response from the service was missing expected fields.
    #[error("{0}")]
    InvalidResponse(String),

    /// Writing the image to disk failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The batch prompt file could not be read as CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The batch prompt file lacks required columns.
    #[error("{0}")]
    InvalidBatch(String),
}

impl LuminaError {
    /// Text surfaced in the form's error banner.
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            GENERIC_FAILURE_MESSAGE.to_string()
        } else {
            message
        }
    }

    /// Whether the failure happened before any network activity.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LuminaError::EmptyPrompt
                | LuminaError::InvalidField { .. }
                | LuminaError::UnknownField(_)
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, LuminaError>;
