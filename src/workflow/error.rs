//! Error types for the snapshot workflow.

use thiserror::Error;

/// Errors raised while validating a snapshot request. These surface before the
/// workflow exists, so no provider call has been made.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RequestError {
    /// Raised when a required field is missing or blank.
    #[error("missing or empty field: {0}")]
    Validation(String),
}

/// Fatal errors raised by a workflow run.
#[derive(Debug, Error)]
pub enum WorkflowError<ProviderError>
where
    ProviderError: std::error::Error + 'static,
{
    /// Raised when the budget runs out while waiting.
    #[error("timed out waiting for {waiting_for}")]
    Timeout {
        /// What the workflow was waiting on: an image id or `existing operation`.
        waiting_for: String,
    },
    /// Raised when the provider reports the new image as failed.
    #[error("image {image_id} entered the failed state")]
    ImageCreationFailed {
        /// Identifier of the failed image.
        image_id: String,
    },
    /// Raised when the image service rejects a create or describe call.
    #[error("image service error: {0}")]
    Provider(#[source] ProviderError),
}

impl<ProviderError> WorkflowError<ProviderError>
where
    ProviderError: std::error::Error + 'static,
{
    pub(crate) fn timeout(waiting_for: impl Into<String>) -> Self {
        Self::Timeout {
            waiting_for: waiting_for.into(),
        }
    }

    /// Short machine-friendly label used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::ImageCreationFailed { .. } => "image_creation_failed",
            Self::Provider(_) => "provider",
        }
    }
}
