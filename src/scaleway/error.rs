//! Error types for the Scaleway image service.

use crate::config::ConfigError;
use scaleway_rs::ScalewayError;
use thiserror::Error;

/// Errors raised by the Scaleway image service.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScalewayImageError {
    /// Raised when the high-level configuration is incomplete.
    #[error("configuration error: {0}")]
    Config(String),
    /// Wrapper for transport and SDK level failures.
    #[error("provider error: {message}")]
    Provider {
        /// Message returned by the HTTP client or SDK.
        message: String,
    },
    /// Raised when the API answers with a non-success status.
    #[error("{operation} failed with status {status}: {message}")]
    Api {
        /// Operation being attempted.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body returned by the API.
        message: String,
    },
    /// Raised when a success response cannot be understood.
    #[error("unexpected {operation} response: {message}")]
    UnexpectedResponse {
        /// Operation being attempted.
        operation: &'static str,
        /// Description of what was wrong.
        message: String,
    },
    /// Raised when a cross-zone copy is requested without a transfer bucket.
    #[error("copying images to {target_zone} requires SCW_IMAGE_TRANSFER_BUCKET")]
    CopyUnavailable {
        /// Zone the copy was meant for.
        target_zone: String,
    },
    /// Raised when a snapshot ends a transfer in an unusable state.
    #[error("snapshot {snapshot_id} in zone {zone} entered state {state}")]
    SnapshotFailed {
        /// Snapshot identifier.
        snapshot_id: String,
        /// Zone holding the snapshot.
        zone: String,
        /// State reported by the provider.
        state: String,
    },
    /// Raised when a copy step runs past the copy's deadline.
    #[error("timeout waiting for {action} of {snapshot_id}")]
    Timeout {
        /// Action being waited on.
        action: String,
        /// Snapshot, image or object the action concerns.
        snapshot_id: String,
    },
}

impl From<ScalewayError> for ScalewayImageError {
    fn from(value: ScalewayError) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for ScalewayImageError {
    fn from(value: reqwest::Error) -> Self {
        Self::Provider {
            message: value.to_string(),
        }
    }
}

impl From<ConfigError> for ScalewayImageError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}
