//! Optional cross-region copy of the finished image.
//!
//! A copy failure never fails the run: the primary image already exists, so
//! the failure is folded into the result as a note.

use std::time::Duration;

use tracing::{info, warn};

use crate::budget::{Clock, TimeBudget};
use crate::image::{CopyImageRequest, ImageService};

use super::creation::PendingImage;

/// Time held back from the copy so the run can still report its result.
const COPY_SAFETY_MARGIN: Duration = Duration::from_secs(30);

/// What happened to the replication request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReplicationOutcome {
    /// Source and target regions are the same.
    NotRequested,
    /// Too little budget was left to start a copy.
    Skipped {
        /// Region the copy was meant for.
        target_region: String,
    },
    /// The copy was accepted by the target region.
    Copied {
        /// Region holding the copy.
        target_region: String,
        /// Identifier of the copy.
        image_id: String,
    },
    /// The copy call failed.
    Failed {
        /// Region the copy was meant for.
        target_region: String,
        /// Provider error message.
        message: String,
    },
}

impl ReplicationOutcome {
    /// Returns `true` when a copy was made.
    #[must_use]
    pub const fn copied(&self) -> bool {
        matches!(self, Self::Copied { .. })
    }

    /// Identifier of the copy, when one was made.
    #[must_use]
    pub fn copy_image_id(&self) -> Option<&str> {
        match self {
            Self::Copied { image_id, .. } => Some(image_id),
            _ => None,
        }
    }

    /// Human readable note for the result body. `None` when nothing was
    /// requested.
    #[must_use]
    pub fn note(&self) -> Option<String> {
        match self {
            Self::NotRequested => None,
            Self::Skipped { target_region } => Some(format!(
                "copy to {target_region} skipped due to insufficient remaining time"
            )),
            Self::Copied {
                target_region,
                image_id,
            } => Some(format!("copied to {target_region} as {image_id}")),
            Self::Failed {
                target_region,
                message,
            } => Some(format!("copy to {target_region} failed: {message}")),
        }
    }
}

/// Copies a finished image into the target region when budget allows.
pub struct ReplicationStep<'a, S, C> {
    target: Option<&'a S>,
    budget: &'a TimeBudget<C>,
    source_region: &'a str,
    target_region: &'a str,
    min_remaining: Duration,
}

impl<'a, S, C> ReplicationStep<'a, S, C>
where
    S: ImageService,
    C: Clock,
{
    /// Creates the step. `target` is the target-region client, if one exists.
    #[must_use]
    pub const fn new(
        target: Option<&'a S>,
        budget: &'a TimeBudget<C>,
        source_region: &'a str,
        target_region: &'a str,
        min_remaining: Duration,
    ) -> Self {
        Self {
            target,
            budget,
            source_region,
            target_region,
            min_remaining,
        }
    }

    /// Copies `image` into the target region, or explains why it did not.
    ///
    /// The copy gets the remaining budget minus a fixed margin. A copy still
    /// running at that limit is dropped and reported as failed.
    pub async fn maybe_replicate(&self, image: &PendingImage) -> ReplicationOutcome {
        if self.target_region == self.source_region {
            return ReplicationOutcome::NotRequested;
        }

        let remaining = self.budget.remaining();
        if remaining <= self.min_remaining {
            warn!(
                image_id = %image.image_id,
                target_region = self.target_region,
                remaining_secs = remaining.as_secs(),
                "skipping image copy: insufficient remaining time"
            );
            return ReplicationOutcome::Skipped {
                target_region: self.target_region.to_owned(),
            };
        }

        let Some(target) = self.target else {
            warn!(
                target_region = self.target_region,
                "no image service configured for target region"
            );
            return ReplicationOutcome::Failed {
                target_region: self.target_region.to_owned(),
                message: format!(
                    "no image service configured for region {}",
                    self.target_region
                ),
            };
        };

        let time_limit = remaining.saturating_sub(COPY_SAFETY_MARGIN);
        let request = CopyImageRequest {
            source_image_id: image.image_id.clone(),
            source_region: self.source_region.to_owned(),
            target_region: self.target_region.to_owned(),
            name: image.label.name.clone(),
            description: format!(
                "Copy of {} from {}: {}",
                image.image_id, self.source_region, image.label.description
            ),
            time_limit,
        };

        let copied = tokio::time::timeout(time_limit, target.copy_image(&request)).await;
        match copied {
            Ok(Ok(copy_id)) => {
                info!(
                    image_id = %image.image_id,
                    copy_image_id = %copy_id,
                    target_region = self.target_region,
                    "image copy started"
                );
                ReplicationOutcome::Copied {
                    target_region: self.target_region.to_owned(),
                    image_id: copy_id,
                }
            }
            Ok(Err(err)) => {
                warn!(
                    image_id = %image.image_id,
                    target_region = self.target_region,
                    error = %err,
                    "image copy failed; continuing"
                );
                ReplicationOutcome::Failed {
                    target_region: self.target_region.to_owned(),
                    message: err.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    image_id = %image.image_id,
                    target_region = self.target_region,
                    time_limit_secs = time_limit.as_secs(),
                    "image copy abandoned at its time limit; continuing"
                );
                ReplicationOutcome::Failed {
                    target_region: self.target_region.to_owned(),
                    message: format!("did not finish within {}s", time_limit.as_secs()),
                }
            }
        }
    }
}
