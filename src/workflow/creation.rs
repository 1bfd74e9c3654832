//! Requests a new image and drives it to a terminal state.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, error, info};

use crate::budget::{Clock, TimeBudget};
use crate::image::{CreateImageRequest, ImageService, ImageState};

use super::error::WorkflowError;

/// Name and description given to an image.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageLabel {
    /// Image name, unique per instance and second.
    pub name: String,
    /// Free-form description.
    pub description: String,
}

impl ImageLabel {
    /// Builds the label for an image of `instance_id` taken at `taken_at`.
    ///
    /// Both parts embed the instance and timestamp so repeated runs stay
    /// distinguishable in the provider console.
    #[must_use]
    pub fn for_instance(instance_id: &str, taken_at: DateTime<Utc>) -> Self {
        Self {
            name: format!(
                "imprint-{instance_id}-{}",
                taken_at.format("%Y%m%d-%H%M%S")
            ),
            description: format!(
                "Snapshot of {instance_id} taken at {}",
                taken_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
        }
    }
}

/// Image accepted by the provider but not yet known to be available.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PendingImage {
    /// Provider identifier of the new image.
    pub image_id: String,
    /// Label used when the image was requested.
    pub label: ImageLabel,
}

/// Creates an image of the instance and polls it until it settles.
pub struct ImageCreation<'a, S, C> {
    service: &'a S,
    budget: &'a TimeBudget<C>,
    instance_id: &'a str,
    check_interval: Duration,
}

impl<'a, S, C> ImageCreation<'a, S, C>
where
    S: ImageService,
    C: Clock,
{
    /// Creates the step for `instance_id` on the source-region service.
    #[must_use]
    pub const fn new(
        service: &'a S,
        budget: &'a TimeBudget<C>,
        instance_id: &'a str,
        check_interval: Duration,
    ) -> Self {
        Self {
            service,
            budget,
            instance_id,
            check_interval,
        }
    }

    /// Requests a new image without stopping the instance.
    ///
    /// Every call creates a fresh image; there is no idempotency token.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Provider`] when the service rejects the
    /// request.
    pub async fn create(&self) -> Result<PendingImage, WorkflowError<S::Error>> {
        let label = ImageLabel::for_instance(self.instance_id, Utc::now());
        let request =
            CreateImageRequest::new(self.instance_id, &label.name, &label.description);
        let image_id = self
            .service
            .create_image(&request)
            .await
            .map_err(WorkflowError::Provider)?;
        info!(
            instance_id = self.instance_id,
            image_id = %image_id,
            name = %label.name,
            "image creation requested"
        );
        Ok(PendingImage { image_id, label })
    }

    /// Polls `image_id` until it is available.
    ///
    /// Any state other than available or failed, including states the
    /// workflow does not recognise and images the service cannot see yet,
    /// counts as still in progress. Retries are bounded by the budget only.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::ImageCreationFailed`] when the image fails,
    /// [`WorkflowError::Timeout`] when the budget cannot cover another poll
    /// interval, and [`WorkflowError::Provider`] when a describe call fails.
    pub async fn await_available(&self, image_id: &str) -> Result<(), WorkflowError<S::Error>> {
        loop {
            let record = self
                .service
                .describe_image(image_id)
                .await
                .map_err(WorkflowError::Provider)?;

            match record.as_ref().map(|image| &image.state) {
                Some(ImageState::Available) => {
                    info!(image_id, "image is available");
                    return Ok(());
                }
                Some(ImageState::Failed) => {
                    error!(image_id, "image creation failed");
                    return Err(WorkflowError::ImageCreationFailed {
                        image_id: image_id.to_owned(),
                    });
                }
                Some(state) => debug!(image_id, state = %state, "image not ready"),
                None => debug!(image_id, "image not visible yet"),
            }

            if self.budget.remaining() < self.check_interval {
                return Err(WorkflowError::timeout(image_id));
            }
            self.budget.sleep(self.check_interval).await;
        }
    }
}
