//! Waits out image operations already running for the same instance.
//!
//! The check is best-effort: another caller can start an image between the
//! final list call and our own create call. Nothing here closes that window.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::budget::{Clock, TimeBudget};
use crate::image::{ImageFilter, ImageService};

/// Blocks new work while a pending image for the instance exists.
pub struct ExistingOperationGuard<'a, S, C> {
    service: &'a S,
    budget: &'a TimeBudget<C>,
    instance_id: &'a str,
    check_interval: Duration,
}

impl<'a, S, C> ExistingOperationGuard<'a, S, C>
where
    S: ImageService,
    C: Clock,
{
    /// Creates a guard for `instance_id` on the source-region service.
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

    /// Returns `true` once no pending image is tagged with the instance, or
    /// `false` when the budget drops to the poll interval first. Callers must
    /// treat `false` as a timeout.
    ///
    /// # Errors
    ///
    /// Propagates image service failures unchanged.
    pub async fn wait_for_clear(&self) -> Result<bool, S::Error> {
        let filter = ImageFilter::pending_machine_images().for_instance(self.instance_id);
        while self.budget.remaining() > self.check_interval {
            let images = self.service.list_images(&filter).await?;
            let Some(existing) = images
                .iter()
                .find(|image| image.is_from_instance(self.instance_id))
            else {
                debug!(instance_id = self.instance_id, "no image operation in progress");
                return Ok(true);
            };

            let wait = self.check_interval.min(self.budget.remaining());
            info!(
                instance_id = self.instance_id,
                image_id = %existing.image_id,
                wait_secs = wait.as_secs(),
                "image operation already in progress for instance; waiting"
            );
            self.budget.sleep(wait).await;
        }

        warn!(
            instance_id = self.instance_id,
            remaining_secs = self.budget.remaining().as_secs(),
            "budget exhausted waiting for existing image operation"
        );
        Ok(false)
    }
}
