//! Snapshot workflow: wait for a clear slot, create an image, wait for it to
//! become available, and optionally copy it to another region.
//!
//! Every stage shares one [`TimeBudget`] and consults it before each wait, so
//! the run ends on its own before the hosting environment's ceiling.

use tracing::{error, info};

use crate::budget::{Clock, TimeBudget, TokioClock};
use crate::config::WorkflowConfig;
use crate::image::ImageService;

mod creation;
mod error;
mod guard;
mod replication;
mod request;
mod result;

pub use creation::{ImageCreation, ImageLabel, PendingImage};
pub use error::{RequestError, WorkflowError};
pub use guard::ExistingOperationGuard;
pub use replication::{ReplicationOutcome, ReplicationStep};
pub use request::{SnapshotRequest, SnapshotRequestBuilder};
pub use result::{SUCCESS_STATUS, WorkflowResult, WorkflowResultBuilder};

/// Label used for the timeout raised when an existing operation never clears.
pub const EXISTING_OPERATION: &str = "existing operation";

/// Single-use controller for one snapshot run.
///
/// [`Self::run`] consumes the workflow, so each instance runs at most once.
#[derive(Debug)]
pub struct ImageWorkflow<S, C = TokioClock> {
    config: WorkflowConfig,
    request: SnapshotRequest,
    source: S,
    replica: Option<S>,
    clock: C,
}

impl<S: ImageService> ImageWorkflow<S, TokioClock> {
    /// Creates a workflow driven by the Tokio clock.
    #[must_use]
    pub fn new(config: WorkflowConfig, request: SnapshotRequest, source: S) -> Self {
        Self {
            config,
            request,
            source,
            replica: None,
            clock: TokioClock::new(),
        }
    }
}

impl<S, C> ImageWorkflow<S, C>
where
    S: ImageService,
    C: Clock,
{
    /// Replaces the clock, typically with a virtual one in tests.
    #[must_use]
    pub fn with_clock<D: Clock>(self, clock: D) -> ImageWorkflow<S, D> {
        ImageWorkflow {
            config: self.config,
            request: self.request,
            source: self.source,
            replica: self.replica,
            clock,
        }
    }

    /// Supplies the client for the target region.
    #[must_use]
    pub fn with_replica_service(mut self, replica: S) -> Self {
        self.replica = Some(replica);
        self
    }

    /// Region of the source instance, as reported by its client.
    #[must_use]
    pub fn source_region(&self) -> &str {
        self.source.region()
    }

    /// Region replication targets; the source region when none was requested.
    #[must_use]
    pub fn target_region(&self) -> &str {
        self.request
            .target_region()
            .unwrap_or_else(|| self.source.region())
    }

    /// Runs the workflow to completion.
    ///
    /// Elapsed time is logged exactly once when the run ends, whatever the
    /// outcome.
    ///
    /// # Errors
    ///
    /// Returns [`WorkflowError::Timeout`] when the budget runs out while
    /// waiting, [`WorkflowError::ImageCreationFailed`] when the provider fails
    /// the image, and [`WorkflowError::Provider`] for provider errors outside
    /// replication.
    pub async fn run(self) -> Result<WorkflowResult, WorkflowError<S::Error>> {
        let budget = TimeBudget::start(&self.clock, self.config.max_duration());
        let outcome = self.execute(&budget).await;

        if let Err(err) = &outcome {
            error!(
                instance_id = self.request.instance_id(),
                kind = err.kind(),
                error = %err,
                "snapshot workflow failed"
            );
        }
        info!(
            instance_id = self.request.instance_id(),
            elapsed_secs = budget.elapsed().as_secs(),
            succeeded = outcome.is_ok(),
            "snapshot workflow finished"
        );
        outcome
    }

    async fn execute<B: Clock>(
        &self,
        budget: &TimeBudget<B>,
    ) -> Result<WorkflowResult, WorkflowError<S::Error>> {
        let instance_id = self.request.instance_id();
        let source_region = self.source_region();
        let target_region = self.target_region();
        let interval = self.config.check_interval();
        info!(
            instance_id,
            source_region,
            target_region,
            max_duration_secs = budget.max_duration().as_secs(),
            "starting snapshot workflow"
        );

        let guard = ExistingOperationGuard::new(&self.source, budget, instance_id, interval);
        let clear = guard
            .wait_for_clear()
            .await
            .map_err(WorkflowError::Provider)?;
        if !clear {
            return Err(WorkflowError::timeout(EXISTING_OPERATION));
        }

        let creation = ImageCreation::new(&self.source, budget, instance_id, interval);
        let image = creation.create().await?;
        creation.await_available(&image.image_id).await?;

        let replication = ReplicationStep::new(
            self.replica.as_ref(),
            budget,
            source_region,
            target_region,
            self.config.replication_min_remaining(),
        );
        let outcome = replication.maybe_replicate(&image).await;

        Ok(
            WorkflowResult::builder(&image.image_id, source_region, target_region)
                .replication(&outcome)
                .build(),
        )
    }
}

#[cfg(test)]
mod tests;
