//! Result payload returned by a successful run.

use serde::Serialize;

use super::replication::ReplicationOutcome;

/// Status code reported for every successful run, including degraded ones.
pub const SUCCESS_STATUS: &str = "200";

/// Summary of a successful run, serialised as a flat string map.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct WorkflowResult {
    /// Always [`SUCCESS_STATUS`].
    #[serde(rename = "statusCode")]
    pub status_code: String,
    /// Narrative of what happened.
    pub body: String,
    /// Identifier of the image created in the source region.
    #[serde(rename = "ami_id")]
    pub image_id: String,
    /// Region the instance lives in.
    pub source_region: String,
    /// Region replication was requested for.
    pub target_region: String,
}

impl WorkflowResult {
    /// Starts a builder for the image created in `source_region`.
    #[must_use]
    pub fn builder(
        image_id: impl Into<String>,
        source_region: impl Into<String>,
        target_region: impl Into<String>,
    ) -> WorkflowResultBuilder {
        WorkflowResultBuilder {
            image_id: image_id.into(),
            source_region: source_region.into(),
            target_region: target_region.into(),
            note: None,
        }
    }
}

/// Accumulates an optional degraded or informational note before building a
/// [`WorkflowResult`].
#[derive(Clone, Debug)]
pub struct WorkflowResultBuilder {
    image_id: String,
    source_region: String,
    target_region: String,
    note: Option<String>,
}

impl WorkflowResultBuilder {
    /// Records the replication outcome.
    #[must_use]
    pub fn replication(mut self, outcome: &ReplicationOutcome) -> Self {
        self.note = outcome.note();
        self
    }

    /// Builds the result.
    #[must_use]
    pub fn build(self) -> WorkflowResult {
        let created = format!(
            "Image {} created successfully in {}",
            self.image_id, self.source_region
        );
        let body = match self.note {
            Some(note) => format!("{created}; {note}"),
            None => created,
        };
        WorkflowResult {
            status_code: SUCCESS_STATUS.to_owned(),
            body,
            image_id: self.image_id,
            source_region: self.source_region,
            target_region: self.target_region,
        }
    }
}
