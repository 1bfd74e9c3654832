//! Validated input for a snapshot run.

use super::error::RequestError;

/// Instance to snapshot and the optional region to replicate into.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotRequest {
    instance_id: String,
    target_region: Option<String>,
}

impl SnapshotRequest {
    /// Starts a builder for a [`SnapshotRequest`].
    #[must_use]
    pub fn builder() -> SnapshotRequestBuilder {
        SnapshotRequestBuilder::default()
    }

    /// Builds a request from raw strings.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when `instance_id` is blank.
    pub fn new(
        instance_id: impl Into<String>,
        target_region: Option<String>,
    ) -> Result<Self, RequestError> {
        Self::builder()
            .instance_id(instance_id)
            .target_region(target_region)
            .build()
    }

    /// Identifier of the instance to snapshot.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Requested replication region, if any.
    #[must_use]
    pub fn target_region(&self) -> Option<&str> {
        self.target_region.as_deref()
    }
}

/// Builder for [`SnapshotRequest`] that trims input and validates on build.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SnapshotRequestBuilder {
    instance_id: String,
    target_region: Option<String>,
}

impl SnapshotRequestBuilder {
    /// Sets the instance identifier.
    #[must_use]
    pub fn instance_id(mut self, value: impl Into<String>) -> Self {
        self.instance_id = value.into();
        self
    }

    /// Sets the replication region. Blank values mean "no replication".
    #[must_use]
    pub fn target_region(mut self, value: Option<String>) -> Self {
        self.target_region = value;
        self
    }

    /// Builds and validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Validation`] when `instance_id` is blank.
    pub fn build(self) -> Result<SnapshotRequest, RequestError> {
        let instance_id = self.instance_id.trim().to_owned();
        if instance_id.is_empty() {
            return Err(RequestError::Validation(String::from("instance_id")));
        }
        let target_region = self
            .target_region
            .map(|region| region.trim().to_owned())
            .filter(|region| !region.is_empty());
        Ok(SnapshotRequest {
            instance_id,
            target_region,
        })
    }
}
