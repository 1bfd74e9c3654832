//! Image service abstraction consumed by the snapshot workflow.
//!
//! A service is scoped to a single region. The workflow holds one for the
//! source region and, when replication is requested, another for the target.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Tag key whose value names the instance an image was taken from.
pub const SOURCE_INSTANCE_TAG: &str = "imprint-source-instance";

/// Image type used when listing images that can boot an instance.
pub const MACHINE_IMAGE_TYPE: &str = "machine";

/// Lifecycle state reported by the image service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ImageState {
    /// Image is still being produced.
    Pending,
    /// Image is complete and usable.
    Available,
    /// Image creation failed permanently.
    Failed,
    /// Any state the workflow does not recognise.
    Other(String),
}

impl ImageState {
    /// Returns `true` for states with no further automatic transition.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Available | Self::Failed)
    }

    /// Canonical lowercase label for the state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Available => "available",
            Self::Failed => "failed",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl From<&str> for ImageState {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "available" => Self::Available,
            "failed" => Self::Failed,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl fmt::Display for ImageState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Image as observed through the service. Read-only to the workflow.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ImageRecord {
    /// Provider identifier for the image.
    pub image_id: String,
    /// Current lifecycle state.
    pub state: ImageState,
    /// Key/value tags attached to the image.
    pub tags: BTreeMap<String, String>,
}

impl ImageRecord {
    /// Creates an untagged record.
    #[must_use]
    pub fn new(image_id: impl Into<String>, state: ImageState) -> Self {
        Self {
            image_id: image_id.into(),
            state,
            tags: BTreeMap::new(),
        }
    }

    /// Adds a tag to the record.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Returns the value of `key`, if present.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Returns `true` when the image was taken from `instance_id`.
    #[must_use]
    pub fn is_from_instance(&self, instance_id: &str) -> bool {
        self.tag(SOURCE_INSTANCE_TAG) == Some(instance_id)
    }
}

/// Criteria for listing images.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ImageFilter {
    /// Only return images in this state.
    pub state: Option<ImageState>,
    /// Only return images of this type (for example [`MACHINE_IMAGE_TYPE`]).
    pub image_type: Option<String>,
    /// Only return images tagged with this [`SOURCE_INSTANCE_TAG`] value.
    pub source_instance: Option<String>,
}

impl ImageFilter {
    /// Filter matching machine images that are still being produced.
    #[must_use]
    pub fn pending_machine_images() -> Self {
        Self {
            state: Some(ImageState::Pending),
            image_type: Some(MACHINE_IMAGE_TYPE.to_owned()),
            source_instance: None,
        }
    }

    /// Narrows the filter to images taken from `instance_id`.
    #[must_use]
    pub fn for_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.source_instance = Some(instance_id.into());
        self
    }

    /// Returns `true` when `record` satisfies the state criterion.
    ///
    /// Providers that cannot filter server-side use this to narrow results.
    #[must_use]
    pub fn matches_state(&self, record: &ImageRecord) -> bool {
        self.state
            .as_ref()
            .is_none_or(|wanted| *wanted == record.state)
    }

    /// Returns `true` when `record` satisfies the source instance criterion.
    #[must_use]
    pub fn matches_instance(&self, record: &ImageRecord) -> bool {
        self.source_instance
            .as_deref()
            .is_none_or(|instance_id| record.is_from_instance(instance_id))
    }
}

/// Request to create an image from a running instance.
///
/// Creation never stops or reboots the instance: [`Self::no_reboot`] is
/// always `true` and cannot be changed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CreateImageRequest {
    /// Source instance identifier.
    pub instance_id: String,
    /// Unique image name.
    pub name: String,
    /// Human readable description.
    pub description: String,
    /// Tags applied to the new image.
    pub tags: BTreeMap<String, String>,
}

impl CreateImageRequest {
    /// Builds a request tagged with [`SOURCE_INSTANCE_TAG`].
    #[must_use]
    pub fn new(
        instance_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        let instance = instance_id.into();
        let mut tags = BTreeMap::new();
        tags.insert(SOURCE_INSTANCE_TAG.to_owned(), instance.clone());
        Self {
            instance_id: instance,
            name: name.into(),
            description: description.into(),
            tags,
        }
    }

    /// Whether the instance may keep running during creation. Always `true`.
    #[must_use]
    pub const fn no_reboot(&self) -> bool {
        true
    }
}

/// Request to copy an image between regions.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CopyImageRequest {
    /// Image to copy.
    pub source_image_id: String,
    /// Region holding the source image.
    pub source_region: String,
    /// Region receiving the copy.
    pub target_region: String,
    /// Name for the copy.
    pub name: String,
    /// Description for the copy.
    pub description: String,
    /// Longest the copy may take before the caller gives up on it.
    pub time_limit: Duration,
}

/// Future returned by image service operations.
pub type ImageFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Region-scoped client for a provider's machine image API.
pub trait ImageService: Send + Sync {
    /// Provider specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Region this client talks to.
    fn region(&self) -> &str;

    /// Lists images matching `filter`.
    fn list_images<'a>(
        &'a self,
        filter: &'a ImageFilter,
    ) -> ImageFuture<'a, Vec<ImageRecord>, Self::Error>;

    /// Requests a new image and returns its identifier.
    fn create_image<'a>(
        &'a self,
        request: &'a CreateImageRequest,
    ) -> ImageFuture<'a, String, Self::Error>;

    /// Describes an image, returning `None` when the provider does not know it.
    fn describe_image<'a>(
        &'a self,
        image_id: &'a str,
    ) -> ImageFuture<'a, Option<ImageRecord>, Self::Error>;

    /// Copies an image into this client's region and returns the new id.
    fn copy_image<'a>(
        &'a self,
        request: &'a CopyImageRequest,
    ) -> ImageFuture<'a, String, Self::Error>;
}
