//! Core library for the Imprint snapshot tool.
//!
//! The crate captures a running instance as a machine image without rebooting
//! it, waits for the image to become usable, and optionally copies it to a
//! second region. Every wait shares a single [`TimeBudget`] so a run ends on
//! its own before the host environment's execution ceiling.
//!
//! Provider access sits behind the [`ImageService`] trait; the Scaleway
//! implementation lives in [`scaleway`].

pub mod budget;
pub mod config;
pub mod image;
pub mod scaleway;
pub mod test_support;
pub mod workflow;

pub use budget::{Clock, TimeBudget, TokioClock};
pub use config::{ConfigError, ScalewayConfig, WorkflowConfig};
pub use image::{
    CopyImageRequest, CreateImageRequest, ImageFilter, ImageRecord, ImageService, ImageState,
    SOURCE_INSTANCE_TAG,
};
pub use scaleway::{ScalewayImageError, ScalewayImageService};
pub use workflow::{
    ExistingOperationGuard, ImageCreation, ImageWorkflow, ReplicationOutcome, ReplicationStep,
    RequestError, SnapshotRequest, WorkflowError, WorkflowResult,
};
