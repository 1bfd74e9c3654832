//! Command-line interface definitions for the `imprint` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `imprint` binary.
#[derive(Debug, Parser)]
#[command(
    name = "imprint",
    about = "Snapshot a running Scaleway instance into an image, optionally copying it to another zone",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create an image from a running instance.
    #[command(
        name = "snapshot",
        about = "Create an image from a running instance without rebooting it"
    )]
    Snapshot(SnapshotCommand),
}

/// Arguments for the `imprint snapshot` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct SnapshotCommand {
    /// Identifier of the instance to snapshot.
    #[arg(value_name = "INSTANCE_ID")]
    pub(crate) instance_id: String,
    /// Zone to copy the finished image into.
    ///
    /// Defaults to the instance's own zone, in which case no copy is made.
    /// Copies between zones need `SCW_IMAGE_TRANSFER_BUCKET`.
    #[arg(long, value_name = "ZONE", env = "IMPRINT_TARGET_REGION")]
    pub(crate) target_region: Option<String>,
}
