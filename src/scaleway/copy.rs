//! Cross-zone image copy.
//!
//! Scaleway has no direct image copy between zones. The root snapshot of the
//! source image is exported to Object Storage, imported as a snapshot in the
//! target zone, and registered there as a new image. Export and import share
//! one deadline derived from the request's time limit.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, info};
use uuid::Uuid;

use crate::image::CopyImageRequest;

use super::api::{
    CreateImage, ExportSnapshot, HTTP_CLIENT, ImageEnvelope, ImportSnapshot, Snapshot,
    SnapshotEnvelope, parse, send,
};
use super::{ScalewayImageError, ScalewayImageService};

const DEFAULT_VOLUME_TYPE: &str = "l_ssd";
const DEFAULT_ARCH: &str = "x86_64";

/// Object key used to stage an exported snapshot.
fn export_key(image_name: &str) -> String {
    format!("imprint/{image_name}-{}.qcow2", Uuid::new_v4().simple())
}

/// Time left before `deadline`, or a timeout naming the stalled step.
fn time_left(
    deadline: Instant,
    action: &str,
    subject: &str,
) -> Result<Duration, ScalewayImageError> {
    let left = deadline.saturating_duration_since(Instant::now());
    if left.is_zero() {
        return Err(ScalewayImageError::Timeout {
            action: action.to_owned(),
            snapshot_id: subject.to_owned(),
        });
    }
    Ok(left)
}

impl ScalewayImageService {
    /// Copies `request.source_image_id` from its zone into this service's
    /// zone and returns the new image identifier.
    pub(super) async fn copy_from(
        &self,
        request: &CopyImageRequest,
    ) -> Result<String, ScalewayImageError> {
        let bucket = self.config.transfer_bucket().map(str::to_owned).ok_or_else(|| {
            ScalewayImageError::CopyUnavailable {
                target_zone: self.zone.clone(),
            }
        })?;
        let source = self.for_zone(&request.source_region);
        let deadline = Instant::now() + request.time_limit.min(self.copy_timeout);

        time_left(deadline, "copy", &request.source_image_id)?;
        let image = source
            .fetch_image(&request.source_image_id)
            .await?
            .ok_or_else(|| ScalewayImageError::UnexpectedResponse {
                operation: "copy image",
                message: format!(
                    "image {} not found in {}",
                    request.source_image_id, request.source_region
                ),
            })?;
        let root_volume = image
            .root_volume
            .ok_or_else(|| ScalewayImageError::UnexpectedResponse {
                operation: "copy image",
                message: format!("image {} has no root volume", request.source_image_id),
            })?;
        let volume_type = root_volume
            .volume_type
            .as_deref()
            .unwrap_or(DEFAULT_VOLUME_TYPE);
        let arch = image.arch.as_deref().unwrap_or(DEFAULT_ARCH);

        let key = export_key(&request.name);
        source
            .export_snapshot(&root_volume.id, &bucket, &key, deadline)
            .await?;
        source
            .wait_for_snapshot(&root_volume.id, "export", deadline)
            .await?;
        debug!(snapshot_id = %root_volume.id, bucket = %bucket, key = %key, "snapshot exported");

        let imported = self
            .import_snapshot(&request.name, &bucket, &key, volume_type, deadline)
            .await?;
        self.wait_for_snapshot(&imported.id, "import", deadline).await?;

        let image_id = self
            .register_image(&request.name, &imported.id, arch, deadline)
            .await?;
        info!(
            source_image_id = %request.source_image_id,
            image_id = %image_id,
            source_zone = %request.source_region,
            target_zone = %self.zone,
            "image copied"
        );
        Ok(image_id)
    }

    async fn export_snapshot(
        &self,
        snapshot_id: &str,
        bucket: &str,
        key: &str,
        deadline: Instant,
    ) -> Result<(), ScalewayImageError> {
        let left = time_left(deadline, "export", snapshot_id)?;
        let url = self.zone_url(&format!("snapshots/{snapshot_id}/export"));
        let body = ExportSnapshot { bucket, key };
        let request = HTTP_CLIENT.post(url).json(&body).timeout(left);
        let (status, response) = send(request, &self.config.secret_key).await?;
        let _: serde_json::Value = parse("export snapshot", status, &response)?;
        Ok(())
    }

    async fn import_snapshot(
        &self,
        name: &str,
        bucket: &str,
        key: &str,
        volume_type: &str,
        deadline: Instant,
    ) -> Result<Snapshot, ScalewayImageError> {
        let left = time_left(deadline, "import", key)?;
        let body = ImportSnapshot {
            name,
            project: &self.config.default_project_id,
            bucket,
            key,
            volume_type,
        };
        let request = HTTP_CLIENT
            .post(self.zone_url("snapshots"))
            .json(&body)
            .timeout(left);
        let (status, response) = send(request, &self.config.secret_key).await?;
        let envelope: SnapshotEnvelope = parse("import snapshot", status, &response)?;
        Ok(envelope.snapshot)
    }

    async fn fetch_snapshot(
        &self,
        snapshot_id: &str,
        left: Duration,
    ) -> Result<Snapshot, ScalewayImageError> {
        let url = self.zone_url(&format!("snapshots/{snapshot_id}"));
        let request = HTTP_CLIENT.get(url).timeout(left);
        let (status, response) = send(request, &self.config.secret_key).await?;
        let envelope: SnapshotEnvelope = parse("describe snapshot", status, &response)?;
        Ok(envelope.snapshot)
    }

    async fn wait_for_snapshot(
        &self,
        snapshot_id: &str,
        action: &str,
        deadline: Instant,
    ) -> Result<(), ScalewayImageError> {
        loop {
            let left = time_left(deadline, action, snapshot_id)?;
            let snapshot = self.fetch_snapshot(snapshot_id, left).await?;
            match snapshot.state.as_str() {
                "available" => return Ok(()),
                "error" | "invalid_data" => {
                    return Err(ScalewayImageError::SnapshotFailed {
                        snapshot_id: snapshot.id,
                        zone: self.zone.clone(),
                        state: snapshot.state,
                    });
                }
                _ => {
                    let left = time_left(deadline, action, snapshot_id)?;
                    sleep(self.poll_interval.min(left)).await;
                }
            }
        }
    }

    async fn register_image(
        &self,
        name: &str,
        snapshot_id: &str,
        arch: &str,
        deadline: Instant,
    ) -> Result<String, ScalewayImageError> {
        let left = time_left(deadline, "register", snapshot_id)?;
        let body = CreateImage {
            name,
            root_volume: snapshot_id,
            arch,
            project: &self.config.default_project_id,
        };
        let request = HTTP_CLIENT
            .post(self.zone_url("images"))
            .json(&body)
            .timeout(left);
        let (status, response) = send(request, &self.config.secret_key).await?;
        let envelope: ImageEnvelope = parse("register image", status, &response)?;
        Ok(envelope.image.id)
    }
}
