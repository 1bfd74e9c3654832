//! Scaleway implementation of the image service.
//!
//! Images are created with the Instance API `backup` action, which snapshots
//! every volume of a running server without stopping it. Cross-zone copies go
//! through Object Storage.

mod api;
mod copy;
mod error;

use std::time::Duration;

use reqwest::StatusCode;
use scaleway_rs::ScalewayApi;
use tracing::{debug, info, warn};

use crate::config::ScalewayConfig;
use crate::image::{
    CopyImageRequest, CreateImageRequest, ImageFilter, ImageFuture, ImageRecord, ImageService,
    SOURCE_INSTANCE_TAG,
};
use api::{
    BackupAction, HTTP_CLIENT, IMAGES_PER_PAGE, ImageEnvelope, ImageList, Page,
    SCALEWAY_INSTANCE_API_BASE, TaskEnvelope, UpdateImageTags, collect_pages, encode_tags,
    image_id_from_href, parse, send, send_counted,
};

pub use error::ScalewayImageError;

const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Ceiling on a whole cross-zone copy, whatever the caller allows.
const COPY_TIMEOUT: Duration = Duration::from_secs(90);

/// Image service bound to one Scaleway zone.
#[derive(Clone)]
pub struct ScalewayImageService {
    api: ScalewayApi,
    config: ScalewayConfig,
    zone: String,
    poll_interval: Duration,
    copy_timeout: Duration,
}

impl ScalewayImageService {
    /// Constructs a service for the configured default zone.
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayImageError::Config`] when the configuration fails
    /// validation.
    pub fn new(config: ScalewayConfig) -> Result<Self, ScalewayImageError> {
        config.validate()?;
        Ok(Self {
            api: ScalewayApi::new(&config.secret_key),
            zone: config.default_zone.trim().to_owned(),
            config,
            poll_interval: POLL_INTERVAL,
            copy_timeout: COPY_TIMEOUT,
        })
    }

    /// Returns a service sharing these credentials but bound to `zone`.
    #[must_use]
    pub fn for_zone(&self, zone: &str) -> Self {
        Self {
            zone: zone.trim().to_owned(),
            ..self.clone()
        }
    }

    /// Zone this service operates in.
    #[must_use]
    pub fn zone(&self) -> &str {
        &self.zone
    }

    fn zone_url(&self, path: &str) -> String {
        format!("{SCALEWAY_INSTANCE_API_BASE}/zones/{}/{path}", self.zone)
    }

    /// Query for one page of private project images matching `filter`.
    fn list_query(&self, filter: &ImageFilter, page: u32) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("public", String::from("false")),
            ("project", self.config.default_project_id.clone()),
            ("per_page", IMAGES_PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        if let Some(instance_id) = &filter.source_instance {
            query.push(("tags", format!("{SOURCE_INSTANCE_TAG}={instance_id}")));
        }
        query
    }

    async fn fetch_images(
        &self,
        filter: &ImageFilter,
    ) -> Result<Vec<ImageRecord>, ScalewayImageError> {
        let url = self.zone_url("images");
        let secret_key = self.config.secret_key.as_str();
        let images = collect_pages("list images", IMAGES_PER_PAGE, |page| {
            let request = HTTP_CLIENT.get(&url).query(&self.list_query(filter, page));
            async move {
                let (status, total, body) = send_counted(request, secret_key).await?;
                let list: ImageList = parse("list images", status, &body)?;
                Ok(Page {
                    items: list.images,
                    total,
                })
            }
        })
        .await?;
        Ok(images.into_iter().map(ImageRecord::from).collect())
    }

    async fn start_backup(
        &self,
        request: &CreateImageRequest,
    ) -> Result<String, ScalewayImageError> {
        let instance = self
            .api
            .get_instance_async(&self.zone, &request.instance_id)
            .await?;
        let root_volume = instance.volumes.volumes.get("0").ok_or_else(|| {
            ScalewayImageError::UnexpectedResponse {
                operation: "create image",
                message: format!("instance {} has no root volume", request.instance_id),
            }
        })?;
        debug!(
            instance_id = %request.instance_id,
            root_volume_id = %root_volume.id,
            no_reboot = request.no_reboot(),
            "requesting backup"
        );

        let url = self.zone_url(&format!("servers/{}/action", request.instance_id));
        let action = BackupAction {
            action: "backup",
            name: &request.name,
        };
        let (status, body) =
            send(HTTP_CLIENT.post(url).json(&action), &self.config.secret_key).await?;
        let envelope: TaskEnvelope = parse("create image", status, &body)?;

        envelope
            .task
            .href_result
            .as_deref()
            .and_then(image_id_from_href)
            .map(str::to_owned)
            .ok_or_else(|| ScalewayImageError::UnexpectedResponse {
                operation: "create image",
                message: format!("backup task {} did not report an image", envelope.task.id),
            })
    }

    async fn tag_image(
        &self,
        image_id: &str,
        request: &CreateImageRequest,
    ) -> Result<(), ScalewayImageError> {
        let update = UpdateImageTags {
            tags: encode_tags(&request.tags),
        };
        let url = self.zone_url(&format!("images/{image_id}"));
        let (status, body) =
            send(HTTP_CLIENT.patch(url).json(&update), &self.config.secret_key).await?;
        let _: ImageEnvelope = parse("tag image", status, &body)?;
        Ok(())
    }

    async fn fetch_image(
        &self,
        image_id: &str,
    ) -> Result<Option<api::ScalewayImage>, ScalewayImageError> {
        let url = self.zone_url(&format!("images/{image_id}"));
        let (status, body) = send(HTTP_CLIENT.get(url), &self.config.secret_key).await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: ImageEnvelope = parse("describe image", status, &body)?;
        Ok(Some(envelope.image))
    }
}

/// The backup already exists once tagging runs, so a tagging failure is
/// logged with the image id and the id is still returned.
fn keep_backup(image_id: String, tagged: Result<(), ScalewayImageError>) -> String {
    if let Err(err) = tagged {
        warn!(
            image_id = %image_id,
            error = %err,
            "failed to tag backup image; it will not be seen by the in-progress check"
        );
    }
    image_id
}

impl ImageService for ScalewayImageService {
    type Error = ScalewayImageError;

    fn region(&self) -> &str {
        &self.zone
    }

    fn list_images<'a>(
        &'a self,
        filter: &'a ImageFilter,
    ) -> ImageFuture<'a, Vec<ImageRecord>, Self::Error> {
        // Every Scaleway instance image is bootable, so the image type needs
        // no filtering. The API has no state filter.
        Box::pin(async move {
            let images = self.fetch_images(filter).await?;
            Ok(images
                .into_iter()
                .filter(|image| filter.matches_state(image) && filter.matches_instance(image))
                .collect())
        })
    }

    fn create_image<'a>(
        &'a self,
        request: &'a CreateImageRequest,
    ) -> ImageFuture<'a, String, Self::Error> {
        Box::pin(async move {
            let image_id = self.start_backup(request).await?;
            let tagged = self.tag_image(&image_id, request).await;
            let image_id = keep_backup(image_id, tagged);
            info!(
                image_id = %image_id,
                instance_id = %request.instance_id,
                zone = %self.zone,
                "backup image requested"
            );
            Ok(image_id)
        })
    }

    fn describe_image<'a>(
        &'a self,
        image_id: &'a str,
    ) -> ImageFuture<'a, Option<ImageRecord>, Self::Error> {
        Box::pin(async move { Ok(self.fetch_image(image_id).await?.map(ImageRecord::from)) })
    }

    fn copy_image<'a>(
        &'a self,
        request: &'a CopyImageRequest,
    ) -> ImageFuture<'a, String, Self::Error> {
        Box::pin(async move { self.copy_from(request).await })
    }
}
