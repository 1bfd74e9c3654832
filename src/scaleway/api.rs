//! Wire types and HTTP plumbing for the Scaleway Instance API.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::image::{ImageRecord, ImageState};

use super::ScalewayImageError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub(super) const SCALEWAY_INSTANCE_API_BASE: &str = "https://api.scaleway.com/instance/v1";
pub(super) const IMAGES_PER_PAGE: usize = 100;
/// Upper bound on pages read for one listing.
const MAX_PAGES: u32 = 50;
const TOTAL_COUNT_HEADER: &str = "X-Total-Count";

pub(super) static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

#[derive(Clone, Debug, Deserialize)]
pub(super) struct ScalewayImage {
    pub(super) id: String,
    pub(super) state: String,
    #[serde(default)]
    pub(super) tags: Vec<String>,
    #[serde(default)]
    pub(super) arch: Option<String>,
    #[serde(default)]
    pub(super) root_volume: Option<RootVolume>,
}

#[derive(Clone, Debug, Deserialize)]
pub(super) struct RootVolume {
    pub(super) id: String,
    #[serde(default)]
    pub(super) volume_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ImageEnvelope {
    pub(super) image: ScalewayImage,
}

#[derive(Debug, Deserialize)]
pub(super) struct ImageList {
    #[serde(default)]
    pub(super) images: Vec<ScalewayImage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct TaskEnvelope {
    pub(super) task: Task,
}

#[derive(Debug, Deserialize)]
pub(super) struct Task {
    pub(super) id: String,
    #[serde(default)]
    pub(super) href_result: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(super) struct Snapshot {
    pub(super) id: String,
    pub(super) state: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct SnapshotEnvelope {
    pub(super) snapshot: Snapshot,
}

/// Body for `POST /servers/{id}/action` requesting a backup image.
#[derive(Debug, Serialize)]
pub(super) struct BackupAction<'a> {
    pub(super) action: &'static str,
    pub(super) name: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct UpdateImageTags {
    pub(super) tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ExportSnapshot<'a> {
    pub(super) bucket: &'a str,
    pub(super) key: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct ImportSnapshot<'a> {
    pub(super) name: &'a str,
    pub(super) project: &'a str,
    pub(super) bucket: &'a str,
    pub(super) key: &'a str,
    pub(super) volume_type: &'a str,
}

#[derive(Debug, Serialize)]
pub(super) struct CreateImage<'a> {
    pub(super) name: &'a str,
    pub(super) root_volume: &'a str,
    pub(super) arch: &'a str,
    pub(super) project: &'a str,
}

/// Maps Scaleway image states onto workflow states.
pub(super) fn image_state(raw: &str) -> ImageState {
    match raw {
        "creating" => ImageState::Pending,
        "available" => ImageState::Available,
        "error" => ImageState::Failed,
        other => ImageState::Other(other.to_owned()),
    }
}

/// Scaleway tags are flat strings; key/value pairs travel as `key=value`.
pub(super) fn encode_tags(tags: &BTreeMap<String, String>) -> Vec<String> {
    tags.iter().map(|(key, value)| format!("{key}={value}")).collect()
}

pub(super) fn decode_tags(tags: &[String]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|tag| match tag.split_once('=') {
            Some((key, value)) => (key.to_owned(), value.to_owned()),
            None => (tag.clone(), String::new()),
        })
        .collect()
}

/// Extracts the image id from a backup task's `href_result` (`/images/<id>`).
pub(super) fn image_id_from_href(href: &str) -> Option<&str> {
    href.rsplit_once("/images/")
        .map(|(_, id)| id.trim_end_matches('/'))
        .filter(|id| !id.is_empty() && !id.contains('/'))
}

impl From<ScalewayImage> for ImageRecord {
    fn from(value: ScalewayImage) -> Self {
        Self {
            state: image_state(&value.state),
            tags: decode_tags(&value.tags),
            image_id: value.id,
        }
    }
}

/// Sends `request` with the auth header and returns the status and body.
pub(super) async fn send(
    request: RequestBuilder,
    secret_key: &str,
) -> Result<(StatusCode, Vec<u8>), ScalewayImageError> {
    let response = request.header("X-Auth-Token", secret_key).send().await?;
    let status = response.status();
    let body = response.bytes().await?;
    Ok((status, body.to_vec()))
}

/// Like [`send`], but also returns the listing size from `X-Total-Count`.
pub(super) async fn send_counted(
    request: RequestBuilder,
    secret_key: &str,
) -> Result<(StatusCode, Option<usize>, Vec<u8>), ScalewayImageError> {
    let response = request.header("X-Auth-Token", secret_key).send().await?;
    let status = response.status();
    let total = response
        .headers()
        .get(TOTAL_COUNT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok());
    let body = response.bytes().await?;
    Ok((status, total, body.to_vec()))
}

/// One page of a listing and the total the API reported, if any.
pub(super) struct Page<T> {
    pub(super) items: Vec<T>,
    pub(super) total: Option<usize>,
}

/// Reads pages from 1 upwards until a short page or the reported total.
pub(super) async fn collect_pages<T, F, Fut>(
    operation: &'static str,
    per_page: usize,
    mut fetch: F,
) -> Result<Vec<T>, ScalewayImageError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Page<T>, ScalewayImageError>>,
{
    let mut items = Vec::new();
    for page in 1..=MAX_PAGES {
        let batch = fetch(page).await?;
        let received = batch.items.len();
        items.extend(batch.items);
        if received < per_page || batch.total.is_some_and(|total| items.len() >= total) {
            return Ok(items);
        }
    }
    Err(ScalewayImageError::UnexpectedResponse {
        operation,
        message: format!("listing did not end within {MAX_PAGES} pages"),
    })
}

/// Parses a success body, or turns any other status into an API error.
pub(super) fn parse<T: DeserializeOwned>(
    operation: &'static str,
    status: StatusCode,
    body: &[u8],
) -> Result<T, ScalewayImageError> {
    if !status.is_success() {
        return Err(ScalewayImageError::Api {
            operation,
            status: status.as_u16(),
            message: String::from_utf8_lossy(body).into_owned(),
        });
    }
    serde_json::from_slice(body).map_err(|err| ScalewayImageError::UnexpectedResponse {
        operation,
        message: err.to_string(),
    })
}
