//! Test support utilities shared across unit and integration tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;

use crate::budget::{Clock, SleepFuture};
use crate::image::{
    CopyImageRequest, CreateImageRequest, ImageFilter, ImageFuture, ImageRecord, ImageService,
    ImageState,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Virtual clock: sleeping advances time instantly and is recorded.
#[derive(Clone, Debug, Default)]
pub struct FakeClock {
    state: Arc<Mutex<FakeClockState>>,
}

#[derive(Debug, Default)]
struct FakeClockState {
    now: Duration,
    sleeps: Vec<Duration>,
}

impl FakeClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        lock(&self.state).now += duration;
    }

    /// Every sleep requested so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.state).sleeps.clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        lock(&self.state).now
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        {
            let mut state = lock(&self.state);
            state.now += duration;
            state.sleeps.push(duration);
        }
        Box::pin(std::future::ready(()))
    }
}

/// Error returned by [`ScriptedImageService`] when a call is scripted to fail.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ScriptedServiceError {
    /// The provider rejected the call.
    #[error("{0}")]
    Rejected(String),
}

impl ScriptedServiceError {
    /// Convenience constructor.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

type Scripted<T> = VecDeque<Result<T, ScriptedServiceError>>;

#[derive(Debug, Default)]
struct ServiceState {
    list_responses: Scripted<Vec<ImageRecord>>,
    create_responses: Scripted<String>,
    describe_responses: Scripted<Option<ImageRecord>>,
    copy_responses: Scripted<String>,
    list_filters: Vec<ImageFilter>,
    describe_calls: usize,
    create_requests: Vec<CreateImageRequest>,
    copy_requests: Vec<CopyImageRequest>,
    call_cost: Option<(FakeClock, Duration)>,
    copy_delay: Option<Duration>,
}

/// Image service double that replays queued responses in FIFO order.
///
/// Unscripted calls fall back to benign defaults: no pending images, a
/// generated image id, an available image, and a generated copy id.
#[derive(Clone, Debug)]
pub struct ScriptedImageService {
    region: String,
    state: Arc<Mutex<ServiceState>>,
}

impl ScriptedImageService {
    /// Creates a service for `region` with nothing queued.
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            state: Arc::new(Mutex::new(ServiceState::default())),
        }
    }

    /// Makes every call advance `clock` by `cost`, simulating network latency.
    pub fn charge_calls_to(&self, clock: &FakeClock, cost: Duration) {
        lock(&self.state).call_cost = Some((clock.clone(), cost));
    }

    /// Makes every copy wait `delay` on the Tokio timer before answering.
    pub fn delay_copies(&self, delay: Duration) {
        lock(&self.state).copy_delay = Some(delay);
    }

    /// Queues a list response.
    pub fn push_list(&self, images: Vec<ImageRecord>) {
        lock(&self.state).list_responses.push_back(Ok(images));
    }

    /// Queues a list failure.
    pub fn push_list_error(&self, message: &str) {
        lock(&self.state)
            .list_responses
            .push_back(Err(ScriptedServiceError::rejected(message)));
    }

    /// Queues a create response.
    pub fn push_create(&self, image_id: &str) {
        lock(&self.state)
            .create_responses
            .push_back(Ok(image_id.to_owned()));
    }

    /// Queues a create failure.
    pub fn push_create_error(&self, message: &str) {
        lock(&self.state)
            .create_responses
            .push_back(Err(ScriptedServiceError::rejected(message)));
    }

    /// Queues a describe response reporting `state` for `image_id`.
    pub fn push_describe(&self, image_id: &str, state: ImageState) {
        lock(&self.state)
            .describe_responses
            .push_back(Ok(Some(ImageRecord::new(image_id, state))));
    }

    /// Queues a describe response for an image the provider cannot see.
    pub fn push_describe_missing(&self) {
        lock(&self.state).describe_responses.push_back(Ok(None));
    }

    /// Queues a describe failure.
    pub fn push_describe_error(&self, message: &str) {
        lock(&self.state)
            .describe_responses
            .push_back(Err(ScriptedServiceError::rejected(message)));
    }

    /// Queues a copy response.
    pub fn push_copy(&self, image_id: &str) {
        lock(&self.state)
            .copy_responses
            .push_back(Ok(image_id.to_owned()));
    }

    /// Queues a copy failure.
    pub fn push_copy_error(&self, message: &str) {
        lock(&self.state)
            .copy_responses
            .push_back(Err(ScriptedServiceError::rejected(message)));
    }

    /// Number of list calls made.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        lock(&self.state).list_filters.len()
    }

    /// Filters passed to list calls, in order.
    #[must_use]
    pub fn list_filters(&self) -> Vec<ImageFilter> {
        lock(&self.state).list_filters.clone()
    }

    /// Number of describe calls made.
    #[must_use]
    pub fn describe_calls(&self) -> usize {
        lock(&self.state).describe_calls
    }

    /// Create requests received, in order.
    #[must_use]
    pub fn create_requests(&self) -> Vec<CreateImageRequest> {
        lock(&self.state).create_requests.clone()
    }

    /// Copy requests received, in order.
    #[must_use]
    pub fn copy_requests(&self) -> Vec<CopyImageRequest> {
        lock(&self.state).copy_requests.clone()
    }

    /// Total number of calls of any kind.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        let state = lock(&self.state);
        state.list_filters.len()
            + state.describe_calls
            + state.create_requests.len()
            + state.copy_requests.len()
    }

    fn charge(state: &ServiceState) {
        if let Some((clock, cost)) = &state.call_cost {
            clock.advance(*cost);
        }
    }
}

impl ImageService for ScriptedImageService {
    type Error = ScriptedServiceError;

    fn region(&self) -> &str {
        &self.region
    }

    fn list_images<'a>(
        &'a self,
        filter: &'a ImageFilter,
    ) -> ImageFuture<'a, Vec<ImageRecord>, Self::Error> {
        let result = {
            let mut state = lock(&self.state);
            state.list_filters.push(filter.clone());
            Self::charge(&state);
            state.list_responses.pop_front().unwrap_or(Ok(Vec::new()))
        };
        Box::pin(std::future::ready(result))
    }

    fn create_image<'a>(
        &'a self,
        request: &'a CreateImageRequest,
    ) -> ImageFuture<'a, String, Self::Error> {
        let result = {
            let mut state = lock(&self.state);
            state.create_requests.push(request.clone());
            Self::charge(&state);
            let fallback = format!("img-{}", state.create_requests.len());
            state.create_responses.pop_front().unwrap_or(Ok(fallback))
        };
        Box::pin(std::future::ready(result))
    }

    fn describe_image<'a>(
        &'a self,
        image_id: &'a str,
    ) -> ImageFuture<'a, Option<ImageRecord>, Self::Error> {
        let result = {
            let mut state = lock(&self.state);
            state.describe_calls += 1;
            Self::charge(&state);
            state
                .describe_responses
                .pop_front()
                .unwrap_or_else(|| Ok(Some(ImageRecord::new(image_id, ImageState::Available))))
        };
        Box::pin(std::future::ready(result))
    }

    fn copy_image<'a>(
        &'a self,
        request: &'a CopyImageRequest,
    ) -> ImageFuture<'a, String, Self::Error> {
        let (result, delay) = {
            let mut state = lock(&self.state);
            state.copy_requests.push(request.clone());
            Self::charge(&state);
            let fallback = format!("img-copy-{}", state.copy_requests.len());
            let result = state.copy_responses.pop_front().unwrap_or(Ok(fallback));
            (result, state.copy_delay)
        };
        match delay {
            Some(delay) => Box::pin(async move {
                tokio::time::sleep(delay).await;
                result
            }),
            None => Box::pin(std::future::ready(result)),
        }
    }
}
