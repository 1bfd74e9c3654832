//! Unit tests for the snapshot workflow stages.

use std::time::Duration;

use crate::budget::TimeBudget;
use crate::image::{ImageRecord, ImageState, SOURCE_INSTANCE_TAG};
use crate::test_support::FakeClock;

mod guard;

const SOURCE_REGION: &str = "fr-par-1";
const TARGET_REGION: &str = "nl-ams-1";
const INSTANCE_ID: &str = "i-0123456789";
const INTERVAL: Duration = Duration::from_secs(30);

fn budget(clock: &FakeClock, max_secs: u64) -> TimeBudget<FakeClock> {
    TimeBudget::start(clock.clone(), Duration::from_secs(max_secs))
}

fn pending_for(image_id: &str, instance_id: &str) -> ImageRecord {
    ImageRecord::new(image_id, ImageState::Pending).with_tag(SOURCE_INSTANCE_TAG, instance_id)
}

fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().copied().map(Duration::from_secs).collect()
}
