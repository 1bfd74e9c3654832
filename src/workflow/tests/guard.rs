//! Tests for the existing-operation guard.

use std::time::Duration;

use super::{INSTANCE_ID, INTERVAL, SOURCE_REGION, budget, pending_for, secs};
use crate::image::ImageFilter;
use crate::test_support::{FakeClock, ScriptedImageService, ScriptedServiceError};
use crate::workflow::ExistingOperationGuard;

#[tokio::test]
async fn clear_without_sleeping_when_nothing_is_pending() {
    let clock = FakeClock::new();
    let budget = budget(&clock, 840);
    let service = ScriptedImageService::new(SOURCE_REGION);
    service.push_list(Vec::new());

    let guard = ExistingOperationGuard::new(&service, &budget, INSTANCE_ID, INTERVAL);
    let clear = guard.wait_for_clear().await.expect("list should succeed");

    assert!(clear);
    assert!(clock.sleeps().is_empty());
    assert_eq!(service.list_calls(), 1);
    assert_eq!(
        service.list_filters(),
        vec![ImageFilter::pending_machine_images().for_instance(INSTANCE_ID)]
    );
}

#[tokio::test]
async fn ignores_pending_images_of_other_instances() {
    let clock = FakeClock::new();
    let budget = budget(&clock, 840);
    let service = ScriptedImageService::new(SOURCE_REGION);
    service.push_list(vec![
        pending_for("img-other", "i-someone-else"),
        pending_for("img-prefix", "i-0123456789-old"),
    ]);

    let guard = ExistingOperationGuard::new(&service, &budget, INSTANCE_ID, INTERVAL);

    assert!(guard.wait_for_clear().await.expect("list should succeed"));
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn clears_after_one_interval_when_existing_image_finishes() {
    let clock = FakeClock::new();
    let budget = budget(&clock, 840);
    let service = ScriptedImageService::new(SOURCE_REGION);
    service.push_list(vec![pending_for("img-busy", INSTANCE_ID)]);
    service.push_list(Vec::new());

    let guard = ExistingOperationGuard::new(&service, &budget, INSTANCE_ID, INTERVAL);

    assert!(guard.wait_for_clear().await.expect("list should succeed"));
    assert_eq!(clock.sleeps(), vec![INTERVAL]);
    assert_eq!(service.list_calls(), 2);
}

#[tokio::test]
async fn gives_up_when_budget_reaches_interval() {
    let clock = FakeClock::new();
    let budget = budget(&clock, 90);
    let service = ScriptedImageService::new(SOURCE_REGION);
    for _ in 0..5 {
        service.push_list(vec![pending_for("img-busy", INSTANCE_ID)]);
    }

    let guard = ExistingOperationGuard::new(&service, &budget, INSTANCE_ID, INTERVAL);

    assert!(!guard.wait_for_clear().await.expect("list should succeed"));
    assert_eq!(clock.sleeps(), secs(&[30, 30]));
    assert_eq!(service.list_calls(), 2);
}

#[tokio::test]
async fn never_sleeps_past_the_budget() {
    let clock = FakeClock::new();
    let budget = budget(&clock, 65);
    let service = ScriptedImageService::new(SOURCE_REGION);
    service.charge_calls_to(&clock, Duration::from_secs(40));
    service.push_list(vec![pending_for("img-busy", INSTANCE_ID)]);

    let guard = ExistingOperationGuard::new(&service, &budget, INSTANCE_ID, INTERVAL);

    assert!(!guard.wait_for_clear().await.expect("list should succeed"));
    assert_eq!(clock.sleeps(), secs(&[25]));
    assert_eq!(budget.remaining(), Duration::ZERO);
}

#[tokio::test]
async fn does_not_poll_when_budget_is_already_spent() {
    let clock = FakeClock::new();
    let budget = budget(&clock, 30);
    let service = ScriptedImageService::new(SOURCE_REGION);

    let guard = ExistingOperationGuard::new(&service, &budget, INSTANCE_ID, INTERVAL);

    assert!(!guard.wait_for_clear().await.expect("no call should fail"));
    assert_eq!(service.list_calls(), 0);
}

#[tokio::test]
async fn propagates_list_errors() {
    let clock = FakeClock::new();
    let budget = budget(&clock, 840);
    let service = ScriptedImageService::new(SOURCE_REGION);
    service.push_list_error("throttled");

    let guard = ExistingOperationGuard::new(&service, &budget, INSTANCE_ID, INTERVAL);
    let err = guard.wait_for_clear().await.expect_err("list error should surface");

    assert_eq!(err, ScriptedServiceError::rejected("throttled"));
}
