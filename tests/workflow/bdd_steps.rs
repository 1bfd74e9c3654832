//! BDD step definitions for the snapshot workflow.

use imprint::test_support::ScriptedImageService;
use imprint::{ImageRecord, ImageState, ImageWorkflow, SOURCE_INSTANCE_TAG, SnapshotRequest};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{FailureKind, RunOutcome, WorkflowContext};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

/// Upper bound on scripted "still busy" responses; more than any budget in
/// the scenarios can consume.
const NEVER: usize = 64;

#[given("a running instance \"{instance}\"")]
fn running_instance(workflow_context: &WorkflowContext, instance: String) {
    *workflow_context.instance_id.borrow_mut() = instance;
}

#[given("the provider will create image \"{image}\"")]
fn provider_creates(workflow_context: &WorkflowContext, image: String) {
    workflow_context.source.push_create(&image);
    *workflow_context.created_image_id.borrow_mut() = image;
}

#[given("the provider rejects image creation with \"{message}\"")]
fn provider_rejects_create(workflow_context: &WorkflowContext, message: String) {
    workflow_context.source.push_create_error(&message);
}

#[given("the run budget is {secs} seconds")]
fn run_budget(workflow_context: &WorkflowContext, secs: u64) {
    workflow_context.config.borrow_mut().max_duration_secs = secs;
}

#[given("an existing image operation clears after {checks} checks")]
fn existing_operation_clears(workflow_context: &WorkflowContext, checks: usize) {
    push_busy(workflow_context, checks);
    workflow_context.source.push_list(Vec::new());
}

#[given("an existing image operation never clears")]
fn existing_operation_never_clears(workflow_context: &WorkflowContext) {
    push_busy(workflow_context, NEVER);
}

#[given("the image reports pending {count} times before becoming available")]
fn image_pending_then_available(workflow_context: &WorkflowContext, count: usize) {
    let image = workflow_context.created_image_id();
    for _ in 0..count {
        workflow_context
            .source
            .push_describe(&image, ImageState::Pending);
    }
    workflow_context
        .source
        .push_describe(&image, ImageState::Available);
}

#[given("the image never becomes available")]
fn image_never_available(workflow_context: &WorkflowContext) {
    let image = workflow_context.created_image_id();
    for _ in 0..NEVER {
        workflow_context
            .source
            .push_describe(&image, ImageState::Pending);
    }
}

#[given("the image enters the failed state")]
fn image_fails(workflow_context: &WorkflowContext) {
    let image = workflow_context.created_image_id();
    workflow_context
        .source
        .push_describe(&image, ImageState::Pending);
    workflow_context
        .source
        .push_describe(&image, ImageState::Failed);
}

#[given("replication to \"{region}\" is requested")]
fn replication_requested(workflow_context: &WorkflowContext, region: String) {
    *workflow_context.replica.borrow_mut() = Some(ScriptedImageService::new(region.as_str()));
    *workflow_context.target_region.borrow_mut() = Some(region);
}

#[given("the copy is rejected with \"{message}\"")]
fn copy_rejected(workflow_context: &WorkflowContext, message: String) -> Result<(), StepError> {
    let replica = workflow_context.replica.borrow();
    let target = replica
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("replication was not requested")))?;
    target.push_copy_error(&message);
    Ok(())
}

#[when("the snapshot workflow runs")]
fn run_workflow(workflow_context: &WorkflowContext) -> Result<(), StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let request = SnapshotRequest::new(
        workflow_context.instance_id(),
        workflow_context.target_region.borrow().clone(),
    )
    .map_err(|err| StepError::Assertion(err.to_string()))?;

    let mut workflow = ImageWorkflow::new(
        workflow_context.config.borrow().clone(),
        request,
        workflow_context.source.clone(),
    )
    .with_clock(workflow_context.clock.clone());
    if let Some(replica) = workflow_context.replica.borrow().clone() {
        workflow = workflow.with_replica_service(replica);
    }

    let outcome = match runtime.block_on(workflow.run()) {
        Ok(result) => RunOutcome::Success(result),
        Err(err) => RunOutcome::Failure {
            kind: FailureKind::of(&err),
            message: err.to_string(),
        },
    };
    *workflow_context.outcome.borrow_mut() = Some(outcome);
    Ok(())
}

#[then("the run succeeds")]
fn run_succeeds(workflow_context: &WorkflowContext) -> Result<(), StepError> {
    match workflow_context.outcome.borrow().as_ref() {
        Some(RunOutcome::Success(result)) if result.status_code == "200" => Ok(()),
        Some(RunOutcome::Success(result)) => Err(StepError::Assertion(format!(
            "unexpected status code {}",
            result.status_code
        ))),
        Some(RunOutcome::Failure { message, .. }) => Err(StepError::Assertion(format!(
            "expected success, got failure: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the run fails with a \"{kind}\" error")]
fn run_fails(workflow_context: &WorkflowContext, kind: String) -> Result<(), StepError> {
    let expected = FailureKind::parse(&kind)
        .ok_or_else(|| StepError::Assertion(format!("unknown failure kind: {kind}")))?;
    match workflow_context.outcome.borrow().as_ref() {
        Some(RunOutcome::Failure { kind: actual, .. }) if *actual == expected => Ok(()),
        Some(RunOutcome::Failure { kind: actual, message }) => Err(StepError::Assertion(
            format!("expected {expected:?} failure, got {actual:?}: {message}"),
        )),
        Some(RunOutcome::Success(result)) => Err(StepError::Assertion(format!(
            "expected failure, got success: {}",
            result.body
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the error mentions \"{text}\"")]
fn error_mentions(workflow_context: &WorkflowContext, text: String) -> Result<(), StepError> {
    match workflow_context.outcome.borrow().as_ref() {
        Some(RunOutcome::Failure { message, .. }) if message.contains(&text) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected error mentioning {text}, got {other:?}"
        ))),
    }
}

#[then("the result image is \"{image}\"")]
fn result_image(workflow_context: &WorkflowContext, image: String) -> Result<(), StepError> {
    with_result(workflow_context, |result| {
        check(
            result.image_id == image,
            format!("expected image {image}, got {}", result.image_id),
        )
    })
}

#[then("the result body mentions \"{text}\"")]
fn body_mentions(workflow_context: &WorkflowContext, text: String) -> Result<(), StepError> {
    with_result(workflow_context, |result| {
        check(
            result.body.contains(&text),
            format!("body should mention {text}: {}", result.body),
        )
    })
}

#[then("the result body does not mention copying")]
fn body_silent_on_copy(workflow_context: &WorkflowContext) -> Result<(), StepError> {
    with_result(workflow_context, |result| {
        check(
            !result.body.to_lowercase().contains("cop"),
            format!("body should not mention copying: {}", result.body),
        )
    })
}

#[then("no image was created")]
fn no_image_created(workflow_context: &WorkflowContext) -> Result<(), StepError> {
    let created = workflow_context.source.create_requests().len();
    check(created == 0, format!("expected no create calls, got {created}"))
}

#[then("the image was created without a reboot")]
fn created_without_reboot(workflow_context: &WorkflowContext) -> Result<(), StepError> {
    let requests = workflow_context.source.create_requests();
    let [request] = requests.as_slice() else {
        return Err(StepError::Assertion(format!(
            "expected one create call, got {}",
            requests.len()
        )));
    };
    check(
        request.no_reboot() && request.instance_id == workflow_context.instance_id(),
        format!("unexpected create request: {request:?}"),
    )
}

#[then("{count} copies were requested")]
fn copies_requested(workflow_context: &WorkflowContext, count: usize) -> Result<(), StepError> {
    let copies = workflow_context
        .replica
        .borrow()
        .as_ref()
        .map_or(0, |replica| replica.copy_requests().len());
    check(
        copies == count,
        format!("expected {count} copy calls, got {copies}"),
    )
}

#[then("the workflow waited {count} times")]
fn waited(workflow_context: &WorkflowContext, count: usize) -> Result<(), StepError> {
    let sleeps = workflow_context.clock.sleeps().len();
    check(
        sleeps == count,
        format!("expected {count} waits, got {sleeps}"),
    )
}

#[then("the run stayed within {secs} seconds")]
fn stayed_within(workflow_context: &WorkflowContext, secs: u64) -> Result<(), StepError> {
    let total: u64 = workflow_context
        .clock
        .sleeps()
        .iter()
        .map(std::time::Duration::as_secs)
        .sum();
    check(
        total <= secs,
        format!("slept {total}s, budget was {secs}s"),
    )
}

fn push_busy(workflow_context: &WorkflowContext, checks: usize) {
    let record = ImageRecord::new("img-busy", ImageState::Pending)
        .with_tag(SOURCE_INSTANCE_TAG, workflow_context.instance_id());
    for _ in 0..checks {
        workflow_context.source.push_list(vec![record.clone()]);
    }
}

fn with_result(
    workflow_context: &WorkflowContext,
    assertion: impl FnOnce(&imprint::WorkflowResult) -> Result<(), StepError>,
) -> Result<(), StepError> {
    match workflow_context.outcome.borrow().as_ref() {
        Some(RunOutcome::Success(result)) => assertion(result),
        Some(RunOutcome::Failure { message, .. }) => Err(StepError::Assertion(format!(
            "expected success, got failure: {message}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

fn check(condition: bool, message: String) -> Result<(), StepError> {
    if condition {
        Ok(())
    } else {
        Err(StepError::Assertion(message))
    }
}
