//! BDD scenarios for the snapshot workflow.

use rstest_bdd_macros::scenario;

use super::test_helpers::{WorkflowContext, workflow_context};

#[scenario(
    path = "tests/features/workflow.feature",
    name = "Snapshot an instance in its own region"
)]
fn scenario_same_region(workflow_context: WorkflowContext) {
    drop(workflow_context);
}

#[scenario(
    path = "tests/features/workflow.feature",
    name = "Wait for an existing image operation to clear"
)]
fn scenario_existing_operation_clears(workflow_context: WorkflowContext) {
    drop(workflow_context);
}

#[scenario(
    path = "tests/features/workflow.feature",
    name = "Give up when an existing operation never clears"
)]
fn scenario_existing_operation_never_clears(workflow_context: WorkflowContext) {
    drop(workflow_context);
}

#[scenario(
    path = "tests/features/workflow.feature",
    name = "Surface a failed image"
)]
fn scenario_failed_image(workflow_context: WorkflowContext) {
    drop(workflow_context);
}

#[scenario(
    path = "tests/features/workflow.feature",
    name = "Time out waiting for an image that never finishes"
)]
fn scenario_image_timeout(workflow_context: WorkflowContext) {
    drop(workflow_context);
}

#[scenario(
    path = "tests/features/workflow.feature",
    name = "Surface provider rejections"
)]
fn scenario_provider_rejection(workflow_context: WorkflowContext) {
    drop(workflow_context);
}

#[scenario(
    path = "tests/features/workflow.feature",
    name = "Copy the image to another region"
)]
fn scenario_copy(workflow_context: WorkflowContext) {
    drop(workflow_context);
}

#[scenario(
    path = "tests/features/workflow.feature",
    name = "A failed copy still reports success"
)]
fn scenario_copy_failure(workflow_context: WorkflowContext) {
    drop(workflow_context);
}

#[scenario(
    path = "tests/features/workflow.feature",
    name = "Skip the copy when little time remains"
)]
fn scenario_copy_skipped(workflow_context: WorkflowContext) {
    drop(workflow_context);
}
