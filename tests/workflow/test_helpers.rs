//! Shared fixtures for snapshot workflow BDD scenarios.

use std::cell::RefCell;

use imprint::test_support::{FakeClock, ScriptedImageService, ScriptedServiceError};
use imprint::{WorkflowConfig, WorkflowError, WorkflowResult};
use rstest::fixture;

pub const SOURCE_REGION: &str = "fr-par-1";

/// What a scenario's workflow run produced.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    Success(WorkflowResult),
    Failure { kind: FailureKind, message: String },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureKind {
    Timeout,
    ImageCreationFailed,
    Provider,
}

impl FailureKind {
    pub const fn of(err: &WorkflowError<ScriptedServiceError>) -> Self {
        match err {
            WorkflowError::Timeout { .. } => Self::Timeout,
            WorkflowError::ImageCreationFailed { .. } => Self::ImageCreationFailed,
            WorkflowError::Provider(_) => Self::Provider,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "timeout" => Some(Self::Timeout),
            "image_creation_failed" => Some(Self::ImageCreationFailed),
            "provider" => Some(Self::Provider),
            _ => None,
        }
    }
}

/// Scenario state. Steps share it by reference, so mutable parts sit behind
/// `RefCell`.
#[derive(Debug)]
pub struct WorkflowContext {
    pub clock: FakeClock,
    pub source: ScriptedImageService,
    pub replica: RefCell<Option<ScriptedImageService>>,
    pub instance_id: RefCell<String>,
    pub created_image_id: RefCell<String>,
    pub target_region: RefCell<Option<String>>,
    pub config: RefCell<WorkflowConfig>,
    pub outcome: RefCell<Option<RunOutcome>>,
}

impl WorkflowContext {
    pub fn instance_id(&self) -> String {
        self.instance_id.borrow().clone()
    }

    pub fn created_image_id(&self) -> String {
        self.created_image_id.borrow().clone()
    }
}

#[fixture]
pub fn workflow_context() -> WorkflowContext {
    WorkflowContext {
        clock: FakeClock::new(),
        source: ScriptedImageService::new(SOURCE_REGION),
        replica: RefCell::new(None),
        instance_id: RefCell::new(String::from("i-0123456789")),
        created_image_id: RefCell::new(String::from("img-1")),
        target_region: RefCell::new(None),
        config: RefCell::new(WorkflowConfig::default()),
        outcome: RefCell::new(None),
    }
}
