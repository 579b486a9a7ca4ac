use thiserror::Error;

/// Rejections raised synchronously by `ImportCoordinator::start_import` and `ImportTask::new`.
///
/// None of these touch the active task; a rejected request never supersedes anything.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("import request has an empty source locator")]
    EmptyLocator,
    #[error("import task for '{locator}' has no steps")]
    NoSteps { locator: String },
}

/// A step reported `StepPoll::Failed`. Stored on the task once it enters `TaskState::Failed`.
#[derive(Debug, Error)]
#[error("step '{label}' failed: {source:#}")]
pub struct StepExecutionError {
    pub label: String,
    #[source]
    pub source: anyhow::Error,
}

impl StepExecutionError {
    pub fn new(label: impl Into<String>, source: anyhow::Error) -> Self {
        Self { label: label.into(), source }
    }
}
