use super::locator::SourceLocator;
use super::model::ImportedModel;

/// Result of one quantum of step work.
#[derive(Debug)]
pub enum StepPoll {
    /// More work remains; the same step is resumed on the next `advance()`.
    Pending,
    Done,
    Failed(anyhow::Error),
}

impl StepPoll {
    pub fn from_result(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => StepPoll::Done,
            Err(err) => StepPoll::Failed(err),
        }
    }
}

/// A bounded, resumable unit of import work.
pub trait ImportStep {
    fn label(&self) -> &str;

    /// Perform one bounded quantum of work.
    fn poll(&mut self, ctx: &mut StepContext<'_>) -> StepPoll;

    /// Called once if the task is cancelled after this step started but before it finished.
    fn abandon(&mut self) {}
}

/// Data handed from one step to the next.
#[derive(Default)]
pub struct ImportPayload {
    pub bytes: Option<Vec<u8>>,
    pub document: Option<gltf::Document>,
    pub blob: Option<Vec<u8>>,
    pub buffers: Vec<gltf::buffer::Data>,
    pub model: Option<ImportedModel>,
}

pub struct StepContext<'a> {
    locator: &'a SourceLocator,
    payload: &'a mut ImportPayload,
    progress: Option<(f32, String)>,
    pushed: Vec<Box<dyn ImportStep>>,
}

impl<'a> StepContext<'a> {
    pub(crate) fn new(locator: &'a SourceLocator, payload: &'a mut ImportPayload) -> Self {
        Self { locator, payload, progress: None, pushed: Vec::new() }
    }

    pub fn locator(&self) -> &'a SourceLocator {
        self.locator
    }

    pub fn payload(&mut self) -> &mut ImportPayload {
        &mut *self.payload
    }

    /// Report how far the current step is, as a fraction of the step itself.
    pub fn report(&mut self, fraction: f32, message: impl Into<String>) {
        self.progress = Some((fraction.clamp(0.0, 1.0), message.into()));
    }

    /// Queue `step` to run right after the step being polled.
    pub fn push_step(&mut self, step: Box<dyn ImportStep>) {
        self.pushed.push(step);
    }

    pub(crate) fn finish(self) -> (Option<(f32, String)>, Vec<Box<dyn ImportStep>>) {
        (self.progress, self.pushed)
    }
}

/// Adapts a closure into an [`ImportStep`].
pub struct FnStep<F> {
    label: String,
    poll: F,
}

impl<F> FnStep<F> {
    pub fn new(label: impl Into<String>, poll: F) -> Self
    where
        F: FnMut(&mut StepContext<'_>) -> StepPoll,
    {
        Self { label: label.into(), poll }
    }

    pub fn boxed(label: impl Into<String>, poll: F) -> Box<dyn ImportStep>
    where
        F: FnMut(&mut StepContext<'_>) -> StepPoll + 'static,
    {
        Box::new(Self::new(label, poll))
    }
}

impl<F> ImportStep for FnStep<F>
where
    F: FnMut(&mut StepContext<'_>) -> StepPoll,
{
    fn label(&self) -> &str {
        &self.label
    }

    fn poll(&mut self, ctx: &mut StepContext<'_>) -> StepPoll {
        (self.poll)(ctx)
    }
}
