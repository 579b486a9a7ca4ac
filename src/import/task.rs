use std::collections::VecDeque;

use tracing::{debug, warn};

use super::error::{ImportError, StepExecutionError};
use super::locator::SourceLocator;
use super::model::ImportedModel;
use super::profiler::{ProfilingReport, StepTimer};
use super::step::{ImportPayload, ImportStep, StepContext, StepPoll};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Running)
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskState::Running => "Running",
            TaskState::Completed => "Completed",
            TaskState::Failed => "Failed",
            TaskState::Cancelled => "Cancelled",
        }
    }
}

pub type ProgressObserver = Box<dyn FnMut(f32, &str)>;
pub type CompletionObserver = Box<dyn FnOnce(TaskState, &ImportTask)>;

struct QueuedStep {
    id: u64,
    step: Box<dyn ImportStep>,
}

/// One model import, executed as a queue of resumable steps.
///
/// The front of the queue is the current step. Each [`advance`](ImportTask::advance) polls it exactly
/// once; a step that returns [`StepPoll::Pending`] is polled again on the next call. Steps pushed while
/// a step is current run right after it, ahead of everything already queued.
pub struct ImportTask {
    locator: SourceLocator,
    queue: VecDeque<QueuedStep>,
    current_started: bool,
    completed_steps: usize,
    next_step_id: u64,
    state: TaskState,
    error: Option<StepExecutionError>,
    payload: ImportPayload,
    progress: f32,
    status: String,
    progress_observers: Vec<ProgressObserver>,
    completion_observers: Vec<CompletionObserver>,
    profiler: Option<StepTimer>,
}

impl ImportTask {
    pub fn new(locator: SourceLocator, steps: Vec<Box<dyn ImportStep>>) -> Result<Self, ImportError> {
        if steps.is_empty() {
            return Err(ImportError::NoSteps { locator: locator.to_string() });
        }
        let status = format!("Queued {}", locator.display_name());
        let mut task = Self {
            locator,
            queue: VecDeque::with_capacity(steps.len() + 1),
            current_started: false,
            completed_steps: 0,
            next_step_id: 0,
            state: TaskState::Running,
            error: None,
            payload: ImportPayload::default(),
            progress: 0.0,
            status,
            progress_observers: Vec::new(),
            completion_observers: Vec::new(),
            profiler: None,
        };
        for step in steps {
            let id = task.allocate_step_id();
            task.queue.push_back(QueuedStep { id, step });
        }
        Ok(task)
    }

    fn allocate_step_id(&mut self) -> u64 {
        let id = self.next_step_id;
        self.next_step_id += 1;
        id
    }

    /// Insert `step` right after the step currently executing, or at the head if none has started.
    /// Returns `false` and drops the step when the task is already terminal.
    pub fn push_step(&mut self, step: Box<dyn ImportStep>) -> bool {
        if self.state.is_terminal() {
            debug!(locator = %self.locator, step = step.label(), "dropping step pushed into finished import");
            return false;
        }
        self.insert_after_current(step);
        true
    }

    fn insert_after_current(&mut self, step: Box<dyn ImportStep>) {
        let id = self.allocate_step_id();
        let index = if self.current_started { 1 } else { 0 };
        let index = index.min(self.queue.len());
        self.queue.insert(index, QueuedStep { id, step });
    }

    /// Run one quantum of the current step and return the resulting state.
    pub fn advance(&mut self) -> TaskState {
        if self.state.is_terminal() {
            return self.state;
        }
        let Some(current) = self.queue.front_mut() else {
            self.finish(TaskState::Completed);
            return self.state;
        };
        self.current_started = true;
        let step_id = current.id;
        let label = current.step.label().to_string();

        let mut ctx = StepContext::new(&self.locator, &mut self.payload);
        let poll = {
            let _scope = self.profiler.as_mut().map(|timer| timer.scope(step_id, label.as_str()));
            current.step.poll(&mut ctx)
        };
        let (reported, pushed) = ctx.finish();

        match poll {
            StepPoll::Pending => {
                for step in pushed {
                    self.insert_after_current(step);
                }
                if let Some((fraction, message)) = reported {
                    self.emit_progress(fraction, message);
                }
            }
            StepPoll::Done => {
                for step in pushed {
                    self.insert_after_current(step);
                }
                self.queue.pop_front();
                self.current_started = false;
                self.completed_steps += 1;
                debug!(locator = %self.locator, step = %label, remaining = self.queue.len(), "import step finished");
                let message = reported.map(|(_, message)| message).unwrap_or_else(|| format!("{label} done"));
                self.emit_progress(0.0, message);
                if self.queue.is_empty() {
                    self.finish(TaskState::Completed);
                }
            }
            StepPoll::Failed(source) => {
                if let Some((fraction, message)) = reported {
                    self.emit_progress(fraction, message);
                }
                let error = StepExecutionError::new(label, source);
                warn!(locator = %self.locator, error = %error, "import step failed");
                self.status = error.to_string();
                self.error = Some(error);
                self.finish(TaskState::Failed);
            }
        }
        self.state
    }

    /// Force the task into `Cancelled`. No-op on a terminal task.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        if self.current_started {
            if let Some(current) = self.queue.front_mut() {
                current.step.abandon();
            }
        }
        self.status = format!("Cancelled {}", self.locator.display_name());
        self.finish(TaskState::Cancelled);
        true
    }

    fn emit_progress(&mut self, step_fraction: f32, message: String) {
        let total = self.completed_steps + self.queue.len();
        let ratio = if total == 0 {
            1.0
        } else {
            ((self.completed_steps as f32 + step_fraction) / total as f32).clamp(0.0, 1.0)
        };
        self.progress = ratio;
        self.status = message;
        for observer in self.progress_observers.iter_mut() {
            observer(ratio, &self.status);
        }
    }

    fn finish(&mut self, state: TaskState) {
        self.state = state;
        self.queue.clear();
        self.current_started = false;
        let observers = std::mem::take(&mut self.completion_observers);
        for observer in observers {
            observer(state, self);
        }
    }

    pub fn on_progress(&mut self, observer: impl FnMut(f32, &str) + 'static) {
        self.progress_observers.push(Box::new(observer));
    }

    /// Observers registered after the task is terminal are invoked immediately.
    pub fn on_completed(&mut self, observer: impl FnOnce(TaskState, &ImportTask) + 'static) {
        if self.state.is_terminal() {
            observer(self.state, self);
        } else {
            self.completion_observers.push(Box::new(observer));
        }
    }

    pub fn enable_profiling(&mut self) {
        self.profiler.get_or_insert_with(StepTimer::new);
    }

    pub fn is_profiling(&self) -> bool {
        self.profiler.is_some()
    }

    pub fn profiling_report(&self) -> ProfilingReport {
        self.profiler.as_ref().map(StepTimer::report).unwrap_or_default()
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn locator(&self) -> &SourceLocator {
        &self.locator
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn error(&self) -> Option<&StepExecutionError> {
        self.error.as_ref()
    }

    pub fn payload(&self) -> &ImportPayload {
        &self.payload
    }

    pub fn model(&self) -> Option<&ImportedModel> {
        self.payload.model.as_ref()
    }

    pub fn completed_steps(&self) -> usize {
        self.completed_steps
    }

    pub fn pending_steps(&self) -> usize {
        self.queue.len()
    }

    pub fn current_step_label(&self) -> Option<&str> {
        self.queue.front().map(|queued| queued.step.label())
    }

    pub fn pending_step_labels(&self) -> Vec<&str> {
        self.queue.iter().map(|queued| queued.step.label()).collect()
    }
}
