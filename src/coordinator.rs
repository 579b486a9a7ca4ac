use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::import::{
    DelayStep, ImportError, ImportStep, ImportTask, ImportedModel, ProfilingReport, SourceLocator, TaskState,
};

/// Produces the step sequence for a new import.
pub trait StepFactory {
    fn build(&self, locator: &SourceLocator) -> Vec<Box<dyn ImportStep>>;
}

impl<F> StepFactory for F
where
    F: Fn(&SourceLocator) -> Vec<Box<dyn ImportStep>>,
{
    fn build(&self, locator: &SourceLocator) -> Vec<Box<dyn ImportStep>> {
        self(locator)
    }
}

/// Per-request pipeline options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Wait this long before the first real step.
    pub delay_ms: u64,
    /// Time every step quantum and log the report once the import ends.
    pub profile: bool,
    /// Raise an exit request once the import reaches any terminal state.
    pub quit_after_load: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestSource {
    CommandLine,
    DragAndDrop,
    FileAssociation,
}

impl RequestSource {
    pub fn label(self) -> &'static str {
        match self {
            RequestSource::CommandLine => "command line",
            RequestSource::DragAndDrop => "drag and drop",
            RequestSource::FileAssociation => "file association",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    pub locator: String,
    pub config: ImportConfig,
    pub source: RequestSource,
}

impl ImportRequest {
    pub fn new(locator: impl Into<String>, config: ImportConfig, source: RequestSource) -> Self {
        Self { locator: locator.into(), config, source }
    }
}

/// Snapshot of how the most recent import ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub locator: String,
    pub state: TaskState,
    pub error: Option<String>,
    pub model: Option<ImportedModel>,
    pub profile: Option<ProfilingReport>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FooterMessage {
    pub text: String,
    pub ratio: Option<f32>,
}

pub fn exit_code_for(state: TaskState) -> i32 {
    match state {
        TaskState::Completed | TaskState::Running => 0,
        TaskState::Failed => 1,
        TaskState::Cancelled => 2,
    }
}

/// Single-slot owner of the current import. Starting an import always supersedes the previous one.
pub struct ImportCoordinator {
    factory: Box<dyn StepFactory>,
    active: Option<ImportTask>,
    footer: Rc<RefCell<FooterMessage>>,
    last_outcome: Rc<RefCell<Option<ImportOutcome>>>,
    exit_request: Rc<Cell<Option<i32>>>,
    superseding: Rc<Cell<bool>>,
    active_quits: bool,
    imports_started: u64,
}

impl ImportCoordinator {
    pub fn new(factory: impl StepFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            active: None,
            footer: Rc::new(RefCell::new(FooterMessage::default())),
            last_outcome: Rc::new(RefCell::new(None)),
            exit_request: Rc::new(Cell::new(None)),
            superseding: Rc::new(Cell::new(false)),
            active_quits: false,
            imports_started: 0,
        }
    }

    pub fn submit(&mut self, request: ImportRequest) -> Result<&ImportTask, ImportError> {
        info!(source = request.source.label(), locator = %request.locator, "import requested");
        self.start_import(&request.locator, request.config)
    }

    /// Build a task for `locator` and make it the active one.
    ///
    /// The replacement is fully built before the previous task is touched, so a rejected request
    /// leaves the active task running. The previous task is detached, then cancelled (its completion
    /// observers see `Cancelled`), then the new task is installed. A superseded `quit_after_load`
    /// import does not raise an exit request; the replacement inherits it instead.
    pub fn start_import(&mut self, locator: &str, config: ImportConfig) -> Result<&ImportTask, ImportError> {
        let locator = SourceLocator::parse(locator)?;
        let steps = self.factory.build(&locator);
        let mut task = ImportTask::new(locator, steps)?;
        if config.delay_ms > 0 {
            task.push_step(Box::new(DelayStep::from_millis(config.delay_ms)));
        }
        if config.profile {
            task.enable_profiling();
        }
        self.wire_observers(&mut task, config);

        let mut quit_after_load = config.quit_after_load;
        if let Some(mut previous) = self.active.take() {
            self.superseding.set(true);
            let cancelled = previous.cancel();
            self.superseding.set(false);
            if cancelled {
                info!(superseded = %previous.locator(), by = %task.locator(), "import superseded");
                quit_after_load |= self.active_quits;
            }
        }
        if quit_after_load {
            self.wire_quit_observer(&mut task);
        }
        self.active_quits = quit_after_load;

        info!(
            locator = %task.locator(),
            steps = task.pending_steps(),
            delay_ms = config.delay_ms,
            profile = config.profile,
            quit_after_load,
            "import started"
        );
        *self.footer.borrow_mut() =
            FooterMessage { text: format!("Loading {}", task.locator().display_name()), ratio: Some(0.0) };
        self.imports_started += 1;
        let task = self.active.insert(task);
        Ok(&*task)
    }

    fn wire_observers(&self, task: &mut ImportTask, config: ImportConfig) {
        let name = task.locator().display_name();

        let footer = Rc::clone(&self.footer);
        let progress_name = name.clone();
        task.on_progress(move |ratio, message| {
            let mut footer = footer.borrow_mut();
            footer.text = format!("Loading {progress_name}: {:.0}% {message}", ratio * 100.0);
            footer.ratio = Some(ratio);
        });

        let footer = Rc::clone(&self.footer);
        let last_outcome = Rc::clone(&self.last_outcome);
        task.on_completed(move |state, task| {
            let text = match state {
                TaskState::Completed => match task.model() {
                    Some(model) => {
                        info!(
                            locator = %task.locator(),
                            meshes = model.meshes.len(),
                            vertices = model.vertex_count(),
                            triangles = model.triangle_count(),
                            "import completed"
                        );
                        format!(
                            "Loaded {name}: {} meshes, {} triangles",
                            model.meshes.len(),
                            model.triangle_count()
                        )
                    }
                    None => {
                        info!(locator = %task.locator(), "import completed");
                        format!("Loaded {name}")
                    }
                },
                TaskState::Failed => {
                    let reason = task.error().map(ToString::to_string).unwrap_or_else(|| "unknown error".into());
                    warn!(locator = %task.locator(), error = %reason, "import failed");
                    format!("Failed to load {name}: {reason}")
                }
                TaskState::Cancelled => {
                    info!(locator = %task.locator(), "import cancelled");
                    format!("Cancelled {name}")
                }
                TaskState::Running => return,
            };
            let ratio = (state == TaskState::Completed).then_some(1.0);
            *footer.borrow_mut() = FooterMessage { text, ratio };

            let profile = config.profile.then(|| task.profiling_report());
            if let Some(report) = &profile {
                info!(locator = %task.locator(), steps = report.entries.len(), total_ms = report.total_ms(), "profiling report");
                for line in report.to_string().lines() {
                    info!("  {line}");
                }
            }
            *last_outcome.borrow_mut() = Some(ImportOutcome {
                locator: task.locator().to_string(),
                state,
                error: task.error().map(ToString::to_string),
                model: task.model().cloned(),
                profile,
            });
        });
    }

    /// Registered after every other observer so the exit request is raised last.
    fn wire_quit_observer(&self, task: &mut ImportTask) {
        let exit_request = Rc::clone(&self.exit_request);
        let superseding = Rc::clone(&self.superseding);
        task.on_completed(move |state, task| {
            if state == TaskState::Cancelled && superseding.get() {
                info!(locator = %task.locator(), "quit after load passed to the replacement import");
                return;
            }
            let code = exit_code_for(state);
            info!(locator = %task.locator(), state = state.label(), code, "quit after load requested");
            exit_request.set(Some(code));
        });
    }

    pub fn active_task(&self) -> Option<&ImportTask> {
        self.active.as_ref()
    }

    /// Mutable access for the driver and for callers injecting steps.
    pub fn active_task_mut(&mut self) -> Option<&mut ImportTask> {
        self.active.as_mut()
    }

    pub fn has_running_task(&self) -> bool {
        self.active.as_ref().is_some_and(|task| !task.state().is_terminal())
    }

    pub fn footer(&self) -> FooterMessage {
        self.footer.borrow().clone()
    }

    pub fn last_outcome(&self) -> Option<ImportOutcome> {
        self.last_outcome.borrow().clone()
    }

    /// Exit code requested by a `quit_after_load` import, consumed on read.
    pub fn take_exit_request(&self) -> Option<i32> {
        self.exit_request.take()
    }

    pub fn imports_started(&self) -> u64 {
        self.imports_started
    }

    /// Cancel whatever is in flight. Used on process exit.
    pub fn shutdown(&mut self) {
        self.active_quits = false;
        if let Some(mut task) = self.active.take() {
            if task.cancel() {
                info!(locator = %task.locator(), "import cancelled at shutdown");
            }
        }
    }
}

impl Drop for ImportCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}
