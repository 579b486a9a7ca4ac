//! Cooperative, resumable model import.
//!
//! An [`ImportTask`] owns a queue of [`ImportStep`]s and runs one bounded quantum per
//! [`ImportTask::advance`] call, so a host loop can keep rendering between steps.

pub mod error;
pub mod locator;
pub mod model;
pub mod profiler;
pub mod step;
pub mod steps;
pub mod task;

pub use error::{ImportError, StepExecutionError};
pub use locator::SourceLocator;
pub use model::{ImportedModel, MeshBounds, MeshSummary};
pub use profiler::{ProfileEntry, ProfilingReport, StepTimer, StepTiming};
pub use step::{FnStep, ImportPayload, ImportStep, StepContext, StepPoll};
pub use steps::{
    BuildMeshesStep, DelayStep, FileOpener, GltfPipeline, LoadBuffersStep, OpenedSource, ParseDocumentStep,
    ReadSourceStep, SourceOpener, DEFAULT_READ_CHUNK_BYTES,
};
pub use task::{CompletionObserver, ImportTask, ProgressObserver, TaskState};
