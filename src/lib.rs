pub mod app;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod driver;
pub mod import;

pub use app::{run, Viewer};
pub use coordinator::{ImportConfig, ImportCoordinator, ImportRequest, RequestSource};
pub use driver::TaskDriver;
pub use import::{ImportStep, ImportTask, StepPoll, TaskState};
