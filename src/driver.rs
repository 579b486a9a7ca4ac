use crate::coordinator::ImportCoordinator;
use crate::import::TaskState;

/// Advances the coordinator's active import by exactly one step quantum per host tick.
#[derive(Debug, Default)]
pub struct TaskDriver {
    ticks: u64,
    advances: u64,
}

impl TaskDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the task state after advancing, or `None` when there was nothing to advance.
    pub fn tick(&mut self, coordinator: &mut ImportCoordinator) -> Option<TaskState> {
        self.ticks += 1;
        let task = coordinator.active_task_mut()?;
        if task.state().is_terminal() {
            return None;
        }
        self.advances += 1;
        Some(task.advance())
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn advances(&self) -> u64 {
        self.advances
    }
}
