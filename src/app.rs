use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::AppConfig;
use crate::coordinator::{ImportConfig, ImportCoordinator, ImportRequest, RequestSource};
use crate::driver::TaskDriver;
use crate::import::{GltfPipeline, TaskState};

/// Host-side state shared by the windowed and headless loops.
pub struct Viewer {
    config: AppConfig,
    coordinator: ImportCoordinator,
    driver: TaskDriver,
    exit_code: Option<i32>,
}

impl Viewer {
    pub fn new(config: AppConfig) -> Self {
        let pipeline = GltfPipeline::with_chunk_bytes(config.import.read_chunk_bytes);
        Self::with_coordinator(config, ImportCoordinator::new(pipeline))
    }

    pub fn with_coordinator(config: AppConfig, coordinator: ImportCoordinator) -> Self {
        Self { config, coordinator, driver: TaskDriver::new(), exit_code: None }
    }

    /// Startup imports use the full configured pipeline, including `quit_after_load`.
    pub fn startup_import(&mut self, locator: impl Into<String>, source: RequestSource) -> bool {
        let config = self.config.import.request_config();
        self.request(ImportRequest::new(locator, config, source))
    }

    /// Dropped files start immediately and never quit the viewer on their own. Dropping over a
    /// running `quit_after_load` startup import keeps the viewer open until the dropped file ends.
    pub fn dropped_file(&mut self, locator: impl Into<String>) -> bool {
        let config = ImportConfig { profile: self.config.import.profile, ..ImportConfig::default() };
        self.request(ImportRequest::new(locator, config, RequestSource::DragAndDrop))
    }

    fn request(&mut self, request: ImportRequest) -> bool {
        match self.coordinator.submit(request) {
            Ok(_) => true,
            Err(err) => {
                warn!("Import request rejected: {err}");
                false
            }
        }
    }

    /// One host frame: advance the active import by one quantum and collect any exit request.
    pub fn update(&mut self) -> Option<TaskState> {
        let state = self.driver.tick(&mut self.coordinator);
        if let Some(code) = self.coordinator.take_exit_request() {
            self.exit_code = Some(code);
        }
        state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn coordinator(&self) -> &ImportCoordinator {
        &self.coordinator
    }

    pub fn driver(&self) -> &TaskDriver {
        &self.driver
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.config.host.frame_interval_ms.max(1))
    }

    pub fn window_title(&self) -> String {
        let footer = self.coordinator.footer();
        if footer.text.is_empty() {
            self.config.window.title.clone()
        } else {
            format!("{} - {}", self.config.window.title, footer.text)
        }
    }

    pub fn shutdown(&mut self) {
        self.coordinator.shutdown();
    }
}

pub fn run(config: AppConfig, startup: Option<(String, RequestSource)>) -> Result<i32> {
    let headless = config.host.headless;
    let mut viewer = Viewer::new(config);
    if let Some((locator, source)) = startup {
        viewer.startup_import(locator, source);
    }
    if headless {
        return Ok(run_headless(viewer));
    }

    let event_loop = EventLoop::new().context("Failed to create winit event loop")?;
    let mut host = WindowedHost::new(viewer);
    event_loop.run_app(&mut host).context("Event loop execution failed")?;
    host.viewer.shutdown();
    Ok(host.viewer.exit_code().unwrap_or(0))
}

/// Ticks until an exit is requested or nothing is left to import.
pub fn run_headless(mut viewer: Viewer) -> i32 {
    let interval = viewer.frame_interval();
    let started = Instant::now();
    let code = loop {
        let frame_start = Instant::now();
        viewer.update();
        if let Some(code) = viewer.exit_code() {
            break code;
        }
        if !viewer.coordinator().has_running_task() {
            break 0;
        }
        thread::sleep(interval.saturating_sub(frame_start.elapsed()));
    };
    info!(
        ticks = viewer.driver().ticks(),
        advances = viewer.driver().advances(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        code,
        "headless run finished"
    );
    viewer.shutdown();
    code
}

struct WindowedHost {
    viewer: Viewer,
    window: Option<Window>,
    hovered: Option<String>,
    should_close: bool,
    last_title: String,
}

impl WindowedHost {
    fn new(viewer: Viewer) -> Self {
        Self { viewer, window: None, hovered: None, should_close: false, last_title: String::new() }
    }

    fn refresh_title(&mut self) {
        let title = match &self.hovered {
            Some(name) => format!("{} - Drop to load {name}", self.viewer.config.window.title),
            None => self.viewer.window_title(),
        };
        if title != self.last_title {
            if let Some(window) = &self.window {
                window.set_title(&title);
            }
            self.last_title = title;
        }
    }
}

impl ApplicationHandler for WindowedHost {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_cfg = &self.viewer.config.window;
        let attrs = Window::default_attributes()
            .with_title(window_cfg.title.clone())
            .with_inner_size(LogicalSize::new(window_cfg.width as f64, window_cfg.height as f64));
        match event_loop.create_window(attrs) {
            Ok(window) => self.window = Some(window),
            Err(err) => {
                error!("Failed to create window: {err:?}");
                self.should_close = true;
            }
        }
    }

    fn window_event(&mut self, _el: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.should_close = true,
            WindowEvent::HoveredFile(path) => {
                self.hovered = path.file_name().map(|name| name.to_string_lossy().into_owned());
            }
            WindowEvent::HoveredFileCancelled => self.hovered = None,
            WindowEvent::DroppedFile(path) => {
                self.hovered = None;
                self.viewer.dropped_file(path.to_string_lossy().into_owned());
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_close {
            event_loop.exit();
            return;
        }
        self.viewer.update();
        if self.viewer.exit_code().is_some() {
            event_loop.exit();
            return;
        }
        self.refresh_title();
        let flow = if self.viewer.coordinator().has_running_task() {
            ControlFlow::WaitUntil(Instant::now() + self.viewer.frame_interval())
        } else {
            ControlFlow::Wait
        };
        event_loop.set_control_flow(flow);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::{FnStep, ImportStep, SourceLocator, StepPoll};

    fn two_steps(_: &SourceLocator) -> Vec<Box<dyn ImportStep>> {
        vec![FnStep::boxed("first", |_ctx| StepPoll::Done), FnStep::boxed("second", |_ctx| StepPoll::Done)]
    }

    #[test]
    fn headless_quits_with_outcome_code() {
        let mut config = AppConfig::default();
        config.import.quit_after_load = true;
        config.host.frame_interval_ms = 1;
        let mut viewer = Viewer::with_coordinator(config, ImportCoordinator::new(two_steps));
        assert!(viewer.startup_import("model.glb", RequestSource::CommandLine));
        assert_eq!(run_headless(viewer), 0);
    }

    #[test]
    fn dropped_files_do_not_request_exit() {
        let mut config = AppConfig::default();
        config.import.quit_after_load = true;
        let mut viewer = Viewer::with_coordinator(config, ImportCoordinator::new(two_steps));
        assert!(viewer.dropped_file("dropped.glb"));
        while viewer.update().is_some() {}
        assert_eq!(viewer.exit_code(), None);
        assert!(viewer.window_title().contains("Loaded dropped.glb"), "title: {}", viewer.window_title());
    }

    #[test]
    fn drop_over_quitting_startup_import_loads_before_exit() {
        let mut config = AppConfig::default();
        config.import.quit_after_load = true;
        config.import.delay_ms = 60_000;
        let mut viewer = Viewer::with_coordinator(config, ImportCoordinator::new(two_steps));
        assert!(viewer.startup_import("startup.glb", RequestSource::CommandLine));
        assert_eq!(viewer.update(), Some(TaskState::Running));

        assert!(viewer.dropped_file("dropped.glb"));
        assert_eq!(viewer.update(), Some(TaskState::Running));
        assert_eq!(viewer.exit_code(), None, "replaced startup import must not close the viewer");
        while viewer.update().is_some() {}
        assert_eq!(viewer.exit_code(), Some(0));
        assert!(viewer.window_title().contains("Loaded dropped.glb"), "title: {}", viewer.window_title());
    }

    #[test]
    fn blank_drop_is_rejected() {
        let mut viewer = Viewer::with_coordinator(AppConfig::default(), ImportCoordinator::new(two_steps));
        assert!(!viewer.dropped_file(""));
        assert!(viewer.coordinator().active_task().is_none());
    }
}
