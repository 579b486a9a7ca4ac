use anyhow::anyhow;
use gltf_viewer::import::{FnStep, ImportStep, ImportTask, SourceLocator, StepPoll, TaskState};
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

type Log = Rc<RefCell<Vec<String>>>;

fn locator() -> SourceLocator {
    SourceLocator::parse("model.glb").expect("locator")
}

fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

fn step(label: &'static str, log: &Log) -> Box<dyn ImportStep> {
    let log = Rc::clone(log);
    FnStep::boxed(label, move |_ctx| {
        log.borrow_mut().push(label.to_string());
        StepPoll::Done
    })
}

#[test]
fn happy_path_reaches_n_plus_one_progress_states() {
    let log = new_log();
    let mut task = ImportTask::new(locator(), vec![step("a", &log), step("b", &log), step("c", &log)])
        .expect("task");
    let ratios = Rc::new(RefCell::new(vec![task.progress()]));
    let ratios_cb = Rc::clone(&ratios);
    task.on_progress(move |ratio, _message| ratios_cb.borrow_mut().push(ratio));

    let mut advances = 0;
    while task.state() == TaskState::Running {
        task.advance();
        advances += 1;
    }

    assert_eq!(task.state(), TaskState::Completed);
    assert!(advances >= 3, "three steps need at least three advances, got {advances}");
    let ratios = ratios.borrow();
    assert_eq!(ratios.len(), 4);
    let expected = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
    for (got, want) in ratios.iter().zip(expected) {
        assert!((got - want).abs() < 1e-5, "expected {want}, got {got}");
    }
}

#[test]
fn pending_step_is_resumed_instead_of_skipped() {
    let polls = Rc::new(RefCell::new(0));
    let polls_in_step = Rc::clone(&polls);
    let slow = FnStep::boxed("slow", move |ctx| {
        *polls_in_step.borrow_mut() += 1;
        let count = *polls_in_step.borrow();
        ctx.report(count as f32 / 3.0, format!("quantum {count}"));
        if count < 3 {
            StepPoll::Pending
        } else {
            StepPoll::Done
        }
    });
    let mut task = ImportTask::new(locator(), vec![slow]).expect("task");
    assert_eq!(task.advance(), TaskState::Running);
    assert_eq!(task.current_step_label(), Some("slow"));
    assert_eq!(task.status(), "quantum 1");
    assert_eq!(task.advance(), TaskState::Running);
    assert_eq!(task.advance(), TaskState::Completed);
    assert_eq!(*polls.borrow(), 3);
    assert!((task.progress() - 1.0).abs() < 1e-6);
}

#[test]
fn step_pushed_mid_execution_runs_next() {
    let log = new_log();
    let injector = {
        let log = Rc::clone(&log);
        FnStep::boxed("k", move |ctx| {
            log.borrow_mut().push("k".to_string());
            let inner = Rc::clone(&log);
            ctx.push_step(FnStep::boxed("injected", move |_ctx| {
                inner.borrow_mut().push("injected".to_string());
                StepPoll::Done
            }));
            StepPoll::Done
        })
    };
    let mut task = ImportTask::new(
        locator(),
        vec![step("k-1", &log), injector, step("k+1", &log), step("k+2", &log)],
    )
    .expect("task");

    while task.advance() == TaskState::Running {}

    assert_eq!(*log.borrow(), vec!["k-1", "k", "injected", "k+1", "k+2"]);
    assert_eq!(task.completed_steps(), 5);
}

#[test]
fn later_push_runs_before_earlier_push() {
    let log = new_log();
    let mut task = ImportTask::new(locator(), vec![step("real", &log)]).expect("task");
    assert!(task.push_step(step("first push", &log)));
    assert!(task.push_step(step("second push", &log)));
    while task.advance() == TaskState::Running {}
    assert_eq!(*log.borrow(), vec!["second push", "first push", "real"]);
}

#[test]
fn failure_records_error_after_progress() {
    let events = new_log();
    let failing = FnStep::boxed("decode", |ctx| {
        ctx.report(0.5, "decoded header");
        StepPoll::Failed(anyhow!("malformed accessor"))
    });
    let log = new_log();
    let mut task = ImportTask::new(locator(), vec![step("read", &log), failing, step("never", &log)])
        .expect("task");
    let progress_events = Rc::clone(&events);
    task.on_progress(move |_ratio, message| progress_events.borrow_mut().push(format!("progress {message}")));
    let completion_events = Rc::clone(&events);
    task.on_completed(move |state, task| {
        let error = task.error().map(|err| err.label.clone()).unwrap_or_default();
        completion_events.borrow_mut().push(format!("completed {} {error}", state.label()));
    });

    assert_eq!(task.advance(), TaskState::Running);
    assert_eq!(task.advance(), TaskState::Failed);
    assert_eq!(task.advance(), TaskState::Failed, "terminal state is sticky");

    assert_eq!(
        *events.borrow(),
        vec!["progress read done", "progress decoded header", "completed Failed decode"],
        "progress reported by the failing quantum lands before completion"
    );
    assert_eq!(*log.borrow(), vec!["read"]);
    let error = task.error().expect("error recorded");
    assert!(error.to_string().contains("malformed accessor"));
    assert_eq!(task.pending_steps(), 0);
}

#[test]
fn cancel_is_idempotent() {
    let fired = Rc::new(RefCell::new(Vec::new()));
    let mut task =
        ImportTask::new(locator(), vec![FnStep::boxed("spin", |_ctx| StepPoll::Pending)]).expect("task");
    let fired_cb = Rc::clone(&fired);
    task.on_completed(move |state, _| fired_cb.borrow_mut().push(state));

    assert_eq!(task.advance(), TaskState::Running);
    assert!(task.cancel());
    assert!(!task.cancel());
    assert_eq!(task.advance(), TaskState::Cancelled);
    assert_eq!(*fired.borrow(), vec![TaskState::Cancelled]);
}

#[test]
fn completion_observers_run_in_registration_order() {
    let order = new_log();
    let log = new_log();
    let mut task = ImportTask::new(locator(), vec![step("only", &log)]).expect("task");
    for name in ["ui", "profiling", "exit"] {
        let order = Rc::clone(&order);
        task.on_completed(move |_, _| order.borrow_mut().push(name.to_string()));
    }
    task.advance();
    assert_eq!(*order.borrow(), vec!["ui", "profiling", "exit"]);
}

#[test]
fn profiling_report_surfaces_longest_step_first() {
    let sleeper = |label: &'static str, ms: u64| {
        FnStep::boxed(label, move |_ctx| {
            thread::sleep(Duration::from_millis(ms));
            StepPoll::Done
        })
    };
    let mut task = ImportTask::new(
        locator(),
        vec![sleeper("medium", 10), sleeper("long", 60), sleeper("short", 0)],
    )
    .expect("task");
    task.enable_profiling();
    while task.advance() == TaskState::Running {}

    let report = task.profiling_report();
    assert_eq!(report.labels(), vec!["long", "medium", "short"]);
    assert!(report.entries[0].duration_ms >= 60.0);
    assert!(report.entries.iter().all(|entry| entry.quanta == 1));
}

#[test]
fn profiling_is_off_by_default() {
    let log = new_log();
    let mut task = ImportTask::new(locator(), vec![step("only", &log)]).expect("task");
    task.advance();
    assert!(!task.is_profiling());
    assert!(task.profiling_report().is_empty());
}
