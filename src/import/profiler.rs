use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// One quantum of one step.
#[derive(Clone, Debug)]
pub struct StepTiming {
    pub step_id: u64,
    pub label: String,
    pub started_at: Instant,
    pub ended_at: Instant,
    pub duration: Duration,
}

impl StepTiming {
    pub fn duration_ms(&self) -> f32 {
        self.duration.as_secs_f32() * 1000.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProfileEntry {
    pub label: String,
    pub duration_ms: f32,
    pub longest_quantum_ms: f32,
    pub quanta: u32,
}

/// Per-step totals, longest step first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProfilingReport {
    pub entries: Vec<ProfileEntry>,
}

impl ProfilingReport {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_ms(&self) -> f32 {
        self.entries.iter().map(|entry| entry.duration_ms).sum()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.label.as_str()).collect()
    }
}

impl fmt::Display for ProfilingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (rank, entry) in self.entries.iter().enumerate() {
            if rank > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:>2}. {:<24} {:>9.3} ms (longest quantum {:.3} ms over {} quanta)",
                rank + 1,
                entry.label,
                entry.duration_ms,
                entry.longest_quantum_ms,
                entry.quanta
            )?;
        }
        Ok(())
    }
}

/// Accumulates wall-clock timings for every step quantum an [`ImportTask`](super::ImportTask) executes.
#[derive(Default)]
pub struct StepTimer {
    timings: Vec<StepTiming>,
}

impl StepTimer {
    pub fn new() -> Self {
        Self { timings: Vec::new() }
    }

    pub fn scope(&mut self, step_id: u64, label: impl Into<String>) -> StepTimerScope<'_> {
        StepTimerScope { step_id, label: label.into(), timer: self, started_at: Instant::now() }
    }

    pub(crate) fn record(&mut self, step_id: u64, label: String, started_at: Instant, ended_at: Instant) {
        let duration = ended_at.saturating_duration_since(started_at);
        self.timings.push(StepTiming { step_id, label, started_at, ended_at, duration });
    }

    pub fn timings(&self) -> &[StepTiming] {
        &self.timings
    }

    pub fn report(&self) -> ProfilingReport {
        let mut order: Vec<u64> = Vec::new();
        let mut by_step: HashMap<u64, ProfileEntry> = HashMap::new();
        for timing in &self.timings {
            let ms = timing.duration_ms();
            let entry = by_step.entry(timing.step_id).or_insert_with(|| {
                order.push(timing.step_id);
                ProfileEntry { label: timing.label.clone(), duration_ms: 0.0, longest_quantum_ms: 0.0, quanta: 0 }
            });
            entry.duration_ms += ms;
            entry.longest_quantum_ms = entry.longest_quantum_ms.max(ms);
            entry.quanta += 1;
        }
        let mut entries: Vec<ProfileEntry> = order.iter().filter_map(|id| by_step.remove(id)).collect();
        // Stable sort keeps execution order among equal durations.
        entries.sort_by(|a, b| b.duration_ms.partial_cmp(&a.duration_ms).unwrap_or(std::cmp::Ordering::Equal));
        ProfilingReport { entries }
    }
}

pub struct StepTimerScope<'a> {
    step_id: u64,
    label: String,
    timer: &'a mut StepTimer,
    started_at: Instant,
}

impl<'a> Drop for StepTimerScope<'a> {
    fn drop(&mut self) {
        let label = std::mem::take(&mut self.label);
        self.timer.record(self.step_id, label, self.started_at, Instant::now());
    }
}
