use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lifecycle state of a unit of pipeline work (a file, an element, a relationship) as
/// reported on the process-wide status map (§4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Queued,
    Analyzing,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ComponentStatus {
    pub status: Status,
    pub started_at: Instant,
    pub description: Option<String>,
}

/// Aggregate counts plus a completion rate and ETA, as rendered by [`ProgressReporter`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub queued: usize,
    pub analyzing: usize,
    pub completed: usize,
    pub failed: usize,
    pub elapsed_secs: f64,
    pub completion_rate: f64,
    pub eta_secs: Option<f64>,
}

/// Process-wide status map plus a throttled renderer (§4.7).
///
/// `report` is cheap to call on every state transition; the renderer itself only emits
/// at most once per `min_interval` unless `force` is set, so hot loops (one call per
/// file) don't flood the log.
pub struct ProgressReporter {
    statuses: Mutex<HashMap<String, ComponentStatus>>,
    started_at: Instant,
    last_rendered: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl ProgressReporter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            started_at: Instant::now(),
            last_rendered: Mutex::new(None),
            min_interval,
        }
    }

    pub fn set_status(&self, component_id: impl Into<String>, status: Status, description: Option<String>) {
        let mut map = self.statuses.lock();
        let entry = map
            .entry(component_id.into())
            .or_insert_with(|| ComponentStatus {
                status: Status::Queued,
                started_at: Instant::now(),
                description: None,
            });
        entry.status = status;
        entry.description = description;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let map = self.statuses.lock();
        let mut queued = 0;
        let mut analyzing = 0;
        let mut completed = 0;
        let mut failed = 0;
        for entry in map.values() {
            match entry.status {
                Status::Queued => queued += 1,
                Status::Analyzing => analyzing += 1,
                Status::Completed => completed += 1,
                Status::Failed => failed += 1,
            }
        }
        let elapsed_secs = self.started_at.elapsed().as_secs_f64();
        let completion_rate = if elapsed_secs > 0.0 {
            completed as f64 / elapsed_secs
        } else {
            0.0
        };
        let remaining = queued + analyzing;
        let eta_secs = if completion_rate > 0.0 {
            Some(remaining as f64 / completion_rate)
        } else {
            None
        };
        ProgressSnapshot {
            queued,
            analyzing,
            completed,
            failed,
            elapsed_secs,
            completion_rate,
            eta_secs,
        }
    }

    /// Render the current snapshot through `sink`, throttled to `min_interval` unless
    /// `force` is set.
    pub fn render<Sink: FnOnce(&ProgressSnapshot)>(&self, force: bool, sink: Sink) {
        let now = Instant::now();
        let mut last = self.last_rendered.lock();
        let should_render = force
            || last
                .map(|t| now.duration_since(t) >= self.min_interval)
                .unwrap_or(true);
        if !should_render {
            return;
        }
        *last = Some(now);
        drop(last);
        sink(&self.snapshot());
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn snapshot_counts_by_status() {
        let reporter = ProgressReporter::new(Duration::from_secs(2));
        reporter.set_status("a", Status::Completed, None);
        reporter.set_status("b", Status::Analyzing, None);
        reporter.set_status("c", Status::Failed, None);
        let snap = reporter.snapshot();
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.analyzing, 1);
        assert_eq!(snap.failed, 1);
    }

    #[test]
    fn render_is_throttled_unless_forced() {
        let reporter = ProgressReporter::new(Duration::from_secs(60));
        let renders = AtomicUsize::new(0);
        reporter.render(false, |_| {
            renders.fetch_add(1, Ordering::SeqCst);
        });
        reporter.render(false, |_| {
            renders.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(renders.load(Ordering::SeqCst), 1);
        reporter.render(true, |_| {
            renders.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(renders.load(Ordering::SeqCst), 2);
    }
}
