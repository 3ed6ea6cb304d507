use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::TracerError;

/// Cooperative cancellation flag, settable from any thread. A lightweight
/// `Arc`-shared flag rather than a channel or async runtime.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ProgressReport {
    pub open_count: usize,
    pub closed_count: usize,
    pub elapsed: Duration,
}

/// Notifications an engine emits over its lifetime: periodic `Progress`
/// reports while it runs, then exactly one `Finished` when it stops.
#[derive(Clone, Copy, Debug)]
pub enum SearchEvent {
    Progress(ProgressReport),
    Finished { success: bool, elapsed: Duration },
}

/// Tracks the engine's loop counter, wall-clock deadline, and periodic
/// progress notifications. Checked every `cancel_check_interval` iterations,
/// never on every iteration.
pub struct ProgressTracker<'a> {
    started_at: Instant,
    deadline: Option<Instant>,
    cancel: CancelToken,
    check_interval: u64,
    progress_interval: Option<Duration>,
    last_report: Option<Instant>,
    iterations: u64,
    on_event: Option<Box<dyn FnMut(SearchEvent) + 'a>>,
    finished: bool,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(
        timeout: Duration,
        cancel: CancelToken,
        check_interval: u64,
        progress_interval: Duration,
        on_event: Option<Box<dyn FnMut(SearchEvent) + 'a>>,
    ) -> Self {
        let started_at = Instant::now();
        Self {
            started_at,
            deadline: (!timeout.is_zero()).then(|| started_at + timeout),
            cancel,
            check_interval: check_interval.max(1),
            progress_interval: (!progress_interval.is_zero()).then_some(progress_interval),
            last_report: None,
            iterations: 0,
            on_event,
            finished: false,
        }
    }

    /// Called once per completed expansion. Returns an error if the engine
    /// must stop; the caller is responsible for surfacing `Finished(false)`.
    pub fn tick(&mut self, open_count: usize, closed_count: usize) -> Result<(), TracerError> {
        self.iterations += 1;
        if self.iterations % self.check_interval == 0 {
            if self.cancel.is_cancelled() {
                warn!(iterations = self.iterations, "search cancelled");
                return Err(TracerError::Interrupted);
            }
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    let elapsed = self.started_at.elapsed();
                    warn!(?elapsed, "search timed out");
                    return Err(TracerError::Timeout(elapsed));
                }
            }
        }
        if let Some(interval) = self.progress_interval {
            let now = Instant::now();
            let due = self.last_report.map(|t| now - t >= interval).unwrap_or(true);
            if due {
                self.last_report = Some(now);
                if let Some(cb) = self.on_event.as_mut() {
                    cb(SearchEvent::Progress(ProgressReport { open_count, closed_count, elapsed: self.started_at.elapsed() }));
                }
            }
        }
        Ok(())
    }

    /// Emits the single terminal callback. Idempotent: a second call is a
    /// no-op, guaranteeing `Finished` fires exactly once.
    pub fn finish(&mut self, success: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        let elapsed = self.started_at.elapsed();
        debug!(success, iterations = self.iterations, ?elapsed, "search finished");
        if let Some(cb) = self.on_event.as_mut() {
            cb(SearchEvent::Finished { success, elapsed });
        }
    }
}
