//! Cooperative UI pacing.
//!
//! Materialization runs on the host's UI-owning thread, so responsiveness
//! comes from interleaving batched work with cooperative yields rather than
//! from concurrency. [`UiPacer`] wraps a caller-supplied progress callback
//! and yield callback, and rate-limits both: an update fires only when
//! forced or when at least the configured interval has elapsed since the
//! previous one. Skipped updates are dropped, never queued.

use std::time::{Duration, Instant};

/// Default minimum interval between unforced updates.
pub const DEFAULT_PACER_INTERVAL: Duration = Duration::from_millis(300);

/// Progress payload for an update: either a percentage or an indeterminate
/// busy marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Work is ongoing but unquantified.
    Busy,
    /// Completed percentage, 0–100.
    Percent(u8),
}

/// Callback receiving paced progress updates.
pub type ProgressCallback = Box<dyn FnMut(&str, Progress) + Send>;

/// Cooperative-yield callback, e.g. one pump of the host's event loop.
pub type YieldCallback = Box<dyn FnMut() + Send>;

/// Rate limiter over a progress sink and a cooperative yield point.
pub struct UiPacer {
    progress: Option<ProgressCallback>,
    yield_fn: Option<YieldCallback>,
    interval: Duration,
    last: Option<Instant>,
}

impl UiPacer {
    /// Create a pacer with the default interval. Either callback may be
    /// absent; pacing bookkeeping still applies.
    pub fn new(progress: Option<ProgressCallback>, yield_fn: Option<YieldCallback>) -> Self {
        Self::with_interval(progress, yield_fn, DEFAULT_PACER_INTERVAL)
    }

    /// Create a pacer with a custom interval.
    pub fn with_interval(
        progress: Option<ProgressCallback>,
        yield_fn: Option<YieldCallback>,
        interval: Duration,
    ) -> Self {
        Self {
            progress,
            yield_fn,
            interval,
            last: None,
        }
    }

    /// A pacer that swallows everything; useful when the caller has no UI.
    pub fn disabled() -> Self {
        Self::new(None, None)
    }

    /// Report progress and yield, unless the call lands inside the
    /// rate-limit window. `force` bypasses the window. Dropped calls are
    /// lost, not delayed.
    pub fn update(&mut self, message: &str, progress: Progress, force: bool) {
        self.update_at(Instant::now(), message, progress, force);
    }

    fn update_at(&mut self, now: Instant, message: &str, progress: Progress, force: bool) {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if !(force || due) {
            return;
        }

        if let Some(cb) = self.progress.as_mut() {
            cb(message, progress);
        }
        if let Some(pump) = self.yield_fn.as_mut() {
            pump();
        }
        self.last = Some(now);
    }
}
