//! Progress reporting and cooperative cancellation.
//!
//! The core never spawns threads. It reports coarse progress through a [`StatusSink`] supplied by
//! the caller and polls the same sink for cancellation at well-defined points (once per feature
//! while rasterizing, once per time step while diffusing, once per layer while projecting).

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Upper bound of the progress scale.
pub const PROGRESS_MAX: u16 = 1000;

pub trait StatusSink {
    /// `progress` is in `0..=PROGRESS_MAX`. Implementations must not block.
    fn on_progress(&self, progress: u16, phase: &str, detail: &str);

    fn is_cancelled(&self) -> bool;

    /// Fatal-but-expected conditions (bad attribute data, memory) with a user-facing message.
    fn on_error(&self, _title: &str, _message: &str, _detail: &str) {}
}

/// Returns [`Error::Interrupted`] when the sink reports cancellation.
pub fn check_cancelled(status: &dyn StatusSink) -> Result<()> {
    if status.is_cancelled() {
        tracing::debug!("cancellation observed");
        return Err(Error::Interrupted);
    }
    Ok(())
}

/// Sink that ignores progress and is never cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatus;

impl StatusSink for NoopStatus {
    fn on_progress(&self, _progress: u16, _phase: &str, _detail: &str) {}

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Maps a sub-phase's local `0..=PROGRESS_MAX` onto `[start, end]` of the parent scale.
pub struct ScopedStatus<'a> {
    inner: &'a dyn StatusSink,
    start: u16,
    end: u16,
}

impl<'a> ScopedStatus<'a> {
    pub fn new(inner: &'a dyn StatusSink, start: u16, end: u16) -> Self {
        let start = start.min(PROGRESS_MAX);
        let end = end.clamp(start, PROGRESS_MAX);
        Self { inner, start, end }
    }

    /// Convenience for reporting a completed fraction in `[0, 1]`.
    pub fn fraction(&self, fraction: f64, phase: &str, detail: &str) {
        let local = (fraction.clamp(0.0, 1.0) * f64::from(PROGRESS_MAX)).round() as u16;
        self.on_progress(local, phase, detail);
    }
}

impl StatusSink for ScopedStatus<'_> {
    fn on_progress(&self, progress: u16, phase: &str, detail: &str) {
        let span = u32::from(self.end - self.start);
        let local = u32::from(progress.min(PROGRESS_MAX));
        let mapped = self.start as u32 + span * local / u32::from(PROGRESS_MAX);
        self.inner.on_progress(mapped as u16, phase, detail);
    }

    fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    fn on_error(&self, title: &str, message: &str, detail: &str) {
        self.inner.on_error(title, message, detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<u16>>,
    }

    impl StatusSink for Recorder {
        fn on_progress(&self, progress: u16, _phase: &str, _detail: &str) {
            self.seen.borrow_mut().push(progress);
        }

        fn is_cancelled(&self) -> bool {
            false
        }
    }

    #[test]
    fn scoped_status_maps_local_range_onto_parent_slice() {
        let rec = Recorder::default();
        let scoped = ScopedStatus::new(&rec, 100, 800);
        scoped.on_progress(0, "p", "");
        scoped.on_progress(500, "p", "");
        scoped.on_progress(1000, "p", "");
        scoped.fraction(2.0, "p", "");
        assert_eq!(*rec.seen.borrow(), vec![100, 450, 800, 800]);
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = Cancellation::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
