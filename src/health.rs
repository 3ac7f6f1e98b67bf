//! Capture health diagnostics.
//!
//! A full capture ring is not a failure: the newest frame is dropped and
//! capture carries on. What matters is seeing it happen, once per episode,
//! without flooding the log from interrupt context. [`CaptureHealth`] turns
//! the per-frame outcome into edges ("started dropping", "recovered") and
//! keeps counters for the console.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Transition reported by [`CaptureHealth`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HealthEdge {
    /// First frame dropped after a run of good frames.
    Dropping,
    /// First frame captured after a run of drops. Carries the run length.
    Recovered { dropped: u32 },
}

/// Thread-safe capture health.
///
/// Written from the sample interrupt, read from the main loop.
///
/// # Usage
///
/// ```ignore
/// // In the interrupt, once per frame boundary:
/// if let Some(edge) = HEALTH.on_frame(ring_full) {
///     rt_warn!(ISR_LOG, now_us, "capture {:?}", edge);
/// }
///
/// // In the main loop:
/// let snap = HEALTH.snapshot();
/// ```
pub struct CaptureHealth {
    /// True while frames are being dropped.
    dropping: AtomicBool,

    /// Frames committed to the ring.
    captured: AtomicU32,

    /// Frames dropped because the ring was full.
    dropped: AtomicU32,

    /// Drops in the current episode.
    run: AtomicU32,

    /// Number of dropping episodes.
    drop_edges: AtomicU32,

    /// Number of recoveries.
    recover_edges: AtomicU32,
}

impl CaptureHealth {
    pub const fn new() -> Self {
        Self {
            dropping: AtomicBool::new(false),
            captured: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            run: AtomicU32::new(0),
            drop_edges: AtomicU32::new(0),
            recover_edges: AtomicU32::new(0),
        }
    }

    /// Record a frame that could not get a slot.
    ///
    /// Returns `Some(Dropping)` only for the first drop of an episode.
    #[inline]
    pub fn on_drop(&self) -> Option<HealthEdge> {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.run.fetch_add(1, Ordering::Relaxed);
        if self.dropping.swap(true, Ordering::AcqRel) {
            None
        } else {
            self.drop_edges.fetch_add(1, Ordering::Relaxed);
            Some(HealthEdge::Dropping)
        }
    }

    /// Record a frame that got a slot.
    ///
    /// Returns `Some(Recovered)` only for the first success after drops.
    #[inline]
    pub fn on_acquire(&self) -> Option<HealthEdge> {
        if self.dropping.swap(false, Ordering::AcqRel) {
            self.recover_edges.fetch_add(1, Ordering::Relaxed);
            let dropped = self.run.swap(0, Ordering::Relaxed);
            Some(HealthEdge::Recovered { dropped })
        } else {
            None
        }
    }

    /// Record a committed frame.
    #[inline]
    pub fn on_commit(&self) {
        self.captured.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_dropping(&self) -> bool {
        self.dropping.load(Ordering::Acquire)
    }

    /// Total frames dropped since the last reset.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Total frames captured since the last reset.
    #[inline]
    pub fn captured(&self) -> u32 {
        self.captured.load(Ordering::Relaxed)
    }

    /// Clear all counters (capture must be stopped).
    pub fn reset(&self) {
        self.dropping.store(false, Ordering::Release);
        self.captured.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.run.store(0, Ordering::Relaxed);
        self.drop_edges.store(0, Ordering::Relaxed);
        self.recover_edges.store(0, Ordering::Relaxed);
    }

    /// Get a snapshot of the current counters.
    #[inline]
    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            dropping: self.is_dropping(),
            captured: self.captured(),
            dropped: self.dropped(),
            drop_edges: self.drop_edges.load(Ordering::Relaxed),
            recover_edges: self.recover_edges.load(Ordering::Relaxed),
        }
    }
}

impl Default for CaptureHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of capture health at a point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub dropping: bool,
    pub captured: u32,
    pub dropped: u32,
    pub drop_edges: u32,
    pub recover_edges: u32,
}
