//! Interrupt-side capture: one sample in per timer tick.
//!
//! [`CaptureDriver::tick`] is the whole body of the sample interrupt. It
//! reads one sample from the injected [`SampleSource`] and appends it to the
//! current ring slot, acquiring a new slot at each frame boundary. When the
//! ring is full the frame is dropped whole: samples keep being read (the ADC
//! has to be serviced) but are discarded until the next boundary.

use crate::audio::ring::{CaptureRing, WriteSlot, CAPTURE_SLOTS};
use crate::health::{CaptureHealth, HealthEdge};
use crate::logging::LogStream;
use crate::{rt_info, rt_warn};

/// Where capture samples come from.
pub trait SampleSource {
    /// Read one sample. Called from interrupt context: must not block.
    fn next_sample(&mut self) -> i16;
}

impl<F> SampleSource for F
where
    F: FnMut() -> i16,
{
    #[inline]
    fn next_sample(&mut self) -> i16 {
        self()
    }
}

/// Producer half of the capture path.
pub struct CaptureDriver<'a, S, const N: usize = CAPTURE_SLOTS> {
    ring: &'a CaptureRing<N>,
    health: &'a CaptureHealth,
    log: &'a LogStream,
    source: S,
    slot: Option<WriteSlot<'a, N>>,
    /// Samples still to discard from a dropped frame.
    skip: usize,
    ticks: u64,
    us_per_tick: i64,
}

impl<'a, S: SampleSource, const N: usize> CaptureDriver<'a, S, N> {
    pub fn new(
        ring: &'a CaptureRing<N>,
        health: &'a CaptureHealth,
        log: &'a LogStream,
        source: S,
        sample_rate: u32,
    ) -> Self {
        Self {
            ring,
            health,
            log,
            source,
            slot: None,
            skip: 0,
            ticks: 0,
            us_per_tick: 1_000_000 / i64::from(sample_rate.max(1)),
        }
    }

    /// Ticks since start.
    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Capture time of the current tick in microseconds.
    #[inline]
    pub fn now_us(&self) -> i64 {
        (self.ticks as i64).wrapping_mul(self.us_per_tick)
    }

    /// Service one sample interrupt.
    ///
    /// # Timing
    ///
    /// O(1) except at a frame boundary after a drop episode, where one log
    /// entry is formatted.
    #[inline]
    pub fn tick(&mut self) {
        let sample = self.source.next_sample();
        self.ticks = self.ticks.wrapping_add(1);

        if self.skip > 0 {
            self.skip -= 1;
            return;
        }

        if self.slot.is_none() {
            match self.ring.acquire_for_write() {
                Some(slot) => {
                    if let Some(HealthEdge::Recovered { dropped }) = self.health.on_acquire() {
                        rt_info!(self.log, self.now_us(), "capture recovered, {} frames dropped", dropped);
                    }
                    self.slot = Some(slot);
                }
                None => {
                    if self.health.on_drop().is_some() {
                        rt_warn!(self.log, self.now_us(), "capture ring full, dropping frames");
                    }
                    self.skip = self.ring.frame_len() - 1;
                    return;
                }
            }
        }

        let full = match self.slot.as_mut() {
            Some(slot) => slot.push(sample),
            None => false,
        };
        if full {
            if let Some(slot) = self.slot.take() {
                self.ring.commit_write(slot);
                self.health.on_commit();
            }
        }
    }

    /// Stop capturing. A frame mid-fill is abandoned.
    pub fn stop(self) -> S {
        self.source
    }
}
