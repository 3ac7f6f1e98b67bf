//! Playback sink building blocks
//!
//! [`MemorySink`] is the host stand-in for the I2S output: a bounded sample
//! buffer that only frees room when the test (or the host demo) consumes
//! from it, the way the DMA frees room as it plays.
//!
//! [`DmaRoom`] is the free-room count of a DMA queue that drains at the
//! sample clock. The I2S sink feeds it the microsecond timer.

use super::playback::{PlaybackError, PlaybackSink};

/// Bounded sink with `N` samples of room.
pub struct MemorySink<const N: usize> {
    buffer: [i16; N],
    /// Next read position.
    read: usize,
    /// Queued samples.
    len: usize,
    running: bool,
    sample_rate: u32,
    starts: u32,
    stops: u32,
    fail_start: bool,
}

impl<const N: usize> MemorySink<N> {
    /// Create new empty sink
    pub const fn new() -> Self {
        Self {
            buffer: [0; N],
            read: 0,
            len: 0,
            running: false,
            sample_rate: 0,
            starts: 0,
            stops: 0,
            fail_start: false,
        }
    }

    /// Take up to `out.len()` queued samples, oldest first.
    ///
    /// Returns number of samples actually read.
    pub fn consume(&mut self, out: &mut [i16]) -> usize {
        let n = out.len().min(self.len);
        for s in &mut out[..n] {
            *s = self.buffer[self.read];
            self.read = (self.read + 1) % N;
        }
        self.len -= n;
        n
    }

    /// Discard up to `n` queued samples, as if played.
    pub fn play(&mut self, n: usize) -> usize {
        let n = n.min(self.len);
        self.read = (self.read + n) % N;
        self.len -= n;
        n
    }

    /// Get number of queued samples
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn stops(&self) -> u32 {
        self.stops
    }

    /// Make the next `start` fail.
    pub fn fail_next_start(&mut self) {
        self.fail_start = true;
    }
}

impl<const N: usize> Default for MemorySink<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PlaybackSink for MemorySink<N> {
    fn available(&self) -> usize {
        N - self.len
    }

    fn write(&mut self, samples: &[i16]) -> usize {
        let n = samples.len().min(N - self.len);
        let mut pos = (self.read + self.len) % N;
        for &s in &samples[..n] {
            self.buffer[pos] = s;
            pos = (pos + 1) % N;
        }
        self.len += n;
        n
    }

    fn start(&mut self, sample_rate: u32) -> Result<(), PlaybackError> {
        if core::mem::take(&mut self.fail_start) {
            return Err(PlaybackError::StartFailed(sample_rate));
        }
        self.running = true;
        self.sample_rate = sample_rate;
        self.starts += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
        self.stops += 1;
        self.read = 0;
        self.len = 0;
    }
}

/// Samples per DMA frame.
pub const DMA_FRAME: usize = 64;

/// Offer `samples` to a byte-oriented driver one DMA frame at a time.
///
/// `offer` gets little-endian PCM bytes and returns how many it took. A
/// split sample counts as not taken. Returns the samples accepted and
/// whether the driver ran out of room.
pub fn offer_in_frames<F>(samples: &[i16], mut offer: F) -> (usize, bool)
where
    F: FnMut(&[u8]) -> usize,
{
    let mut bytes = [0u8; DMA_FRAME * 2];
    let mut accepted = 0;
    for chunk in samples.chunks(DMA_FRAME) {
        let n = crate::transport::pcm_to_le(chunk, &mut bytes);
        let took = offer(&bytes[..n]).min(n) / 2;
        accepted += took;
        if took < chunk.len() {
            return (accepted, true);
        }
    }
    (accepted, false)
}

/// Free room of a DMA queue that plays out at `sample_rate`.
///
/// Queued samples are credited back as the clock advances. A short write
/// from the driver means the queue is full whatever the clock says, so
/// [`mark_full`](Self::mark_full) resynchronizes the count.
#[derive(Debug, Clone)]
pub struct DmaRoom {
    capacity: usize,
    sample_rate: u32,
    /// Samples queued as of `stamp_us`.
    queued: usize,
    stamp_us: i64,
}

impl DmaRoom {
    pub const fn new(capacity: usize, sample_rate: u32) -> Self {
        Self {
            capacity,
            sample_rate,
            queued: 0,
            stamp_us: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Empty queue at `now_us` (output just started or stopped).
    pub fn reset(&mut self, now_us: i64) {
        self.queued = 0;
        self.stamp_us = now_us;
    }

    /// Samples the queue can take at `now_us`.
    #[inline]
    pub fn available(&self, now_us: i64) -> usize {
        self.capacity - self.settle(now_us).0
    }

    /// Record `samples` accepted by the driver at `now_us`.
    pub fn commit(&mut self, now_us: i64, samples: usize) {
        let (queued, stamp_us) = self.settle(now_us);
        self.queued = (queued + samples).min(self.capacity);
        self.stamp_us = stamp_us;
    }

    /// The driver refused data: treat the queue as full from `now_us`.
    pub fn mark_full(&mut self, now_us: i64) {
        self.queued = self.capacity;
        self.stamp_us = now_us;
    }

    /// Queued count at `now_us` and the stamp it is valid from.
    ///
    /// The stamp only advances by whole played samples so fractional
    /// progress carries over to the next call.
    fn settle(&self, now_us: i64) -> (usize, i64) {
        let elapsed = now_us.saturating_sub(self.stamp_us).max(0) as u64;
        let played = elapsed * u64::from(self.sample_rate) / 1_000_000;
        if self.sample_rate == 0 || played >= self.queued as u64 {
            // Underrun: the queue ran dry somewhere before `now_us`
            return (0, now_us.max(self.stamp_us));
        }
        let played_us = played * 1_000_000 / u64::from(self.sample_rate);
        (self.queued - played as usize, self.stamp_us + played_us as i64)
    }
}
