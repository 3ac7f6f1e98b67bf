//! Interrupt-fed capture ring of whole audio frames.
//!
//! # Architecture
//!
//! ```text
//! sample ISR                 CaptureRing (N slots)          main loop
//! ──────────                 ─────────────────────          ─────────
//!
//! acquire_for_write() ─────▶ [full][full][fill][free] ────▶ lock_for_read()
//! push samples                  ▲tail        ▲head          encode / send
//! commit_write()                                            unlock_read()
//! ```
//!
//! # Rules
//!
//! - One producer (the sample interrupt), one consumer (the main loop).
//! - Slot state moves `Free → Filling → Full → Draining → Free`.
//! - The producer never blocks: a full ring drops the newest frame.
//! - The consumer only takes a slot while at least two are full, so the
//!   slot being filled and the slot being read are never the same.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::codec::{check_frame_len, CodecError, MAX_FRAME_LEN};
use crate::critical;

/// Number of capture slots.
pub const CAPTURE_SLOTS: usize = 4;

/// Full slots required before the consumer may take one.
pub const READ_THRESHOLD: usize = 2;

/// Fixed ring of `N` frame slots.
///
/// # Safety
///
/// Slot memory sits in `UnsafeCell`s. The producer writes only the slot at
/// `head` while `live < N`; the consumer reads only the slot at `tail` while
/// `live >= 2`. Those are different slots whenever both are active, and
/// `live` is published with Release/Acquire so a slot's samples are visible
/// before the slot is.
pub struct CaptureRing<const N: usize = CAPTURE_SLOTS> {
    slots: [UnsafeCell<[i16; MAX_FRAME_LEN]>; N],
    frame_len: usize,

    /// Next slot to fill (producer only).
    head: AtomicUsize,

    /// Oldest full slot (consumer only, updated masked).
    tail: AtomicUsize,

    /// Full slots, `0..=N`.
    live: AtomicUsize,

    /// A `WriteSlot` is outstanding.
    writing: AtomicBool,

    /// A `ReadSlot` is outstanding.
    reading: AtomicBool,
}

// SAFETY: See the type-level comment; all coordination is atomic.
unsafe impl<const N: usize> Sync for CaptureRing<N> {}
unsafe impl<const N: usize> Send for CaptureRing<N> {}

impl<const N: usize> CaptureRing<N> {
    const MASK: usize = N - 1;

    /// Create an empty ring of frames of `frame_len` samples.
    pub fn new(frame_len: usize) -> Result<Self, CodecError> {
        const { assert!(N.is_power_of_two() && N >= READ_THRESHOLD, "slot count must be a power of 2, at least 2") };
        check_frame_len(frame_len)?;

        Ok(Self {
            slots: [const { UnsafeCell::new([0; MAX_FRAME_LEN]) }; N],
            frame_len,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            live: AtomicUsize::new(0),
            writing: AtomicBool::new(false),
            reading: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Number of full slots.
    #[inline]
    pub fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Reserve the next free slot for filling (producer side).
    ///
    /// Returns `None` when every slot is full, or when a write slot is
    /// already outstanding. Never blocks.
    #[inline]
    pub fn acquire_for_write(&self) -> Option<WriteSlot<'_, N>> {
        if self.live.load(Ordering::Acquire) >= N {
            return None;
        }
        if self.writing.swap(true, Ordering::Acquire) {
            return None;
        }
        Some(WriteSlot {
            ring: self,
            index: self.head.load(Ordering::Relaxed),
            filled: 0,
        })
    }

    /// Publish a filled slot to the consumer and advance the producer index.
    ///
    /// Unfilled samples are zeroed so the consumer always sees a whole frame.
    #[inline]
    pub fn commit_write(&self, mut slot: WriteSlot<'_, N>) {
        let filled = slot.filled;
        slot.samples_mut()[filled..].fill(0);
        let index = slot.index;
        core::mem::forget(slot);

        self.head.store((index + 1) & Self::MASK, Ordering::Relaxed);
        self.live.fetch_add(1, Ordering::Release);
        self.writing.store(false, Ordering::Release);
    }

    /// Take the oldest full slot if at least two are full (consumer side).
    #[inline]
    pub fn lock_for_read(&self) -> Option<ReadSlot<'_, N>> {
        if self.live.load(Ordering::Acquire) < READ_THRESHOLD {
            return None;
        }
        if self.reading.swap(true, Ordering::Acquire) {
            return None;
        }
        Some(ReadSlot {
            ring: self,
            index: self.tail.load(Ordering::Relaxed),
        })
    }

    /// Release a slot taken with [`lock_for_read`](Self::lock_for_read).
    ///
    /// Same as dropping the `ReadSlot`.
    #[inline]
    pub fn unlock_read(&self, slot: ReadSlot<'_, N>) {
        drop(slot);
    }

    fn release_read(&self, index: usize) {
        critical::masked(|| {
            self.tail.store((index + 1) & Self::MASK, Ordering::Relaxed);
            self.live.fetch_sub(1, Ordering::Release);
            self.reading.store(false, Ordering::Release);
        });
    }

    fn abandon_write(&self) {
        self.writing.store(false, Ordering::Release);
    }

    /// Empty the ring for a new session.
    pub fn reset(&mut self) {
        *self.head.get_mut() = 0;
        *self.tail.get_mut() = 0;
        *self.live.get_mut() = 0;
        *self.writing.get_mut() = false;
        *self.reading.get_mut() = false;
    }

    /// Change the frame length of an idle ring and empty it.
    pub fn set_frame_len(&mut self, frame_len: usize) -> Result<(), CodecError> {
        check_frame_len(frame_len)?;
        self.frame_len = frame_len;
        self.reset();
        Ok(())
    }
}

/// A slot being filled by the producer.
///
/// Dropping it without [`CaptureRing::commit_write`] abandons the frame and
/// returns the slot.
pub struct WriteSlot<'a, const N: usize = CAPTURE_SLOTS> {
    ring: &'a CaptureRing<N>,
    index: usize,
    filled: usize,
}

impl<const N: usize> WriteSlot<'_, N> {
    /// Append one sample. Returns `true` once the frame is complete.
    ///
    /// Samples past the end of the frame are ignored.
    #[inline]
    pub fn push(&mut self, sample: i16) -> bool {
        let len = self.ring.frame_len;
        if self.filled < len {
            let i = self.filled;
            self.samples_mut()[i] = sample;
            self.filled += 1;
        }
        self.filled >= len
    }

    /// Copy as many samples as fit. Returns the number taken.
    pub fn extend_from_slice(&mut self, samples: &[i16]) -> usize {
        let start = self.filled;
        let n = samples.len().min(self.ring.frame_len - start);
        self.samples_mut()[start..start + n].copy_from_slice(&samples[..n]);
        self.filled += n;
        n
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.filled
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.filled >= self.ring.frame_len
    }

    /// Slot index in the ring.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    fn samples_mut(&mut self) -> &mut [i16] {
        // SAFETY: The producer owns the slot at `head` until commit or drop.
        unsafe { &mut (&mut (*self.ring.slots[self.index].get()))[..self.ring.frame_len] }
    }
}

impl<const N: usize> Drop for WriteSlot<'_, N> {
    fn drop(&mut self) {
        self.ring.abandon_write();
    }
}

/// The oldest full slot, held by the consumer. Dropping it frees the slot.
pub struct ReadSlot<'a, const N: usize = CAPTURE_SLOTS> {
    ring: &'a CaptureRing<N>,
    index: usize,
}

impl<const N: usize> ReadSlot<'_, N> {
    /// Slot index in the ring.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<const N: usize> core::ops::Deref for ReadSlot<'_, N> {
    type Target = [i16];

    fn deref(&self) -> &[i16] {
        // SAFETY: The slot at `tail` is full and the producer cannot reach it
        // while `live >= 2`.
        unsafe { &(&(*self.ring.slots[self.index].get()))[..self.ring.frame_len] }
    }
}

impl<const N: usize> Drop for ReadSlot<'_, N> {
    fn drop(&mut self) {
        self.ring.release_read(self.index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(ring: &CaptureRing, value: i16) -> bool {
        match ring.acquire_for_write() {
            Some(mut slot) => {
                while !slot.push(value) {}
                ring.commit_write(slot);
                true
            }
            None => false,
        }
    }

    #[test]
    fn test_rejects_bad_frame_len() {
        assert!(CaptureRing::<4>::new(0).is_err());
        assert!(CaptureRing::<4>::new(MAX_FRAME_LEN + 2).is_err());
    }

    #[test]
    fn test_read_needs_two_full_slots() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        assert!(ring.lock_for_read().is_none());

        assert!(fill(&ring, 1));
        assert!(ring.lock_for_read().is_none());

        assert!(fill(&ring, 2));
        let slot = ring.lock_for_read().unwrap();
        assert_eq!(slot.len(), 40);
        assert!(slot.iter().all(|&s| s == 1));
        ring.unlock_read(slot);

        assert_eq!(ring.live(), 1);
        assert!(ring.lock_for_read().is_none());
    }

    #[test]
    fn test_full_ring_refuses_writes() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        for v in 0..4 {
            assert!(fill(&ring, v));
        }
        assert_eq!(ring.live(), 4);
        assert!(ring.acquire_for_write().is_none());

        drop(ring.lock_for_read().unwrap());
        assert!(fill(&ring, 4));
    }

    #[test]
    fn test_fifo_order_across_wrap() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        let mut next_in = 0;
        let mut next_out = 0;
        for _ in 0..10 {
            while fill(&ring, next_in) {
                next_in += 1;
            }
            while let Some(slot) = ring.lock_for_read() {
                assert_eq!(slot[0], next_out);
                next_out += 1;
            }
        }
        assert_eq!(next_in - next_out, 1);
    }

    #[test]
    fn test_dropped_write_slot_is_abandoned() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        {
            let mut slot = ring.acquire_for_write().unwrap();
            slot.push(7);
            assert!(ring.acquire_for_write().is_none());
        }
        assert_eq!(ring.live(), 0);

        let slot = ring.acquire_for_write().unwrap();
        assert_eq!(slot.index(), 0);
    }

    #[test]
    fn test_partial_commit_is_zero_padded() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        let mut slot = ring.acquire_for_write().unwrap();
        assert_eq!(slot.extend_from_slice(&[9; 100]), 40);
        ring.commit_write(slot);

        let mut slot = ring.acquire_for_write().unwrap();
        slot.extend_from_slice(&[5; 10]);
        ring.commit_write(slot);

        drop(ring.lock_for_read().unwrap());
        fill(&ring, 0);
        let second = ring.lock_for_read().unwrap();
        assert!(second[..10].iter().all(|&s| s == 5));
        assert!(second[10..].iter().all(|&s| s == 0));
    }

    #[test]
    fn test_single_outstanding_reader() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        for v in 0..3 {
            fill(&ring, v);
        }
        let first = ring.lock_for_read().unwrap();
        assert!(ring.lock_for_read().is_none());
        drop(first);
        assert_eq!(ring.lock_for_read().unwrap()[0], 1);
    }

    #[test]
    fn test_reset_and_frame_len() {
        let mut ring: CaptureRing = CaptureRing::new(40).unwrap();
        fill(&ring, 1);
        fill(&ring, 2);
        ring.set_frame_len(160).unwrap();
        assert_eq!(ring.live(), 0);
        assert_eq!(ring.frame_len(), 160);
        assert_eq!(ring.set_frame_len(41), Err(CodecError::InvalidFrameLength(41)));
    }
}
