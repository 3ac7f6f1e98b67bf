//! Playback queue backpressure and refcount tests

use esp_audio_link::audio::playback::PlaybackError;
use esp_audio_link::audio::{DmaRoom, MemorySink, PlaybackQueue, PlaybackSink};
use esp_audio_link::link::write_with_retry;

#[test]
fn test_backpressure_accepts_only_free_room() {
    let mut queue = PlaybackQueue::new(MemorySink::<100>::new());
    queue.begin(8000).unwrap();

    let pcm = [5i16; 1000];
    assert_eq!(queue.write(&pcm), 100);
    assert_eq!(queue.write(&pcm[100..]), 0);
    assert_eq!(queue.available(), 0);

    // room comes back as the output plays
    queue.sink_mut().play(30);
    assert_eq!(queue.write(&pcm[100..]), 30);
}

#[test]
fn test_refcounted_start_stop() {
    let mut queue = PlaybackQueue::new(MemorySink::<64>::new());
    queue.begin(8000).unwrap();
    queue.begin(8000).unwrap();
    assert_eq!(queue.users(), 2);
    assert_eq!(queue.sink().starts(), 1);

    queue.end();
    assert!(queue.is_active());
    queue.end();
    assert!(!queue.is_active());
    assert_eq!(queue.sink().stops(), 1);

    // unmatched end is a no-op
    queue.end();
    assert_eq!(queue.sink().stops(), 1);
}

#[test]
fn test_rate_conflict_and_start_failure() {
    let mut queue = PlaybackQueue::new(MemorySink::<64>::new());
    queue.begin(8000).unwrap();
    assert_eq!(
        queue.begin(16000),
        Err(PlaybackError::RateMismatch {
            active: 8000,
            requested: 16000
        })
    );
    assert_eq!(queue.users(), 1);
    queue.end();

    queue.sink_mut().fail_next_start();
    assert_eq!(queue.begin(8000), Err(PlaybackError::StartFailed(8000)));
    assert!(!queue.is_active());
    assert_eq!(queue.write(&[1, 2, 3]), 0);
}

#[test]
fn test_retry_policy_drops_excess() {
    let mut queue = PlaybackQueue::new(MemorySink::<100>::new());
    queue.begin(8000).unwrap();

    let pcm = [1i16; 1000];
    let mut idles = 0;
    let written = write_with_retry(&mut queue, &pcm, 4, &mut |_: &mut PlaybackQueue<MemorySink<100>>| {
        idles += 1
    });
    assert_eq!(written, 100);
    assert_eq!(idles, 4);

    // an idle hook that plays the output lets everything through
    queue.sink_mut().play(100);
    let written = write_with_retry(&mut queue, &pcm, 4, &mut |q: &mut PlaybackQueue<MemorySink<100>>| {
        q.sink_mut().play(100);
    });
    assert_eq!(written, 1000);
}

/// DMA-style sink: room is reported by a [`DmaRoom`] on a manual clock,
/// the way the I2S sink reports it on the target.
struct ClockedSink {
    room: DmaRoom,
    now_us: i64,
    driver_writes: u32,
    played: usize,
}

impl ClockedSink {
    fn new(capacity: usize) -> Self {
        Self {
            room: DmaRoom::new(capacity, 8000),
            now_us: 0,
            driver_writes: 0,
            played: 0,
        }
    }

    fn advance_ms(&mut self, ms: i64) {
        self.now_us += ms * 1000;
    }
}

impl PlaybackSink for ClockedSink {
    fn available(&self) -> usize {
        self.room.available(self.now_us)
    }

    fn write(&mut self, samples: &[i16]) -> usize {
        self.driver_writes += 1;
        let n = samples.len().min(self.room.available(self.now_us));
        self.room.commit(self.now_us, n);
        self.played += n;
        n
    }

    fn start(&mut self, _sample_rate: u32) -> Result<(), PlaybackError> {
        self.room.reset(self.now_us);
        Ok(())
    }

    fn stop(&mut self) {}
}

#[test]
fn test_dma_room_limits_queue_writes() {
    let mut queue = PlaybackQueue::new(ClockedSink::new(384));
    queue.begin(8000).unwrap();

    let pcm = [3i16; 1000];
    assert_eq!(queue.write(&pcm), 384);
    assert_eq!(queue.available(), 0);

    // A full DMA queue is never offered more data
    assert_eq!(queue.write(&pcm[384..]), 0);
    assert_eq!(queue.sink().driver_writes, 1);

    // 8 ms at 8 kHz frees one 64-sample DMA frame
    queue.sink_mut().advance_ms(8);
    assert_eq!(queue.available(), 64);
    assert_eq!(queue.write(&pcm[384..]), 64);
    assert_eq!(queue.write(&pcm[448..]), 0);
}

#[test]
fn test_retry_waits_for_dma_room() {
    let mut queue = PlaybackQueue::new(ClockedSink::new(384));
    queue.begin(8000).unwrap();

    let pcm = [3i16; 1000];
    let mut idles = 0;
    let written = write_with_retry(&mut queue, &pcm, 4, &mut |q: &mut PlaybackQueue<ClockedSink>| {
        idles += 1;
        q.sink_mut().advance_ms(1);
    });

    // 8 samples free up per idle millisecond; the stall budget is never hit
    assert_eq!(written, 1000);
    assert_eq!(queue.sink().played, 1000);
    assert_eq!(idles, (1000 - 384 + 7) / 8);
}
