//! Link sessions: capture → wire, wire → speaker.
//!
//! # Architecture
//!
//! ```text
//! CaptureRing ──▶ Uplink::poll ──▶ FrameSink        (main loop, per poll)
//!                 encode / raw
//!
//! FrameSource ──▶ Downlink::play ──▶ PlaybackQueue  (until short read)
//!                 decode / raw       retry + idle hook
//! ```
//!
//! The wire format is latched when a session is created: switching the
//! mode selector affects the next session only.

use crate::audio::mode::{LinkMode, LinkModeSelector};
use crate::audio::playback::{PlaybackQueue, PlaybackSink};
use crate::audio::ring::{CaptureRing, CAPTURE_SLOTS};
use crate::audio::tone::ToneGenerator;
use crate::codec::{
    check_frame_len, DecoderState, EncoderState, ParameterFrame, MAX_FRAME_LEN, PARAM_FRAME_SIZE,
    SAMPLE_RATE,
};
use crate::transport::{le_to_pcm, pcm_to_le, FrameSink, FrameSource, LinkError};

/// Consecutive zero-progress writes tolerated before the rest of a frame
/// is dropped.
pub const DEFAULT_STALL_LIMIT: u32 = 64;

/// Largest wire frame (raw PCM at the maximum frame length).
pub const MAX_WIRE_FRAME: usize = MAX_FRAME_LEN * 2;

/// Uplink counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UplinkStats {
    pub frames_sent: u32,
    pub bytes_sent: u32,
    pub send_errors: u32,
}

/// Capture-side session: drains the ring onto the transport.
pub struct Uplink<'a, const N: usize = CAPTURE_SLOTS> {
    ring: &'a CaptureRing<N>,
    mode: LinkMode,
    encoder: EncoderState,
    wire: [u8; MAX_WIRE_FRAME],
    stats: UplinkStats,
}

impl<'a, const N: usize> Uplink<'a, N> {
    /// Start a session, latching the current mode.
    pub fn new(ring: &'a CaptureRing<N>, selector: &LinkModeSelector) -> Result<Self, LinkError> {
        Ok(Self {
            ring,
            mode: selector.get(),
            encoder: EncoderState::new(ring.frame_len())?,
            wire: [0; MAX_WIRE_FRAME],
            stats: UplinkStats::default(),
        })
    }

    #[inline]
    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    #[inline]
    pub fn stats(&self) -> UplinkStats {
        self.stats
    }

    /// Send at most one frame.
    ///
    /// Returns `Ok(false)` when no frame was ready. The ring slot is released
    /// whether or not the send succeeds.
    pub fn poll<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<bool, LinkError> {
        let Some(slot) = self.ring.lock_for_read() else {
            return Ok(false);
        };

        let len = match self.mode {
            LinkMode::Lpc => {
                let frame = self.encoder.encode(&slot)?;
                self.wire[..PARAM_FRAME_SIZE].copy_from_slice(&frame);
                PARAM_FRAME_SIZE
            }
            LinkMode::Raw => pcm_to_le(&slot, &mut self.wire),
        };
        self.ring.unlock_read(slot);

        match sink.send(&self.wire[..len]) {
            Ok(()) => {
                self.stats.frames_sent = self.stats.frames_sent.wrapping_add(1);
                self.stats.bytes_sent = self.stats.bytes_sent.wrapping_add(len as u32);
                Ok(true)
            }
            Err(e) => {
                self.stats.send_errors = self.stats.send_errors.wrapping_add(1);
                Err(e)
            }
        }
    }

    /// Send every frame currently available. Returns the number sent.
    pub fn flush<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<usize, LinkError> {
        let mut sent = 0;
        while self.poll(sink)? {
            sent += 1;
        }
        Ok(sent)
    }
}

/// Downlink counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DownlinkStats {
    pub frames: u32,
    pub samples_played: u32,
    pub samples_dropped: u32,
}

/// Playback-side session: decodes wire frames into the playback queue.
pub struct Downlink {
    mode: LinkMode,
    frame_len: usize,
    decoder: DecoderState,
    stall_limit: u32,
    stats: DownlinkStats,
}

impl Downlink {
    pub fn new(frame_len: usize, mode: LinkMode) -> Result<Self, LinkError> {
        check_frame_len(frame_len)?;
        Ok(Self {
            mode,
            frame_len,
            decoder: DecoderState::new(frame_len)?,
            stall_limit: DEFAULT_STALL_LIMIT,
            stats: DownlinkStats::default(),
        })
    }

    /// Zero-progress writes allowed per frame before dropping the rest.
    pub fn with_stall_limit(mut self, limit: u32) -> Self {
        self.stall_limit = limit;
        self
    }

    #[inline]
    pub fn mode(&self) -> LinkMode {
        self.mode
    }

    #[inline]
    pub fn stats(&self) -> DownlinkStats {
        self.stats
    }

    /// Bytes per wire frame for this session.
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.mode.frame_bytes(self.frame_len)
    }

    /// Play a whole stream: read frames until a short read.
    ///
    /// The queue is held (`begin`/`end`) for the duration. `idle` runs
    /// whenever the sink is full and gets the queue to wait on (or, on the
    /// host, to drain). Returns the number of frames played.
    pub fn play<Src, S, F>(
        &mut self,
        source: &mut Src,
        queue: &mut PlaybackQueue<S>,
        mut idle: F,
    ) -> Result<usize, LinkError>
    where
        Src: FrameSource + ?Sized,
        S: PlaybackSink,
        F: FnMut(&mut PlaybackQueue<S>),
    {
        queue.begin(SAMPLE_RATE)?;
        let result = self.play_frames(source, queue, &mut idle);
        queue.end();
        result
    }

    fn play_frames<Src, S, F>(
        &mut self,
        source: &mut Src,
        queue: &mut PlaybackQueue<S>,
        idle: &mut F,
    ) -> Result<usize, LinkError>
    where
        Src: FrameSource + ?Sized,
        S: PlaybackSink,
        F: FnMut(&mut PlaybackQueue<S>),
    {
        let mut wire = [0u8; MAX_WIRE_FRAME];
        let need = self.frame_bytes();
        let mut frames = 0;
        loop {
            if source.read_frame(&mut wire[..need]) < need {
                return Ok(frames);
            }
            self.play_frame(&wire[..need], queue, &mut *idle)?;
            frames += 1;
        }
    }

    /// Decode one wire frame and write it out, retrying while the sink is
    /// full. The queue must already be started.
    ///
    /// Returns the samples accepted.
    pub fn play_frame<S, F>(
        &mut self,
        wire: &[u8],
        queue: &mut PlaybackQueue<S>,
        mut idle: F,
    ) -> Result<usize, LinkError>
    where
        S: PlaybackSink,
        F: FnMut(&mut PlaybackQueue<S>),
    {
        let mut pcm = [0i16; MAX_FRAME_LEN];
        let len = match self.mode {
            LinkMode::Lpc => {
                let mut frame: ParameterFrame = [0; PARAM_FRAME_SIZE];
                let n = wire.len().min(PARAM_FRAME_SIZE);
                frame[..n].copy_from_slice(&wire[..n]);
                self.decoder.decode(&frame, &mut pcm)?
            }
            LinkMode::Raw => le_to_pcm(wire, &mut pcm[..self.frame_len]),
        };

        let written = write_with_retry(queue, &pcm[..len], self.stall_limit, &mut idle);
        // Counters wrap like the capture health counters
        self.stats.frames = self.stats.frames.wrapping_add(1);
        self.stats.samples_played = self.stats.samples_played.wrapping_add(written as u32);
        self.stats.samples_dropped = self.stats.samples_dropped.wrapping_add((len - written) as u32);
        Ok(written)
    }

    /// Clear decoder state between streams.
    pub fn reset(&mut self) {
        self.decoder.reset();
    }
}

/// Write all of `pcm`, calling `idle` while the sink is full.
///
/// After `stall_limit` consecutive writes that make no progress the rest is
/// dropped. Returns the samples accepted.
pub fn write_with_retry<S, F>(
    queue: &mut PlaybackQueue<S>,
    pcm: &[i16],
    stall_limit: u32,
    idle: &mut F,
) -> usize
where
    S: PlaybackSink,
    F: FnMut(&mut PlaybackQueue<S>) + ?Sized,
{
    let mut written = 0;
    let mut stalls = 0;
    while written < pcm.len() {
        let n = queue.write(&pcm[written..]);
        if n == 0 {
            stalls += 1;
            if stalls > stall_limit {
                break;
            }
            idle(&mut *queue);
        } else {
            stalls = 0;
            written += n;
        }
    }
    written
}

/// Encode a little-endian PCM stream into parameter frames.
///
/// Reads whole frames until a short read; a partial last frame is not
/// encoded. Returns the number of frames sent.
pub fn encode_pcm_stream<Src, Snk>(
    encoder: &mut EncoderState,
    source: &mut Src,
    sink: &mut Snk,
) -> Result<usize, LinkError>
where
    Src: FrameSource + ?Sized,
    Snk: FrameSink + ?Sized,
{
    let frame_len = encoder.frame_len();
    let mut wire = [0u8; MAX_WIRE_FRAME];
    let mut pcm = [0i16; MAX_FRAME_LEN];
    let mut frames = 0;
    loop {
        let need = frame_len * 2;
        if source.read_frame(&mut wire[..need]) < need {
            return Ok(frames);
        }
        le_to_pcm(&wire[..need], &mut pcm[..frame_len]);
        let frame = encoder.encode(&pcm[..frame_len])?;
        sink.send(&frame)?;
        frames += 1;
    }
}

/// Play `samples` samples of a tone through the queue.
///
/// Returns the samples accepted.
pub fn play_tone<S, F>(
    queue: &mut PlaybackQueue<S>,
    tone: &mut ToneGenerator,
    samples: usize,
    mut idle: F,
) -> Result<usize, LinkError>
where
    S: PlaybackSink,
    F: FnMut(&mut PlaybackQueue<S>),
{
    const CHUNK: usize = 64;

    queue.begin(SAMPLE_RATE)?;
    let mut played = 0;
    let mut chunk = [0i16; CHUNK];
    while played < samples {
        let n = (samples - played).min(CHUNK);
        tone.fill(&mut chunk[..n]);
        let written = write_with_retry(queue, &chunk[..n], DEFAULT_STALL_LIMIT, &mut idle);
        played += written;
        if written < n {
            break;
        }
    }
    queue.end();
    Ok(played)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sink::MemorySink;
    use crate::transport::{SliceSink, SliceSource};

    fn fill_frames(ring: &CaptureRing, count: i16) {
        for v in 0..count {
            let mut slot = ring.acquire_for_write().unwrap();
            while !slot.push(v) {}
            ring.commit_write(slot);
        }
    }

    struct FailingSink;

    impl FrameSink for FailingSink {
        fn send(&mut self, _frame: &[u8]) -> Result<(), LinkError> {
            Err(LinkError::SendFailed)
        }
    }

    #[test]
    fn test_uplink_raw_frames() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        let selector = LinkModeSelector::new(LinkMode::Raw);
        let mut uplink = Uplink::new(&ring, &selector).unwrap();

        let mut out = [0u8; 400];
        let mut sink = SliceSink::new(&mut out);
        assert!(!uplink.poll(&mut sink).unwrap());

        fill_frames(&ring, 3);
        assert_eq!(uplink.flush(&mut sink).unwrap(), 2);
        assert_eq!(sink.written().len(), 160);
        assert_eq!(&sink.written()[80..82], &[1, 0]);
        assert_eq!(uplink.stats().frames_sent, 2);
    }

    #[test]
    fn test_uplink_latches_mode() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        let selector = LinkModeSelector::new(LinkMode::Lpc);
        let mut uplink = Uplink::new(&ring, &selector).unwrap();
        selector.set(LinkMode::Raw);

        fill_frames(&ring, 2);
        let mut out = [0u8; 64];
        let mut sink = SliceSink::new(&mut out);
        assert!(uplink.poll(&mut sink).unwrap());
        assert_eq!(uplink.mode(), LinkMode::Lpc);
        assert_eq!(sink.written().len(), PARAM_FRAME_SIZE);
    }

    #[test]
    fn test_uplink_releases_slot_on_send_error() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        let selector = LinkModeSelector::default();
        let mut uplink = Uplink::new(&ring, &selector).unwrap();

        fill_frames(&ring, 3);
        assert_eq!(uplink.poll(&mut FailingSink), Err(LinkError::SendFailed));
        assert_eq!(ring.live(), 2);
        assert_eq!(uplink.stats().send_errors, 1);
    }

    #[test]
    fn test_downlink_raw_until_short_read() {
        let mut wire = [0u8; 2 * 80 + 10];
        for (i, b) in wire.iter_mut().enumerate() {
            *b = (i % 7) as u8;
        }
        let mut source = SliceSource::new(&wire);
        let mut queue = PlaybackQueue::new(MemorySink::<512>::new());
        let mut downlink = Downlink::new(40, LinkMode::Raw).unwrap();

        let frames = downlink.play(&mut source, &mut queue, |_| {}).unwrap();
        assert_eq!(frames, 2);
        assert!(!queue.is_active());
        assert_eq!(downlink.stats().samples_played, 80);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_downlink_drops_after_stall_budget() {
        let wire = [0u8; 2 * 40 * 3];
        let mut source = SliceSource::new(&wire);
        let mut queue = PlaybackQueue::new(MemorySink::<50>::new());
        let mut downlink = Downlink::new(40, LinkMode::Raw).unwrap().with_stall_limit(3);

        let mut idles = 0;
        let frames = downlink.play(&mut source, &mut queue, |_| idles += 1).unwrap();
        assert_eq!(frames, 3);
        let stats = downlink.stats();
        assert_eq!(stats.samples_played, 50);
        assert_eq!(stats.samples_dropped, 70);
        assert_eq!(idles, 6);
    }

    #[test]
    fn test_downlink_idle_hook_drains_sink() {
        let wire = [0x10u8; 2 * 40 * 4];
        let mut source = SliceSource::new(&wire);
        let mut queue = PlaybackQueue::new(MemorySink::<32>::new());
        let mut downlink = Downlink::new(40, LinkMode::Raw).unwrap();

        // the hook stands in for the DMA freeing room
        let mut played = 0;
        let frames = downlink.play(&mut source, &mut queue, |q| {
            played += q.sink_mut().play(16);
        });
        assert_eq!(frames, Ok(4));
        assert_eq!(downlink.stats().samples_dropped, 0);
        assert_eq!(downlink.stats().samples_played, 160);
        assert!(played >= 128);
    }

    #[test]
    fn test_counters_wrap_on_long_sessions() {
        let ring: CaptureRing = CaptureRing::new(40).unwrap();
        let selector = LinkModeSelector::new(LinkMode::Raw);
        let mut uplink = Uplink::new(&ring, &selector).unwrap();
        uplink.stats.bytes_sent = u32::MAX - 9;
        fill_frames(&ring, 2);
        let mut out = [0u8; 80];
        assert!(uplink.poll(&mut SliceSink::new(&mut out)).unwrap());
        assert_eq!(uplink.stats().bytes_sent, 70);

        let wire = [0u8; 2 * 40];
        let mut queue = PlaybackQueue::new(MemorySink::<16>::new());
        let mut downlink = Downlink::new(40, LinkMode::Raw).unwrap().with_stall_limit(0);
        downlink.stats.samples_played = u32::MAX;
        downlink.stats.samples_dropped = u32::MAX - 1;
        downlink.play(&mut SliceSource::new(&wire), &mut queue, |_| {}).unwrap();
        assert_eq!(downlink.stats().samples_played, 15);
        assert_eq!(downlink.stats().samples_dropped, 22);
    }

    #[test]
    fn test_encode_pcm_stream() {
        let mut pcm_bytes = [0u8; 160 * 2 * 3 + 5];
        for (i, b) in pcm_bytes.iter_mut().enumerate() {
            *b = (i * 31 % 251) as u8;
        }
        let mut source = SliceSource::new(&pcm_bytes);
        let mut out = [0u8; 64];
        let mut sink = SliceSink::new(&mut out);
        let mut encoder = EncoderState::new(160).unwrap();

        assert_eq!(encode_pcm_stream(&mut encoder, &mut source, &mut sink), Ok(3));
        assert_eq!(sink.written().len(), 3 * PARAM_FRAME_SIZE);
    }

    #[test]
    fn test_play_tone() {
        let mut queue = PlaybackQueue::new(MemorySink::<1024>::new());
        let mut tone = ToneGenerator::new(1000, 8000, 16000);
        assert_eq!(play_tone(&mut queue, &mut tone, 800, |_| {}), Ok(800));
        assert_eq!(queue.sink().starts(), 1);
        assert_eq!(queue.sink().stops(), 1);
    }
}
