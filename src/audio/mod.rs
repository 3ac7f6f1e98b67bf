//! Audio capture and playback
//!
//! Architecture:
//! - Capture ring: 4 frame slots filled by the sample interrupt
//! - Capture driver: one `SampleSource` read per timer tick
//! - Playback queue: refcounted front end over a non-blocking sink
//! - Test tone: LUT + phase accumulator
//! - Link mode: raw PCM or LPC frames on the wire

pub mod capture;
pub mod mode;
pub mod playback;
pub mod ring;
pub mod sink;
pub mod tone;

pub use capture::{CaptureDriver, SampleSource};
pub use mode::{LinkMode, LinkModeSelector};
pub use playback::{PlaybackError, PlaybackQueue, PlaybackSink};
pub use ring::{CaptureRing, ReadSlot, WriteSlot, CAPTURE_SLOTS};
pub use sink::{DmaRoom, MemorySink};
pub use tone::ToneGenerator;
