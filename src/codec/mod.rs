//! Fixed-point LPC-10 speech codec.
//!
//! # Frame Layout
//!
//! ```text
//!  previous half frame      new frame
//! |----------------|================================|   history (bufLen)
//! |<------ first pitch region ------>|
//!                  |<------ second pitch region ------>|
//! ```
//!
//! Each encode call consumes `frame_len` PCM samples and produces one
//! [`ParameterFrame`] of [`PARAM_FRAME_SIZE`] bytes. Each decode call turns
//! one parameter frame back into `frame_len` samples.
//!
//! All coefficients assume 8000 Hz input.

pub mod analysis;
pub mod decoder;
pub mod encoder;
pub mod filters;
pub mod params;
pub mod pitch;
pub mod synthesis;

pub use decoder::DecoderState;
pub use encoder::EncoderState;
pub use params::{FrameParams, ParameterFrame, QuantizedParams, LPC_BITS, PARAM_FRAME_SIZE};

/// Sample rate the filters and pitch limits are designed for.
pub const SAMPLE_RATE: u32 = 8000;

/// Order of the prediction filter.
pub const LPC_ORDER: usize = 10;

/// Pitch detector decimation factor.
pub const DECIMATION: usize = 5;

/// Shortest lag searched by the pitch detector (decimated samples, 320 Hz).
pub const MIN_LAG: usize = 5;

/// Longest lag searched by the pitch detector (decimated samples, 40 Hz).
pub const MAX_LAG: usize = 40;

/// Shortest pitch period in samples.
pub const MIN_PERIOD: i32 = (DECIMATION * MIN_LAG) as i32;

/// Shortest supported frame.
pub const MIN_FRAME_LEN: usize = 40;

/// Longest supported frame. Longer frames cannot follow the vocal tract.
pub const MAX_FRAME_LEN: usize = 320;

/// History capacity for the longest frame.
pub const MAX_HISTORY_LEN: usize = history_len(MAX_FRAME_LEN);

/// History length for a frame: the frame plus half of the previous one.
#[inline]
pub const fn history_len(frame_len: usize) -> usize {
    frame_len * 3 / 2
}

/// Check that a frame length can be used by the encoder and decoder.
pub fn check_frame_len(frame_len: usize) -> Result<(), CodecError> {
    if !(MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&frame_len) || frame_len % 2 != 0 {
        return Err(CodecError::InvalidFrameLength(frame_len));
    }
    Ok(())
}

/// Codec errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Frame length is odd or outside 40..=320.
    #[error("invalid frame length {0} (even, 40..=320)")]
    InvalidFrameLength(usize),

    /// PCM buffer does not match the frame length.
    #[error("buffer holds {got} samples, frame needs {need}")]
    BufferSize { need: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_len_limits() {
        assert!(check_frame_len(160).is_ok());
        assert!(check_frame_len(40).is_ok());
        assert!(check_frame_len(320).is_ok());
        assert_eq!(check_frame_len(161), Err(CodecError::InvalidFrameLength(161)));
        assert_eq!(check_frame_len(38), Err(CodecError::InvalidFrameLength(38)));
        assert_eq!(check_frame_len(322), Err(CodecError::InvalidFrameLength(322)));
    }

    #[test]
    fn test_history_len() {
        assert_eq!(history_len(160), 240);
        assert_eq!(MAX_HISTORY_LEN, 480);
        assert_eq!(MIN_PERIOD, 25);
    }
}
