//! Module: config
//!
//! Purpose: Session configuration for the audio link.
//!
//! Architecture:
//! - Compile-time limits live next to the code they size (`codec`,
//!   `audio::ring`) and are re-exported here
//! - `LinkConfig` is the per-session choice, checked by `validate()`
//! - `nvs` persists it on the target
//!
//! Safety: Plain data. Runtime switching goes through `LinkModeSelector`.

pub mod nvs;

pub use crate::audio::ring::CAPTURE_SLOTS;
pub use crate::codec::{MAX_FRAME_LEN, MIN_FRAME_LEN, SAMPLE_RATE};

use crate::audio::mode::LinkMode;
use crate::codec::{check_frame_len, CodecError};

/// Default frame length: 20 ms at 8 kHz.
pub const DEFAULT_FRAME_LEN: usize = 160;

/// Configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame length {0} (even, 40..=320)")]
    InvalidFrameLength(usize),
    #[error("unsupported sample rate {0} Hz (only 8000)")]
    UnsupportedSampleRate(u32),
    #[error("unknown link mode (raw or lpc)")]
    UnknownMode,
}

impl From<CodecError> for ConfigError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::InvalidFrameLength(n) => ConfigError::InvalidFrameLength(n),
            CodecError::BufferSize { got, .. } => ConfigError::InvalidFrameLength(got),
        }
    }
}

/// One audio link session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Capture and playback rate in Hz. The prefilters are designed for
    /// 8 kHz only.
    pub sample_rate: u32,
    /// Samples per frame.
    pub frame_len: usize,
    /// Wire format.
    pub mode: LinkMode,
}

impl LinkConfig {
    pub const fn new(frame_len: usize, mode: LinkMode) -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            frame_len,
            mode,
        }
    }

    /// Check every field against what the codec and ring support.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate != SAMPLE_RATE {
            return Err(ConfigError::UnsupportedSampleRate(self.sample_rate));
        }
        check_frame_len(self.frame_len)?;
        Ok(())
    }

    /// Bytes per wire frame.
    #[inline]
    pub fn frame_bytes(&self) -> usize {
        self.mode.frame_bytes(self.frame_len)
    }

    /// Frame duration in microseconds.
    #[inline]
    pub fn frame_us(&self) -> u32 {
        (self.frame_len as u64 * 1_000_000 / u64::from(self.sample_rate.max(1))) as u32
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_LEN, LinkMode::Raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = LinkConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.frame_bytes(), 320);
        assert_eq!(cfg.frame_us(), 20_000);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut cfg = LinkConfig::new(161, LinkMode::Lpc);
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidFrameLength(161)));
        cfg.frame_len = 38;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidFrameLength(38)));
        cfg.frame_len = 322;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidFrameLength(322)));
        cfg.frame_len = 320;
        cfg.sample_rate = 16000;
        assert_eq!(cfg.validate(), Err(ConfigError::UnsupportedSampleRate(16000)));
    }
}
