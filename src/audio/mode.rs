//! Link mode selector
//!
//! Atomic selection between raw PCM and LPC parameter frames on the wire.

use core::str::FromStr;
use core::sync::atomic::{AtomicU8, Ordering};

use crate::codec::PARAM_FRAME_SIZE;
use crate::config::ConfigError;

/// Wire format of a session
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkMode {
    /// Little-endian 16-bit PCM, `frame_len * 2` bytes per frame
    #[default]
    Raw = 0,
    /// Packed LPC parameter frames, 7 bytes per frame
    Lpc = 1,
}

impl LinkMode {
    /// Convert from u8
    #[inline]
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Lpc,
            _ => Self::Raw,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Lpc => "lpc",
        }
    }

    /// Bytes per wire frame for `frame_len` samples
    #[inline]
    pub fn frame_bytes(self, frame_len: usize) -> usize {
        match self {
            Self::Raw => frame_len * 2,
            Self::Lpc => PARAM_FRAME_SIZE,
        }
    }
}

impl FromStr for LinkMode {
    type Err = ConfigError;

    /// Accepts `raw` and `lpc`; `plc` is an older spelling of `lpc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("raw") {
            Ok(Self::Raw)
        } else if s.eq_ignore_ascii_case("lpc") || s.eq_ignore_ascii_case("plc") {
            Ok(Self::Lpc)
        } else {
            Err(ConfigError::UnknownMode)
        }
    }
}

impl core::fmt::Display for LinkMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thread-safe link mode selector
///
/// Written by the console, read by the uplink at session start.
pub struct LinkModeSelector {
    mode: AtomicU8,
}

impl LinkModeSelector {
    /// Create new selector
    pub const fn new(mode: LinkMode) -> Self {
        Self {
            mode: AtomicU8::new(mode as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> LinkMode {
        LinkMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, mode: LinkMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    /// Atomically swap to new mode, return old
    #[inline]
    pub fn swap(&self, mode: LinkMode) -> LinkMode {
        LinkMode::from_u8(self.mode.swap(mode as u8, Ordering::AcqRel))
    }
}

impl Default for LinkModeSelector {
    fn default() -> Self {
        Self::new(LinkMode::Raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("raw".parse::<LinkMode>(), Ok(LinkMode::Raw));
        assert_eq!("LPC".parse::<LinkMode>(), Ok(LinkMode::Lpc));
        assert_eq!("plc".parse::<LinkMode>(), Ok(LinkMode::Lpc));
        assert_eq!("adpcm".parse::<LinkMode>(), Err(ConfigError::UnknownMode));
    }

    #[test]
    fn test_frame_bytes() {
        assert_eq!(LinkMode::Raw.frame_bytes(160), 320);
        assert_eq!(LinkMode::Lpc.frame_bytes(160), 7);
    }

    #[test]
    fn test_selector_swap() {
        let sel = LinkModeSelector::default();
        assert_eq!(sel.get(), LinkMode::Raw);
        assert_eq!(sel.swap(LinkMode::Lpc), LinkMode::Raw);
        assert_eq!(sel.get(), LinkMode::Lpc);
        sel.set(LinkMode::Raw);
        assert_eq!(sel.get(), LinkMode::Raw);
    }
}
