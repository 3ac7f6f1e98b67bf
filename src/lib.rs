//! # esp-audio-link
//!
//! Fixed-point LPC speech link for small microcontrollers.
//!
//! ## Architecture
//!
//! Samples flow one way through owned context objects:
//! - The sample interrupt feeds a [`CaptureRing`] through a [`CaptureDriver`]
//! - The main loop takes full frames out of the ring and sends them as raw
//!   PCM or packed LPC parameter frames ([`link::Uplink`])
//! - Received frames are decoded and pushed into a bounded
//!   [`PlaybackQueue`] ([`link::Downlink`])
//! - The interrupt never blocks and never allocates; it logs through
//!   [`logging::LogStream`] only
//!
//! The codec itself ([`codec`]) is pure Q20 integer arithmetic
//! ([`fixed::Fixed`]) and has no hardware dependencies.

#![cfg_attr(not(test), no_std)]

pub mod audio;
pub mod codec;
pub mod config;
pub mod console;
pub mod critical;
pub mod fixed;
pub mod health;
pub mod link;
pub mod log_drain;
pub mod logging;
pub mod transport;

#[cfg(target_os = "espidf")]
pub mod hal;

pub use audio::{
    CaptureDriver, CaptureRing, LinkMode, LinkModeSelector, PlaybackQueue, PlaybackSink,
    SampleSource,
};
pub use codec::{CodecError, DecoderState, EncoderState, ParameterFrame};
pub use config::{ConfigError, LinkConfig};
pub use fixed::Fixed;
pub use health::CaptureHealth;
pub use link::{Downlink, Uplink};
pub use logging::{LogLevel, LogStream};
pub use transport::{FrameSink, FrameSource, LinkError};
