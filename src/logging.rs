//! RT-safe logging for the audio link.
//!
//! # Architecture
//!
//! ```text
//! Sample ISR / main loop     LogStream           drain (main loop)
//! ──────────────────────     ─────────           ─────────────────
//!
//! rt_warn!() ──────────────▶ [L0][L1][L2] ─────▶ UART / stdout
//! formats on the stack       lock-free ring      blocking ok
//! never blocks               drops when full
//! ```
//!
//! # Rules
//!
//! - The interrupt never calls blocking output; it uses the `rt_*!` macros.
//! - Each stream has exactly one producer context. The firmware gives the
//!   interrupt and the main loop a stream each.
//! - Messages may be dropped when a ring is full; drops are counted.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

/// Longest stored message; longer text is cut.
pub const MAX_MSG_LEN: usize = 96;

/// Default entries per stream (power of two).
pub const LOG_BUFFER_SIZE: usize = 64;

/// Log level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    /// Upper-case name used in drained lines.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Convert from raw u8 value (values past `Trace` clamp to `Trace`).
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a console name (`error`, `warn`, `info`, `debug`, `trace`).
    pub fn parse(name: &str) -> Option<Self> {
        [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ]
        .into_iter()
        .find(|l| l.as_str().eq_ignore_ascii_case(name))
    }
}

/// A single log entry.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct LogEntry {
    /// Microseconds since boot.
    pub timestamp_us: i64,
    pub level: LogLevel,
    /// Used bytes of `msg`.
    pub len: u8,
    pub msg: [u8; MAX_MSG_LEN],
}

impl LogEntry {
    const EMPTY: LogEntry = LogEntry {
        timestamp_us: 0,
        level: LogLevel::Info,
        len: 0,
        msg: [0; MAX_MSG_LEN],
    };

    /// Message text.
    pub fn text(&self) -> &str {
        core::str::from_utf8(&self.msg[..self.len as usize]).unwrap_or("<invalid utf8>")
    }

    fn fill(&mut self, timestamp_us: i64, level: LogLevel, text: &[u8]) {
        let used = text.len().min(MAX_MSG_LEN);
        self.timestamp_us = timestamp_us;
        self.level = level;
        self.len = used as u8;
        self.msg[..used].copy_from_slice(&text[..used]);
    }
}

impl Default for LogEntry {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Single-producer, single-drain ring of [`LogEntry`] records.
///
/// A full ring rejects the new entry and bumps `dropped`. Levels above
/// `max_level` are filtered by the macros before any formatting happens.
pub struct LogStream<const N: usize = LOG_BUFFER_SIZE> {
    entries: UnsafeCell<[LogEntry; N]>,
    write_idx: AtomicU32,
    read_idx: AtomicU32,
    dropped: AtomicU32,
    max_level: AtomicU8,
}

// SAFETY: One producer writes a slot before publishing it with a Release
// store of write_idx; the single drain reads it after an Acquire load.
unsafe impl<const N: usize> Sync for LogStream<N> {}
unsafe impl<const N: usize> Send for LogStream<N> {}

impl<const N: usize> LogStream<N> {
    const MASK: usize = N - 1;

    /// Create a new empty log stream passing `Info` and above.
    pub const fn new() -> Self {
        assert!(N.is_power_of_two(), "LogStream capacity must be a power of two");

        Self {
            entries: UnsafeCell::new([LogEntry::EMPTY; N]),
            write_idx: AtomicU32::new(0),
            read_idx: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            max_level: AtomicU8::new(LogLevel::Info as u8),
        }
    }

    /// Most verbose level accepted.
    #[inline]
    pub fn max_level(&self) -> LogLevel {
        LogLevel::from_u8(self.max_level.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set_max_level(&self, level: LogLevel) {
        self.max_level.store(level as u8, Ordering::Relaxed);
    }

    /// True if `level` passes this stream's filter.
    #[inline]
    pub fn enabled(&self, level: LogLevel) -> bool {
        (level as u8) <= self.max_level.load(Ordering::Relaxed)
    }

    /// Queue one entry. Safe to call from the sample interrupt.
    ///
    /// Returns `false` when the ring is full and the entry was counted as
    /// dropped.
    #[inline]
    pub fn push(&self, timestamp_us: i64, level: LogLevel, text: &[u8]) -> bool {
        let head = self.write_idx.load(Ordering::Relaxed);
        if head.wrapping_sub(self.read_idx.load(Ordering::Acquire)) >= N as u32 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // SAFETY: the slot at `head` is invisible to the drain until the
        // Release store below.
        unsafe { (*self.entries.get())[head as usize & Self::MASK].fill(timestamp_us, level, text) };

        self.write_idx.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Oldest queued entry, if any.
    #[inline]
    pub fn drain(&self) -> Option<LogEntry> {
        let tail = self.read_idx.load(Ordering::Relaxed);
        if tail == self.write_idx.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: published by the producer; not reused until read_idx passes it.
        let entry = unsafe { (*self.entries.get())[tail as usize & Self::MASK] };
        self.read_idx.store(tail.wrapping_add(1), Ordering::Release);
        Some(entry)
    }

    /// Entries rejected because the ring was full.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Report-and-clear form of [`dropped`](Self::dropped).
    #[inline]
    pub fn take_dropped(&self) -> u32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    #[inline]
    pub fn has_entries(&self) -> bool {
        self.pending() != 0
    }

    /// Entries waiting for the drain.
    #[inline]
    pub fn pending(&self) -> u32 {
        self.write_idx
            .load(Ordering::Acquire)
            .wrapping_sub(self.read_idx.load(Ordering::Relaxed))
    }
}

impl<const N: usize> Default for LogStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Render `args` into `buf`, cutting at its end. Returns the used length.
#[inline]
pub fn format_to_buffer(buf: &mut [u8], args: core::fmt::Arguments<'_>) -> usize {
    let mut out = BufWriter::new(buf);
    let _ = core::fmt::write(&mut out, args);
    out.pos
}

/// `core::fmt::Write` over a byte slice, truncating on overflow.
pub struct BufWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> BufWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn written(&self) -> &[u8] {
        &self.buf[..self.pos]
    }
}

impl core::fmt::Write for BufWriter<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let room = &mut self.buf[self.pos..];
        let n = s.len().min(room.len());
        room[..n].copy_from_slice(&s.as_bytes()[..n]);
        self.pos += n;
        Ok(())
    }
}

/// RT-safe log macro.
///
/// Use this in the interrupt and the main loop instead of `println!`.
/// Nothing is formatted when the stream filters out the level.
///
/// # Example
///
/// ```ignore
/// rt_log!(LogLevel::Warn, ISR_LOG, now_us, "slot {} dropped", seq);
/// ```
#[macro_export]
macro_rules! rt_log {
    ($level:expr, $stream:expr, $timestamp:expr, $($arg:tt)*) => {{
        let level = $level;
        if $stream.enabled(level) {
            let mut buf = [0u8; $crate::logging::MAX_MSG_LEN];
            let len = $crate::logging::format_to_buffer(&mut buf, format_args!($($arg)*));
            $stream.push($timestamp, level, &buf[..len]);
        }
    }};
}

/// RT-safe info log.
#[macro_export]
macro_rules! rt_info {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Info, $stream, $timestamp, $($arg)*)
    };
}

/// RT-safe warning log.
#[macro_export]
macro_rules! rt_warn {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Warn, $stream, $timestamp, $($arg)*)
    };
}

/// RT-safe error log.
#[macro_export]
macro_rules! rt_error {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Error, $stream, $timestamp, $($arg)*)
    };
}

/// RT-safe debug log.
#[macro_export]
macro_rules! rt_debug {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Debug, $stream, $timestamp, $($arg)*)
    };
}

/// RT-safe trace log.
#[macro_export]
macro_rules! rt_trace {
    ($stream:expr, $timestamp:expr, $($arg:tt)*) => {
        $crate::rt_log!($crate::logging::LogLevel::Trace, $stream, $timestamp, $($arg)*)
    };
}
