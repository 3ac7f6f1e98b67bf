//! Log drain: moves entries out of the RT log streams to a blocking writer.
//!
//! The writer is the UART driver on the target and stdout on the host.
//! Draining runs in the main loop only.

use core::fmt::Write;

use crate::logging::{LogEntry, LogStream};

/// Format one entry as `[timestamp_us] LEVEL: message\n`.
pub fn format_log_entry(entry: &LogEntry, out: &mut dyn Write) -> core::fmt::Result {
    writeln!(
        out,
        "[{:10}] {}: {}",
        entry.timestamp_us,
        entry.level.as_str(),
        entry.text()
    )
}

/// Totals of one drain pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Entries written.
    pub written: usize,
    /// Drops reported (and reset) across the streams.
    pub dropped: u32,
}

/// Drain every stream in order, then report drops.
///
/// At most `budget` entries are taken per stream so a chatty producer cannot
/// starve the main loop. A drop notice is written once per pass for each
/// stream that lost messages since the last pass.
pub fn drain_streams(
    streams: &[&LogStream],
    out: &mut dyn Write,
    now_us: i64,
    budget: usize,
) -> DrainReport {
    let mut report = DrainReport::default();

    for stream in streams {
        for entry in core::iter::from_fn(|| stream.drain()).take(budget) {
            if format_log_entry(&entry, out).is_ok() {
                report.written += 1;
            }
        }
    }

    for (id, stream) in streams.iter().enumerate() {
        let dropped = stream.take_dropped();
        if dropped > 0 {
            let _ = writeln!(
                out,
                "[{:10}] WARN: stream {} dropped {} log messages",
                now_us, id, dropped
            );
            report.dropped += dropped;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;

    #[test]
    fn test_format_log_entry() {
        let stream = LogStream::<4>::new();
        stream.push(12345, LogLevel::Info, b"Test message");
        let entry = stream.drain().unwrap();

        let mut out = String::new();
        format_log_entry(&entry, &mut out).unwrap();
        assert_eq!(out, "[     12345] INFO: Test message\n");
    }

    #[test]
    fn test_drain_reports_drops_once() {
        let isr = LogStream::new();
        let main = LogStream::new();
        isr.push(1, LogLevel::Warn, b"capture dropping");
        main.push(2, LogLevel::Info, b"session start");
        for _ in 0..crate::logging::LOG_BUFFER_SIZE {
            isr.push(3, LogLevel::Info, b"x");
        }

        let mut out = String::new();
        let report = drain_streams(&[&isr, &main], &mut out, 99, usize::MAX);
        assert_eq!(report.written, crate::logging::LOG_BUFFER_SIZE + 1);
        assert_eq!(report.dropped, 1);
        assert!(out.starts_with("[         1] WARN: capture dropping\n"));
        assert!(out.contains("INFO: session start"));
        assert!(out.ends_with("WARN: stream 0 dropped 1 log messages\n"));

        let mut again = String::new();
        assert_eq!(drain_streams(&[&isr, &main], &mut again, 100, 8), DrainReport::default());
        assert!(again.is_empty());
    }

    #[test]
    fn test_drain_budget() {
        let stream = LogStream::new();
        for ts in 0..10 {
            stream.push(ts, LogLevel::Info, b"m");
        }
        let mut out = String::new();
        let report = drain_streams(&[&stream], &mut out, 0, 4);
        assert_eq!(report.written, 4);
        assert_eq!(stream.pending(), 6);
    }
}
