//! Command handlers
//!
//! Handlers never touch the audio path directly. They read and write the
//! shared [`ControlPanel`]; the main loop acts on requests between frames.

use core::fmt::Write;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::parser::ParsedCommand;
use super::ConsoleError;
use crate::audio::mode::{LinkMode, LinkModeSelector};
use crate::health::CaptureHealth;
use crate::link::{DownlinkStats, UplinkStats};
use crate::logging::{LogLevel, LogStream};

/// Version string (set by build.rs, includes git hash)
pub const VERSION: &str = env!("VERSION_STRING");

/// Default and maximum `tone` duration in milliseconds.
pub const DEFAULT_TONE_MS: u32 = 1000;
pub const MAX_TONE_MS: u32 = 10_000;

/// State shared between the console and the main loop.
pub struct ControlPanel<'a> {
    mode: &'a LinkModeSelector,
    health: &'a CaptureHealth,
    /// Log streams, named in the same order as `stream_names`.
    streams: &'a [&'a LogStream],
    stream_names: &'a [&'a str],

    tone_ms: AtomicU32,
    save: AtomicBool,

    frames_sent: AtomicU32,
    send_errors: AtomicU32,
    frames_played: AtomicU32,
    samples_dropped: AtomicU32,
}

impl<'a> ControlPanel<'a> {
    pub fn new(
        mode: &'a LinkModeSelector,
        health: &'a CaptureHealth,
        streams: &'a [&'a LogStream],
        stream_names: &'a [&'a str],
    ) -> Self {
        Self {
            mode,
            health,
            streams,
            stream_names,
            tone_ms: AtomicU32::new(0),
            save: AtomicBool::new(false),
            frames_sent: AtomicU32::new(0),
            send_errors: AtomicU32::new(0),
            frames_played: AtomicU32::new(0),
            samples_dropped: AtomicU32::new(0),
        }
    }

    pub fn mode(&self) -> &LinkModeSelector {
        self.mode
    }

    /// Take a pending tone request (milliseconds).
    pub fn take_tone_request(&self) -> Option<u32> {
        match self.tone_ms.swap(0, Ordering::AcqRel) {
            0 => None,
            ms => Some(ms),
        }
    }

    /// Take a pending save request.
    pub fn take_save_request(&self) -> bool {
        self.save.swap(false, Ordering::AcqRel)
    }

    /// Publish the current uplink session counters.
    pub fn record_uplink(&self, stats: &UplinkStats) {
        self.frames_sent.store(stats.frames_sent, Ordering::Relaxed);
        self.send_errors.store(stats.send_errors, Ordering::Relaxed);
    }

    /// Publish the current downlink session counters.
    pub fn record_downlink(&self, stats: &DownlinkStats) {
        self.frames_played.store(stats.frames, Ordering::Relaxed);
        self.samples_dropped.store(stats.samples_dropped, Ordering::Relaxed);
    }

    fn stream_name(&self, idx: usize) -> &str {
        self.stream_names.get(idx).copied().unwrap_or("?")
    }
}

type Handler = fn(&ParsedCommand<'_>, &ControlPanel<'_>, &mut dyn Write) -> Result<(), ConsoleError>;

/// Command descriptor
pub struct CommandDescriptor {
    pub name: &'static str,
    pub brief: &'static str,
    pub handler: Handler,
}

/// All available commands
pub static COMMANDS: &[CommandDescriptor] = &[
    CommandDescriptor { name: "help", brief: "List commands", handler: cmd_help },
    CommandDescriptor { name: "mode", brief: "Show or set link mode (raw|lpc)", handler: cmd_mode },
    CommandDescriptor { name: "stats", brief: "Capture and link statistics", handler: cmd_stats },
    CommandDescriptor { name: "log", brief: "Show or set log level", handler: cmd_log },
    CommandDescriptor { name: "tone", brief: "Play test tone [ms]", handler: cmd_tone },
    CommandDescriptor { name: "save", brief: "Persist link settings", handler: cmd_save },
    CommandDescriptor { name: "version", brief: "Firmware version", handler: cmd_version },
];

/// Execute a parsed command
pub fn execute(
    cmd: &ParsedCommand<'_>,
    panel: &ControlPanel<'_>,
    out: &mut dyn Write,
) -> Result<(), ConsoleError> {
    if cmd.command.is_empty() {
        return Ok(()); // Empty line, do nothing
    }

    let handler = COMMANDS
        .iter()
        .find(|c| c.name == cmd.command)
        .ok_or(ConsoleError::UnknownCommand)?;

    if cmd.extra > 0 {
        return Err(ConsoleError::InvalidValue);
    }

    (handler.handler)(cmd, panel, out)
}

/// Get all command names
pub fn command_names() -> impl Iterator<Item = &'static str> {
    COMMANDS.iter().map(|c| c.name)
}

// --- Command Implementations ---

fn cmd_help(cmd: &ParsedCommand<'_>, _panel: &ControlPanel<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
    if let Some(name) = cmd.arg(0) {
        let c = COMMANDS
            .iter()
            .find(|c| c.name == name)
            .ok_or(ConsoleError::UnknownCommand)?;
        let _ = writeln!(out, "{}: {}", c.name, c.brief);
    } else {
        for c in COMMANDS {
            let _ = writeln!(out, "  {:<8} {}", c.name, c.brief);
        }
    }
    Ok(())
}

fn cmd_mode(cmd: &ParsedCommand<'_>, panel: &ControlPanel<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
    match cmd.arg(0) {
        None => {
            let _ = writeln!(out, "mode={}", panel.mode.get());
        }
        Some(value) => {
            let mode: LinkMode = value.parse().map_err(|_| ConsoleError::InvalidValue)?;
            let old = panel.mode.swap(mode);
            if old == mode {
                let _ = writeln!(out, "mode={}", mode);
            } else {
                let _ = writeln!(out, "mode={} (next session)", mode);
            }
        }
    }
    Ok(())
}

fn cmd_stats(cmd: &ParsedCommand<'_>, panel: &ControlPanel<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
    match cmd.arg(0) {
        None => {
            stats_capture(panel, out);
            stats_link(panel, out);
            stats_log(panel, out);
        }
        Some("capture") => stats_capture(panel, out),
        Some("link") => stats_link(panel, out),
        Some("log") => stats_log(panel, out),
        Some(_) => return Err(ConsoleError::InvalidValue),
    }
    Ok(())
}

fn stats_capture(panel: &ControlPanel<'_>, out: &mut dyn Write) {
    let h = panel.health.snapshot();
    let _ = writeln!(
        out,
        "capture: {} frames, {} dropped ({} episodes, {} recovered){}",
        h.captured,
        h.dropped,
        h.drop_edges,
        h.recover_edges,
        if h.dropping { ", DROPPING" } else { "" }
    );
}

fn stats_link(panel: &ControlPanel<'_>, out: &mut dyn Write) {
    let _ = writeln!(
        out,
        "uplink: {} frames sent, {} send errors",
        panel.frames_sent.load(Ordering::Relaxed),
        panel.send_errors.load(Ordering::Relaxed)
    );
    let _ = writeln!(
        out,
        "downlink: {} frames played, {} samples dropped",
        panel.frames_played.load(Ordering::Relaxed),
        panel.samples_dropped.load(Ordering::Relaxed)
    );
}

fn stats_log(panel: &ControlPanel<'_>, out: &mut dyn Write) {
    for (i, stream) in panel.streams.iter().enumerate() {
        let _ = writeln!(
            out,
            "log {}: {} pending, {} dropped",
            panel.stream_name(i),
            stream.pending(),
            stream.dropped()
        );
    }
}

fn cmd_log(cmd: &ParsedCommand<'_>, panel: &ControlPanel<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
    match cmd.arg(0) {
        None => {
            for (i, stream) in panel.streams.iter().enumerate() {
                let _ = writeln!(out, "{}={}", panel.stream_name(i), stream.max_level().as_str());
            }
        }
        Some(value) => {
            let level = LogLevel::parse(value).ok_or(ConsoleError::InvalidValue)?;
            let target = cmd.arg(1);
            let mut matched = false;
            for (i, stream) in panel.streams.iter().enumerate() {
                if target.is_none() || target == Some(panel.stream_name(i)) {
                    stream.set_max_level(level);
                    let _ = writeln!(out, "{}={}", panel.stream_name(i), level.as_str());
                    matched = true;
                }
            }
            if !matched {
                return Err(ConsoleError::InvalidValue);
            }
        }
    }
    Ok(())
}

fn cmd_tone(cmd: &ParsedCommand<'_>, panel: &ControlPanel<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
    let ms = match cmd.arg(0) {
        None => DEFAULT_TONE_MS,
        Some(value) => value.parse::<u32>().map_err(|_| ConsoleError::InvalidValue)?,
    };
    if ms == 0 || ms > MAX_TONE_MS {
        return Err(ConsoleError::OutOfRange);
    }
    panel.tone_ms.store(ms, Ordering::Release);
    let _ = writeln!(out, "tone {} ms", ms);
    Ok(())
}

fn cmd_save(_cmd: &ParsedCommand<'_>, panel: &ControlPanel<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
    panel.save.store(true, Ordering::Release);
    let _ = writeln!(out, "saving");
    Ok(())
}

fn cmd_version(_cmd: &ParsedCommand<'_>, _panel: &ControlPanel<'_>, out: &mut dyn Write) -> Result<(), ConsoleError> {
    let _ = writeln!(out, "{}", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::parser::parse_line;

    fn run(line: &str, panel: &ControlPanel<'_>) -> (Result<(), ConsoleError>, String) {
        let mut out = String::new();
        let result = execute(&parse_line(line), panel, &mut out);
        (result, out)
    }

    #[test]
    fn test_mode_switch() {
        let mode = LinkModeSelector::default();
        let health = CaptureHealth::new();
        let panel = ControlPanel::new(&mode, &health, &[], &[]);

        let (r, out) = run("mode plc", &panel);
        assert_eq!(r, Ok(()));
        assert_eq!(out, "mode=lpc (next session)\n");
        assert_eq!(mode.get(), LinkMode::Lpc);

        assert_eq!(run("mode mp3", &panel).0, Err(ConsoleError::InvalidValue));
        assert_eq!(run("mode", &panel).1, "mode=lpc\n");
    }

    #[test]
    fn test_tone_request() {
        let mode = LinkModeSelector::default();
        let health = CaptureHealth::new();
        let panel = ControlPanel::new(&mode, &health, &[], &[]);

        assert_eq!(panel.take_tone_request(), None);
        assert_eq!(run("tone", &panel).0, Ok(()));
        assert_eq!(panel.take_tone_request(), Some(DEFAULT_TONE_MS));
        assert_eq!(panel.take_tone_request(), None);

        assert_eq!(run("tone 0", &panel).0, Err(ConsoleError::OutOfRange));
        assert_eq!(run("tone 20000", &panel).0, Err(ConsoleError::OutOfRange));
        assert_eq!(run("tone abc", &panel).0, Err(ConsoleError::InvalidValue));
    }

    #[test]
    fn test_log_levels() {
        let mode = LinkModeSelector::default();
        let health = CaptureHealth::new();
        let isr = LogStream::new();
        let main = LogStream::new();
        let streams = [&isr, &main];
        let panel = ControlPanel::new(&mode, &health, &streams, &["isr", "main"]);

        assert_eq!(run("log debug main", &panel).1, "main=DEBUG\n");
        assert_eq!(main.max_level(), LogLevel::Debug);
        assert_eq!(isr.max_level(), LogLevel::Info);

        assert_eq!(run("log warn", &panel).0, Ok(()));
        assert_eq!(isr.max_level(), LogLevel::Warn);
        assert_eq!(main.max_level(), LogLevel::Warn);

        assert_eq!(run("log loud", &panel).0, Err(ConsoleError::InvalidValue));
        assert_eq!(run("log info uart", &panel).0, Err(ConsoleError::InvalidValue));
        assert_eq!(run("log", &panel).1, "isr=WARN\nmain=WARN\n");
    }

    #[test]
    fn test_stats_shows_counters() {
        let mode = LinkModeSelector::default();
        let health = CaptureHealth::new();
        health.on_commit();
        health.on_drop();
        let panel = ControlPanel::new(&mode, &health, &[], &[]);
        panel.record_uplink(&UplinkStats { frames_sent: 12, bytes_sent: 84, send_errors: 1 });

        let (r, out) = run("stats", &panel);
        assert_eq!(r, Ok(()));
        assert!(out.contains("capture: 1 frames, 1 dropped (1 episodes, 0 recovered), DROPPING"));
        assert!(out.contains("uplink: 12 frames sent, 1 send errors"));
        assert_eq!(run("stats tasks", &panel).0, Err(ConsoleError::InvalidValue));
    }
}
