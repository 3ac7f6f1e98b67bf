//! Console state machine: echo, line editing, dispatch

use core::fmt::Write;

use super::{execute, parse_line, ConsoleError, ControlPanel, LineBuffer, VERSION};

/// Console state machine
pub struct Console {
    line: LineBuffer,
    /// Escape sequence state
    escape_state: EscapeState,
}

#[derive(Clone, Copy, PartialEq)]
enum EscapeState {
    Normal,
    Escape,  // Got ESC
    Bracket, // Got ESC [
}

impl Console {
    /// Create new console
    pub const fn new() -> Self {
        Self {
            line: LineBuffer::new(),
            escape_state: EscapeState::Normal,
        }
    }

    /// Process a single input byte
    ///
    /// Returns Some(result) if a command completed, None if more input needed.
    pub fn process_byte(
        &mut self,
        byte: u8,
        panel: &ControlPanel<'_>,
        out: &mut dyn Write,
    ) -> Option<Result<(), ConsoleError>> {
        match self.escape_state {
            EscapeState::Normal => self.process_normal(byte, panel, out),
            EscapeState::Escape => {
                self.escape_state = if byte == b'[' {
                    EscapeState::Bracket
                } else {
                    EscapeState::Normal
                };
                None
            }
            // Arrow keys and friends are swallowed
            EscapeState::Bracket => {
                self.escape_state = EscapeState::Normal;
                None
            }
        }
    }

    fn process_normal(
        &mut self,
        byte: u8,
        panel: &ControlPanel<'_>,
        out: &mut dyn Write,
    ) -> Option<Result<(), ConsoleError>> {
        match byte {
            // Enter
            b'\r' | b'\n' => {
                let _ = writeln!(out);
                let result = if self.line.overflowed() {
                    Some(Err(ConsoleError::LineTooLong))
                } else if self.line.is_empty() {
                    None
                } else {
                    Some(execute(&parse_line(self.line.as_str()), panel, out))
                };

                if let Some(Err(e)) = &result {
                    let _ = writeln!(out, "{}", e);
                }
                self.line.clear();
                self.print_prompt(out);
                result
            }

            // Backspace
            0x7F | 0x08 => {
                if !self.line.is_empty() {
                    self.line.backspace();
                    // Echo: backspace, space, backspace
                    let _ = write!(out, "\x08 \x08");
                }
                None
            }

            // Escape
            0x1B => {
                self.escape_state = EscapeState::Escape;
                None
            }

            // Ctrl+C
            0x03 => {
                let _ = writeln!(out, "^C");
                self.line.clear();
                self.print_prompt(out);
                None
            }

            // Ctrl+U (clear line)
            0x15 => {
                for _ in 0..self.line.len() {
                    let _ = write!(out, "\x08 \x08");
                }
                self.line.clear();
                None
            }

            // Printable character
            0x20..=0x7E => {
                if self.line.push(byte) {
                    let _ = write!(out, "{}", byte as char);
                }
                None
            }

            _ => None,
        }
    }

    /// Print the prompt
    pub fn print_prompt(&self, out: &mut dyn Write) {
        let _ = write!(out, "link> ");
    }

    /// Print welcome banner
    pub fn print_banner(&self, out: &mut dyn Write) {
        let _ = writeln!(out, "\r\n{}", VERSION);
        let _ = writeln!(out, "Type 'help' for commands.\r");
        self.print_prompt(out);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mode::{LinkMode, LinkModeSelector};
    use crate::console::line_buffer::LINE_SIZE;
    use crate::health::CaptureHealth;

    fn feed(
        console: &mut Console,
        panel: &ControlPanel<'_>,
        input: &[u8],
        out: &mut String,
    ) -> Option<Result<(), ConsoleError>> {
        let mut last = None;
        for &b in input {
            if let Some(r) = console.process_byte(b, panel, out) {
                last = Some(r);
            }
        }
        last
    }

    #[test]
    fn test_line_dispatch() {
        let mode = LinkModeSelector::default();
        let health = CaptureHealth::new();
        let panel = ControlPanel::new(&mode, &health, &[], &[]);
        let mut console = Console::new();
        let mut out = String::new();

        assert_eq!(feed(&mut console, &panel, b"mode lpc\r", &mut out), Some(Ok(())));
        assert_eq!(mode.get(), LinkMode::Lpc);
        assert!(out.starts_with("mode lpc\n"));
        assert!(out.ends_with("link> "));
    }

    #[test]
    fn test_empty_line_and_errors() {
        let mode = LinkModeSelector::default();
        let health = CaptureHealth::new();
        let panel = ControlPanel::new(&mode, &health, &[], &[]);
        let mut console = Console::new();
        let mut out = String::new();

        assert_eq!(feed(&mut console, &panel, b"\r", &mut out), None);
        assert_eq!(
            feed(&mut console, &panel, b"reboot\r", &mut out),
            Some(Err(ConsoleError::UnknownCommand))
        );
        assert!(out.contains("E01: unknown command"));
    }

    #[test]
    fn test_editing_keys() {
        let mode = LinkModeSelector::default();
        let health = CaptureHealth::new();
        let panel = ControlPanel::new(&mode, &health, &[], &[]);
        let mut console = Console::new();
        let mut out = String::new();

        // Backspace fixes a typo, arrow keys are ignored
        feed(&mut console, &panel, b"mode lpx\x7fc\x1b[A\r", &mut out);
        assert_eq!(mode.get(), LinkMode::Lpc);

        // Ctrl+U drops the line
        assert_eq!(feed(&mut console, &panel, b"mode raw\x15\r", &mut out), None);
        assert_eq!(mode.get(), LinkMode::Lpc);

        // Ctrl+C too
        assert_eq!(feed(&mut console, &panel, b"mode raw\x03\r", &mut out), None);
        assert_eq!(mode.get(), LinkMode::Lpc);
    }

    #[test]
    fn test_long_line_rejected() {
        let mode = LinkModeSelector::default();
        let health = CaptureHealth::new();
        let panel = ControlPanel::new(&mode, &health, &[], &[]);
        let mut console = Console::new();
        let mut out = String::new();

        let long = [b'x'; LINE_SIZE + 5];
        feed(&mut console, &panel, &long, &mut out);
        assert_eq!(
            feed(&mut console, &panel, b"\r", &mut out),
            Some(Err(ConsoleError::LineTooLong))
        );
        // Buffer is usable again
        assert_eq!(feed(&mut console, &panel, b"version\r", &mut out), Some(Ok(())));
    }
}
