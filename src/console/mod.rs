//! Serial console for link settings and diagnostics
//!
//! Polled from the main loop between frames, one byte at a time.
//! Zero heap allocation.

pub mod commands;
pub mod console;
pub mod error;
pub mod line_buffer;
pub mod parser;

pub use commands::{command_names, execute, ControlPanel, COMMANDS, VERSION};
pub use console::Console;
pub use error::ConsoleError;
pub use line_buffer::LineBuffer;
pub use parser::{parse_line, ParsedCommand};
