//! Command line parser
//!
//! Split on whitespace, at most 2 arguments.

/// Maximum number of arguments kept
pub const MAX_ARGS: usize = 2;

/// Parsed command
#[derive(Debug, Clone)]
pub struct ParsedCommand<'a> {
    /// The command name (first token)
    pub command: &'a str,
    /// Up to `MAX_ARGS` arguments
    pub args: [Option<&'a str>; MAX_ARGS],
    /// Tokens past `MAX_ARGS`
    pub extra: usize,
}

impl<'a> ParsedCommand<'a> {
    /// Get argument by index (0-based)
    pub fn arg(&self, idx: usize) -> Option<&'a str> {
        self.args.get(idx).copied().flatten()
    }
}

/// Parse a command line into command and arguments
pub fn parse_line(line: &str) -> ParsedCommand<'_> {
    let mut parts = line.split_whitespace();

    let command = parts.next().unwrap_or("");

    let mut args = [None; MAX_ARGS];
    for (slot, arg) in args.iter_mut().zip(parts.by_ref()) {
        *slot = Some(arg);
    }

    ParsedCommand {
        command,
        args,
        extra: parts.count(),
    }
}
