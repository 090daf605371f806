use ratchet_common::{Direction, ParseError};
use serde::Serialize;

pub const UP_MARKER: &str = "UP:";
pub const DOWN_MARKER: &str = "DOWN:";
pub const END_MARKER: &str = "END_MIGRATION";

#[cfg(windows)]
const LINE_SEPARATOR: &str = "\r\n";
#[cfg(not(windows))]
const LINE_SEPARATOR: &str = "\n";

/// The two bodies of a migration file. Each body is handed to the database
/// as a single batch; it is never split into individual statements here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMigration {
    pub up: String,
    pub down: String,
}

impl ParsedMigration {
    pub fn statement(&self, direction: Direction) -> &str {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }
}

/// Splits migration text on the exact-match sentinel lines `UP:`, `DOWN:` and
/// `END_MIGRATION`. Anything before `UP:` or after `END_MIGRATION` is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationParser {
    require_up_marker: bool,
}

impl Default for MigrationParser {
    fn default() -> Self {
        Self {
            require_up_marker: true,
        }
    }
}

impl MigrationParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// A parser that accepts a file without an `UP:` line and treats every
    /// line before `DOWN:` as the UP body.
    pub fn lenient() -> Self {
        Self {
            require_up_marker: false,
        }
    }

    pub fn with_required_up_marker(require_up_marker: bool) -> Self {
        Self { require_up_marker }
    }

    pub fn parse(&self, content: &str) -> Result<ParsedMigration, ParseError> {
        let lines: Vec<&str> = content.lines().collect();

        let down = lines
            .iter()
            .position(|line| *line == DOWN_MARKER)
            .ok_or(ParseError::MissingDown)?;

        let end = lines[down + 1..]
            .iter()
            .position(|line| *line == END_MARKER)
            .map(|offset| down + 1 + offset)
            .ok_or(ParseError::MissingEnd)?;

        let up_start = match lines[..down].iter().position(|line| *line == UP_MARKER) {
            Some(up) => up + 1,
            None if self.require_up_marker => return Err(ParseError::MissingUp),
            None => 0,
        };

        Ok(ParsedMigration {
            up: lines[up_start..down].join(LINE_SEPARATOR),
            down: lines[down + 1..end].join(LINE_SEPARATOR),
        })
    }
}
