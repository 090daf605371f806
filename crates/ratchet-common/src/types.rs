use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Migration identity, taken from the numeric prefix of the file name.
/// Stored as SQLite's native 64-bit integer.
pub type MigrationId = i64;

/// Which body of a migration to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Direction::Up),
            "DOWN" => Ok(Direction::Down),
            _ => Err(Error::InvalidDirection(s.to_string())),
        }
    }
}

/// What the catalog does with a file whose name is not `"<id> - <name>"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedNamePolicy {
    /// Fail the scan with `Error::MalformedFileName`.
    #[default]
    Abort,
    /// Log a warning and leave the file out of the catalog.
    Skip,
}
