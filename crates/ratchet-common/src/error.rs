use thiserror::Error;

use crate::types::MigrationId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("malformed migration file name {file:?}: {reason}")]
    MalformedFileName { file: String, reason: String },

    #[error("malformed migration file {file:?}: {source}")]
    MalformedMigration {
        file: String,
        #[source]
        source: ParseError,
    },

    #[error("invalid migration direction {0:?} (expected UP or DOWN)")]
    InvalidDirection(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("migration {id} ({file}) did not complete cleanly")]
    MigrationFailed { id: MigrationId, file: String },

    #[error("migration {id} ({file}) is already recorded as applied")]
    DuplicateMigration { id: MigrationId, file: String },

    #[error("migration id {id} is used by both {first:?} and {second:?}")]
    ConflictingMigrationId {
        id: MigrationId,
        first: String,
        second: String,
    },

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Validation failures about a single input. A caller may choose to skip
    /// the offending file instead of aborting; everything else is fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::MalformedFileName { .. }
                | Error::MalformedMigration { .. }
                | Error::InvalidDirection(_)
                | Error::ConflictingMigrationId { .. }
        )
    }
}

/// Failures of the pure migration body parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing `UP:` line")]
    MissingUp,

    #[error("missing `DOWN:` line")]
    MissingDown,

    #[error("missing `END_MIGRATION` line")]
    MissingEnd,
}
