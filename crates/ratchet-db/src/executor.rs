use ratchet_common::{Direction, Error, Result};
use rusqlite::Connection;
use tracing::{debug, warn};

/// Runs one migration body against the database.
///
/// `Ok(true)` means the driver reported a clean status, `Ok(false)` means it
/// ran but left the connection in a non-clean state, and `Err` means the
/// driver itself raised an error.
///
/// Implementations do not clean up after `Ok(false)`; whoever owns the
/// connection decides whether to roll back.
pub trait Executor {
    fn execute(&self, statement: &str, direction: Direction) -> Result<bool>;
}

impl<E: Executor + ?Sized> Executor for &E {
    fn execute(&self, statement: &str, direction: Direction) -> Result<bool> {
        (**self).execute(statement, direction)
    }
}

/// Executes bodies as a batch on a borrowed SQLite connection. A body may hold
/// several semicolon separated statements.
pub struct SqliteExecutor<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteExecutor<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl Executor for SqliteExecutor<'_> {
    fn execute(&self, statement: &str, direction: Direction) -> Result<bool> {
        debug!("executing {direction} body ({} bytes)", statement.len());
        self.conn
            .execute_batch(statement)
            .map_err(|e| Error::Execution(e.to_string()))?;

        // A body that opens a transaction without closing it would swallow the
        // tracking insert that follows.
        if !self.conn.is_autocommit() {
            warn!("{direction} body left a transaction open");
            return Ok(false);
        }
        Ok(true)
    }
}
