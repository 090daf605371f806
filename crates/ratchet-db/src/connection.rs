use std::path::Path;
use std::time::Duration;

use ratchet_common::{Error, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::info;

/// Open the target database. The busy timeout bounds how long a statement
/// waits on a lock held by another connection.
pub fn connect(db_path: &Path, busy_timeout: Duration) -> Result<Connection> {
    info!("opening database at {}", db_path.display());
    let conn = Connection::open(db_path)
        .map_err(|e| Error::Connection(format!("failed to open {}: {e}", db_path.display())))?;

    conn.busy_timeout(busy_timeout)
        .map_err(|e| Error::Connection(format!("failed to set busy timeout: {e}")))?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .map_err(|e| Error::Connection(format!("failed to set pragmas: {e}")))?;

    Ok(conn)
}

/// Open a database that must already exist. Unlike [`connect`] this never
/// creates the file.
pub fn connect_existing(db_path: &Path, busy_timeout: Duration) -> Result<Connection> {
    info!("opening existing database at {}", db_path.display());
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let conn = Connection::open_with_flags(db_path, flags)
        .map_err(|e| Error::Connection(format!("failed to open {}: {e}", db_path.display())))?;

    conn.busy_timeout(busy_timeout)
        .map_err(|e| Error::Connection(format!("failed to set busy timeout: {e}")))?;

    Ok(conn)
}

pub fn connect_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(|e| Error::Connection(format!("failed to open in-memory database: {e}")))?;

    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .map_err(|e| Error::Connection(format!("failed to set pragmas: {e}")))?;

    Ok(conn)
}
