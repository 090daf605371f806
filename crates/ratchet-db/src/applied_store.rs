use ratchet_common::{Error, MigrationId, Result};
use rusqlite::{Connection, OptionalExtension, ffi, params};
use serde::Serialize;
use tracing::info;

pub const DEFAULT_TABLE: &str = "migrations";

const TABLE_PLACEHOLDER: &str = "{table}";

const FIND_TABLE_SQL: &str = include_str!("../queries/find_migrations_table.sql");
const CREATE_TABLE_SQL: &str = include_str!("../queries/create_migrations_table.sql");

/// SQL templates used to bootstrap the tracking table. `{table}` is replaced
/// with the configured table name.
///
/// `exists` must return at least one row when the table is present and no
/// rows when it is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingQueries {
    pub exists: String,
    pub create: String,
}

impl TrackingQueries {
    pub fn new(exists: impl Into<String>, create: impl Into<String>) -> Self {
        Self {
            exists: exists.into(),
            create: create.into(),
        }
    }

    /// The SQLite templates shipped with this crate.
    pub fn bundled() -> Self {
        Self::new(FIND_TABLE_SQL, CREATE_TABLE_SQL)
    }

    fn render(&self, table: &str) -> Self {
        Self {
            exists: self.exists.replace(TABLE_PLACEHOLDER, table),
            create: self.create.replace(TABLE_PLACEHOLDER, table),
        }
    }
}

impl Default for TrackingQueries {
    fn default() -> Self {
        Self::bundled()
    }
}

/// One row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigrationRecord {
    pub id: MigrationId,
    pub file: String,
}

/// Append-only record of applied migrations, kept in a table of the target
/// database. Borrows the run's single connection.
pub struct AppliedMigrationStore<'c> {
    conn: &'c Connection,
    table: String,
    queries: TrackingQueries,
}

impl<'c> AppliedMigrationStore<'c> {
    /// Store backed by the default `migrations` table and bundled templates.
    pub fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            table: DEFAULT_TABLE.to_string(),
            queries: TrackingQueries::bundled().render(DEFAULT_TABLE),
        }
    }

    pub fn with_table(conn: &'c Connection, table: &str, queries: TrackingQueries) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            conn,
            table: table.to_string(),
            queries: queries.render(table),
        })
    }

    pub fn exists(&self) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare(&self.queries.exists)
            .map_err(|e| Error::Database(format!("failed to prepare table lookup: {e}")))?;
        let mut rows = stmt
            .query([])
            .map_err(|e| Error::Database(format!("failed to look up tracking table: {e}")))?;
        let found = rows
            .next()
            .map_err(|e| Error::Database(format!("failed to read table lookup: {e}")))?
            .is_some();
        Ok(found)
    }

    /// Create the tracking table if it is absent. Returns whether it was created.
    pub fn ensure_schema(&self) -> Result<bool> {
        if self.exists()? {
            return Ok(false);
        }
        self.conn
            .execute_batch(&self.queries.create)
            .map_err(|e| Error::Database(format!("failed to create tracking table: {e}")))?;
        info!("created migration tracking table {}", self.table);
        Ok(true)
    }

    /// Highest applied id, or `None` when nothing has been applied.
    pub fn high_water_mark(&self) -> Result<Option<MigrationId>> {
        self.conn
            .query_row(
                &format!("SELECT id FROM {} ORDER BY id DESC LIMIT 1", self.table),
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Database(format!("failed to read high-water mark: {e}")))
    }

    /// Insert one row. Only a primary key or unique violation on the id means
    /// the migration is already recorded; any other constraint failure comes
    /// from the table's own schema and is reported as a database error.
    pub fn record(&self, id: MigrationId, file: &str) -> Result<()> {
        self.conn
            .execute(
                &format!("INSERT INTO {} (id, file) VALUES (?1, ?2)", self.table),
                params![id, file],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(ref err, _)
                    if err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        || err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    Error::DuplicateMigration {
                        id,
                        file: file.to_string(),
                    }
                }
                other => Error::Database(format!("failed to record migration {id}: {other}")),
            })?;
        Ok(())
    }

    /// Every applied record, ascending by id.
    pub fn applied(&self) -> Result<Vec<AppliedMigrationRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, file FROM {} ORDER BY id ASC", self.table))
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(AppliedMigrationRecord {
                    id: row.get(0)?,
                    file: row.get(1)?,
                })
            })
            .map_err(|e| Error::Database(format!("failed to query applied migrations: {e}")))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::Database(format!("failed to read applied migration row: {e}")))
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    let mut chars = table.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::Config(format!(
            "tracking table name {table:?} must be a plain SQL identifier"
        )));
    }
    Ok(())
}
