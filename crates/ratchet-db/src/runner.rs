//! Orchestrates a migration run.
//!
//! A run moves through bootstrapping (tracking table), scanning (high-water
//! mark and pending files) and then applies each pending migration in
//! ascending id order: parse, execute the UP body, record. The first failure
//! aborts the run. Nothing is rolled back: every migration recorded before the
//! failure stays applied. A transaction left open by a failed body is left
//! on the caller's connection as well.
//!
//! The runner assumes it is the only one working against the target database.
//! Two concurrent runs can both create the tracking table or apply the same
//! migration before either records it; callers that may race must hold an
//! external lock around [`MigrationRunner::run`].

use std::time::Instant;

use ratchet_common::{Direction, Error, MalformedNamePolicy, MigrationId, Result};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info};

use crate::applied_store::{AppliedMigrationRecord, AppliedMigrationStore};
use crate::catalog::{MigrationCatalog, MigrationFile, MigrationSource};
use crate::executor::{Executor, SqliteExecutor};
use crate::parser::MigrationParser;

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// High-water mark read before any migration was applied.
    pub previous_high_water_mark: Option<MigrationId>,
    /// Migrations applied by this run, in the order they were applied.
    pub applied: Vec<AppliedMigrationRecord>,
    pub elapsed_ms: u64,
}

impl RunReport {
    pub fn high_water_mark(&self) -> Option<MigrationId> {
        self.applied
            .last()
            .map(|record| record.id)
            .or(self.previous_high_water_mark)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationState {
    /// Recorded in the tracking table.
    Applied,
    /// Above the high-water mark; the next run will apply it.
    Pending,
    /// At or below the high-water mark but never recorded. It will never run.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub id: MigrationId,
    pub file_name: String,
    pub state: MigrationState,
}

pub struct MigrationRunner<'c, S, E = SqliteExecutor<'c>> {
    store: AppliedMigrationStore<'c>,
    catalog: MigrationCatalog<S>,
    parser: MigrationParser,
    executor: E,
}

impl<'c, S: MigrationSource> MigrationRunner<'c, S> {
    /// Runner with the default tracking table, strict parser and SQLite
    /// executor, all sharing `conn`.
    pub fn new(conn: &'c Connection, source: S) -> Self {
        Self {
            store: AppliedMigrationStore::new(conn),
            catalog: MigrationCatalog::new(source),
            parser: MigrationParser::default(),
            executor: SqliteExecutor::new(conn),
        }
    }
}

impl<'c, S: MigrationSource, E: Executor> MigrationRunner<'c, S, E> {
    pub fn with_executor<X: Executor>(self, executor: X) -> MigrationRunner<'c, S, X> {
        MigrationRunner {
            store: self.store,
            catalog: self.catalog,
            parser: self.parser,
            executor,
        }
    }

    pub fn with_store(mut self, store: AppliedMigrationStore<'c>) -> Self {
        self.store = store;
        self
    }

    pub fn with_parser(mut self, parser: MigrationParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_malformed_name_policy(mut self, policy: MalformedNamePolicy) -> Self {
        self.catalog = self.catalog.with_policy(policy);
        self
    }

    pub fn store(&self) -> &AppliedMigrationStore<'c> {
        &self.store
    }

    /// Apply every pending migration, stopping at the first failure.
    ///
    /// A body that leaves a transaction open fails the run with
    /// [`Error::MigrationFailed`]. That transaction is not rolled back here: it
    /// stays open on the borrowed connection, and the connection's owner must
    /// roll it back or drop the connection before using it again.
    pub fn run(&self) -> Result<RunReport> {
        let started = Instant::now();

        self.store.ensure_schema()?;
        let previous_high_water_mark = self.store.high_water_mark()?;
        let pending = self.catalog.list_pending(previous_high_water_mark)?;

        if pending.is_empty() {
            info!("database is up to date (high-water mark {previous_high_water_mark:?})");
        } else {
            info!(
                "{} pending migration(s) above high-water mark {previous_high_water_mark:?}",
                pending.len()
            );
        }

        let mut applied = Vec::with_capacity(pending.len());
        for file in &pending {
            self.apply(file)?;
            applied.push(AppliedMigrationRecord {
                id: file.id,
                file: file.file_name.clone(),
            });
        }

        Ok(RunReport {
            previous_high_water_mark,
            applied,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn apply(&self, file: &MigrationFile) -> Result<()> {
        let parsed = self
            .parser
            .parse(&file.raw_content)
            .map_err(|source| Error::MalformedMigration {
                file: file.file_name.clone(),
                source,
            })?;

        info!("applying migration {} ({})", file.id, file.name);
        let success = self
            .executor
            .execute(&parsed.up, Direction::Up)
            .map_err(|e| match e {
                Error::Execution(message) => Error::Execution(format!(
                    "migration {} ({}): {message}",
                    file.id, file.file_name
                )),
                other => other,
            })?;

        if !success {
            error!("migration {} ({}) did not complete cleanly", file.id, file.file_name);
            return Err(Error::MigrationFailed {
                id: file.id,
                file: file.file_name.clone(),
            });
        }

        self.store.record(file.id, &file.file_name)
    }

    /// Pending migrations a run would apply now. Reads only; the tracking
    /// table is not created.
    pub fn plan(&self) -> Result<Vec<MigrationFile>> {
        let high_water_mark = self.current_high_water_mark()?;
        self.catalog.list_pending(high_water_mark)
    }

    /// State of every catalogued migration. Reads only.
    pub fn status(&self) -> Result<Vec<StatusEntry>> {
        let (high_water_mark, applied) = if self.store.exists()? {
            (self.store.high_water_mark()?, self.store.applied()?)
        } else {
            (None, Vec::new())
        };

        let entries = self
            .catalog
            .scan()?
            .into_iter()
            .map(|entry| {
                let state = if applied.iter().any(|record| record.id == entry.id) {
                    MigrationState::Applied
                } else if high_water_mark.is_some_and(|mark| entry.id <= mark) {
                    MigrationState::Skipped
                } else {
                    MigrationState::Pending
                };
                StatusEntry {
                    id: entry.id,
                    file_name: entry.file_name,
                    state,
                }
            })
            .collect();

        Ok(entries)
    }

    fn current_high_water_mark(&self) -> Result<Option<MigrationId>> {
        if self.store.exists()? {
            self.store.high_water_mark()
        } else {
            Ok(None)
        }
    }
}
