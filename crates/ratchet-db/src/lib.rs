pub mod applied_store;
pub mod catalog;
pub mod connection;
pub mod executor;
pub mod parser;
pub mod runner;

pub use rusqlite::Connection;

pub use applied_store::{AppliedMigrationRecord, AppliedMigrationStore, TrackingQueries};
pub use catalog::{
    CatalogEntry, DirectorySource, MemorySource, MigrationCatalog, MigrationFile, MigrationSource,
};
pub use connection::{connect, connect_existing, connect_in_memory};
pub use executor::{Executor, SqliteExecutor};
pub use parser::{MigrationParser, ParsedMigration};
pub use runner::{MigrationRunner, MigrationState, RunReport, StatusEntry};
