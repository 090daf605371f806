use std::fs;
use std::path::Path;

use ratchet_common::{Error, MalformedNamePolicy};
use ratchet_db::{
    AppliedMigrationStore, DirectorySource, MigrationParser, MigrationRunner, connect_in_memory,
};
use rusqlite::Connection;

fn write_migration(dir: &Path, file_name: &str, up: &str, down: &str) {
    let content = format!("-- {file_name}\nUP:\n{up}\nDOWN:\n{down}\nEND_MIGRATION\n");
    fs::write(dir.join(file_name), content).expect("write migration file");
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.query_row(
        "SELECT count(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )
    .unwrap()
}

fn applied_ids(conn: &Connection) -> Vec<i64> {
    AppliedMigrationStore::new(conn)
        .applied()
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect()
}

#[test]
fn second_run_applies_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(
        dir.path(),
        "001 - create_users",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);",
        "DROP TABLE users;",
    );
    write_migration(
        dir.path(),
        "002 - seed_users",
        "INSERT INTO users (name) VALUES ('ada');\nINSERT INTO users (name) VALUES ('grace');",
        "DELETE FROM users;",
    );
    let conn = connect_in_memory().unwrap();

    let first = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap();
    assert_eq!(first.applied.len(), 2);

    let records_after_first = AppliedMigrationStore::new(&conn).applied().unwrap();

    let second = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.previous_high_water_mark, Some(2));
    assert_eq!(AppliedMigrationStore::new(&conn).applied().unwrap(), records_after_first);

    // The seed ran exactly once.
    let users: i64 = conn
        .query_row("SELECT count(*) FROM users", [], |row| row.get(0))
        .unwrap();
    assert_eq!(users, 2);
}

#[test]
fn records_keep_the_full_file_name() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "003 - add_users_table", "CREATE TABLE users (id INT);", "DROP TABLE users;");
    let conn = connect_in_memory().unwrap();

    MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap();

    let records = AppliedMigrationStore::new(&conn).applied().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, 3);
    assert_eq!(records[0].file, "003 - add_users_table");
}

#[test]
fn new_files_above_the_mark_run_on_the_next_invocation() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "2 - two", "CREATE TABLE two (id INT);", "DROP TABLE two;");
    let conn = connect_in_memory().unwrap();

    MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap();

    write_migration(dir.path(), "7 - seven", "CREATE TABLE seven (id INT);", "DROP TABLE seven;");
    write_migration(dir.path(), "5 - five", "CREATE TABLE five (id INT);", "DROP TABLE five;");
    // Below the mark: never applied.
    write_migration(dir.path(), "1 - one", "CREATE TABLE one (id INT);", "DROP TABLE one;");

    let report = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap();
    let ids: Vec<_> = report.applied.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![5, 7]);
    assert!(!table_exists(&conn, "one"));
    assert_eq!(applied_ids(&conn), vec![2, 5, 7]);
}

#[test]
fn fail_fast_keeps_earlier_migrations_and_skips_later_ones() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "10 - ten", "CREATE TABLE ten (id INT);", "DROP TABLE ten;");
    write_migration(
        dir.path(),
        "11 - eleven",
        "BEGIN;\nCREATE TABLE eleven (id INT);",
        "DROP TABLE eleven;",
    );
    write_migration(dir.path(), "12 - twelve", "CREATE TABLE twelve (id INT);", "DROP TABLE twelve;");
    let conn = connect_in_memory().unwrap();

    let err = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::MigrationFailed { id: 11, .. }));

    assert_eq!(applied_ids(&conn), vec![10]);
    assert!(table_exists(&conn, "ten"));
    assert!(!table_exists(&conn, "twelve"));
}

#[test]
fn failed_run_leaves_the_open_transaction_to_the_caller() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "1 - one", "CREATE TABLE one (id INT);", "DROP TABLE one;");
    write_migration(
        dir.path(),
        "2 - two",
        "BEGIN;\nCREATE TABLE two (id INT);",
        "DROP TABLE two;",
    );
    let conn = connect_in_memory().unwrap();

    let err = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::MigrationFailed { id: 2, .. }));
    assert!(!conn.is_autocommit());

    conn.execute_batch("ROLLBACK;").unwrap();
    assert!(conn.is_autocommit());
    assert!(!table_exists(&conn, "two"));
    assert_eq!(applied_ids(&conn), vec![1]);
}

#[test]
fn driver_error_aborts_with_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "1 - ok", "CREATE TABLE ok (id INT);", "DROP TABLE ok;");
    write_migration(dir.path(), "2 - typo", "CREAT TABLE oops (id INT);", "SELECT 1;");
    write_migration(dir.path(), "3 - after", "CREATE TABLE after (id INT);", "DROP TABLE after;");
    let conn = connect_in_memory().unwrap();

    let err = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap_err();
    match err {
        Error::Execution(message) => assert!(message.contains("2 - typo"), "{message}"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(applied_ids(&conn), vec![1]);
    assert!(!table_exists(&conn, "after"));
}

#[test]
fn malformed_file_name_aborts_before_anything_runs() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "1 - ok", "CREATE TABLE ok (id INT);", "DROP TABLE ok;");
    fs::write(dir.path().join("README.md"), "notes").unwrap();
    let conn = connect_in_memory().unwrap();

    let err = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::MalformedFileName { .. }));
    assert!(err.is_recoverable());
    assert!(!table_exists(&conn, "ok"));
    // Bootstrapping already happened.
    assert!(table_exists(&conn, "migrations"));
}

#[test]
fn skip_policy_ignores_stray_files() {
    let dir = tempfile::tempdir().unwrap();
    write_migration(dir.path(), "1 - ok", "CREATE TABLE ok (id INT);", "DROP TABLE ok;");
    fs::write(dir.path().join(".gitkeep"), "").unwrap();
    let conn = connect_in_memory().unwrap();

    let report = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .with_malformed_name_policy(MalformedNamePolicy::Skip)
        .run()
        .unwrap();
    assert_eq!(report.applied.len(), 1);
}

#[test]
fn missing_up_marker_is_strict_unless_configured() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("1 - legacy"),
        "CREATE TABLE legacy (id INT);\nDOWN:\nDROP TABLE legacy;\nEND_MIGRATION\n",
    )
    .unwrap();
    let conn = connect_in_memory().unwrap();

    let err = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::MalformedMigration { .. }));

    MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .with_parser(MigrationParser::with_required_up_marker(false))
        .run()
        .unwrap();
    assert!(table_exists(&conn, "legacy"));
}

#[test]
fn empty_directory_only_bootstraps() {
    let dir = tempfile::tempdir().unwrap();
    let conn = connect_in_memory().unwrap();

    let report = MigrationRunner::new(&conn, DirectorySource::new(dir.path()))
        .run()
        .unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.high_water_mark(), None);
    assert!(table_exists(&conn, "migrations"));
    assert_eq!(AppliedMigrationStore::new(&conn).high_water_mark().unwrap(), None);
}
