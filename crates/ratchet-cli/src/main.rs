mod report;
mod scaffold;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ratchet_common::Direction;
use ratchet_config::{AppConfig, ConfigLoader};
use ratchet_db::{
    AppliedMigrationStore, Connection, DirectorySource, MigrationFile, MigrationParser,
    MigrationRunner, TrackingQueries, connect, connect_existing, connect_in_memory,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = "\
ratchet assumes a single runner per database. Running two `ratchet migrate`
processes against the same database at once can apply a migration twice;
serialize deployments with an external lock.";

#[derive(Parser)]
#[command(name = "ratchet", version, about, after_help = AFTER_HELP)]
struct Cli {
    /// Config file (YAML or TOML). Defaults to ./ratchet.{yml,yaml,toml} if present.
    #[arg(long, global = true, env = "RATCHET_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database to migrate.
    #[arg(long, global = true, env = "RATCHET_DATABASE")]
    database: Option<PathBuf>,

    /// Directory holding `<id> - <name>` migration files.
    #[arg(long = "dir", global = true, env = "RATCHET_MIGRATIONS_DIR")]
    dir: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply every pending migration, stopping at the first failure.
    Migrate {
        /// List what would be applied without touching the database.
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show applied, pending and skipped migrations.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Create a new migration file with the next free id.
    New { name: String },
    /// Print the parsed UP or DOWN body of a migration file.
    Inspect {
        file: PathBuf,
        #[arg(long, default_value = "up")]
        direction: String,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(&cli)?;

    match cli.command {
        Command::Migrate { dry_run: true, json } => {
            report::print_plan(&dry_run_plan(&config)?, json)?;
        }
        Command::Migrate { dry_run: false, json } => {
            let conn = open(&config)?;
            let runner = build_runner(&conn, &config)?;
            let run = runner.run().context("migration run aborted")?;
            report::print_run(&run, &config, json)?;
        }
        Command::Status { json } => {
            let conn = open_read_only(&config)?;
            let runner = build_runner(&conn, &config)?;
            let status = runner.status().context("failed to read migration status")?;
            report::print_status(&status, json)?;
        }
        Command::New { name } => {
            let path = scaffold::create_migration(&config.migrations.directory, &name)?;
            info!("created {}", path.display());
            println!("Created {}", path.display());
        }
        Command::Inspect { file, direction } => {
            let direction: Direction = direction.parse()?;
            print!("{}", inspect(&file, direction, &config)?);
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load(path)?,
        None => ConfigLoader::discover(Path::new("."))?,
    };
    if let Some(database) = &cli.database {
        config.database.path = database.clone();
    }
    if let Some(dir) = &cli.dir {
        config.migrations.directory = dir.clone();
    }
    Ok(config)
}

fn open(config: &AppConfig) -> Result<Connection> {
    connect(&config.database.path, config.database.busy_timeout())
        .context("failed to connect to the target database")
}

/// Open for commands that only read. A database that does not exist yet is
/// stood in for by an empty in-memory one, so the file is never created.
fn open_read_only(config: &AppConfig) -> Result<Connection> {
    let path = &config.database.path;
    let conn = if path.exists() {
        connect_existing(path, config.database.busy_timeout())
    } else {
        info!("{} does not exist yet, nothing is applied", path.display());
        connect_in_memory()
    };
    conn.context("failed to connect to the target database")
}

fn dry_run_plan(config: &AppConfig) -> Result<Vec<MigrationFile>> {
    let conn = open_read_only(config)?;
    let plan = build_runner(&conn, config)?
        .plan()
        .context("failed to plan migrations")?;
    Ok(plan)
}

fn tracking_queries(config: &AppConfig) -> Result<TrackingQueries> {
    let mut queries = TrackingQueries::bundled();
    if let Some(path) = &config.migrations.find_table_query {
        queries.exists = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
    }
    if let Some(path) = &config.migrations.create_table_query {
        queries.create = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
    }
    Ok(queries)
}

fn build_runner<'c>(
    conn: &'c Connection,
    config: &AppConfig,
) -> Result<MigrationRunner<'c, DirectorySource>> {
    let store =
        AppliedMigrationStore::with_table(conn, &config.migrations.table, tracking_queries(config)?)?;

    Ok(MigrationRunner::new(conn, DirectorySource::new(&config.migrations.directory))
        .with_store(store)
        .with_parser(MigrationParser::with_required_up_marker(
            config.migrations.require_up_marker,
        ))
        .with_malformed_name_policy(config.migrations.on_malformed_name))
}

fn inspect(file: &Path, direction: Direction, config: &AppConfig) -> Result<String> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let parsed = MigrationParser::with_required_up_marker(config.migrations.require_up_marker)
        .parse(&content)
        .with_context(|| format!("malformed migration file {}", file.display()))?;

    let mut body = parsed.statement(direction).to_string();
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_prints_requested_body() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("1 - users");
        std::fs::write(
            &file,
            "UP:\nCREATE TABLE users (id INT);\nDOWN:\nDROP TABLE users;\nEND_MIGRATION\n",
        )
        .unwrap();
        let config = AppConfig::default();

        assert_eq!(
            inspect(&file, Direction::Up, &config).unwrap(),
            "CREATE TABLE users (id INT);\n"
        );
        assert_eq!(
            inspect(&file, Direction::Down, &config).unwrap(),
            "DROP TABLE users;\n"
        );
    }

    #[test]
    fn inspect_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("1 - users");
        std::fs::write(&file, "UP:\nSELECT 1;\n").unwrap();

        assert!(inspect(&file, Direction::Up, &AppConfig::default()).is_err());
    }

    #[test]
    fn cli_flags_override_config() {
        let cli = Cli::parse_from([
            "ratchet",
            "--config",
            "/nonexistent/ratchet.yml",
            "status",
        ]);
        assert!(load_config(&cli).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratchet.yml");
        std::fs::write(&path, "database:\n  path: from_file.db\n").unwrap();
        let cli = Cli::parse_from([
            "ratchet",
            "--config",
            path.to_str().unwrap(),
            "--dir",
            "elsewhere",
            "status",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.database.path, dir.path().join("from_file.db"));
        assert_eq!(config.migrations.directory, PathBuf::from("elsewhere"));
    }

    #[test]
    fn dry_run_does_not_create_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir(&migrations).unwrap();
        std::fs::write(
            migrations.join("1 - users"),
            "UP:\nCREATE TABLE users (id INT);\nDOWN:\nDROP TABLE users;\nEND_MIGRATION\n",
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.database.path = dir.path().join("app.db");
        config.migrations.directory = migrations;

        let plan = dry_run_plan(&config).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].file_name, "1 - users");
        assert!(!config.database.path.exists());
    }

    #[test]
    fn dry_run_reads_an_existing_database() {
        let dir = tempfile::tempdir().unwrap();
        let migrations = dir.path().join("migrations");
        std::fs::create_dir(&migrations).unwrap();
        for id in 1..=2 {
            std::fs::write(
                migrations.join(format!("{id} - step")),
                format!("UP:\nCREATE TABLE t{id} (id INT);\nDOWN:\nEND_MIGRATION\n"),
            )
            .unwrap();
        }

        let mut config = AppConfig::default();
        config.database.path = dir.path().join("app.db");
        config.migrations.directory = migrations;
        {
            let conn = open(&config).unwrap();
            let store = AppliedMigrationStore::new(&conn);
            store.ensure_schema().unwrap();
            store.record(1, "1 - step").unwrap();
        }

        let plan = dry_run_plan(&config).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].id, 2);
    }

    #[test]
    fn build_runner_rejects_bad_table_name() {
        let conn = ratchet_db::connect_in_memory().unwrap();
        let mut config = AppConfig::default();
        config.migrations.table = "drop table".into();

        assert!(build_runner(&conn, &config).is_err());
    }
}
