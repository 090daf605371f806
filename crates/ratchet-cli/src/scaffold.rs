use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use ratchet_common::MalformedNamePolicy;
use ratchet_db::{DirectorySource, MigrationCatalog};
use tracing::info;

/// Write an empty migration file named `"<next id> - <name>"` into `dir`,
/// creating the directory if needed. The next id is one above the largest id
/// already present; stray files that do not follow the naming scheme are
/// ignored.
pub fn create_migration(dir: &Path, name: &str) -> Result<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        bail!("migration name cannot be empty");
    }
    if name.contains(['/', '\\']) {
        bail!("migration name cannot contain path separators");
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let entries = MigrationCatalog::new(DirectorySource::new(dir))
        .with_policy(MalformedNamePolicy::Skip)
        .scan()
        .context("failed to scan existing migrations")?;
    let next_id = match entries.last() {
        None => 1,
        Some(last) => match last.id.checked_add(1) {
            Some(id) => id,
            None => bail!("no id left after {:?}", last.file_name),
        },
    };

    let file_name = format!("{next_id:03} - {name}");
    let path = dir.join(&file_name);
    std::fs::write(&path, template(name))
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!("scaffolded migration {next_id} at {}", path.display());
    Ok(path)
}

fn template(name: &str) -> String {
    format!(
        "-- Migration: {name}\n\
         -- Created: {}\n\
         -- Lines above UP: are ignored.\n\
         UP:\n\
         \n\
         DOWN:\n\
         \n\
         END_MIGRATION\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    )
}
