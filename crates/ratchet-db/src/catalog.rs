use std::ffi::OsString;
use std::fs;
use std::path::PathBuf;

use ratchet_common::{Error, MalformedNamePolicy, MigrationId, Result};
use serde::Serialize;
use tracing::{debug, warn};

/// Separator between the numeric id and the free-text name in a file name.
pub const NAME_SEPARATOR: &str = " - ";

/// Lists and reads migration files. Enumeration order is not trusted; the
/// catalog always re-sorts by id.
pub trait MigrationSource {
    /// File names of the non-directory entries at this source. Names are raw;
    /// the catalog decides what to do with ones that are not UTF-8.
    fn list(&self) -> Result<Vec<OsString>>;

    fn read(&self, file_name: &str) -> Result<String>;

    /// Human readable location, used in log lines.
    fn location(&self) -> String;
}

/// Migration files in a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl MigrationSource for DirectorySource {
    fn list(&self) -> Result<Vec<OsString>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            // Follows symlinks, so a link to a directory is skipped too.
            if fs::metadata(entry.path())?.is_dir() {
                continue;
            }
            names.push(entry.file_name());
        }
        Ok(names)
    }

    fn read(&self, file_name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.root.join(file_name))?)
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// Migration files held in memory, listed in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Vec<(String, String)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file_name: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(file_name, content);
        self
    }

    pub fn insert(&mut self, file_name: impl Into<String>, content: impl Into<String>) {
        self.files.push((file_name.into(), content.into()));
    }
}

impl MigrationSource for MemorySource {
    fn list(&self) -> Result<Vec<OsString>> {
        Ok(self.files.iter().map(|(name, _)| OsString::from(name)).collect())
    }

    fn read(&self, file_name: &str) -> Result<String> {
        self.files
            .iter()
            .find(|(name, _)| name == file_name)
            .map(|(_, content)| content.clone())
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no migration named {file_name:?}"),
                ))
            })
    }

    fn location(&self) -> String {
        "<memory>".to_string()
    }
}

/// Ordering metadata parsed from a file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: MigrationId,
    pub name: String,
    pub file_name: String,
}

/// A migration file loaded for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    pub id: MigrationId,
    pub name: String,
    pub file_name: String,
    #[serde(skip)]
    pub raw_content: String,
}

/// Parse `"<id> - <name>"` into its id and name. The id must be base-10
/// digits only; the name is everything after the first separator.
pub fn parse_file_name(file_name: &str) -> Result<(MigrationId, String)> {
    let malformed = |reason: &str| Error::MalformedFileName {
        file: file_name.to_string(),
        reason: reason.to_string(),
    };

    let (id, name) = file_name
        .split_once(NAME_SEPARATOR)
        .ok_or_else(|| malformed("expected \"<id> - <name>\""))?;

    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("id is not a non-negative integer"));
    }
    let id = id
        .parse::<MigrationId>()
        .map_err(|_| malformed("id is out of range"))?;

    Ok((id, name.to_string()))
}

fn utf8_file_name(raw: OsString) -> Result<String> {
    raw.into_string().map_err(|raw| Error::MalformedFileName {
        file: raw.to_string_lossy().into_owned(),
        reason: "file name is not valid UTF-8".into(),
    })
}

/// Turns the entries of a [`MigrationSource`] into an id-ordered catalog.
pub struct MigrationCatalog<S> {
    source: S,
    policy: MalformedNamePolicy,
}

impl<S: MigrationSource> MigrationCatalog<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            policy: MalformedNamePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MalformedNamePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Every catalogued migration, ascending by id.
    pub fn scan(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        for raw in self.source.list()? {
            let parsed = utf8_file_name(raw).and_then(|file_name| {
                let (id, name) = parse_file_name(&file_name)?;
                Ok(CatalogEntry {
                    id,
                    name,
                    file_name,
                })
            });
            match parsed {
                Ok(entry) => entries.push(entry),
                Err(e) if self.policy == MalformedNamePolicy::Skip => {
                    warn!("skipping entry in {}: {e}", self.source.location());
                }
                Err(e) => return Err(e),
            }
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.file_name.cmp(&b.file_name)));

        if let Some(pair) = entries.windows(2).find(|pair| pair[0].id == pair[1].id) {
            return Err(Error::ConflictingMigrationId {
                id: pair[0].id,
                first: pair[0].file_name.clone(),
                second: pair[1].file_name.clone(),
            });
        }

        Ok(entries)
    }

    /// Migrations whose id is strictly above `high_water_mark`, ascending by
    /// id, with their content loaded. `None` means nothing has been applied.
    pub fn list_pending(&self, high_water_mark: Option<MigrationId>) -> Result<Vec<MigrationFile>> {
        let mut pending = Vec::new();
        for entry in self.scan()? {
            if high_water_mark.is_some_and(|mark| entry.id <= mark) {
                continue;
            }
            let raw_content = self.source.read(&entry.file_name)?;
            pending.push(MigrationFile {
                id: entry.id,
                name: entry.name,
                file_name: entry.file_name,
                raw_content,
            });
        }
        debug!(
            "{} pending migration(s) in {} above {:?}",
            pending.len(),
            self.source.location(),
            high_water_mark
        );
        Ok(pending)
    }
}
