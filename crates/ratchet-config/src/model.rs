use std::path::PathBuf;
use std::time::Duration;

use ratchet_common::MalformedNamePolicy;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub migrations: MigrationsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    /// How long a statement waits on a lock held by another connection.
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ratchet.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    pub directory: PathBuf,
    pub table: String,
    /// Reject files without an `UP:` line instead of treating everything
    /// before `DOWN:` as the UP body.
    pub require_up_marker: bool,
    pub on_malformed_name: MalformedNamePolicy,
    /// Override for the "does the tracking table exist" query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub find_table_query: Option<PathBuf>,
    /// Override for the "create the tracking table" query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_table_query: Option<PathBuf>,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("migrations"),
            table: "migrations".to_string(),
            require_up_marker: true,
            on_malformed_name: MalformedNamePolicy::Abort,
            find_table_query: None,
            create_table_query: None,
        }
    }
}
