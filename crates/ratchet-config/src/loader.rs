use std::path::{Path, PathBuf};

use ratchet_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// File names probed, in order, when no config path is given.
pub const DEFAULT_FILE_NAMES: &[&str] = &["ratchet.yml", "ratchet.yaml", "ratchet.toml"];

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a YAML or TOML config, chosen by extension. Relative paths inside
    /// the file are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;

        let mut config = Self::parse(&contents, extension(path))
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;

        if let Some(base) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.database.path = resolve(base, &config.database.path);
            config.migrations.directory = resolve(base, &config.migrations.directory);
            config.migrations.find_table_query = config
                .migrations
                .find_table_query
                .map(|p| resolve(base, &p));
            config.migrations.create_table_query = config
                .migrations
                .create_table_query
                .map(|p| resolve(base, &p));
        }

        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Load the first default-named config file in `dir`, or defaults when
    /// there is none.
    pub fn discover(dir: &Path) -> Result<AppConfig> {
        for name in DEFAULT_FILE_NAMES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Self::load(&candidate);
            }
        }
        debug!("no config file in {}, using defaults", dir.display());
        Ok(AppConfig::default())
    }

    fn parse(contents: &str, ext: &str) -> std::result::Result<AppConfig, String> {
        match ext {
            "yml" | "yaml" => {
                serde_yaml::from_str(contents).map_err(|e| format!("YAML parse error: {e}"))
            }
            "toml" => toml::from_str(contents).map_err(|e| format!("TOML parse error: {e}")),
            other => Err(format!("unsupported config extension: {other:?}")),
        }
    }
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("")
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use ratchet_common::MalformedNamePolicy;

    use super::*;

    #[test]
    fn loads_yaml_and_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratchet.yml");
        std::fs::write(
            &path,
            "migrations:\n  table: schema_history\n  on_malformed_name: skip\n",
        )
        .unwrap();

        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.migrations.table, "schema_history");
        assert_eq!(config.migrations.on_malformed_name, MalformedNamePolicy::Skip);
        assert!(config.migrations.require_up_marker);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert_eq!(config.migrations.directory, dir.path().join("migrations"));
        assert_eq!(config.database.path, dir.path().join("ratchet.db"));
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratchet.toml");
        std::fs::write(
            &path,
            "[database]\npath = \"/var/lib/app.db\"\nbusy_timeout_ms = 250\n\n[migrations]\nrequire_up_marker = false\ncreate_table_query = \"sql/create.sql\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/var/lib/app.db"));
        assert_eq!(config.database.busy_timeout().as_millis(), 250);
        assert!(!config.migrations.require_up_marker);
        assert_eq!(
            config.migrations.create_table_query,
            Some(dir.path().join("sql/create.sql"))
        );
        assert_eq!(config.migrations.find_table_query, None);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratchet.ini");
        std::fs::write(&path, "x=1").unwrap();

        let err = ConfigLoader::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn rejects_unknown_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratchet.yml");
        std::fs::write(&path, "migrations:\n  on_malformed_name: ignore\n").unwrap();

        assert!(ConfigLoader::load(&path).is_err());
    }

    #[test]
    fn discover_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigLoader::discover(dir.path()).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn discover_prefers_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ratchet.yml"), "migrations:\n  table: from_yaml\n").unwrap();
        std::fs::write(dir.path().join("ratchet.toml"), "[migrations]\ntable = \"from_toml\"\n").unwrap();

        let config = ConfigLoader::discover(dir.path()).unwrap();
        assert_eq!(config.migrations.table, "from_yaml");
    }
}
