use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;

pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// `sqlite://<path>`; relative paths resolve against the settings directory.
    pub url: String,

    /// SQLite likes small pools
    pub max_connections: u32,

    /// How long a writer waits for the database lock.
    pub busy_timeout_ms: u64,

    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://kq.db".into(),
            max_connections: 4,
            busy_timeout_ms: 5_000,
            acquire_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSettings {
    pub name: String,

    /// Dotted member paths to index, e.g. `Birth.Day`.
    #[serde(default)]
    pub indexes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    pub collection: CollectionSettings,
}

impl Settings {
    /// Reads `<dir>/settings.toml`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SETTINGS_FILE);
        if !path.is_file() {
            return Err(Error::Config(format!(
                "settings file not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(&path)?;
        let mut settings: Settings = toml::from_str(&text)?;
        settings.database.url = resolve_url(&settings.database.url, dir);
        Ok(settings)
    }
}

fn resolve_url(url: &str, dir: &Path) -> String {
    let path = url.strip_prefix("sqlite://").unwrap_or(url);
    if Path::new(path).is_absolute() {
        return format!("sqlite://{path}");
    }
    format!("sqlite://{}", dir.join(path).display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn full_settings_parse() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"
            [database]
            url = "sqlite://data/kq.db"
            max_connections = 2
            busy_timeout_ms = 100
            acquire_timeout_ms = 200

            [collection]
            name = "customers"
            indexes = ["FirstName", "Birth.Day"]
            "#,
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();

        assert_eq!(
            settings.database.url,
            format!("sqlite://{}", dir.path().join("data/kq.db").display())
        );
        assert_eq!(settings.database.max_connections, 2);
        assert_eq!(settings.database.busy_timeout_ms, 100);
        assert_eq!(settings.collection.name, "customers");
        assert_eq!(settings.collection.indexes, vec!["FirstName", "Birth.Day"]);
    }

    #[test]
    fn database_section_is_optional() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            "[collection]\nname = \"people\"\n",
        )
        .unwrap();

        let settings = Settings::load(dir.path()).unwrap();

        assert_eq!(settings.database.max_connections, 4);
        assert!(settings.database.url.ends_with("kq.db"));
        assert!(settings.collection.indexes.is_empty());
    }

    #[test]
    fn absolute_urls_are_kept() {
        assert_eq!(
            resolve_url("sqlite:///var/lib/kq.db", Path::new("/etc")),
            "sqlite:///var/lib/kq.db"
        );
        assert_eq!(resolve_url("/tmp/x.db", Path::new("/etc")), "sqlite:///tmp/x.db");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(Settings::load(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn malformed_file_is_a_toml_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "[collection\n").unwrap();
        assert!(matches!(Settings::load(dir.path()), Err(Error::Toml(_))));
    }
}
