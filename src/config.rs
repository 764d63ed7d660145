// ABOUTME: Connection settings for the replicator
// ABOUTME: Loads the optional TOML credentials file and builds per-database driver configs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

/// Top-level settings, deserialized from the optional `replicator.toml`.
///
/// The file is a single `[db]` table of connection parameters shared by every
/// logical database; a relation's `db` component supplies the database name.
#[derive(Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub db: ConnectionSettings,
}

/// Connection parameters. Any field left unset falls back to the driver
/// default (localhost, current OS user, trust auth).
#[derive(Clone, Default, Deserialize)]
pub struct ConnectionSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Settings {
    /// Load settings from `path`. A missing file is not an error: the
    /// credentials file is optional and absent settings mean driver defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))?;
        Ok(settings)
    }

    /// Driver configuration for the named logical database.
    pub fn pg_config(&self, dbname: &str) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config.dbname(dbname);
        config.host(self.db.host.as_deref().unwrap_or("localhost"));
        if let Some(port) = self.db.port {
            config.port(port);
        }
        if let Some(user) = &self.db.user {
            config.user(user);
        } else if let Ok(user) = std::env::var("USER") {
            config.user(&user);
        }
        if let Some(password) = &self.db.password {
            config.password(password);
        }
        config
    }
}

// Passwords must never reach logs or error chains.
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings").field("db", &self.db).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_settings() {
        let settings: Settings = toml::from_str(
            r#"
            [db]
            host = "db.internal"
            port = 5433
            user = "etl"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(settings.db.host.as_deref(), Some("db.internal"));
        assert_eq!(settings.db.port, Some(5433));
        assert_eq!(settings.db.user.as_deref(), Some("etl"));
        assert_eq!(settings.db.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_parse_partial_settings() {
        let settings: Settings = toml::from_str("[db]\nhost = \"10.0.0.1\"\n").unwrap();
        assert_eq!(settings.db.host.as_deref(), Some("10.0.0.1"));
        assert!(settings.db.user.is_none());
        assert!(settings.db.password.is_none());
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let settings = Settings::load(Path::new("/nonexistent/replicator.toml")).unwrap();
        assert!(settings.db.host.is_none());
        assert!(settings.db.port.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[db]\nhost = \"example.test\"\nport = 6432").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.db.host.as_deref(), Some("example.test"));
        assert_eq!(settings.db.port, Some(6432));
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[db\nhost=").unwrap();

        assert!(Settings::load(file.path()).is_err());
    }

    #[test]
    fn test_pg_config_applies_settings() {
        let settings: Settings = toml::from_str(
            r#"
            [db]
            host = "db.internal"
            port = 5433
            user = "etl"
            "#,
        )
        .unwrap();

        let config = settings.pg_config("source");
        assert_eq!(config.get_dbname(), Some("source"));
        assert_eq!(config.get_ports(), &[5433]);
        assert_eq!(config.get_user(), Some("etl"));
    }

    #[test]
    fn test_debug_masks_password() {
        let settings: Settings =
            toml::from_str("[db]\nuser = \"etl\"\npassword = \"hunter2\"\n").unwrap();
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("***"));
    }
}
