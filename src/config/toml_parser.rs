//! TOML configuration file parser
//!
//! The file carries the same settings as the `RDS_*` environment variables.
//! It is optional; environment variables always win over values found here.

use crate::error::{DashboardError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Engine allow-list
    #[serde(default)]
    pub engines: Vec<String>,

    /// Backup-capable engines
    #[serde(default)]
    pub backup_engines: Vec<String>,

    /// Listen host
    pub host: Option<String>,

    /// Listen port
    pub port: Option<u16>,

    /// Basic auth user name
    pub auth_user: Option<String>,

    /// Path to the password file
    pub password_file: Option<PathBuf>,

    /// Origins allowed to receive CORS headers
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Browse URL per engine
    #[serde(default)]
    pub browse: HashMap<String, String>,

    /// Connect command per engine
    #[serde(default)]
    pub connect: HashMap<String, String>,
}

impl TomlConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse(toml: &str) -> Result<Self> {
        toml::from_str(toml)
            .map_err(|e| DashboardError::Config(format!("Failed to parse TOML config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            engines = ["pg", "redis"]
            backup_engines = ["pg"]
            host = "0.0.0.0"
            port = 8800
            auth_user = "ops"
            password_file = "/etc/rds/dashboard.pass"
            allowed_origins = ["https://rds.example.com"]

            [browse]
            pg = "http://localhost:8081"

            [connect]
            redis = "redis-cli -p 6379"
        "#;

        let config = TomlConfig::parse(toml).expect("Failed to parse TOML");
        assert_eq!(config.engines, vec!["pg", "redis"]);
        assert_eq!(config.backup_engines, vec!["pg"]);
        assert_eq!(config.port, Some(8800));
        assert_eq!(config.auth_user.as_deref(), Some("ops"));
        assert_eq!(
            config.password_file,
            Some(PathBuf::from("/etc/rds/dashboard.pass"))
        );
        assert_eq!(config.browse["pg"], "http://localhost:8081");
        assert_eq!(config.connect["redis"], "redis-cli -p 6379");
    }

    #[test]
    fn test_parse_with_defaults() {
        let config = TomlConfig::parse("").expect("Failed to parse TOML");
        assert!(config.engines.is_empty());
        assert!(config.host.is_none());
        assert!(config.port.is_none());
        assert!(config.browse.is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(TomlConfig::parse("engine = [\"pg\"]").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dashboard.toml");
        fs::write(&path, "engines = [\"mongo\"]\n").unwrap();

        let config = TomlConfig::from_file(&path).unwrap();
        assert_eq!(config.engines, vec!["mongo"]);

        assert!(TomlConfig::from_file(dir.path().join("missing.toml")).is_err());
    }
}
