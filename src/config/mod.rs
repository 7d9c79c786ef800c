//! Configuration management
//!
//! Configuration is read once at startup from the process environment,
//! optionally layered on top of a TOML file, and is immutable afterwards.
//! Every component receives it by reference (usually through an `Arc`).

mod toml_parser;
mod validation;

pub use toml_parser::TomlConfig;
pub use validation::{validate_engine_name, validate_host, validate_origin};

use crate::error::{DashboardError, Result};
use crate::security::Credentials;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default listen host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8765;

/// Default Basic auth user name
pub const DEFAULT_AUTH_USER: &str = "rds";

/// Main configuration structure
#[derive(Debug, Clone)]
pub struct Config {
    /// Engine allow-list, in display order
    pub engines: Vec<String>,

    /// Engines for which backup/list/restore is permitted
    pub backup_engines: Vec<String>,

    /// Listen address
    pub server: ServerConfig,

    /// Credentials; `None` disables authentication
    pub credentials: Option<Credentials>,

    /// Origins allowed to receive CORS headers
    pub allowed_origins: Vec<String>,

    /// Browse URL per engine name
    pub browse_urls: HashMap<String, String>,

    /// Connect command per engine name
    pub connect_commands: HashMap<String, String>,

    /// External programs invoked by the delegate
    pub commands: CommandConfig,
}

/// HTTP listen configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl ServerConfig {
    /// Address string suitable for `TcpListener::bind`
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Programs the process delegate shells out to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    /// Service manager control binary
    pub systemctl: String,
    /// Backup tool binary
    pub backup_tool: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            systemctl: "systemctl".to_string(),
            backup_tool: "rds".to_string(),
        }
    }
}

impl Config {
    /// Create a configuration with the given engines and everything else defaulted
    pub fn new(engines: Vec<String>, backup_engines: Vec<String>) -> Self {
        Self {
            engines,
            backup_engines,
            server: ServerConfig::default(),
            credentials: None,
            allowed_origins: Vec::new(),
            browse_urls: HashMap::new(),
            connect_commands: HashMap::new(),
            commands: CommandConfig::default(),
        }
    }

    /// Load configuration from the process environment only
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an optional TOML file, with environment overrides
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let toml = file.map(TomlConfig::from_file).transpose()?;
        Self::from_sources(toml, |key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_sources(None, lookup)
    }

    /// Build configuration from a TOML base and a variable lookup.
    ///
    /// Variables found by `lookup` take precedence over the file.
    pub fn from_sources<F>(toml: Option<TomlConfig>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let toml = toml.unwrap_or_default();

        let engines = lookup("RDS_ENGINES")
            .map(|v| split_list(&v))
            .unwrap_or(toml.engines);
        let backup_engines = lookup("RDS_BACKUP_ENGINES")
            .map(|v| split_list(&v))
            .unwrap_or(toml.backup_engines);

        let host = lookup("RDS_DASHBOARD_HOST")
            .or(toml.host)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("RDS_DASHBOARD_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| {
                DashboardError::Config(format!("Invalid RDS_DASHBOARD_PORT: {:?}", raw))
            })?,
            None => toml.port.unwrap_or(DEFAULT_PORT),
        };

        let auth_user = lookup("RDS_DASHBOARD_AUTH_USER")
            .or(toml.auth_user)
            .unwrap_or_else(|| DEFAULT_AUTH_USER.to_string());
        let password_file = lookup("RDS_DASHBOARD_PASSWORD_FILE")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or(toml.password_file);
        let credentials = match password_file {
            Some(path) => Credentials::load(auth_user, &path)?,
            None => None,
        };

        let allowed_origins = lookup("RDS_DASHBOARD_ALLOWED_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or(toml.allowed_origins);

        let mut browse_urls = HashMap::new();
        let mut connect_commands = HashMap::new();
        for name in &engines {
            let key = env_key(name);
            if let Some(url) = lookup(&format!("RDS_BROWSE_{}", key))
                .or_else(|| toml.browse.get(name).cloned())
                .filter(|v| !v.is_empty())
            {
                browse_urls.insert(name.clone(), url);
            }
            if let Some(cmd) = lookup(&format!("RDS_CONNECT_{}", key))
                .or_else(|| toml.connect.get(name).cloned())
                .filter(|v| !v.is_empty())
            {
                connect_commands.insert(name.clone(), cmd);
            }
        }

        let defaults = CommandConfig::default();
        let commands = CommandConfig {
            systemctl: lookup("RDS_SYSTEMCTL_BIN")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.systemctl),
            backup_tool: lookup("RDS_BACKUP_BIN")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.backup_tool),
        };

        let config = Self {
            engines,
            backup_engines,
            server: ServerConfig { host, port },
            credentials,
            allowed_origins,
            browse_urls,
            connect_commands,
            commands,
        };
        config.validate()?;

        debug!(
            engines = config.engines.len(),
            backup_engines = config.backup_engines.len(),
            auth = config.credentials.is_some(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        for name in self.engines.iter().chain(&self.backup_engines) {
            validate_engine_name(name)?;
        }
        for name in &self.backup_engines {
            if !self.is_engine(name) {
                warn!("Backup engine '{}' is not in the engine list", name);
            }
        }
        for origin in &self.allowed_origins {
            validate_origin(origin)?;
        }
        validate_host(&self.server.host)?;
        Ok(())
    }

    /// Whether `name` is on the engine allow-list
    pub fn is_engine(&self, name: &str) -> bool {
        self.engines.iter().any(|e| e == name)
    }

    /// Whether backup actions are enabled for `name`
    pub fn has_backup(&self, name: &str) -> bool {
        self.backup_engines.iter().any(|e| e == name)
    }

    /// Browse URL for an engine, if configured
    pub fn browse_url(&self, name: &str) -> Option<&str> {
        self.browse_urls.get(name).map(String::as_str)
    }

    /// Connect command for an engine; empty when not configured
    pub fn connect_command(&self, name: &str) -> &str {
        self.connect_commands.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Split a comma-separated list, trimming entries and dropping empties
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Environment-variable suffix for an engine name (`-` becomes `_`)
pub fn env_key(name: &str) -> String {
    name.replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("pg, redis ,,mysql"), vec!["pg", "redis", "mysql"]);
        assert!(split_list("").is_empty());
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.engines.is_empty());
        assert_eq!(config.server, ServerConfig::default());
        assert!(config.credentials.is_none());
        assert_eq!(config.commands, CommandConfig::default());
    }

    #[test]
    fn test_engine_lists() {
        let config = Config::from_lookup(lookup_from(&[
            ("RDS_ENGINES", "pg,redis,neo-4j"),
            ("RDS_BACKUP_ENGINES", "pg"),
        ]))
        .unwrap();

        assert_eq!(config.engines, vec!["pg", "redis", "neo-4j"]);
        assert!(config.is_engine("redis"));
        assert!(!config.is_engine("mysql"));
        assert!(config.has_backup("pg"));
        assert!(!config.has_backup("redis"));
    }

    #[test]
    fn test_browse_and_connect_keys() {
        let config = Config::from_lookup(lookup_from(&[
            ("RDS_ENGINES", "pg,neo-4j"),
            ("RDS_BROWSE_neo_4j", "http://localhost:7474"),
            ("RDS_CONNECT_pg", "psql -h localhost"),
            ("RDS_BROWSE_pg", ""),
        ]))
        .unwrap();

        assert_eq!(config.browse_url("neo-4j"), Some("http://localhost:7474"));
        assert_eq!(config.browse_url("pg"), None);
        assert_eq!(config.connect_command("pg"), "psql -h localhost");
        assert_eq!(config.connect_command("neo-4j"), "");
    }

    #[test]
    fn test_invalid_port() {
        let result = Config::from_lookup(lookup_from(&[("RDS_DASHBOARD_PORT", "http")]));
        assert!(matches!(result, Err(DashboardError::Config(_))));
    }

    #[test]
    fn test_invalid_engine_name_rejected() {
        let result = Config::from_lookup(lookup_from(&[("RDS_ENGINES", "pg,../etc")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_password_file_disables_auth() {
        let config = Config::from_lookup(lookup_from(&[(
            "RDS_DASHBOARD_PASSWORD_FILE",
            "/nonexistent/rds/password",
        )]))
        .unwrap();
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_password_file_enables_auth() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hunter2").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = Config::from_lookup(lookup_from(&[
            ("RDS_DASHBOARD_PASSWORD_FILE", path.as_str()),
            ("RDS_DASHBOARD_AUTH_USER", "admin"),
        ]))
        .unwrap();

        let creds = config.credentials.expect("credentials should be loaded");
        assert_eq!(creds.username(), "admin");
        assert!(creds.matches("admin", "hunter2"));
    }

    #[test]
    fn test_env_overrides_toml() {
        let toml = TomlConfig::parse(
            r#"
            engines = ["pg", "redis"]
            port = 9000

            [browse]
            pg = "http://pg.local"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            Some(toml),
            lookup_from(&[("RDS_DASHBOARD_PORT", "9100")]),
        )
        .unwrap();

        assert_eq!(config.engines, vec!["pg", "redis"]);
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.browse_url("pg"), Some("http://pg.local"));
    }

    #[test]
    fn test_bind_addr() {
        let v4 = ServerConfig { host: "0.0.0.0".to_string(), port: 80 };
        assert_eq!(v4.bind_addr(), "0.0.0.0:80");

        let v6 = ServerConfig { host: "::1".to_string(), port: 8765 };
        assert_eq!(v6.bind_addr(), "[::1]:8765");
    }
}
