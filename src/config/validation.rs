//! Configuration validation functions
//!
//! Engine names end up inside service-manager unit names and backup tool
//! arguments, so only a conservative character set is accepted.

use crate::error::{DashboardError, Result};
use tracing::warn;

/// Maximum engine name length
const MAX_ENGINE_NAME_LEN: usize = 64;

/// Validate engine name (ASCII alphanumeric, dashes, underscores)
pub fn validate_engine_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DashboardError::Validation(
            "Engine name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_ENGINE_NAME_LEN {
        return Err(DashboardError::Validation(format!(
            "Engine name too long (max {} characters)",
            MAX_ENGINE_NAME_LEN
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(DashboardError::Validation(format!(
            "Invalid engine name '{}': only alphanumeric, dash, and underscore allowed",
            name
        )));
    }

    // A leading dash would be read as an option by systemctl and rds
    if name.starts_with('-') || name.starts_with('_') {
        return Err(DashboardError::Validation(format!(
            "Engine name '{}' cannot start with dash or underscore",
            name
        )));
    }

    Ok(())
}

/// Validate a CORS origin (`scheme://host[:port]`, no path)
pub fn validate_origin(origin: &str) -> Result<()> {
    let rest = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
        .ok_or_else(|| {
            DashboardError::Validation(format!(
                "Invalid origin '{}': must start with http:// or https://",
                origin
            ))
        })?;

    if rest.is_empty() || rest.contains('/') {
        return Err(DashboardError::Validation(format!(
            "Invalid origin '{}': expected scheme://host[:port]",
            origin
        )));
    }

    Ok(())
}

/// Validate listen host
pub fn validate_host(host: &str) -> Result<()> {
    if host.trim().is_empty() {
        return Err(DashboardError::Config("Listen host cannot be empty".to_string()));
    }

    if host != "127.0.0.1" && host != "localhost" && host != "::1" {
        warn!("Dashboard listening on non-loopback host {}", host);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_engine_name() {
        assert!(validate_engine_name("pg").is_ok());
        assert!(validate_engine_name("neo-4j").is_ok());
        assert!(validate_engine_name("mongo_7").is_ok());

        assert!(validate_engine_name("").is_err());
        assert!(validate_engine_name("-pg").is_err());
        assert!(validate_engine_name("_pg").is_err());
        assert!(validate_engine_name("pg.service").is_err());
        assert!(validate_engine_name("../pg").is_err());
        assert!(validate_engine_name("pg redis").is_err());
        assert!(validate_engine_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_validate_origin() {
        assert!(validate_origin("https://rds.example.com").is_ok());
        assert!(validate_origin("http://localhost:3000").is_ok());

        assert!(validate_origin("rds.example.com").is_err());
        assert!(validate_origin("https://").is_err());
        assert!(validate_origin("https://example.com/path").is_err());
    }

    #[test]
    fn test_validate_host() {
        assert!(validate_host("127.0.0.1").is_ok());
        assert!(validate_host("0.0.0.0").is_ok());
        assert!(validate_host("").is_err());
    }
}
