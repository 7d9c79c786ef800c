//! Access control for the dashboard
//!
//! This module provides:
//! - Optional single-user HTTP Basic authentication
//! - The CORS decision applied to every response
//! - Permission checks for the password file

use crate::error::Result;
use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};
use zeroize::Zeroizing;

mod cors;
mod permissions;

pub use cors::{CorsPolicy, CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_MAX_AGE};
pub use permissions::check_secret_file_permissions;

/// Value of the `WWW-Authenticate` challenge sent with 401 responses
pub const BASIC_CHALLENGE: &str = "Basic realm=\"RDS dashboard\"";

/// The single configured user
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Create credentials from a user name and password
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    /// Load the password from a one-line file.
    ///
    /// A missing file or an empty password disables authentication and
    /// yields `Ok(None)`.
    pub fn load(username: String, path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            info!("Password file {:?} not found, authentication disabled", path);
            return Ok(None);
        }

        check_secret_file_permissions(path)?;

        let contents = Zeroizing::new(std::fs::read_to_string(path)?);
        let password = contents.trim();
        if password.is_empty() {
            info!("Password file {:?} is empty, authentication disabled", path);
            return Ok(None);
        }

        info!("Basic authentication enabled for user '{}'", username);
        Ok(Some(Self::new(username, password)))
    }

    /// Configured user name
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Compare a user/password pair against the configured one.
    ///
    /// The password comparison does not short-circuit on the first
    /// differing byte.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        let user_ok = username == self.username;
        let password_ok = constant_time_eq(password.as_bytes(), self.password.as_bytes());
        user_ok & password_ok
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Outcome of the authorization gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    /// Request may proceed
    Allowed,
    /// Request must be answered with 401
    Unauthorized,
}

/// Decide whether a request may proceed
pub fn authorize(headers: &HeaderMap, credentials: Option<&Credentials>) -> AuthDecision {
    let Some(credentials) = credentials else {
        return AuthDecision::Allowed;
    };

    let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    else {
        debug!("Request without Authorization header");
        return AuthDecision::Unauthorized;
    };

    match decode_basic(value) {
        Some((user, password)) if credentials.matches(&user, &password) => AuthDecision::Allowed,
        Some((user, _)) => {
            debug!("Rejected credentials for user '{}'", user);
            AuthDecision::Unauthorized
        }
        None => {
            debug!("Malformed Authorization header");
            AuthDecision::Unauthorized
        }
    }
}

/// Decode a `Basic <base64(user:password)>` header value
fn decode_basic(value: &str) -> Option<(String, Zeroizing<String>)> {
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = Zeroizing::new(STANDARD.decode(encoded.trim()).ok()?);
    let raw = std::str::from_utf8(&decoded).ok()?;
    let (user, password) = raw.split_once(':').unwrap_or((raw, ""));
    Some((user.to_string(), Zeroizing::new(password.to_string())))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
