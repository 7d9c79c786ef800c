//! CORS decision
//!
//! Headers are only emitted for an exact match against the configured
//! origins. Absence of the headers is the deny signal.

use axum::http::{header, HeaderMap, HeaderValue};
use std::collections::HashSet;

/// Methods advertised to allowed origins
pub const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";

/// Request headers advertised to allowed origins
pub const CORS_ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Preflight cache lifetime in seconds
pub const CORS_MAX_AGE: &str = "86400";

/// Immutable set of origins allowed to receive CORS headers
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed: HashSet<String>,
}

impl CorsPolicy {
    /// Create a policy from the configured origins
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: origins.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `origin` is allowed
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed.contains(origin)
    }

    /// Headers to add to a response for a request carrying `origin`
    pub fn headers_for(&self, origin: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        let Some(origin) = origin.filter(|o| self.allows(o)) else {
            return headers;
        };
        let Ok(origin) = HeaderValue::from_str(origin) else {
            return headers;
        };

        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(CORS_MAX_AGE),
        );
        headers
    }

    /// Same as [`Self::headers_for`], reading the `Origin` request header
    pub fn headers_for_request(&self, request_headers: &HeaderMap) -> HeaderMap {
        let origin = request_headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok());
        self.headers_for(origin)
    }
}
