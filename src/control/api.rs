//! HTTP API request and response types
//!
//! Requests are reduced to a [`Route`] by a single pure function so the
//! whole routing table can be tested without a server.

use crate::delegate::{DelegateError, UnitAction};
use axum::http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

/// Action selected by a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// `POST /api/engines/{name}/start|stop|restart`
    Control(UnitAction),
    /// `POST /api/engines/{name}/backup`
    BackupTrigger,
    /// `GET /api/engines/{name}/backups`
    BackupList,
    /// `POST /api/engines/{name}/restore`
    BackupRestore,
}

impl ActionKind {
    /// Parse the action token of a POST path
    pub fn from_post_token(token: &str) -> Option<Self> {
        match token {
            "start" => Some(Self::Control(UnitAction::Start)),
            "stop" => Some(Self::Control(UnitAction::Stop)),
            "restart" => Some(Self::Control(UnitAction::Restart)),
            "backup" => Some(Self::BackupTrigger),
            "restore" => Some(Self::BackupRestore),
            _ => None,
        }
    }

    /// Service-manager verb for unit control actions
    pub fn unit_action(&self) -> Option<UnitAction> {
        match self {
            Self::Control(action) => Some(*action),
            Self::BackupTrigger | Self::BackupList | Self::BackupRestore => None,
        }
    }

    /// Whether the engine must be backup-capable
    pub fn requires_backup(&self) -> bool {
        self.unit_action().is_none()
    }
}

/// A parsed action against one engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    /// Engine named in the path
    pub engine: String,
    /// Requested action
    pub kind: ActionKind,
    /// Backup id from the restore body; empty when absent
    pub backup_id: Option<String>,
}

impl ActionRequest {
    /// Create a request without a backup id
    pub fn new(engine: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            engine: engine.into(),
            kind,
            backup_id: None,
        }
    }
}

/// Every request shape the dashboard answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// CORS pre-flight on any path
    Preflight,
    /// The static dashboard page
    Index,
    /// `GET /api/engines`
    ListEngines,
    /// An engine action
    Action(ActionRequest),
    /// `POST /api/engines/{name}/{token}` with an unrecognized token
    BadAction {
        /// Engine named in the path
        engine: String,
    },
    /// Anything else
    NotFound,
}

impl Route {
    /// Map method, raw path and body to a route
    pub fn parse(method: &Method, raw_path: &str, body: &[u8]) -> Self {
        if method == &Method::OPTIONS {
            return Self::Preflight;
        }

        let path = normalize_path(raw_path);
        let segments: Vec<&str> = path.split('/').skip(1).collect();

        match (method, segments.as_slice()) {
            (&Method::GET, [""]) | (&Method::GET, ["index.html"]) => Self::Index,
            (&Method::GET, ["api", "engines"]) => Self::ListEngines,
            (&Method::GET, ["api", "engines", name, "backups"]) => {
                Self::Action(ActionRequest::new(*name, ActionKind::BackupList))
            }
            (&Method::POST, ["api", "engines", name, token]) => {
                match ActionKind::from_post_token(token) {
                    Some(ActionKind::BackupRestore) => Self::Action(ActionRequest {
                        engine: name.to_string(),
                        kind: ActionKind::BackupRestore,
                        backup_id: Some(restore_id(body)),
                    }),
                    Some(kind) => Self::Action(ActionRequest::new(*name, kind)),
                    None => Self::BadAction {
                        engine: name.to_string(),
                    },
                }
            }
            _ => Self::NotFound,
        }
    }
}

/// Percent-decode a request path, drop any query and trailing slashes.
///
/// An empty or all-slash path becomes `/`.
pub fn normalize_path(raw: &str) -> String {
    let without_query = raw.split('?').next().unwrap_or("");
    let decoded = urlencoding::decode_binary(without_query.as_bytes());
    let decoded = String::from_utf8_lossy(&decoded);
    let trimmed = decoded.trim_end_matches('/');

    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Extract the `id` string from a restore body; anything else yields `""`
pub fn restore_id(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(|value| value.as_object())
        .and_then(|object| object.get("id"))
        .and_then(|id| id.as_str())
        .map(str::to_string)
        .unwrap_or_default()
}

/// One entry of `GET /api/engines`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    /// Engine name
    pub name: String,
    /// Live unit status (`active`, `inactive`, `failed`, `unknown`, ...)
    pub status: String,
    /// Configured browse URL, `null` when unset
    pub browse_url: Option<String>,
    /// Configured connect command, empty when unset
    pub connect_command: String,
    /// Whether backup actions are enabled
    pub has_backup: bool,
}

/// Body of `GET /api/engines`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnginesBody {
    /// One entry per configured engine, in configured order
    pub engines: Vec<EngineStatus>,
}

/// Body of `GET /api/engines/{name}/backups`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupsBody {
    /// Backup identifiers in tool order
    pub backups: Vec<String>,
}

/// Body of a successful action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkBody {
    /// Always `true`
    pub ok: bool,
}

impl OkBody {
    /// The `{ok: true}` body
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkBody {
    fn default() -> Self {
        Self::new()
    }
}

/// Body of every failed API request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Human-readable message
    pub error: String,
}

/// API error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Malformed input (400)
    #[error("{0}")]
    BadRequest(String),

    /// Unknown engine or action not enabled (404)
    #[error("{0}")]
    NotFound(String),

    /// External command exited non-zero (502)
    #[error("{0}")]
    UpstreamCommand(String),

    /// Command could not run, timed out, or an internal fault (500)
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// `{error: "unknown engine"}`
    pub fn unknown_engine() -> Self {
        Self::NotFound("unknown engine".to_string())
    }

    /// `{error: "backup not enabled"}`
    pub fn backup_not_enabled() -> Self {
        Self::NotFound("backup not enabled".to_string())
    }

    /// `{error: "bad action"}`
    pub fn bad_action() -> Self {
        Self::BadRequest("bad action".to_string())
    }

    /// `{error: "backup id required"}`
    pub fn backup_id_required() -> Self {
        Self::BadRequest("backup id required".to_string())
    }

    /// `{error: "invalid backup id"}`
    pub fn invalid_backup_id() -> Self {
        Self::BadRequest("invalid backup id".to_string())
    }

    /// HTTP status for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamCommand(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body for this error
    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
        }
    }
}

impl From<DelegateError> for ApiError {
    fn from(err: DelegateError) -> Self {
        match err {
            DelegateError::CommandFailed { .. } => ApiError::UpstreamCommand(err.to_string()),
            DelegateError::Execution(msg) => ApiError::Internal(msg),
        }
    }
}
