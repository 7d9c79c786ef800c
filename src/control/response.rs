//! Response formatting
//!
//! CORS headers are not added here; the CORS middleware in `server`
//! applies them to every response on the way out.

use crate::control::api::ApiError;
use crate::security::BASIC_CHALLENGE;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// The dashboard page served at `/` and `/index.html`
pub const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Payload of an [`ActionResult`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// `application/json`
    Json(serde_json::Value),
    /// `text/html`
    Html(&'static str),
    /// No body, no content type
    Empty,
}

/// Status code plus body produced for every request
#[derive(Debug, Clone, PartialEq)]
pub struct ActionResult {
    /// HTTP status
    pub status: StatusCode,
    /// Response payload
    pub body: ResponseBody,
}

impl ActionResult {
    /// JSON response with an arbitrary status
    pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => Self {
                status,
                body: ResponseBody::Json(value),
            },
            Err(e) => Self::error(&ApiError::Internal(format!("Serialization error: {}", e))),
        }
    }

    /// 200 with a JSON body
    pub fn ok<T: Serialize>(body: &T) -> Self {
        Self::json(StatusCode::OK, body)
    }

    /// `{error: ...}` with the error's status
    pub fn error(err: &ApiError) -> Self {
        Self::json(err.status_code(), &err.body())
    }

    /// 204 with no body
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            body: ResponseBody::Empty,
        }
    }

    /// 404 with no body
    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            body: ResponseBody::Empty,
        }
    }

    /// 200 with the dashboard page
    pub fn index() -> Self {
        Self {
            status: StatusCode::OK,
            body: ResponseBody::Html(INDEX_HTML),
        }
    }

    /// The JSON body, or `Value::Null` for non-JSON results
    pub fn json_body(&self) -> serde_json::Value {
        match &self.body {
            ResponseBody::Json(value) => value.clone(),
            _ => serde_json::Value::Null,
        }
    }
}

impl IntoResponse for ActionResult {
    fn into_response(self) -> Response {
        match self.body {
            ResponseBody::Json(value) => (
                self.status,
                [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
                value.to_string(),
            )
                .into_response(),
            ResponseBody::Html(page) => (
                self.status,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                )],
                page,
            )
                .into_response(),
            ResponseBody::Empty => self.status.into_response(),
        }
    }
}

/// 401 with the Basic challenge and no body
pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, HeaderValue::from_static(BASIC_CHALLENGE))],
    )
        .into_response()
}
