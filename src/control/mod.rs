//! HTTP control surface
//!
//! This module turns HTTP requests into engine actions: request parsing and
//! wire types (`api`), action execution (`handler`), response formatting
//! (`response`) and the axum server with its middleware (`server`).

mod api;
mod handler;
mod response;
mod server;

pub use api::{
    normalize_path, restore_id, ActionKind, ActionRequest, ApiError, BackupsBody, EngineStatus,
    EnginesBody, ErrorBody, OkBody, Route,
};
pub use handler::ActionRouter;
pub use response::{unauthorized, ActionResult, ResponseBody, INDEX_HTML};
pub use server::{app, shutdown_signal, AppState, DashboardServer};
