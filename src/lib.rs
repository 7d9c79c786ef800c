//! rds-dashboard: HTTP control surface for locally managed RDS engines
//!
//! This library exposes a small JSON API over the service units
//! (`rds-<engine>.service`) that run each engine, and over the `rds`
//! backup tool.
//!
//! # Architecture
//!
//! Requests flow through the HTTP front door, the access-control gate,
//! the action router and finally the process delegate, which shells out
//! with a hard timeout. Configuration is loaded once and never mutated.
//!
//! # Modules
//!
//! - `config`: Configuration loading and validation
//! - `security`: Basic authentication and CORS decision
//! - `delegate`: External command execution (service manager, backup tool)
//! - `control`: Request routing, response formatting and the HTTP server
//! - `error`: Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod control;
pub mod delegate;
pub mod error;
pub mod security;

// Re-export commonly used types
pub use error::{DashboardError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
