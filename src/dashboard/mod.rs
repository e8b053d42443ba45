//! Web dashboard HTTP server module.
//!
//! Serves the dashboard shell and static assets, the task store and the
//! derived schedule views, all behind HTTP Basic authentication.

pub mod auth;
mod server;
pub mod templates;

pub use auth::{BasicAuth, UNAUTHORIZED_BODY};
pub use server::{DashboardServer, PROJECT_NAME, build_router, start_server};
