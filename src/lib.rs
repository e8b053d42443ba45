//! Schedule Dashboard Library
//!
//! Task-schedule model, rollups, year views and CSV export, plus the
//! authenticated web server and the client session that consume them.

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod logging;
pub mod schedule;
pub mod session;
pub mod store;
pub mod types;
