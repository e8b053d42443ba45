//! HTML templates for the web dashboard.
//!
//! Templates are embedded at compile time using `include_str!`.

/// Dashboard shell used when the static directory has no `index.html`.
pub const INDEX_TEMPLATE: &str = include_str!("templates/index.html");
