//! Per-specialist workflows.
//!
//! Each flow drives one specialist through a bounded sequence of steps,
//! records thoughts, plans and execution metadata in the trace, and
//! renders the final result text. Failures inside a flow become result
//! text; a flow never returns an error.

pub mod browser;
pub mod coder;
pub mod files;
pub mod research;
pub mod sandbox;
pub mod supervisor;

/// Trim a preview to `limit` characters, marking the cut
pub(crate) fn preview(text: &str, limit: usize) -> String {
    crate::specialists::extract::truncate_chars(text, limit)
}
