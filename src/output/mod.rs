//! Output renderers: terminal and JSON.

pub mod json;
pub mod terminal;

use crate::models::RunReport;

/// Trait for rendering a finished run to an output format.
pub trait OutputRenderer {
    /// Render a run report to a string.
    fn render(&self, report: &RunReport) -> String;
}
