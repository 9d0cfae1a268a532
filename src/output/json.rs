//! JSON output renderer.
//!
//! Outputs the full run report plus a flat `findings` list carrying the
//! effective severity of each finding.

use crate::models::RunReport;
use crate::output::OutputRenderer;

/// JSON output renderer.
pub struct JsonRenderer;

impl OutputRenderer for JsonRenderer {
    fn render(&self, report: &RunReport) -> String {
        let findings: Vec<serde_json::Value> = report
            .findings()
            .map(|f| {
                serde_json::json!({
                    "id": f.id,
                    "category": f.category,
                    "kind": f.kind,
                    "severity": f.severity,
                    "effective_severity": report.effective_severity(f),
                    "location": f.location(),
                    "description": f.description,
                })
            })
            .collect();

        let output = serde_json::json!({
            "report": report,
            "findings": findings,
        });

        serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
    }
}
