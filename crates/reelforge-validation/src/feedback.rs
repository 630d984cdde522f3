//! Rendering a validation report into feedback for the next generation pass.
//!
//! The rendered block travels verbatim as a context block on the next
//! generation request, so every finding the loop decided to act on is
//! recoverable from that request's payload.

use reelforge_utils::types::Severity;

use crate::report::ValidationReport;

/// First line of every feedback block.
pub const FEEDBACK_HEADER: &str = "Validation feedback on the previous version:";

/// Render the report's findings into a feedback block.
///
/// Findings are listed in report order with severity, category, and message;
/// a category that names a bundle blob (structure/styling/behavior) gets a
/// file hint so the regeneration pass knows which blob to touch.
#[must_use]
pub fn render_feedback(report: &ValidationReport) -> String {
    let mut out = String::new();
    out.push_str(FEEDBACK_HEADER);
    out.push('\n');

    for finding in &report.findings {
        out.push_str("- [");
        out.push_str(&finding.severity.to_string());
        out.push_str("] ");
        out.push_str(&finding.category);
        out.push_str(": ");
        out.push_str(&finding.message);
        if let Some(location) = &finding.location {
            out.push_str(" (at ");
            out.push_str(location);
            out.push(')');
        }
        if let Some(blob) = blob_hint(&finding.category) {
            out.push_str(" [fix in ");
            out.push_str(blob);
            out.push(']');
        }
        out.push('\n');
    }

    out.push_str("Regenerate the full bundle with these issues resolved.\n");
    out
}

/// Map a harness category onto the bundle blob it most likely concerns.
fn blob_hint(category: &str) -> Option<&'static str> {
    match category {
        "structure" | "markup" | "accessibility" => Some("structure"),
        "styling" | "layout" | "responsive" => Some("styling"),
        "behavior" | "console" | "interaction" => Some("behavior"),
        _ => None,
    }
}

/// Convenience for the loop's tracing output.
#[must_use]
pub fn summarize(report: &ValidationReport, threshold: Severity) -> String {
    format!(
        "version {} · passed={} · {} finding(s), {} blocking",
        report.artifact_version,
        report.passed,
        report.findings.len(),
        report.blocking_findings(threshold).len(),
    )
}
