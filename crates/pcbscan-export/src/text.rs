//! Plain-text inspection report.
//!
//! The line layout is what a paginated renderer consumes: one entry per
//! line, a title, the similarity block, the defect list and the
//! feedback paragraphs.

use std::fmt::Write;

use pcbscan_pipeline::ReportSummary;

/// Report heading.
pub const TITLE: &str = "PCB Defect Detection Report";

/// Render `summary` as a plain-text report.
///
/// Skipped regions are listed after the feedback only when there are
/// any, so a clean run produces exactly the title, similarity, defect
/// and feedback sections.
#[must_use]
pub fn to_text_report(summary: &ReportSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{TITLE}");
    let _ = writeln!(out, "Similarity: {:.2}%", summary.similarity.percentage);
    let _ = writeln!(out, "Grade: {}", summary.similarity.grade);
    let _ = writeln!(out);

    let _ = writeln!(out, "Defects Found:");
    for defect in &summary.defects {
        let b = defect.bbox;
        let _ = writeln!(
            out,
            "- {} at ({}, {}) to ({}, {})",
            defect.category, b.x1, b.y1, b.x2, b.y2
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Feedback:");
    for line in &summary.feedback {
        let _ = writeln!(out, "{line}");
    }

    if !summary.skipped_regions.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Skipped Regions:");
        for skipped in &summary.skipped_regions {
            let b = skipped.bbox;
            let _ = writeln!(
                out,
                "- ({}, {}) to ({}, {}): {}",
                b.x1, b.y1, b.x2, b.y2, skipped.reason
            );
        }
    }

    out
}
