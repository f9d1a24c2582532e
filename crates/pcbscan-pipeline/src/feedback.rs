//! Remediation guidance for detected defects.

use serde::Serialize;

use crate::aggregate::CategoryCounts;
use crate::types::DefectCategory;

/// Fixed guidance for one defect category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Remediation {
    /// Human-readable defect type.
    pub title: &'static str,
    /// What the defect does to the board.
    pub impact: &'static str,
    /// What to do about it.
    pub solution: &'static str,
}

impl Remediation {
    /// Guidance for `category`.
    #[must_use]
    pub const fn for_category(category: DefectCategory) -> Self {
        match category {
            DefectCategory::Open => Self {
                title: "Open Circuit",
                impact: "Electrical connectivity issues.",
                solution: "Check for broken traces or disconnects.",
            },
            DefectCategory::Short => Self {
                title: "Short Circuit",
                impact: "Excessive current flow, potential overheating.",
                solution: "Inspect for unintended connections between traces.",
            },
            DefectCategory::Mousebite => Self {
                title: "Mousebite",
                impact: "Possible leak paths.",
                solution: "Verify that all vias are properly filled and sealed.",
            },
            DefectCategory::Protrusion => Self {
                title: "Protrusion",
                impact: "Signal degradation.",
                solution: "Remove or reduce the length of spurs using a PCB editor.",
            },
            DefectCategory::Copper => Self {
                title: "Copper Puddles",
                impact: "Insulation issues.",
                solution: "Ensure proper etching and copper deposition processes.",
            },
            DefectCategory::PinHole => Self {
                title: "Pin-hole",
                impact: "Weak solder joints.",
                solution: "Improve surface finish and soldering techniques.",
            },
        }
    }

    /// `"Defect Type: ... Impact: ... Solution: ..."`.
    #[must_use]
    pub fn text(&self) -> String {
        format!(
            "Defect Type: {} Impact: {} Solution: {}",
            self.title, self.impact, self.solution
        )
    }
}

/// One feedback line per category with a non-zero count, in category
/// order.
#[must_use]
pub fn feedback(counts: &CategoryCounts) -> Vec<String> {
    counts
        .iter()
        .filter(|&(_, n)| n > 0)
        .map(|(category, n)| {
            format!(
                "{n} {category}(s) detected. {}",
                Remediation::for_category(category).text()
            )
        })
        .collect()
}
