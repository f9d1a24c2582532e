//! Symbolic circuit description derived from board geometry.
//!
//! Every dark foreground shape of the test image becomes a nominal
//! resistor spanning its bounding rectangle. Classified defects are
//! then overlaid: an `open` is modelled as a zero-valued wire across
//! the break and a `short` as a low-value resistor across the bridge.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::color::to_gray;
use crate::contour::external_boxes;
use crate::mask::threshold_binary_inverted;
use crate::types::{BoundingBox, Defect, DefectCategory, RgbImage};

/// First line of every netlist.
pub const HEADER: &str = "* Generated Netlist";

/// One netlist element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Element {
    /// `R{index} x1 y1 x2 y2 1k` for a foreground shape.
    Trace {
        /// 1-based shape number.
        index: usize,
        /// Shape bounding rectangle.
        bbox: BoundingBox,
    },
    /// `w x1 y1 x2 y2 0` across an open defect.
    Wire {
        /// Defect box.
        bbox: BoundingBox,
    },
    /// `R x1 y1 x2 y2 0.1` across a short defect.
    Bridge {
        /// Defect box.
        bbox: BoundingBox,
    },
}

impl Element {
    /// Overlay element for a defect, if its category has one.
    #[must_use]
    pub const fn for_defect(defect: &Defect) -> Option<Self> {
        match defect.category {
            DefectCategory::Open => Some(Self::Wire { bbox: defect.bbox }),
            DefectCategory::Short => Some(Self::Bridge { bbox: defect.bbox }),
            DefectCategory::Mousebite
            | DefectCategory::Protrusion
            | DefectCategory::Copper
            | DefectCategory::PinHole => None,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Trace { index, bbox: b } => {
                write!(f, "R{index} {} {} {} {} 1k", b.x1, b.y1, b.x2, b.y2)
            }
            Self::Wire { bbox: b } => write!(f, "w {} {} {} {} 0", b.x1, b.y1, b.x2, b.y2),
            Self::Bridge { bbox: b } => write!(f, "R {} {} {} {} 0.1", b.x1, b.y1, b.x2, b.y2),
        }
    }
}

/// Ordered netlist: shape resistors first, then defect overlays in
/// defect order.
///
/// `Display` renders the file text: [`HEADER`], then one element per
/// line, each terminated by a newline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Netlist {
    /// Elements in output order.
    pub elements: Vec<Element>,
}

impl Netlist {
    /// Rendered element lines, without the header.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.elements.iter().map(ToString::to_string)
    }

    /// Number of shape resistors.
    #[must_use]
    pub fn trace_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::Trace { .. }))
            .count()
    }
}

impl fmt::Display for Netlist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER}")?;
        for element in &self.elements {
            writeln!(f, "{element}")?;
        }
        Ok(())
    }
}

/// Build the netlist for `test_image` and its classified `defects`.
///
/// Pixels at or below `threshold` in grayscale count as foreground.
#[must_use = "returns the netlist"]
pub fn synthesize(test_image: &RgbImage, defects: &[Defect], threshold: u8) -> Netlist {
    let foreground = threshold_binary_inverted(&to_gray(test_image), threshold);
    let shapes = external_boxes(&foreground);

    let mut elements: Vec<Element> = shapes
        .into_iter()
        .enumerate()
        .map(|(i, bbox)| Element::Trace { index: i + 1, bbox })
        .collect();
    let traces = elements.len();
    elements.extend(defects.iter().filter_map(Element::for_defect));

    debug!(
        traces,
        overlays = elements.len() - traces,
        "synthesized netlist"
    );
    Netlist { elements }
}
