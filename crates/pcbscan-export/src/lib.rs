//! pcbscan-export: Pure format serializers (sans-IO)
//!
//! Converts inspection results into output formats: plain-text report,
//! JSON summary, SVG defect overlay, PNG bytes and netlist text. Every
//! function returns bytes or a `String`; writing files is the caller's
//! job.

pub mod svg;
pub mod text;

use std::io::Cursor;

use pcbscan_pipeline::{Netlist, ReportSummary, RgbImage};

pub use svg::{SvgMetadata, to_overlay_svg};
pub use text::to_text_report;

/// Errors from serializers that can fail.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// JSON serialization failed.
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// PNG encoding failed.
    #[error("failed to encode PNG: {0}")]
    Png(#[from] image::ImageError),
}

/// Pretty-printed JSON for a report summary.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails.
pub fn to_json(summary: &ReportSummary) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(summary)?)
}

/// Encode an RGB image as PNG bytes.
///
/// # Errors
///
/// Returns [`ExportError::Png`] if the encoder fails.
pub fn to_png(image: &RgbImage) -> Result<Vec<u8>, ExportError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, image::ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Netlist file contents: header plus one element per line.
#[must_use]
pub fn to_netlist_text(netlist: &Netlist) -> String {
    netlist.to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgb;
    use pcbscan_pipeline::{
        BoundingBox, CategoryCounts, Defect, DefectCategory, SimilarityResult, synthesize_netlist,
    };

    use super::*;

    #[test]
    fn png_round_trips_through_the_decoder() {
        let img = RgbImage::from_fn(7, 5, |x, y| Rgb([x as u8 * 30, y as u8 * 40, 9]));
        let bytes = to_png(&img).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let back = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(back, img);
    }

    #[test]
    fn json_summary_uses_category_names() {
        let defects = vec![Defect {
            bbox: BoundingBox::new(1, 2, 3, 4).unwrap(),
            category: DefectCategory::PinHole,
        }];
        let summary = ReportSummary {
            similarity: SimilarityResult::from_percentage(61.0),
            counts: CategoryCounts::tally(&defects),
            defects,
            feedback: vec!["1 pin-hole(s) detected.".into()],
            skipped_regions: Vec::new(),
        };
        let json = to_json(&summary).unwrap();
        assert!(json.contains(r#""category": "pin-hole""#));
        assert!(json.contains(r#""grade": "D""#));
        assert!(!json.contains("skipped_regions"));
    }

    #[test]
    fn netlist_text_has_header_and_trailing_newline() {
        let blank = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let defects = [Defect {
            bbox: BoundingBox::new(1, 1, 4, 4).unwrap(),
            category: DefectCategory::Open,
        }];
        let text = to_netlist_text(&synthesize_netlist(&blank, &defects));
        assert_eq!(text, "* Generated Netlist\nw 1 1 4 4 0\n");
    }
}
