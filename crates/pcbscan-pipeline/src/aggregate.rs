//! Defect aggregation: per-category counts and annotated overlays.
//!
//! Every defect is drawn twice, once on a shared "combined" image and
//! once on its category's own copy of the source. All six categories are
//! always present in the output, with an unannotated copy and a zero
//! count when nothing was found.

use std::collections::BTreeMap;
use std::fmt;

use ab_glyph::{FontArc, PxScale};
use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::types::{Defect, DefectCategory, RgbImage};

/// Outline color of defect boxes.
pub const BOX_COLOR: Rgb<u8> = Rgb([10, 255, 36]);

/// Color of category labels.
pub const LABEL_COLOR: Rgb<u8> = Rgb([100, 40, 180]);

/// Outline thickness in pixels, drawn inward from the box edge.
pub const BOX_THICKNESS: i32 = 2;

/// Label tab height when no font is available.
const TAB_HEIGHT: i32 = 10;

/// Label tab width per character when no font is available.
const TAB_CHAR_WIDTH: i32 = 6;

/// DejaVu Sans, the label font used unless the caller supplies one.
/// Distributed under the Bitstream Vera license in
/// `assets/DejaVuSans-LICENSE.txt`.
pub static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// The bundled label font, parsed.
///
/// Returns `None` only if the embedded font data is unusable.
#[must_use]
pub fn bundled_font() -> Option<FontArc> {
    FontArc::try_from_slice(BUNDLED_FONT).ok()
}

/// Defect count per category. Every category has an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCounts(BTreeMap<DefectCategory, usize>);

impl CategoryCounts {
    /// All categories at zero.
    #[must_use]
    pub fn zeroed() -> Self {
        Self(DefectCategory::ALL.into_iter().map(|c| (c, 0)).collect())
    }

    /// Count every defect in `defects`.
    #[must_use]
    pub fn tally(defects: &[Defect]) -> Self {
        let mut counts = Self::zeroed();
        for d in defects {
            counts.increment(d.category);
        }
        counts
    }

    /// Add one to `category`.
    pub fn increment(&mut self, category: DefectCategory) {
        *self.0.entry(category).or_insert(0) += 1;
    }

    /// Count for `category`.
    #[must_use]
    pub fn get(&self, category: DefectCategory) -> usize {
        self.0.get(&category).copied().unwrap_or(0)
    }

    /// Sum over all categories.
    #[must_use]
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// `(category, count)` pairs in category order.
    pub fn iter(&self) -> impl Iterator<Item = (DefectCategory, usize)> + '_ {
        self.0.iter().map(|(&c, &n)| (c, n))
    }
}

impl Default for CategoryCounts {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// How category labels are rendered.
///
/// Labels are drawn as text just above the box's top-left corner. The
/// default style uses [`bundled_font`]. A style with no font draws a
/// solid tab in [`LABEL_COLOR`] at the same spot instead.
#[derive(Clone)]
pub struct LabelStyle {
    /// TrueType/OpenType font for label text.
    pub font: Option<FontArc>,
    /// Font size in pixels.
    pub scale: f32,
}

impl LabelStyle {
    /// Default label height in pixels.
    pub const DEFAULT_SCALE: f32 = 20.0;

    /// Text labels using `font`.
    #[must_use]
    pub const fn with_font(font: FontArc) -> Self {
        Self {
            font: Some(font),
            scale: Self::DEFAULT_SCALE,
        }
    }
}

impl Default for LabelStyle {
    fn default() -> Self {
        Self {
            font: bundled_font(),
            scale: Self::DEFAULT_SCALE,
        }
    }
}

impl fmt::Debug for LabelStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LabelStyle")
            .field("font", &self.font.as_ref().map(|_| "<font>"))
            .field("scale", &self.scale)
            .finish()
    }
}

/// Output of [`aggregate`].
#[derive(Debug, Clone)]
pub struct Annotated {
    /// Every defect on one image.
    pub combined: RgbImage,
    /// One image per category showing only that category's defects.
    pub per_category: BTreeMap<DefectCategory, RgbImage>,
    /// Defects per category.
    pub counts: CategoryCounts,
}

/// Draw every defect onto copies of `image` and count them by category.
#[must_use = "returns the annotated images and counts"]
pub fn aggregate(image: &RgbImage, defects: &[Defect], style: &LabelStyle) -> Annotated {
    let mut combined = image.clone();
    let mut per_category: BTreeMap<DefectCategory, RgbImage> = DefectCategory::ALL
        .into_iter()
        .map(|c| (c, image.clone()))
        .collect();
    let mut counts = CategoryCounts::zeroed();

    for defect in defects {
        annotate(&mut combined, defect, style);
        if let Some(canvas) = per_category.get_mut(&defect.category) {
            annotate(canvas, defect, style);
        }
        counts.increment(defect.category);
    }

    Annotated {
        combined,
        per_category,
        counts,
    }
}

/// Draw one defect's outline and label.
pub fn annotate(canvas: &mut RgbImage, defect: &Defect, style: &LabelStyle) {
    let b = defect.bbox;
    draw_label(canvas, b.x1, b.y1, defect.category.name(), style);
    for inset in 0..BOX_THICKNESS {
        let (w, h) = (b.width() - 2 * inset, b.height() - 2 * inset);
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at(b.x1 + inset, b.y1 + inset).of_size(w.unsigned_abs(), h.unsigned_abs());
        draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
    }
}

/// Draw `text` so that it sits on top of the point `(x, y)`.
#[allow(clippy::cast_possible_truncation)]
fn draw_label(canvas: &mut RgbImage, x: i32, y: i32, text: &str, style: &LabelStyle) {
    if let Some(font) = &style.font {
        let top = y - style.scale.ceil() as i32;
        draw_text_mut(canvas, LABEL_COLOR, x, top, PxScale::from(style.scale), font, text);
    } else {
        let chars = i32::try_from(text.len()).unwrap_or(i32::MAX);
        let width = chars.saturating_mul(TAB_CHAR_WIDTH).max(1);
        let rect = Rect::at(x, y - TAB_HEIGHT).of_size(width.unsigned_abs(), TAB_HEIGHT.unsigned_abs());
        draw_filled_rect_mut(canvas, rect, LABEL_COLOR);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn defect(x1: i32, y1: i32, x2: i32, y2: i32, category: DefectCategory) -> Defect {
        Defect {
            bbox: BoundingBox::new(x1, y1, x2, y2).unwrap(),
            category,
        }
    }

    fn source() -> RgbImage {
        RgbImage::from_pixel(120, 120, Rgb([0, 0, 0]))
    }

    #[test]
    fn empty_defects_yield_zero_counts_and_clean_copies() {
        let img = source();
        let out = aggregate(&img, &[], &LabelStyle::default());
        assert_eq!(out.counts.total(), 0);
        for c in DefectCategory::ALL {
            assert_eq!(out.counts.get(c), 0);
            assert_eq!(out.per_category[&c], img);
        }
        assert_eq!(out.combined, img);
        assert_eq!(out.counts.iter().count(), 6);
    }

    #[test]
    fn counts_sum_to_defect_count() {
        let defects = [
            defect(10, 20, 40, 50, DefectCategory::Short),
            defect(60, 60, 90, 100, DefectCategory::Open),
            defect(5, 70, 30, 110, DefectCategory::Short),
        ];
        let out = aggregate(&source(), &defects, &LabelStyle::default());
        assert_eq!(out.counts.total(), defects.len());
        assert_eq!(out.counts.get(DefectCategory::Short), 2);
        assert_eq!(out.counts.get(DefectCategory::Open), 1);
        assert_eq!(out.counts.get(DefectCategory::PinHole), 0);
    }

    #[test]
    fn outline_is_drawn_on_combined_and_own_category_only() {
        let defects = [defect(20, 30, 60, 70, DefectCategory::Copper)];
        let img = source();
        let out = aggregate(&img, &defects, &LabelStyle::default());

        // Outer and inner outline rows.
        assert_eq!(out.combined.get_pixel(40, 30), &BOX_COLOR);
        assert_eq!(out.combined.get_pixel(40, 31), &BOX_COLOR);
        assert_eq!(out.combined.get_pixel(40, 32), &Rgb([0, 0, 0]));
        // Interior untouched.
        assert_eq!(out.combined.get_pixel(40, 50), &Rgb([0, 0, 0]));

        assert_eq!(out.per_category[&DefectCategory::Copper].get_pixel(40, 30), &BOX_COLOR);
        assert_eq!(out.per_category[&DefectCategory::Open], img);
    }

    /// Pixels in the band just above `(x, y)` that differ from black.
    fn label_pixels(img: &RgbImage, x: u32, y: u32) -> Vec<(u32, u32)> {
        let scale = LabelStyle::DEFAULT_SCALE as u32;
        (y - scale..y)
            .flat_map(|py| (x..x + 80).map(move |px| (px, py)))
            .filter(|&(px, py)| img.get_pixel(px, py) != &Rgb([0, 0, 0]))
            .collect()
    }

    #[test]
    fn bundled_font_parses() {
        assert!(bundled_font().is_some());
        assert!(LabelStyle::default().font.is_some());
    }

    #[test]
    fn default_label_is_text_above_the_box() {
        let defects = [defect(20, 30, 60, 70, DefectCategory::Open)];
        let out = aggregate(&source(), &defects, &LabelStyle::default());
        let drawn = label_pixels(&out.combined, 20, 30);
        assert!(!drawn.is_empty());
        // Glyph strokes, not a filled block.
        assert!(drawn.len() < 80 * 20 / 2);
        assert!(drawn.iter().any(|&(x, y)| out.combined.get_pixel(x, y).0[2] > 150));
    }

    #[test]
    fn categories_get_distinguishable_labels() {
        let render = |category| {
            let out = aggregate(&source(), &[defect(20, 30, 60, 70, category)], &LabelStyle::default());
            label_pixels(&out.combined, 20, 30)
        };
        assert_ne!(render(DefectCategory::Open), render(DefectCategory::Short));
    }

    #[test]
    fn fontless_style_draws_a_tab() {
        let style = LabelStyle {
            font: None,
            ..LabelStyle::default()
        };
        let defects = [defect(20, 30, 60, 70, DefectCategory::Open)];
        let out = aggregate(&source(), &defects, &style);
        assert_eq!(out.combined.get_pixel(21, 25), &LABEL_COLOR);
    }

    #[test]
    fn boxes_leaving_the_frame_are_clipped_not_rejected() {
        let defects = [defect(-20, -20, 70, 70, DefectCategory::Protrusion)];
        let out = aggregate(&source(), &defects, &LabelStyle::default());
        assert_eq!(out.counts.get(DefectCategory::Protrusion), 1);
        assert_eq!(out.combined.get_pixel(69, 10), &BOX_COLOR);
    }

    #[test]
    fn counts_serialize_with_every_category() {
        let json = serde_json::to_string(&CategoryCounts::zeroed()).unwrap();
        assert_eq!(
            json,
            r#"{"open":0,"short":0,"mousebite":0,"protrusion":0,"copper":0,"pin-hole":0}"#
        );
    }
}
