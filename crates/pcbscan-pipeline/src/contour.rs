//! Contour tracing: bounding rectangles of the outermost shapes in a
//! binary mask.
//!
//! Wraps `imageproc::contours::find_contours` (Suzuki-Abe border
//! following) and keeps only external borders, i.e. outer borders with
//! no enclosing parent. Holes and shapes nested inside holes are
//! ignored.
//!
//! The border follower needs a background pixel on every side of a
//! shape, so the mask is traced inside a one-pixel background frame and
//! the resulting points are shifted back. Shapes touching the image edge
//! are therefore reported like any other.

use image::Luma;
use imageproc::contours::{BorderType, Contour};

use crate::types::{BoundingBox, GrayImage};

/// Bounding rectangles of every external contour in `mask`, in the
/// order the border-following scan discovers them (raster order of each
/// contour's first pixel).
///
/// Non-zero pixels are foreground.
#[must_use]
pub fn external_boxes(mask: &GrayImage) -> Vec<BoundingBox> {
    let contours: Vec<Contour<u32>> = imageproc::contours::find_contours(&framed(mask));

    contours
        .iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .filter_map(bounding_rect)
        .collect()
}

/// Copy of `mask` surrounded by a one-pixel background border.
fn framed(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    GrayImage::from_fn(w + 2, h + 2, |x, y| {
        if x == 0 || y == 0 || x > w || y > h {
            Luma([0])
        } else {
            *mask.get_pixel(x - 1, y - 1)
        }
    })
}

/// Smallest box enclosing every point of a contour traced in a
/// [`framed`] mask, in the unframed mask's coordinates.
fn bounding_rect(contour: &Contour<u32>) -> Option<BoundingBox> {
    let min_x = contour.points.iter().map(|p| p.x).min()?;
    let max_x = contour.points.iter().map(|p| p.x).max()?;
    let min_y = contour.points.iter().map(|p| p.y).min()?;
    let max_y = contour.points.iter().map(|p| p.y).max()?;
    Some(BoundingBox::from_rect(
        min_x.saturating_sub(1),
        min_y.saturating_sub(1),
        max_x - min_x + 1,
        max_y - min_y + 1,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) {
        for y in y0..y1 {
            for x in x0..x1 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn empty_mask_produces_no_boxes() {
        assert!(external_boxes(&GrayImage::new(10, 10)).is_empty());
    }

    #[test]
    fn filled_rectangle_produces_exact_box() {
        let mut mask = GrayImage::new(20, 20);
        fill(&mut mask, 5, 6, 15, 12);
        assert_eq!(
            external_boxes(&mask),
            [BoundingBox::new(5, 6, 15, 12).unwrap()]
        );
    }

    #[test]
    fn single_pixel_produces_unit_box() {
        let mut mask = GrayImage::new(10, 10);
        mask.put_pixel(4, 7, Luma([255]));
        assert_eq!(
            external_boxes(&mask),
            [BoundingBox::new(4, 7, 5, 8).unwrap()]
        );
    }

    #[test]
    fn full_frame_covers_image() {
        let mask = GrayImage::from_pixel(50, 50, Luma([255]));
        assert_eq!(
            external_boxes(&mask),
            [BoundingBox::new(0, 0, 50, 50).unwrap()]
        );
    }

    #[test]
    fn shapes_touching_the_edge_get_boxes() {
        let mut mask = GrayImage::new(100, 100);
        // Full-width band along the top edge.
        fill(&mut mask, 0, 0, 100, 10);
        // Block against the left edge.
        fill(&mut mask, 0, 40, 15, 60);
        // Block against the bottom-right corner.
        fill(&mut mask, 80, 85, 100, 100);
        let mut boxes = external_boxes(&mask);
        boxes.sort_by_key(|b| (b.y1, b.x1));
        assert_eq!(
            boxes,
            [
                BoundingBox::new(0, 0, 100, 10).unwrap(),
                BoundingBox::new(0, 40, 15, 60).unwrap(),
                BoundingBox::new(80, 85, 100, 100).unwrap(),
            ]
        );
    }

    #[test]
    fn shape_one_pixel_from_the_edge_gets_a_box() {
        let mut mask = GrayImage::new(40, 40);
        fill(&mut mask, 1, 10, 16, 30);
        assert_eq!(
            external_boxes(&mask),
            [BoundingBox::new(1, 10, 16, 30).unwrap()]
        );
    }

    #[test]
    fn ring_yields_only_the_outer_border() {
        let mut mask = GrayImage::new(30, 30);
        fill(&mut mask, 5, 5, 25, 25);
        for y in 10..20 {
            for x in 10..20 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        // A shape nested inside the hole is not external either.
        fill(&mut mask, 13, 13, 17, 17);
        assert_eq!(
            external_boxes(&mask),
            [BoundingBox::new(5, 5, 25, 25).unwrap()]
        );
    }

    #[test]
    fn separate_shapes_each_get_a_box() {
        let mut mask = GrayImage::new(40, 20);
        fill(&mut mask, 2, 2, 8, 8);
        fill(&mut mask, 20, 10, 30, 15);
        let mut boxes = external_boxes(&mask);
        boxes.sort_by_key(|b| (b.x1, b.y1));
        assert_eq!(
            boxes,
            [
                BoundingBox::new(2, 2, 8, 8).unwrap(),
                BoundingBox::new(20, 10, 30, 15).unwrap(),
            ]
        );
    }
}
