//! Structural similarity (SSIM) between a test image and its reference.
//!
//! Mean SSIM over every fully-contained `7x7` window with uniform
//! weights, `K1 = 0.01`, `K2 = 0.03`, data range 255 and sample
//! (`N - 1`) covariance normalization. Window sums come from integral
//! images, so the cost is linear in the pixel count regardless of the
//! window size.
//!
//! Identical inputs score exactly 1.0: every window's numerator and
//! denominator are computed from bit-identical terms.

use tracing::debug;

use crate::color::to_gray;
use crate::resize::{ResampleFilter, resize_exact};
use crate::types::{Dimensions, GrayImage, PipelineError, RgbImage, SimilarityResult};

/// Default (and maximum) window side.
pub const WINDOW_SIZE: u32 = 7;

/// Smallest window side that still has a sample covariance.
pub const MIN_WINDOW_SIZE: u32 = 3;

const K1: f64 = 0.01;
const K2: f64 = 0.03;
const DATA_RANGE: f64 = 255.0;

/// Score `test` against `reference` and grade the result.
///
/// Both images are converted to grayscale; if the shapes differ the test
/// image is resized to exactly the reference dimensions.
///
/// # Errors
///
/// Returns [`PipelineError::ImageTooSmall`] if either side of the
/// reference is shorter than [`MIN_WINDOW_SIZE`].
pub fn score(
    test: &RgbImage,
    reference: &RgbImage,
    filter: ResampleFilter,
) -> Result<SimilarityResult, PipelineError> {
    let reference_gray = to_gray(reference);
    let mut test_gray = to_gray(test);
    let reference_dims = Dimensions::of(&reference_gray);
    if Dimensions::of(&test_gray) != reference_dims {
        debug!(
            from = %Dimensions::of(&test_gray),
            to = %reference_dims,
            "resizing test image for similarity scoring"
        );
        test_gray = resize_exact(&test_gray, reference_dims, filter);
    }

    let index = mean_ssim(&test_gray, &reference_gray)?;
    Ok(SimilarityResult::from_percentage(index * 100.0))
}

/// Window side used for an image: [`WINDOW_SIZE`], or the largest odd
/// side that fits when the image is smaller.
#[must_use]
pub fn window_size_for(dimensions: Dimensions) -> Option<u32> {
    let shorter = dimensions.width.min(dimensions.height);
    let size = if shorter >= WINDOW_SIZE {
        WINDOW_SIZE
    } else if shorter % 2 == 1 {
        shorter
    } else {
        shorter.saturating_sub(1)
    };
    (size >= MIN_WINDOW_SIZE).then_some(size)
}

/// Mean SSIM index of two same-sized grayscale images, in `[-1, 1]`.
///
/// # Errors
///
/// Returns [`PipelineError::DimensionMismatch`] if the shapes differ and
/// [`PipelineError::ImageTooSmall`] if no window fits.
#[allow(clippy::cast_precision_loss)]
pub fn mean_ssim(a: &GrayImage, b: &GrayImage) -> Result<f64, PipelineError> {
    let dims = Dimensions::of(a);
    if Dimensions::of(b) != dims {
        return Err(PipelineError::DimensionMismatch {
            test: dims,
            reference: Dimensions::of(b),
        });
    }
    let window = window_size_for(dims).ok_or(PipelineError::ImageTooSmall {
        dimensions: dims,
        minimum: MIN_WINDOW_SIZE,
    })?;

    let sums = WindowSums::new(a, b);
    let n = f64::from(window * window);
    let cov_norm = n / (n - 1.0);
    let c1 = (K1 * DATA_RANGE).powi(2);
    let c2 = (K2 * DATA_RANGE).powi(2);

    let mut total = 0.0;
    let mut count: u64 = 0;
    for y in 0..=(dims.height - window) {
        for x in 0..=(dims.width - window) {
            let [sa, sb, saa, sbb, sab] = sums.window(x, y, window);
            let ua = sa as f64 / n;
            let ub = sb as f64 / n;
            let va = cov_norm * (saa as f64 / n - ua * ua);
            let vb = cov_norm * (sbb as f64 / n - ub * ub);
            let vab = cov_norm * (sab as f64 / n - ua * ub);

            let numerator = (2.0 * ua * ub + c1) * (2.0 * vab + c2);
            let denominator = (ua * ua + ub * ub + c1) * (va + vb + c2);
            total += numerator / denominator;
            count += 1;
        }
    }

    debug!(window, windows = count, "computed mean SSIM");
    Ok(total / count as f64)
}

/// Integral images of `a`, `b`, `a²`, `b²` and `a·b`.
struct WindowSums {
    stride: usize,
    tables: [Vec<u64>; 5],
}

impl WindowSums {
    fn new(a: &GrayImage, b: &GrayImage) -> Self {
        let (w, h) = (a.width() as usize, a.height() as usize);
        let stride = w + 1;
        let mut tables: [Vec<u64>; 5] = std::array::from_fn(|_| vec![0; stride * (h + 1)]);

        for (y, (row_a, row_b)) in a.rows().zip(b.rows()).enumerate() {
            let mut row_sums = [0u64; 5];
            for (x, (pa, pb)) in row_a.zip(row_b).enumerate() {
                let va = u64::from(pa.0[0]);
                let vb = u64::from(pb.0[0]);
                let terms = [va, vb, va * va, vb * vb, va * vb];
                for (k, table) in tables.iter_mut().enumerate() {
                    row_sums[k] += terms[k];
                    table[(y + 1) * stride + x + 1] = table[y * stride + x + 1] + row_sums[k];
                }
            }
        }

        Self { stride, tables }
    }

    /// Sums over the `size x size` window with top-left corner `(x, y)`.
    fn window(&self, x: u32, y: u32, size: u32) -> [u64; 5] {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + size as usize, y0 + size as usize);
        let s = self.stride;
        std::array::from_fn(|k| {
            let t = &self.tables[k];
            t[y1 * s + x1] + t[y0 * s + x0] - t[y0 * s + x1] - t[y1 * s + x0]
        })
    }
}
