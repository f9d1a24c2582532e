//! Image decoding.
//!
//! Accepts raw image bytes or a file path (PNG, JPEG, BMP, WebP) and
//! produces an 8-bit RGB image. Alpha is discarded.

use std::path::Path;

use crate::types::{PipelineError, RgbImage};

/// Decode raw image bytes into RGB.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgb8())
}

/// Open and decode the image at `path` into RGB.
///
/// # Errors
///
/// Returns [`PipelineError::ImageOpen`] if the file is missing,
/// unreadable or not a decodable image.
pub fn open_rgb(path: &Path) -> Result<RgbImage, PipelineError> {
    let img = image::open(path).map_err(|source| PipelineError::ImageOpen {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb8())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode_rgb(&[]);
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode_rgb(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn png_decodes_to_rgb_without_alpha() {
        let img = image::RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let rgb = decode_rgb(&encode_png(&img)).unwrap();
        assert_eq!(rgb.dimensions(), (17, 31));
        assert!(rgb.pixels().all(|p| p.0 == [128, 64, 32]));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let path = Path::new("/nonexistent/pcbscan/board.png");
        let err = open_rgb(path).unwrap_err();
        assert!(matches!(&err, PipelineError::ImageOpen { path: p, .. } if p == path));
        assert!(err.to_string().contains("board.png"));
    }
}
