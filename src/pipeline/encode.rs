//! Image encoding for the two consumers of a page render.
//!
//! * The **slide background** gets the full render as an RGB PNG. Alpha is
//!   dropped: pdfium renders onto an opaque white page anyway, and RGB PNGs
//!   are noticeably smaller.
//! * The **vision model** gets a downscaled copy (longest edge capped by
//!   `model_max_dimension`) as base64 PNG. Image tokens are billed by size,
//!   and a 1200 px slide is plenty for reading text.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// A page image ready to embed in a model request.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// Base64 (standard alphabet, padded) image bytes.
    pub data: String,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
}

/// PNG bytes of the render, without alpha, for the slide background.
pub fn encode_background(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded background {}x{} → {} bytes",
        rgb.width(),
        rgb.height(),
        buf.len()
    );
    Ok(buf)
}

/// Shrink `img` so neither edge exceeds `max_dimension`, keeping the aspect
/// ratio. Smaller images are returned unchanged.
pub fn downscale(img: &DynamicImage, max_dimension: u32) -> DynamicImage {
    if img.width() <= max_dimension && img.height() <= max_dimension {
        return img.clone();
    }
    img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}

/// Downscale and base64-encode a render for the vision model.
pub fn encode_for_model(
    img: &DynamicImage,
    max_dimension: u32,
) -> Result<EncodedImage, image::ImageError> {
    let small = downscale(img, max_dimension);
    let rgb = DynamicImage::ImageRgb8(small.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let data = STANDARD.encode(&buf);
    debug!(
        "Encoded model image {}x{} → {} bytes base64",
        rgb.width(),
        rgb.height(),
        data.len()
    );

    Ok(EncodedImage {
        data,
        mime_type: "image/png",
        width: rgb.width(),
        height: rgb.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])))
    }

    #[test]
    fn small_images_are_not_resized() {
        let img = downscale(&solid(40, 30), 100);
        assert_eq!((img.width(), img.height()), (40, 30));
    }

    #[test]
    fn downscale_caps_longest_edge() {
        let img = downscale(&solid(2400, 1350), 1200);
        assert_eq!(img.width(), 1200);
        assert!(img.height() <= 1200);
        assert!((img.height() as i64 - 675).abs() <= 1);
    }

    #[test]
    fn model_image_is_valid_base64_png() {
        let enc = encode_for_model(&solid(10, 10), 1200).expect("encode should succeed");
        assert_eq!(enc.mime_type, "image/png");
        let decoded = STANDARD.decode(&enc.data).expect("valid base64");
        assert!(decoded.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn background_drops_alpha() {
        let png = encode_background(&solid(8, 8)).unwrap();
        let back = image::load_from_memory(&png).unwrap();
        assert!(!back.color().has_alpha());
    }
}
