//! Image loading and conversion helpers.

use crate::core::DefectError;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::map::map_colors;
use std::path::Path;

/// BT.601 luma weights scaled by `2^14`.
const GRAY_WEIGHTS: [u32; 3] = [4899, 9617, 1868];
const GRAY_SHIFT: u32 = 14;

/// Converts a DynamicImage to a GrayImage.
///
/// Color images are reduced with the BT.601 weights in 14-bit fixed point
/// (`0.299 R + 0.587 G + 0.114 B`), rounding half up. Alpha is dropped.
pub fn dynamic_to_gray(img: DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(gray) => gray,
        DynamicImage::ImageLumaA8(_) | DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA16(_) => {
            img.to_luma8()
        }
        other => {
            let rgb = other.to_rgb8();
            map_colors(&rgb, |pixel| {
                let sum: u32 = pixel
                    .0
                    .iter()
                    .zip(GRAY_WEIGHTS)
                    .map(|(&c, w)| c as u32 * w)
                    .sum();
                Luma([((sum + (1 << (GRAY_SHIFT - 1))) >> GRAY_SHIFT) as u8])
            })
        }
    }
}

/// Loads an image from a file path.
///
/// # Errors
///
/// Returns `DefectError::ImageLoad` carrying the path if the file cannot be
/// read or decoded.
pub fn load_image(path: &Path) -> Result<DynamicImage, DefectError> {
    image::open(path).map_err(|e| DefectError::image_load(path.display().to_string(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn loads_written_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.bmp");
        RgbImage::from_pixel(5, 3, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!((img.width(), img.height()), (5, 3));
        assert_eq!(dynamic_to_gray(img).dimensions(), (5, 3));
    }

    #[test]
    fn corrupt_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.bmp");
        std::fs::write(&path, b"definitely not a bitmap").unwrap();

        match load_image(&path) {
            Err(DefectError::ImageLoad { path: reported, .. }) => {
                assert!(reported.ends_with("broken.bmp"))
            }
            other => panic!("expected image load error, got {:?}", other),
        }
    }

    #[test]
    fn color_pixels_use_bt601_weights() {
        let img = RgbImage::from_fn(4, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            2 => Rgb([0, 0, 255]),
            _ => Rgb([255, 255, 255]),
        });
        let gray = dynamic_to_gray(DynamicImage::ImageRgb8(img));
        let values: Vec<u8> = gray.pixels().map(|p| p[0]).collect();
        assert_eq!(values, vec![76, 150, 29, 255]);
    }

    #[test]
    fn gray_input_is_unchanged() {
        let img = GrayImage::from_fn(3, 3, |x, y| Luma([(x * 50 + y * 7) as u8]));
        assert_eq!(dynamic_to_gray(DynamicImage::ImageLuma8(img.clone())), img);
    }
}
