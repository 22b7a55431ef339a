//! Image normalization ahead of feature extraction.
//!
//! Every input, whatever its size or channel layout, is reduced to a 64x64
//! single-channel image through a fixed sequence of steps:
//!
//! 1. grayscale conversion
//! 2. bilinear resize to 64x64
//! 3. 5x5 Gaussian smoothing
//! 4. global histogram equalization
//!
//! The transform is a pure function of the input pixels.

use crate::core::constants::NORMALIZED_IMAGE_SIZE;
use crate::core::{DefectError, ProcessingStage};
use crate::processors::filters::{equalize_histogram, gaussian_blur_5x5, resize_bilinear};
use crate::utils::dynamic_to_gray;
use image::{DynamicImage, GrayImage};
use std::time::{Duration, Instant};

/// Normalized image together with the time the transform took.
#[derive(Debug, Clone)]
pub struct PreprocessOutput {
    /// The 64x64 grayscale image.
    pub image: GrayImage,
    /// Wall-clock time spent in preprocessing.
    pub elapsed: Duration,
}

/// Input statistics gathered alongside preprocessing for the single-image view.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessStats {
    /// Input dimensions (width, height).
    pub input_size: (u32, u32),
    /// Number of channels of the input.
    pub channels: u8,
    /// Size of the decoded input pixel buffer in kilobytes.
    pub memory_usage_kb: f64,
    /// Wall-clock time spent in preprocessing.
    pub preprocessing_time: Duration,
}

/// Normalizes raw images into fixed-size grayscale rasters.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    target_size: u32,
}

impl ImagePreprocessor {
    /// Creates a preprocessor producing 64x64 images.
    pub fn new() -> Self {
        Self {
            target_size: NORMALIZED_IMAGE_SIZE,
        }
    }

    /// Side length of the produced images.
    pub fn target_size(&self) -> u32 {
        self.target_size
    }

    /// Normalizes `input` into a 64x64 grayscale image.
    ///
    /// # Errors
    ///
    /// Returns `DefectError::InvalidInput` for images with a zero dimension.
    pub fn preprocess(&self, input: &DynamicImage) -> Result<PreprocessOutput, DefectError> {
        let start = Instant::now();
        ensure_non_empty(input.width(), input.height())?;

        let gray = match input {
            DynamicImage::ImageLuma8(gray) => gray.clone(),
            other => dynamic_to_gray(other.clone()),
        };
        let image = self.normalize_gray(&gray)?;

        Ok(PreprocessOutput {
            image,
            elapsed: start.elapsed(),
        })
    }

    /// Normalizes `input` and reports statistics about the input image.
    pub fn preprocess_with_stats(
        &self,
        input: &DynamicImage,
    ) -> Result<(GrayImage, PreprocessStats), DefectError> {
        let output = self.preprocess(input)?;
        let stats = PreprocessStats {
            input_size: (input.width(), input.height()),
            channels: input.color().channel_count(),
            memory_usage_kb: input.as_bytes().len() as f64 / 1024.0,
            preprocessing_time: output.elapsed,
        };
        Ok((output.image, stats))
    }

    /// Applies the resize, blur and equalization steps to a grayscale image.
    pub fn normalize_gray(&self, gray: &GrayImage) -> Result<GrayImage, DefectError> {
        ensure_non_empty(gray.width(), gray.height())?;

        let resized = resize_bilinear(gray, self.target_size, self.target_size);

        if resized.dimensions() != (self.target_size, self.target_size) {
            return Err(DefectError::stage_failure(
                ProcessingStage::Preprocess,
                format!(
                    "resize produced {}x{}, expected {}x{}",
                    resized.width(),
                    resized.height(),
                    self.target_size,
                    self.target_size
                ),
            ));
        }

        let blurred = gaussian_blur_5x5(&resized);
        Ok(equalize_histogram(&blurred))
    }
}

impl Default for ImagePreprocessor {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_non_empty(width: u32, height: u32) -> Result<(), DefectError> {
    if width == 0 || height == 0 {
        return Err(DefectError::invalid_input(format!(
            "cannot preprocess an empty image ({}x{})",
            width, height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn gradient_rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    #[test]
    fn output_is_always_64x64_gray() {
        let preprocessor = ImagePreprocessor::new();
        for (w, h) in [(1, 1), (3, 200), (200, 200), (64, 64), (640, 17)] {
            let output = preprocessor.preprocess(&gradient_rgb(w, h)).unwrap();
            assert_eq!(output.image.dimensions(), (64, 64));
        }

        let gray = DynamicImage::ImageLuma8(GrayImage::from_fn(31, 90, |x, y| {
            image::Luma([((x * y) % 256) as u8])
        }));
        let output = preprocessor.preprocess(&gray).unwrap();
        assert_eq!(output.image.dimensions(), (64, 64));
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let preprocessor = ImagePreprocessor::new();
        let input = gradient_rgb(200, 200);
        let a = preprocessor.preprocess(&input).unwrap();
        let b = preprocessor.preprocess(&input).unwrap();
        assert_eq!(a.image.as_raw(), b.image.as_raw());
    }

    #[test]
    fn empty_image_is_rejected() {
        let preprocessor = ImagePreprocessor::new();
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        assert!(matches!(
            preprocessor.preprocess(&empty),
            Err(DefectError::InvalidInput { .. })
        ));
    }

    #[test]
    fn stats_report_input_geometry() {
        let preprocessor = ImagePreprocessor::new();
        let (image, stats) = preprocessor
            .preprocess_with_stats(&gradient_rgb(200, 100))
            .unwrap();
        assert_eq!(image.dimensions(), (64, 64));
        assert_eq!(stats.input_size, (200, 100));
        assert_eq!(stats.channels, 3);
        assert!((stats.memory_usage_kb - 200.0 * 100.0 * 3.0 / 1024.0).abs() < 1e-9);
    }

    #[test]
    fn color_input_uses_integer_bt601_gray() {
        let preprocessor = ImagePreprocessor::new();
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([255, 0, 0])));
        let gray = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, image::Luma([76])));

        let from_color = preprocessor.preprocess(&red).unwrap();
        let from_gray = preprocessor.preprocess(&gray).unwrap();
        assert_eq!(from_color.image.as_raw(), from_gray.image.as_raw());
    }

    #[test]
    fn color_and_gray_inputs_normalize_alike() {
        // Every channel equal, so the weighted sum reproduces the input level.
        let preprocessor = ImagePreprocessor::new();
        let rgb = RgbImage::from_fn(128, 96, |x, y| {
            let v = ((x * 3 + y * 5) % 256) as u8;
            Rgb([v, v, v])
        });
        let gray = GrayImage::from_fn(128, 96, |x, y| image::Luma([((x * 3 + y * 5) % 256) as u8]));

        let a = preprocessor.preprocess(&DynamicImage::ImageRgb8(rgb)).unwrap();
        let b = preprocessor.preprocess(&DynamicImage::ImageLuma8(gray.clone())).unwrap();
        assert_eq!(a.image.as_raw(), b.image.as_raw());
        assert_eq!(
            b.image.as_raw(),
            preprocessor.normalize_gray(&gray).unwrap().as_raw()
        );
    }
}
