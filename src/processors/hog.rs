//! Histogram of oriented gradients (HOG) descriptor.
//!
//! The descriptor is computed over a single detection window. Blocks slide
//! over the window column by column, and inside a block the cell histograms
//! are laid out column by column as well. Each pixel votes into the two
//! nearest orientation bins and, through bilinear interpolation, into up to
//! four cells, weighted by a Gaussian centered on the block. Every block
//! histogram is L2-Hys normalized.

use crate::core::constants::{
    HOG_BLOCK_SIZE, HOG_BLOCK_STRIDE, HOG_CELL_SIZE, HOG_L2HYS_THRESHOLD, HOG_NBINS, HOG_WIN_SIZE,
};
use crate::core::{DefectError, ProcessingStage};
use crate::processors::filters::{centered_gradients, resize_bilinear};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use std::f32::consts::PI;
use std::time::{Duration, Instant};

/// Geometry and normalization parameters of a HOG descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct HogDescriptor {
    /// Detection window size (width, height).
    pub win_size: (usize, usize),
    /// Block size (width, height).
    pub block_size: (usize, usize),
    /// Block stride (width, height).
    pub block_stride: (usize, usize),
    /// Cell size (width, height).
    pub cell_size: (usize, usize),
    /// Number of unsigned orientation bins.
    pub nbins: usize,
    /// L2-Hys clipping threshold.
    pub l2hys_threshold: f32,
}

/// Orientation votes of one pixel: two bins and the magnitude share of each.
#[derive(Debug, Clone, Copy, Default)]
struct PixelVote {
    bins: [usize; 2],
    weights: [f32; 2],
}

impl HogDescriptor {
    /// Creates a descriptor with the given geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not tile into whole cells, the
    /// block does not fit the window, or the stride does not step evenly.
    pub fn new(
        win_size: (usize, usize),
        block_size: (usize, usize),
        block_stride: (usize, usize),
        cell_size: (usize, usize),
        nbins: usize,
    ) -> Result<Self, DefectError> {
        let descriptor = Self {
            win_size,
            block_size,
            block_stride,
            cell_size,
            nbins,
            l2hys_threshold: HOG_L2HYS_THRESHOLD,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<(), DefectError> {
        let dims = [
            self.win_size.0,
            self.win_size.1,
            self.block_size.0,
            self.block_size.1,
            self.block_stride.0,
            self.block_stride.1,
            self.cell_size.0,
            self.cell_size.1,
            self.nbins,
        ];
        if dims.contains(&0) {
            return Err(DefectError::config_error(
                "HOG geometry values must be greater than 0",
            ));
        }
        if self.block_size.0 % self.cell_size.0 != 0 || self.block_size.1 % self.cell_size.1 != 0
        {
            return Err(DefectError::config_error(
                "HOG block size must be a multiple of the cell size",
            ));
        }
        if self.block_size.0 > self.win_size.0 || self.block_size.1 > self.win_size.1 {
            return Err(DefectError::config_error(
                "HOG block size must not exceed the window size",
            ));
        }
        if (self.win_size.0 - self.block_size.0) % self.block_stride.0 != 0
            || (self.win_size.1 - self.block_size.1) % self.block_stride.1 != 0
        {
            return Err(DefectError::config_error(
                "HOG block stride must step evenly across the window",
            ));
        }
        Ok(())
    }

    /// Number of block positions across the window (x, y).
    pub fn blocks_per_window(&self) -> (usize, usize) {
        (
            (self.win_size.0 - self.block_size.0) / self.block_stride.0 + 1,
            (self.win_size.1 - self.block_size.1) / self.block_stride.1 + 1,
        )
    }

    /// Number of cells inside one block (x, y).
    pub fn cells_per_block(&self) -> (usize, usize) {
        (
            self.block_size.0 / self.cell_size.0,
            self.block_size.1 / self.cell_size.1,
        )
    }

    /// Length of the descriptor produced for one window.
    pub fn descriptor_size(&self) -> usize {
        let (bx, by) = self.blocks_per_window();
        let (cx, cy) = self.cells_per_block();
        bx * by * cx * cy * self.nbins
    }

    /// Standard deviation of the Gaussian block window.
    pub fn win_sigma(&self) -> f32 {
        (self.block_size.0 + self.block_size.1) as f32 / 8.0
    }

    /// Computes the descriptor of an image exactly the size of the window.
    pub fn compute(&self, image: &GrayImage) -> Result<Vec<f32>, DefectError> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        if (width, height) != self.win_size {
            return Err(DefectError::validation_error(
                "HogDescriptor",
                "image size",
                &format!("{}x{}", self.win_size.0, self.win_size.1),
                &format!("{}x{}", width, height),
            ));
        }

        let votes = self.orientation_votes(image);
        let (blocks_x, blocks_y) = self.blocks_per_window();
        let mut descriptor = Vec::with_capacity(self.descriptor_size());

        for bx in 0..blocks_x {
            for by in 0..blocks_y {
                let mut hist = self.block_histogram(
                    &votes,
                    width,
                    bx * self.block_stride.0,
                    by * self.block_stride.1,
                );
                self.normalize_l2hys(&mut hist);
                descriptor.extend_from_slice(&hist);
            }
        }

        Ok(descriptor)
    }

    /// Centered-difference gradients turned into two-bin orientation votes.
    fn orientation_votes(&self, image: &GrayImage) -> Vec<PixelVote> {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let (grad_x, grad_y) = centered_gradients(image);
        let (grad_x, grad_y) = (grad_x.as_raw(), grad_y.as_raw());
        let angle_scale = self.nbins as f32 / PI;
        let nbins = self.nbins as isize;

        let mut votes = vec![PixelVote::default(); w * h];
        for y in 0..h {
            for x in 0..w {
                let dx = grad_x[y * w + x] as f32;
                let dy = grad_y[y * w + x] as f32;
                let magnitude = (dx * dx + dy * dy).sqrt();

                let mut angle = dy.atan2(dx);
                if angle < 0.0 {
                    angle += 2.0 * PI;
                }
                let mut position = angle * angle_scale - 0.5;
                let bin = position.floor() as isize;
                position -= bin as f32;
                let bin0 = bin.rem_euclid(nbins) as usize;
                let bin1 = (bin0 + 1) % self.nbins;

                votes[y * w + x] = PixelVote {
                    bins: [bin0, bin1],
                    weights: [magnitude * (1.0 - position), magnitude * position],
                };
            }
        }
        votes
    }

    fn block_histogram(
        &self,
        votes: &[PixelVote],
        image_width: usize,
        origin_x: usize,
        origin_y: usize,
    ) -> Vec<f32> {
        let (block_w, block_h) = self.block_size;
        let (cell_w, cell_h) = (self.cell_size.0 as f32, self.cell_size.1 as f32);
        let (cells_x, cells_y) = self.cells_per_block();
        let sigma = self.win_sigma();
        let gauss_scale = 1.0 / (2.0 * sigma * sigma);

        let mut hist = vec![0.0f32; cells_x * cells_y * self.nbins];

        for py in 0..block_h {
            let cell_y = (py as f32 + 0.5) / cell_h - 0.5;
            let cy0 = cell_y.floor() as isize;
            let fy = cell_y - cy0 as f32;
            let di = py as f32 - block_h as f32 * 0.5;

            for px in 0..block_w {
                let cell_x = (px as f32 + 0.5) / cell_w - 0.5;
                let cx0 = cell_x.floor() as isize;
                let fx = cell_x - cx0 as f32;
                let dj = px as f32 - block_w as f32 * 0.5;
                let gauss = (-(di * di + dj * dj) * gauss_scale).exp();

                let vote = votes[(origin_y + py) * image_width + origin_x + px];

                for (cx, wx) in [(cx0, 1.0 - fx), (cx0 + 1, fx)] {
                    if cx < 0 || cx as usize >= cells_x {
                        continue;
                    }
                    for (cy, wy) in [(cy0, 1.0 - fy), (cy0 + 1, fy)] {
                        if cy < 0 || cy as usize >= cells_y {
                            continue;
                        }
                        let offset = (cx as usize * cells_y + cy as usize) * self.nbins;
                        let weight = gauss * wx * wy;
                        hist[offset + vote.bins[0]] += vote.weights[0] * weight;
                        hist[offset + vote.bins[1]] += vote.weights[1] * weight;
                    }
                }
            }
        }
        hist
    }

    fn normalize_l2hys(&self, hist: &mut [f32]) {
        let size = hist.len() as f32;
        let sum: f32 = hist.iter().map(|v| v * v).sum();
        let scale = 1.0 / (sum.sqrt() + size * 0.1);

        let mut clipped_sum = 0.0f32;
        for value in hist.iter_mut() {
            *value = (*value * scale).min(self.l2hys_threshold);
            clipped_sum += *value * *value;
        }

        let scale = 1.0 / (clipped_sum.sqrt() + 1e-3);
        for value in hist.iter_mut() {
            *value *= scale;
        }
    }
}

impl Default for HogDescriptor {
    fn default() -> Self {
        Self {
            win_size: HOG_WIN_SIZE,
            block_size: HOG_BLOCK_SIZE,
            block_stride: HOG_BLOCK_STRIDE,
            cell_size: HOG_CELL_SIZE,
            nbins: HOG_NBINS,
            l2hys_threshold: HOG_L2HYS_THRESHOLD,
        }
    }
}

/// Statistics returned alongside a descriptor.
#[derive(Debug, Clone)]
pub struct ExtractionStats {
    /// Wall-clock time spent computing the descriptor.
    pub extraction_time: Duration,
    /// Number of values in the returned descriptor.
    pub feature_dimension: usize,
    /// Descriptor length implied by the HOG geometry.
    pub descriptor_size: usize,
    /// Color rendering of the gradient field, when requested.
    pub visualization: Option<RgbImage>,
}

/// Computes HOG feature vectors from normalized images.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    descriptor: HogDescriptor,
    visualize: bool,
}

impl FeatureExtractor {
    /// Creates an extractor with the default 64/16/8/8/9 geometry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an extractor with a custom descriptor.
    pub fn with_descriptor(descriptor: HogDescriptor) -> Self {
        Self {
            descriptor,
            visualize: false,
        }
    }

    /// Enables the gradient visualization in [`ExtractionStats`].
    pub fn with_visualization(mut self, visualize: bool) -> Self {
        self.visualize = visualize;
        self
    }

    /// The underlying descriptor.
    pub fn descriptor(&self) -> &HogDescriptor {
        &self.descriptor
    }

    /// Computes the feature vector of `image`.
    ///
    /// Images that are not exactly window-sized are resized first.
    pub fn extract(&self, image: &GrayImage) -> Result<(Vec<f32>, ExtractionStats), DefectError> {
        let start = Instant::now();
        let window = self.fit_to_window(image)?;

        let features = self.descriptor.compute(&window).map_err(|e| {
            DefectError::processing_error(
                ProcessingStage::FeatureExtraction,
                "HOG descriptor computation failed",
                e,
            )
        })?;

        let mut stats = ExtractionStats {
            extraction_time: start.elapsed(),
            feature_dimension: features.len(),
            descriptor_size: self.descriptor.descriptor_size(),
            visualization: None,
        };

        if self.visualize {
            stats.visualization = Some(visualize_gradients(&window));
        }

        Ok((features, stats))
    }

    fn fit_to_window(&self, image: &GrayImage) -> Result<GrayImage, DefectError> {
        let (win_w, win_h) = self.descriptor.win_size;
        if image.width() == 0 || image.height() == 0 {
            return Err(DefectError::invalid_input(
                "cannot extract features from an empty image",
            ));
        }
        if (image.width() as usize, image.height() as usize) == (win_w, win_h) {
            return Ok(image.clone());
        }
        Ok(resize_bilinear(image, win_w as u32, win_h as u32))
    }
}

/// Renders the gradient field of `image` as a color image.
///
/// Sobel gradient direction selects the hue (half the angle in degrees,
/// 0..180), saturation is full, and the min-max normalized magnitude is the
/// value channel.
pub fn visualize_gradients(image: &GrayImage) -> RgbImage {
    let gx = horizontal_sobel(image);
    let gy = vertical_sobel(image);
    let (width, height) = image.dimensions();

    let mut magnitude = Vec::with_capacity((width * height) as usize);
    let mut angle = Vec::with_capacity((width * height) as usize);
    for (dx, dy) in gx.pixels().zip(gy.pixels()) {
        let (dx, dy) = (dx[0] as f32, dy[0] as f32);
        magnitude.push((dx * dx + dy * dy).sqrt());
        let mut degrees = dy.atan2(dx).to_degrees();
        if degrees < 0.0 {
            degrees += 360.0;
        }
        angle.push(degrees);
    }

    let (min, max) = magnitude
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &m| (lo.min(m), hi.max(m)));
    let range = max - min;

    RgbImage::from_fn(width, height, |x, y| {
        let i = (y * width + x) as usize;
        let value = if range > 0.0 {
            ((magnitude[i] - min) / range * 255.0).round() as u8
        } else {
            0
        };
        let hue = ((angle[i] / 2.0) as u32).min(179) as u8;
        Rgb(hsv_to_rgb(hue, 255, value))
    })
}

/// Converts an 8-bit HSV triple with hue in `0..180` to RGB.
fn hsv_to_rgb(hue: u8, saturation: u8, value: u8) -> [u8; 3] {
    let h = hue as f32 * 2.0 / 60.0;
    let s = saturation as f32 / 255.0;
    let v = value as f32 / 255.0;

    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector as u32 % 6 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ]
}
