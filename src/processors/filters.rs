//! Low-level filters on 8-bit grayscale images.
//!
//! Border handling follows the reflect-101 convention (`gfedcb|abcdefgh|gfedcba`),
//! which mirrors around the edge pixel without repeating it. imageproc kernels
//! clamp at the border, so inputs are padded before filtering and cropped after.

use image::imageops::crop_imm;
use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::Kernel;
use imageproc::map::map_colors;
use imageproc::stats::histogram;

/// Reflects an out-of-range coordinate back into `0..len` without repeating the edge pixel.
fn reflect_101(index: isize, len: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    let len = len as isize;
    let mut i = index;
    while i < 0 || i >= len {
        if i < 0 {
            i = -i;
        }
        if i >= len {
            i = 2 * (len - 1) - i;
        }
    }
    i as usize
}

/// Surrounds `src` with a `radius`-pixel reflect-101 border.
fn pad_reflect_101(src: &GrayImage, radius: u32) -> GrayImage {
    let (width, height) = src.dimensions();
    let r = radius as isize;
    GrayImage::from_fn(width + 2 * radius, height + 2 * radius, |x, y| {
        let sx = reflect_101(x as isize - r, width as usize);
        let sy = reflect_101(y as isize - r, height as usize);
        *src.get_pixel(sx as u32, sy as u32)
    })
}

/// 5x5 Gaussian kernel for the automatically derived sigma
/// (`0.3 * ((5 - 1) * 0.5 - 1) + 0.8`): the outer product of the binomial
/// taps `[1, 4, 6, 4, 1]`, sum 256.
#[rustfmt::skip]
const GAUSSIAN_5X5: [u32; 25] = [
    1,  4,  6,  4, 1,
    4, 16, 24, 16, 4,
    6, 24, 36, 24, 6,
    4, 16, 24, 16, 4,
    1,  4,  6,  4, 1,
];

/// Applies a 5x5 Gaussian blur with reflect-101 borders.
///
/// Sums are kept in integers and rounded once, so the result is exact and
/// independent of evaluation order.
pub fn gaussian_blur_5x5(src: &GrayImage) -> GrayImage {
    let (width, height) = src.dimensions();
    if width == 0 || height == 0 {
        return src.clone();
    }

    let padded = pad_reflect_101(src, 2);
    let blurred = Kernel::new(&GAUSSIAN_5X5, 5, 5)
        .filter::<Luma<u8>, _, Luma<u8>>(&padded, |out, acc| *out = ((acc + 128) >> 8) as u8);
    crop_imm(&blurred, 2, 2, width, height).to_image()
}

const CENTERED_DIFFERENCE: [i32; 3] = [-1, 0, 1];

/// Centered differences `f(x + 1) - f(x - 1)` along each axis, reflect-101 borders.
///
/// Returns the horizontal and vertical derivative images.
pub fn centered_gradients(src: &GrayImage) -> (Image<Luma<i16>>, Image<Luma<i16>>) {
    let (width, height) = src.dimensions();
    let padded = pad_reflect_101(src, 1);
    let store = |out: &mut i16, acc: i32| *out = acc as i16;

    let dx = Kernel::new(&CENTERED_DIFFERENCE, 3, 1).filter::<Luma<u8>, _, Luma<i16>>(&padded, store);
    let dy = Kernel::new(&CENTERED_DIFFERENCE, 1, 3).filter::<Luma<u8>, _, Luma<i16>>(&padded, store);
    (
        crop_imm(&dx, 1, 1, width, height).to_image(),
        crop_imm(&dy, 1, 1, width, height).to_image(),
    )
}

/// Fixed-point scale of interpolation weights (11 fractional bits).
const RESIZE_COEF_BITS: u32 = 11;
const RESIZE_COEF_SCALE: f32 = (1 << RESIZE_COEF_BITS) as f32;

/// Source pixels and weights contributing to one output coordinate.
#[derive(Debug, Clone, Copy)]
struct LinearTap {
    index: usize,
    next: usize,
    weights: [i32; 2],
}

/// Maps each of `dst_len` output coordinates onto the source axis.
///
/// Pixel centers are aligned (`(d + 0.5) * scale - 0.5`) and coordinates past
/// either edge collapse onto the edge pixel.
fn linear_taps(src_len: u32, dst_len: u32) -> Vec<LinearTap> {
    let scale = 1.0 / (dst_len as f64 / src_len as f64);
    let last = src_len as usize - 1;
    (0..dst_len)
        .map(|d| {
            let mut frac = ((d as f64 + 0.5) * scale - 0.5) as f32;
            let start = frac.floor();
            frac -= start;
            let mut index = start as isize;
            if index < 0 {
                index = 0;
                frac = 0.0;
            }
            if index as usize >= last {
                index = last as isize;
                frac = 0.0;
            }
            let index = index as usize;
            LinearTap {
                index,
                next: (index + 1).min(last),
                weights: [
                    ((1.0 - frac) * RESIZE_COEF_SCALE).round_ties_even() as i32,
                    (frac * RESIZE_COEF_SCALE).round_ties_even() as i32,
                ],
            }
        })
        .collect()
}

/// Resizes with bilinear interpolation on a fixed-point weight grid.
///
/// Rows are interpolated first and kept as integers; the vertical pass rounds
/// once, so an exact 2x reduction averages each 2x2 block.
pub fn resize_bilinear(src: &GrayImage, width: u32, height: u32) -> GrayImage {
    let (src_w, src_h) = src.dimensions();
    if (src_w, src_h) == (width, height) {
        return src.clone();
    }
    if src_w == 0 || src_h == 0 || width == 0 || height == 0 {
        return GrayImage::new(width, height);
    }

    let columns = linear_taps(src_w, width);
    let rows = linear_taps(src_h, height);
    let raw = src.as_raw();
    let stride = src_w as usize;
    let interpolate_row = |sy: usize| -> Vec<i32> {
        let row = &raw[sy * stride..(sy + 1) * stride];
        columns
            .iter()
            .map(|tap| {
                row[tap.index] as i32 * tap.weights[0] + row[tap.next] as i32 * tap.weights[1]
            })
            .collect()
    };

    let round = 1i32 << (2 * RESIZE_COEF_BITS - 1);
    let mut out = GrayImage::new(width, height);
    for (dy, tap) in rows.iter().enumerate() {
        let upper = interpolate_row(tap.index);
        let lower = interpolate_row(tap.next);
        for (dx, (a, b)) in upper.iter().zip(&lower).enumerate() {
            let value = (tap.weights[0] * a + tap.weights[1] * b + round) >> (2 * RESIZE_COEF_BITS);
            out.put_pixel(dx as u32, dy as u32, Luma([value.clamp(0, 255) as u8]));
        }
    }
    out
}

/// Builds the lookup table of a global histogram equalization.
///
/// The first occupied intensity maps to 0 and the cumulative count of the
/// remaining intensities is stretched over `0..=255`.
fn equalization_lut(src: &GrayImage) -> Option<[u8; 256]> {
    let hist = histogram(src).channels[0];

    let total: u32 = hist.iter().sum();
    let first = hist.iter().position(|&count| count != 0)?;
    let mut lut = [0u8; 256];

    if hist[first] == total {
        lut[first] = first as u8;
        return Some(lut);
    }

    let scale = 255.0f32 / (total - hist[first]) as f32;
    let mut sum = 0u32;
    for i in first + 1..256 {
        sum += hist[i];
        lut[i] = (sum as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    Some(lut)
}

/// Equalizes the intensity histogram of a grayscale image.
///
/// A uniform image is returned unchanged.
pub fn equalize_histogram(src: &GrayImage) -> GrayImage {
    match equalization_lut(src) {
        Some(lut) => map_colors(src, |pixel| Luma([lut[pixel[0] as usize]])),
        None => src.clone(),
    }
}
