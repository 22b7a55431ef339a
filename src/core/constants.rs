//! Constants used throughout the detection pipeline.
//!
//! This module defines the fixed image geometry produced by preprocessing,
//! the HOG descriptor geometry, and defaults for dataset enumeration and
//! parallel processing.

/// Side length of the normalized image produced by preprocessing.
pub const NORMALIZED_IMAGE_SIZE: u32 = 64;

/// HOG detection window size (width, height).
pub const HOG_WIN_SIZE: (usize, usize) = (64, 64);

/// HOG block size (width, height).
pub const HOG_BLOCK_SIZE: (usize, usize) = (16, 16);

/// HOG block stride (width, height).
pub const HOG_BLOCK_STRIDE: (usize, usize) = (8, 8);

/// HOG cell size (width, height).
pub const HOG_CELL_SIZE: (usize, usize) = (8, 8);

/// Number of unsigned orientation bins per cell.
pub const HOG_NBINS: usize = 9;

/// Clipping threshold of the L2-Hys block normalization.
pub const HOG_L2HYS_THRESHOLD: f32 = 0.2;

/// The default image extensions considered part of a dataset.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["bmp"];

/// Extensions of loadable classifier model files (YAML only).
pub const MODEL_FILE_EXTENSIONS: &[&str] = &["yml", "yaml"];

/// The default threshold for parallel processing.
///
/// In-memory batches with more images than this are processed with rayon.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 4;

/// Name of the validation split below a dataset root.
pub const VALID_SPLIT_DIR: &str = "valid";

/// Name of the test split below a dataset root.
pub const TEST_SPLIT_DIR: &str = "test";
