//! Image processing stages of the detection pipeline.
//!
//! - [`preprocess`]: grayscale, resize, blur and equalization
//! - [`hog`]: HOG feature extraction and gradient visualization
//! - [`filters`]: the low-level filters both stages build on

pub mod filters;
pub mod hog;
pub mod preprocess;

pub use filters::{equalize_histogram, gaussian_blur_5x5};
pub use hog::{ExtractionStats, FeatureExtractor, HogDescriptor, visualize_gradients};
pub use preprocess::{ImagePreprocessor, PreprocessOutput, PreprocessStats};
