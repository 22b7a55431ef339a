//! Single-image prediction.
//!
//! [`Classifier`] is the last pipeline stage; [`DefectDetector`] chains all
//! stages and turns an image path into a [`PredictionResult`](crate::domain::PredictionResult).

pub mod classifier;
pub mod detector;

pub use classifier::{ClassificationStats, Classifier};
pub use detector::{DefectDetector, Detection, FEATURE_TYPE};
