//! Single-image detection pipeline.
//!
//! [`DefectDetector`] chains the three stages (preprocess, HOG extraction and
//! classification) and is shared by the batch workers and the single-image
//! tooling. It holds no per-image state, so one detector can serve several
//! threads at once.

use super::classifier::{ClassificationStats, Classifier};
use crate::core::DefectError;
use crate::core::constants::DEFAULT_PARALLEL_THRESHOLD;
use crate::domain::PredictionResult;
use crate::models::ClassifierModel;
use crate::processors::{ExtractionStats, FeatureExtractor, ImagePreprocessor};
use crate::utils::{load_image, true_label_for};
use image::{DynamicImage, GrayImage};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Name of the feature descriptor recorded on results.
pub const FEATURE_TYPE: &str = "HOG";

/// Everything the pipeline produced for one image.
#[derive(Debug, Clone)]
pub struct Detection {
    /// The 64x64 normalized image.
    pub normalized: GrayImage,
    /// Time spent in preprocessing.
    pub preprocess_time: Duration,
    /// Feature extraction statistics.
    pub extraction: ExtractionStats,
    /// Classification result.
    pub classification: ClassificationStats,
    /// Total pipeline time.
    pub total_time: Duration,
}

/// Runs preprocess, feature extraction and classification on images.
#[derive(Debug, Clone)]
pub struct DefectDetector {
    preprocessor: ImagePreprocessor,
    extractor: FeatureExtractor,
    classifier: Classifier,
    parallel_threshold: usize,
}

impl DefectDetector {
    /// Creates a detector classifying with `model`.
    pub fn new(model: Arc<ClassifierModel>) -> Self {
        Self {
            preprocessor: ImagePreprocessor::new(),
            extractor: FeatureExtractor::new(),
            classifier: Classifier::new(model),
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }

    /// Enables the gradient visualization on every detection.
    pub fn with_visualization(mut self, visualize: bool) -> Self {
        self.extractor = self.extractor.with_visualization(visualize);
        self
    }

    /// Sets the image count above which [`detect_images`](Self::detect_images) runs in parallel.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// The shared model handle.
    pub fn model(&self) -> &Arc<ClassifierModel> {
        self.classifier.model()
    }

    /// Runs the full pipeline on a decoded image.
    pub fn detect_image(&self, image: &DynamicImage) -> Result<Detection, DefectError> {
        let start = Instant::now();
        let preprocessed = self.preprocessor.preprocess(image)?;
        let (features, extraction) = self.extractor.extract(&preprocessed.image)?;
        let classification = self.classifier.classify(&features)?;

        Ok(Detection {
            normalized: preprocessed.image,
            preprocess_time: preprocessed.elapsed,
            extraction,
            classification,
            total_time: start.elapsed(),
        })
    }

    /// Classifies a slice of decoded images.
    ///
    /// Images are processed in parallel when there are more than the
    /// configured threshold; results keep the input order.
    pub fn detect_images(&self, images: &[DynamicImage]) -> Vec<Result<Detection, DefectError>> {
        if images.len() > self.parallel_threshold {
            debug!("Detecting {} images in parallel", images.len());
            images.par_iter().map(|img| self.detect_image(img)).collect()
        } else {
            images.iter().map(|img| self.detect_image(img)).collect()
        }
    }

    /// Loads and classifies the image at `path`.
    ///
    /// Never fails: load and pipeline errors are recorded on the returned
    /// result, which then has `processing_success == false`.
    pub fn detect_path(&self, path: &Path) -> PredictionResult {
        let start = Instant::now();
        let mut result = PredictionResult::new(path);
        result.set_true_label(true_label_for(path));
        result.file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        result.feature_type = FEATURE_TYPE.to_string();

        let outcome = load_image(path).and_then(|image| {
            result.image_size = Some((image.width(), image.height()));
            self.detect_image(&image)
        });

        match outcome {
            Ok(detection) => {
                let classification = detection.classification;
                result.feature_dimension = detection.extraction.feature_dimension;
                result.predict_class_id = classification.class_id;
                result.predict_label = classification.label;
                result.raw_class_id = classification.raw_class_id;
                result.confidence = classification.confidence;
                result.model_name = classification.model_name;
                result.model_path = classification.model_path.display().to_string();
                result.processing_success = true;
            }
            Err(e) => {
                warn!("Failed to process {}: {}", path.display(), e);
                result.model_name = self.model().model_type();
                result.model_path = self
                    .model()
                    .model_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                result.mark_error(&e);
            }
        }

        result.processing_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        result
    }
}
