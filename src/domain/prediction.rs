//! Per-image prediction results.
//!
//! A [`PredictionResult`] is created empty when a worker starts on an image,
//! filled in by the pipeline stages in order, and never mutated after it has
//! been handed to the batch coordinator.

use super::defect::DefectType;
use crate::core::DefectError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Why an image could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The file could not be read or decoded as an image.
    ImageLoad,
    /// A preprocessing, feature extraction or classification step failed.
    PipelineRuntime,
    /// No classifier model was loaded when the image was classified.
    ModelNotLoaded,
}

impl FailureKind {
    /// Classifies a pipeline error into the per-item failure taxonomy.
    pub fn from_error(error: &DefectError) -> Self {
        match error {
            DefectError::ImageLoad { .. } => FailureKind::ImageLoad,
            DefectError::ModelNotLoaded => FailureKind::ModelNotLoaded,
            _ => FailureKind::PipelineRuntime,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::ImageLoad => write!(f, "image load failure"),
            FailureKind::PipelineRuntime => write!(f, "pipeline runtime failure"),
            FailureKind::ModelNotLoaded => write!(f, "model not loaded"),
        }
    }
}

/// Classification outcome of a single result.
///
/// False positive/negative use a binary reduction in which
/// [`DefectType::Unknown`] is the negative class and the six named defects
/// are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The image was not processed successfully.
    Failed,
    /// The image has no ground-truth label.
    Unlabeled,
    /// The predicted category matches the ground truth.
    Correct,
    /// A defect was predicted on an image with no recognized defect.
    FalsePositive,
    /// No defect was predicted on an image with a defect.
    FalseNegative,
    /// A defect was predicted, but the wrong one.
    Misclassified,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::Failed => "Processing failed",
            Outcome::Unlabeled => "Unlabeled",
            Outcome::Correct => "Correct",
            Outcome::FalsePositive => "False positive (FP)",
            Outcome::FalseNegative => "False negative (FN)",
            Outcome::Misclassified => "Misclassified",
        };
        f.write_str(text)
    }
}

/// Result of running the detection pipeline on one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// File name of the image.
    pub image_name: String,
    /// Full path of the image.
    pub image_path: PathBuf,
    /// Size of the image file in bytes.
    pub file_size: u64,
    /// Decoded image dimensions (width, height).
    pub image_size: Option<(u32, u32)>,
    /// Wall-clock time at which processing started.
    pub timestamp: DateTime<Local>,

    /// Ground-truth label, taken from the parent directory name.
    pub true_label: String,
    /// Ground-truth category.
    pub true_class_id: DefectType,

    /// Predicted label.
    pub predict_label: String,
    /// Predicted category.
    pub predict_class_id: DefectType,
    /// Raw class id returned by the classifier.
    pub raw_class_id: i32,
    /// Confidence of the prediction in `[0, 1]`.
    pub confidence: f64,

    /// Length of the feature vector fed to the classifier.
    pub feature_dimension: usize,
    /// Name of the feature descriptor.
    pub feature_type: String,

    /// Total pipeline time in milliseconds.
    pub processing_time_ms: f64,
    /// Type of the model that produced the prediction.
    pub model_name: String,
    /// Path of the model that produced the prediction.
    pub model_path: String,

    /// Whether every pipeline stage succeeded.
    pub processing_success: bool,
    /// Failure category when `processing_success` is false.
    pub failure: Option<FailureKind>,
    /// Error message when `processing_success` is false.
    pub error_message: Option<String>,
}

impl PredictionResult {
    /// Creates an empty result for the image at `path`, stamped with the current time.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self {
            image_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            image_path: path.to_path_buf(),
            file_size: 0,
            image_size: None,
            timestamp: Local::now(),
            true_label: String::new(),
            true_class_id: DefectType::Unknown,
            predict_label: String::new(),
            predict_class_id: DefectType::Unknown,
            raw_class_id: -1,
            confidence: 0.0,
            feature_dimension: 0,
            feature_type: String::new(),
            processing_time_ms: 0.0,
            model_name: String::new(),
            model_path: String::new(),
            processing_success: false,
            failure: None,
            error_message: None,
        }
    }

    /// Records the ground truth label and its category.
    pub fn set_true_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        self.true_class_id = DefectType::from_name(&label);
        self.true_label = label;
    }

    /// Marks the result as failed with the given kind and message.
    pub fn mark_failed(&mut self, kind: FailureKind, message: impl Into<String>) {
        self.processing_success = false;
        self.failure = Some(kind);
        self.error_message = Some(message.into());
    }

    /// Marks the result as failed from a pipeline error.
    pub fn mark_error(&mut self, error: &DefectError) {
        self.mark_failed(FailureKind::from_error(error), error_chain(error));
    }

    fn is_labeled(&self) -> bool {
        !self.true_label.is_empty()
    }

    /// True when processing succeeded and the predicted category equals the ground truth.
    pub fn is_correct(&self) -> bool {
        self.processing_success && self.is_labeled() && self.true_class_id == self.predict_class_id
    }

    /// A defect category was predicted for an image without a recognized defect.
    pub fn is_false_positive(&self) -> bool {
        self.processing_success
            && self.is_labeled()
            && !self.true_class_id.is_defect()
            && self.predict_class_id.is_defect()
    }

    /// No defect category was predicted for an image with a defect.
    pub fn is_false_negative(&self) -> bool {
        self.processing_success
            && self.is_labeled()
            && self.true_class_id.is_defect()
            && !self.predict_class_id.is_defect()
    }

    /// The correct defect category was predicted.
    pub fn is_true_positive(&self) -> bool {
        self.is_correct() && self.true_class_id.is_defect()
    }

    /// No defect was predicted for an image without a recognized defect.
    pub fn is_true_negative(&self) -> bool {
        self.processing_success
            && self.is_labeled()
            && !self.true_class_id.is_defect()
            && !self.predict_class_id.is_defect()
    }

    /// Outcome category of this result.
    pub fn outcome(&self) -> Outcome {
        if !self.processing_success {
            Outcome::Failed
        } else if !self.is_labeled() {
            Outcome::Unlabeled
        } else if self.is_correct() {
            Outcome::Correct
        } else if self.is_false_positive() {
            Outcome::FalsePositive
        } else if self.is_false_negative() {
            Outcome::FalseNegative
        } else {
            Outcome::Misclassified
        }
    }
}

/// Joins an error with its sources into a single message.
fn error_chain(error: &DefectError) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classified(true_label: &str, predicted: DefectType) -> PredictionResult {
        let mut result = PredictionResult::new(format!("data/{true_label}/img.bmp"));
        result.set_true_label(true_label);
        result.predict_class_id = predicted;
        result.predict_label = predicted.prediction_label().to_string();
        result.processing_success = true;
        result
    }

    #[test]
    fn new_result_takes_name_from_path() {
        let result = PredictionResult::new("/data/valid/Rolled/rs_1.bmp");
        assert_eq!(result.image_name, "rs_1.bmp");
        assert!(!result.processing_success);
        assert_eq!(result.outcome(), Outcome::Failed);
    }

    #[test]
    fn correct_prediction_is_true_positive() {
        let result = classified("Crazing", DefectType::Crazing);
        assert!(result.is_correct());
        assert!(result.is_true_positive());
        assert!(!result.is_false_positive());
        assert_eq!(result.outcome(), Outcome::Correct);
    }

    #[test]
    fn missed_defect_is_false_negative() {
        let result = classified("Pitted", DefectType::Unknown);
        assert!(result.is_false_negative());
        assert_eq!(result.outcome(), Outcome::FalseNegative);
    }

    #[test]
    fn defect_on_clean_image_is_false_positive() {
        let result = classified("background", DefectType::Scratches);
        assert_eq!(result.true_class_id, DefectType::Unknown);
        assert!(result.is_false_positive());
        assert_eq!(result.outcome(), Outcome::FalsePositive);
    }

    #[test]
    fn unknown_on_clean_image_is_true_negative() {
        let result = classified("background", DefectType::Unknown);
        assert!(result.is_true_negative());
        assert!(result.is_correct());
    }

    #[test]
    fn wrong_defect_is_misclassified() {
        let result = classified("Patches", DefectType::Inclusion);
        assert!(!result.is_correct());
        assert!(!result.is_false_negative());
        assert!(!result.is_false_positive());
        assert_eq!(result.outcome(), Outcome::Misclassified);
    }

    #[test]
    fn failed_result_never_counts_as_correct() {
        let mut result = classified("Rolled", DefectType::Rolled);
        result.mark_error(&DefectError::ModelNotLoaded);
        assert!(!result.is_correct());
        assert_eq!(result.failure, Some(FailureKind::ModelNotLoaded));
        assert_eq!(result.outcome(), Outcome::Failed);
    }

    #[test]
    fn unlabeled_result_is_reported_as_such() {
        let mut result = classified("Rolled", DefectType::Rolled);
        result.true_label.clear();
        assert_eq!(result.outcome(), Outcome::Unlabeled);
    }
}
