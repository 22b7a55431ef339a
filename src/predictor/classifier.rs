//! Classification step: feature vector to labeled, scored result.

use crate::core::{DefectError, FeatureRow, ProcessingStage};
use crate::domain::{DefectType, label_for_class_id};
use crate::models::ClassifierModel;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of classifying one feature vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationStats {
    /// Wall-clock time spent in the classifier.
    pub classify_time: Duration,
    /// Category of the prediction.
    pub class_id: DefectType,
    /// Raw class id returned by the model.
    pub raw_class_id: i32,
    /// Label of the prediction.
    pub label: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Type name of the model that produced the prediction.
    pub model_name: String,
    /// File that model was loaded from.
    pub model_path: PathBuf,
}

/// Pipeline step running the shared classifier model on feature vectors.
#[derive(Debug, Clone)]
pub struct Classifier {
    model: Arc<ClassifierModel>,
}

impl Classifier {
    /// Creates a step predicting through `model`.
    pub fn new(model: Arc<ClassifierModel>) -> Self {
        Self { model }
    }

    /// The shared model handle.
    pub fn model(&self) -> &Arc<ClassifierModel> {
        &self.model
    }

    /// Classifies a feature vector.
    ///
    /// # Errors
    ///
    /// Returns `DefectError::ModelNotLoaded` if no model is loaded, and a
    /// classification-stage error if the model rejects the features.
    pub fn classify(&self, features: &[f32]) -> Result<ClassificationStats, DefectError> {
        let start = Instant::now();
        let row = FeatureRow::from_shape_vec((1, features.len()), features.to_vec())?;

        let output = self.model.try_predict(row.view()).map_err(|e| match e {
            DefectError::ModelNotLoaded => e,
            other => DefectError::processing_error(
                ProcessingStage::Classification,
                "classifier rejected the feature vector",
                other,
            ),
        })?;

        Ok(ClassificationStats {
            classify_time: start.elapsed(),
            class_id: DefectType::from_class_id(output.class_id),
            raw_class_id: output.class_id,
            label: label_for_class_id(output.class_id).to_string(),
            confidence: output.confidence,
            model_name: output.model_name,
            model_path: output.model_path,
        })
    }
}
