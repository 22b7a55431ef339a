//! Error types for the defect detection pipeline.
//!
//! This module defines the errors that can occur while loading images,
//! running the preprocessing/feature/classification stages, loading the
//! classifier model and preparing a batch run. It also provides constructor
//! helpers for creating these errors with appropriate context.

use thiserror::Error;

/// Stage of the detection pipeline in which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Grayscale conversion, resize, blur and equalization.
    Preprocess,
    /// HOG descriptor computation.
    FeatureExtraction,
    /// Classifier invocation and label mapping.
    Classification,
    /// Batch preparation or worker coordination.
    BatchProcessing,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Preprocess => write!(f, "preprocess"),
            ProcessingStage::FeatureExtraction => write!(f, "feature extraction"),
            ProcessingStage::Classification => write!(f, "classification"),
            ProcessingStage::BatchProcessing => write!(f, "batch processing"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Errors produced by the defect detection pipeline.
#[derive(Error, Debug)]
pub enum DefectError {
    /// The image file could not be read or decoded.
    #[error("image load failed for '{path}'")]
    ImageLoad {
        /// Path of the image that failed to load.
        path: String,
        /// Decoder error.
        #[source]
        source: image::ImageError,
    },

    /// A pipeline stage failed.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Classification was requested while no model is loaded.
    #[error("classifier model is not loaded")]
    ModelNotLoaded,

    /// The classifier model file could not be loaded.
    #[error("model load failed for '{path}': {message}")]
    ModelLoad {
        /// Path of the model file.
        path: String,
        /// Reason for the failure.
        message: String,
    },

    /// The model file was readable but its content is malformed.
    #[error("invalid model: {message}")]
    InvalidModel {
        /// A message describing the problem.
        message: String,
    },

    /// The dataset directory yielded no matching image files.
    #[error("dataset is empty: no image files found in '{path}'")]
    EmptyDataset {
        /// The dataset directory that was searched.
        path: String,
    },

    /// The dataset root does not have the expected split directories.
    #[error("dataset structure: {message}")]
    DatasetStructure {
        /// A message describing the missing structure.
        message: String,
    },

    /// A batch run was requested while another run is active.
    #[error("a batch run is already in progress")]
    BatchInProgress,

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from ndarray shape operations.
    #[error("tensor shape")]
    Shape(#[from] ndarray::ShapeError),

    /// Error parsing a YAML model file.
    #[error("yaml")]
    Yaml(#[from] serde_yaml::Error),

    /// Error parsing a JSON configuration file.
    #[error("json")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl DefectError {
    /// Creates an image load error for `path`.
    pub fn image_load(path: impl Into<String>, source: image::ImageError) -> Self {
        Self::ImageLoad {
            path: path.into(),
            source,
        }
    }

    /// Creates a processing error for the given stage.
    pub fn processing_error(
        kind: ProcessingStage,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a processing error from a plain message.
    pub fn stage_failure(kind: ProcessingStage, context: impl Into<String>) -> Self {
        let context = context.into();
        Self::Processing {
            kind,
            source: Box::new(std::io::Error::other(context.clone())),
            context,
        }
    }

    /// Creates a model load error.
    pub fn model_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid model error.
    pub fn invalid_model(message: impl Into<String>) -> Self {
        Self::InvalidModel {
            message: message.into(),
        }
    }

    /// Creates an error for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates an error for configuration problems.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a validation error with detailed context.
    ///
    /// # Arguments
    ///
    /// * `component` - The component where the error occurred.
    /// * `field` - The field that failed validation.
    /// * `expected` - The expected value.
    /// * `actual` - The actual value.
    pub fn validation_error(component: &str, field: &str, expected: &str, actual: &str) -> Self {
        Self::InvalidInput {
            message: format!(
                "Validation failed in {}: field '{}' expected {}, but got '{}'",
                component, field, expected, actual
            ),
        }
    }

    /// Returns `true` for errors that abort a whole batch before any worker starts.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            Self::ModelLoad { .. }
                | Self::InvalidModel { .. }
                | Self::EmptyDataset { .. }
                | Self::DatasetStructure { .. }
                | Self::BatchInProgress
                | Self::ConfigError { .. }
        )
    }
}

impl From<crate::core::config::ConfigError> for DefectError {
    fn from(error: crate::core::config::ConfigError) -> Self {
        Self::ConfigError {
            message: error.to_string(),
        }
    }
}

/// Convenient result alias for pipeline operations.
pub type DefectResult<T> = Result<T, DefectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_error_display_includes_stage_and_context() {
        let err = DefectError::stage_failure(ProcessingStage::FeatureExtraction, "bad window");
        assert_eq!(err.to_string(), "feature extraction failed: bad window");
    }

    #[test]
    fn setup_errors_are_batch_fatal() {
        assert!(DefectError::model_load("m.yml", "missing").is_batch_fatal());
        assert!(
            DefectError::EmptyDataset {
                path: "data".into()
            }
            .is_batch_fatal()
        );
        assert!(!DefectError::ModelNotLoaded.is_batch_fatal());
        assert!(!DefectError::invalid_input("empty image").is_batch_fatal());
    }

    #[test]
    fn validation_error_formats_message() {
        let err = DefectError::validation_error("HogDescriptor", "width", "64", "32");
        assert!(err.to_string().contains("field 'width' expected 64"));
    }
}
