//! Configuration for the batch engine.
//!
//! This module provides the configuration error type, the validation trait
//! shared by configuration structures, and [`BatchConfig`], which controls
//! worker count, dataset enumeration and the in-memory parallel path.

use crate::core::constants::{DEFAULT_IMAGE_EXTENSIONS, DEFAULT_PARALLEL_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error indicating that a configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Error indicating that a resource limit has been exceeded.
    #[error("resource limit exceeded: {message}")]
    ResourceLimitExceeded { message: String },
}

/// A trait for validating configuration parameters.
pub trait ConfigValidator {
    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError>;

    /// Validates that a usize value is positive.
    fn validate_positive_usize(&self, value: usize, field_name: &str) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::InvalidConfig {
                message: format!("{} must be greater than 0", field_name),
            });
        }
        Ok(())
    }
}

/// Upper bound on explicitly configured worker threads.
pub const MAX_WORKER_COUNT: usize = 256;

/// Configuration of a batch validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of worker threads.
    /// If None, the available hardware parallelism is used.
    #[serde(default)]
    pub worker_count: Option<usize>,

    /// File extensions (without the dot, case-insensitive) treated as images.
    #[serde(default = "BatchConfig::default_image_extensions")]
    pub image_extensions: Vec<String>,

    /// Whether dataset enumeration descends into subdirectories.
    #[serde(default = "BatchConfig::default_recursive")]
    pub recursive: bool,

    /// Number of in-memory images up to which `DefectDetector::detect_images`
    /// runs sequentially.
    #[serde(default = "BatchConfig::default_parallel_threshold")]
    pub parallel_threshold: usize,
}

impl BatchConfig {
    /// Create a new BatchConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, crate::core::DefectError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, crate::core::DefectError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Set the number of worker threads.
    pub fn with_worker_count(mut self, worker_count: Option<usize>) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the accepted image extensions.
    pub fn with_image_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether enumeration is recursive.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the sequential/parallel threshold for in-memory batches.
    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    /// Returns the number of workers to spawn for a run.
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Returns true if `path` has one of the configured image extensions.
    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.image_extensions
                    .iter()
                    .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(ext))
            })
    }

    fn default_image_extensions() -> Vec<String> {
        DEFAULT_IMAGE_EXTENSIONS
            .iter()
            .map(|ext| ext.to_string())
            .collect()
    }

    fn default_recursive() -> bool {
        true
    }

    fn default_parallel_threshold() -> usize {
        DEFAULT_PARALLEL_THRESHOLD
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            image_extensions: Self::default_image_extensions(),
            recursive: Self::default_recursive(),
            parallel_threshold: Self::default_parallel_threshold(),
        }
    }
}

impl ConfigValidator for BatchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(count) = self.worker_count {
            self.validate_positive_usize(count, "worker_count")?;
            if count > MAX_WORKER_COUNT {
                return Err(ConfigError::ResourceLimitExceeded {
                    message: format!(
                        "worker_count {} exceeds maximum allowed {}",
                        count, MAX_WORKER_COUNT
                    ),
                });
            }
        }

        if self.image_extensions.is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "image_extensions must not be empty".to_string(),
            });
        }

        if let Some(ext) = self
            .image_extensions
            .iter()
            .find(|ext| ext.trim_start_matches('.').is_empty())
        {
            return Err(ConfigError::InvalidConfig {
                message: format!("invalid image extension '{}'", ext),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn defaults_accept_bmp_recursively() {
        let config = BatchConfig::default();
        assert_eq!(config.image_extensions, vec!["bmp".to_string()]);
        assert!(config.recursive);
        assert!(config.validate().is_ok());
        assert!(config.effective_worker_count() >= 1);
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        let config = BatchConfig::new().with_image_extensions([".bmp", "png"]);
        assert!(config.matches_extension(&PathBuf::from("a/Crazing/x.BMP")));
        assert!(config.matches_extension(&PathBuf::from("x.png")));
        assert!(!config.matches_extension(&PathBuf::from("x.jpg")));
        assert!(!config.matches_extension(&PathBuf::from("noext")));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let config = BatchConfig::new().with_worker_count(Some(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn worker_count_is_capped() {
        let config = BatchConfig::new().with_worker_count(Some(MAX_WORKER_COUNT + 1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ResourceLimitExceeded { .. })
        ));
        let config = BatchConfig::new().with_worker_count(Some(MAX_WORKER_COUNT));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = BatchConfig::from_json_str(r#"{ "worker_count": 3 }"#).unwrap();
        assert_eq!(config.worker_count, Some(3));
        assert_eq!(config.effective_worker_count(), 3);
        assert_eq!(config.parallel_threshold, DEFAULT_PARALLEL_THRESHOLD);
        assert!(config.recursive);
    }

    #[test]
    fn json_with_empty_extensions_fails_validation() {
        assert!(BatchConfig::from_json_str(r#"{ "image_extensions": [] }"#).is_err());
    }
}
