//! The core module of the detection pipeline.
//!
//! This module contains the fundamental pieces shared by every stage:
//! - Configuration management
//! - Constants used throughout the pipeline
//! - Error handling
//!
//! It also provides re-exports of commonly used types and functions for convenience.

pub mod config;
pub mod constants;
pub mod errors;

pub use crate::utils::{dynamic_to_gray, init_tracing, load_image};
pub use config::{BatchConfig, ConfigError, ConfigValidator};
pub use constants::*;
pub use errors::{DefectError, DefectResult, ProcessingStage};

/// A single-row feature matrix as fed to the classifier.
pub type FeatureRow = ndarray::Array2<f32>;
