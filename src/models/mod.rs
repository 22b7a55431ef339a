//! Classifier models.
//!
//! - [`svm`]: the kernel SVM and its YAML persistence
//! - [`classifier_model`]: the shared, lock-protected handle workers predict through

pub mod classifier_model;
pub mod svm;

pub use classifier_model::{
    ClassifierModel, MODEL_NOT_LOADED, ModelOutput, PREDICTION_SENTINEL, UNKNOWN_MODEL_TYPE,
    logistic_confidence,
};
pub use svm::{DecisionFunction, Kernel, KernelType, SvmModel, SvmPrediction, SvmType};
