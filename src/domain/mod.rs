//! Domain-level structures shared across the detection pipeline.
//!
//! This module groups the defect categories and the per-image prediction
//! result that flow from the workers to the batch coordinator and reports.

pub mod defect;
pub mod prediction;

pub use defect::*;
pub use prediction::*;
