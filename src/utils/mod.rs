//! Utility functions for the detection pipeline.
//!
//! This module provides image loading, dataset layout helpers, CSV export and
//! logging setup.

pub mod dataset;
pub mod export;
pub mod image;

pub use dataset::{
    DatasetSplit, enumerate_images, has_standard_splits, list_model_files, true_label_for,
};
pub use export::{CSV_HEADER, default_export_file_name, export_csv, write_csv};
pub use image::{dynamic_to_gray, load_image};

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and formatting layer.
/// It's typically called at the start of an application to enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
