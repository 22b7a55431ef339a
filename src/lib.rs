//! # Metal Defect
//!
//! Classifies grayscale images of steel strip surfaces into six defect
//! categories using HOG features and a kernel SVM, and validates a model
//! against a labeled dataset with a multi-threaded batch engine.
//!
//! ## Components
//!
//! - **Preprocessing**: grayscale, 64x64 resize, 5x5 Gaussian blur, histogram equalization
//! - **Feature extraction**: OpenCV-compatible HOG descriptor of length 1764
//! - **Classification**: one-vs-one kernel SVM loaded from an OpenCV YAML model
//! - **Batch validation**: worker pool, progress events, statistics and CSV export
//!
//! ## Modules
//!
//! * [`core`] - Configuration, constants and error handling
//! * [`domain`] - Defect categories and per-image prediction results
//! * [`models`] - The SVM and the shared classifier model handle
//! * [`pipeline`] - Task queue, workers, coordinator and metrics
//! * [`predictor`] - Single-image classification
//! * [`processors`] - Preprocessing filters and HOG extraction
//! * [`utils`] - Image loading, dataset layout helpers and CSV export
//!
//! ## Quick Start
//!
//! ### Single image
//!
//! ```rust,no_run
//! use metal_defect::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = Arc::new(ClassifierModel::from_path("models/svm_brf.yml")?);
//! let detector = DefectDetector::new(model);
//!
//! let result = detector.detect_path(Path::new("NEU/test/Crazing/crazing_1.bmp"));
//! println!("{} ({:.1}%)", result.predict_label, result.confidence * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! ### Batch validation
//!
//! ```rust,no_run
//! use metal_defect::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = BatchCoordinator::new(Arc::new(ClassifierModel::new()));
//! let run = coordinator.start("NEU/test", "models/svm_brf.yml")?;
//!
//! for event in run.events() {
//!     match event {
//!         BatchEvent::Progress { current, total, .. } => println!("{current}/{total}"),
//!         BatchEvent::Completed(results) | BatchEvent::Stopped(results) => {
//!             println!("{}", BatchStats::from_results(&results));
//!             break;
//!         }
//!         BatchEvent::Error(message) => return Err(message.into()),
//!         BatchEvent::Result(_) => {}
//!     }
//! }
//! let outcome = run.wait();
//! export_csv("results.csv".as_ref(), &outcome.results)?;
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod processors;
pub mod utils;

/// Prelude module for convenient imports.
///
/// ```rust
/// use metal_defect::prelude::*;
/// ```
///
/// Covers single-image detection, batch runs, results and errors. Lower-level
/// pieces (the SVM, HOG descriptor, filters) live in their own modules.
pub mod prelude {
    pub use crate::core::{BatchConfig, DefectError, DefectResult};
    pub use crate::domain::{DefectType, FailureKind, Outcome, PredictionResult};
    pub use crate::models::ClassifierModel;
    pub use crate::pipeline::{
        BatchCoordinator, BatchEvent, BatchOutcome, BatchReport, BatchRun, BatchState, BatchStats,
    };
    pub use crate::predictor::DefectDetector;
    pub use crate::utils::{export_csv, init_tracing, load_image};
}
