//! The batch validation engine.
//!
//! A [`BatchCoordinator`] fills a [`TaskQueue`] with the images of a dataset
//! and starts a pool of [`Worker`]s that each own a
//! [`DefectDetector`](crate::predictor::DefectDetector). Results flow back as
//! [`BatchEvent`]s and are summarized by [`BatchStats`] and [`BatchReport`].

pub mod coordinator;
pub mod events;
pub mod metrics;
pub mod stats;
pub mod task_queue;
pub mod worker;

pub use coordinator::{BatchCoordinator, BatchOutcome, BatchRun};
pub use events::{BatchEvent, BatchState, WorkerMessage};
pub use metrics::{BatchReport, ClassMetrics, ConfusionMatrix, compute_class_metrics};
pub use stats::{BatchStats, StatsManager};
pub use task_queue::TaskQueue;
pub use worker::Worker;
