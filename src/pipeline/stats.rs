//! Batch-wide statistics helpers.
//!
//! This module defines the `BatchStats` structure summarizing a batch run and
//! the `StatsManager` helper that accumulates it from results as they arrive.

use crate::domain::PredictionResult;
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Statistics for a batch run.
///
/// Tracks how many images were processed, how many succeeded and were
/// classified correctly, and the average per-image processing time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    /// The total number of images processed.
    pub total_processed: usize,
    /// The number of images that went through every pipeline stage.
    pub successful: usize,
    /// The number of images whose processing failed.
    pub failed: usize,
    /// The number of successful images with a ground-truth label.
    pub labeled: usize,
    /// The number of successful, labeled images classified correctly.
    pub correct: usize,
    /// The average per-image processing time in milliseconds.
    pub average_processing_time_ms: f64,
}

impl BatchStats {
    /// Creates a new BatchStats instance with zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Summarizes a finished set of results.
    pub fn from_results(results: &[PredictionResult]) -> Self {
        let mut stats = Self::new();
        for result in results {
            stats.record(result);
        }
        stats
    }

    /// Adds one result to the running statistics.
    pub fn record(&mut self, result: &PredictionResult) {
        let previous_total = self.total_processed;
        self.total_processed += 1;

        if result.processing_success {
            self.successful += 1;
            if !result.true_label.is_empty() {
                self.labeled += 1;
            }
            if result.is_correct() {
                self.correct += 1;
            }
        } else {
            self.failed += 1;
        }

        let accumulated = self.average_processing_time_ms * previous_total as f64;
        self.average_processing_time_ms =
            (accumulated + result.processing_time_ms) / self.total_processed as f64;
    }

    /// Returns the success rate as a percentage (0.0 to 100.0).
    pub fn success_rate(&self) -> f64 {
        percentage(self.successful, self.total_processed)
    }

    /// Returns the failure rate as a percentage (0.0 to 100.0).
    pub fn failure_rate(&self) -> f64 {
        percentage(self.failed, self.total_processed)
    }

    /// Returns the accuracy over labeled, successful images as a percentage.
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct, self.labeled)
    }

    /// Returns the average processing speed of one worker in images per second.
    pub fn images_per_second(&self) -> f64 {
        if self.average_processing_time_ms == 0.0 {
            0.0
        } else {
            1000.0 / self.average_processing_time_ms
        }
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch Statistics:")?;
        writeln!(f, "  Total processed: {}", self.total_processed)?;
        writeln!(
            f,
            "  Successful: {} ({:.1}%)",
            self.successful,
            self.success_rate()
        )?;
        writeln!(f, "  Failed: {} ({:.1}%)", self.failed, self.failure_rate())?;
        writeln!(
            f,
            "  Accuracy: {:.2}% ({} / {})",
            self.accuracy(),
            self.correct,
            self.labeled
        )?;
        writeln!(
            f,
            "  Average processing time: {:.2} ms",
            self.average_processing_time_ms
        )?;
        writeln!(
            f,
            "  Processing speed: {:.2} images/sec per worker",
            self.images_per_second()
        )?;
        Ok(())
    }
}

/// Thread-safe accumulator of batch statistics.
#[derive(Debug, Default)]
pub struct StatsManager {
    /// Shared statistics state guarded by a mutex.
    stats: Mutex<BatchStats>,
}

impl StatsManager {
    /// Creates a new `StatsManager` instance with zeroed metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the current statistics snapshot.
    pub fn get_stats(&self) -> BatchStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Adds one result to the tracked metrics.
    pub fn record(&self, result: &PredictionResult) {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(result);
    }

    /// Resets the tracked statistics to their default state.
    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = BatchStats::default();
    }
}
