//! Classification quality metrics over batch results.
//!
//! Only successful results take part; failed results carry no prediction.
//! Categories are compared by class id.

use super::stats::BatchStats;
use crate::domain::{DefectType, PredictionResult};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// One-vs-rest counts and scores for a single category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub category: DefectType,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
    /// Number of results whose ground truth is this category.
    pub support: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

impl ClassMetrics {
    fn from_counts(category: DefectType, tp: usize, fp: usize, fn_: usize, tn: usize) -> Self {
        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            category,
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
            true_negatives: tn,
            support: tp + fn_,
            precision,
            recall,
            f1_score,
        }
    }
}

/// Computes per-category metrics for every category that appears as a
/// ground truth or a prediction, in canonical order.
pub fn compute_class_metrics(results: &[PredictionResult]) -> Vec<ClassMetrics> {
    let scored: Vec<&PredictionResult> = results.iter().filter(|r| r.processing_success).collect();

    let present: BTreeSet<DefectType> = scored
        .iter()
        .flat_map(|r| [r.true_class_id, r.predict_class_id])
        .collect();

    present
        .into_iter()
        .map(|category| {
            let (mut tp, mut fp, mut fn_, mut tn) = (0, 0, 0, 0);
            for result in &scored {
                let is_true = result.true_class_id == category;
                let is_pred = result.predict_class_id == category;
                match (is_true, is_pred) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => tn += 1,
                }
            }
            ClassMetrics::from_counts(category, tp, fp, fn_, tn)
        })
        .collect()
}

/// Square matrix of (true category, predicted category) counts over all
/// seven categories in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    counts: [[usize; 7]; 7],
}

impl ConfusionMatrix {
    /// Tallies the successful results.
    pub fn from_results(results: &[PredictionResult]) -> Self {
        let mut counts = [[0usize; 7]; 7];
        for result in results.iter().filter(|r| r.processing_success) {
            counts[result.true_class_id.index()][result.predict_class_id.index()] += 1;
        }
        Self { counts }
    }

    /// Count of results with ground truth `actual` predicted as `predicted`.
    pub fn get(&self, actual: DefectType, predicted: DefectType) -> usize {
        self.counts[actual.index()][predicted.index()]
    }

    /// Raw counts, rows are ground truth and columns predictions.
    pub fn counts(&self) -> &[[usize; 7]; 7] {
        &self.counts
    }

    /// Total number of tallied results.
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Fraction of tallied results on the diagonal.
    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let diagonal: usize = (0..7).map(|i| self.counts[i][i]).sum();
        diagonal as f64 / total as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "")?;
        for category in DefectType::ALL {
            write!(f, "{:>10}", category.name())?;
        }
        writeln!(f)?;
        for actual in DefectType::ALL {
            write!(f, "{:>10}", actual.name())?;
            for predicted in DefectType::ALL {
                write!(f, "{:>10}", self.get(actual, predicted))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Everything reported at the end of a batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub stats: BatchStats,
    pub class_metrics: Vec<ClassMetrics>,
    pub confusion: ConfusionMatrix,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn from_results(results: &[PredictionResult], elapsed: Duration) -> Self {
        Self {
            stats: BatchStats::from_results(results),
            class_metrics: compute_class_metrics(results),
            confusion: ConfusionMatrix::from_results(results),
            elapsed,
        }
    }

    /// Unweighted mean of the per-category F1 scores.
    pub fn macro_f1(&self) -> f64 {
        if self.class_metrics.is_empty() {
            return 0.0;
        }
        self.class_metrics.iter().map(|m| m.f1_score).sum::<f64>() / self.class_metrics.len() as f64
    }

    /// Sum of the per-category supports.
    pub fn total_support(&self) -> usize {
        self.class_metrics.iter().map(|m| m.support).sum()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats)?;
        writeln!(f, "  Elapsed: {:.2} s", self.elapsed.as_secs_f64())?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<10} {:>9} {:>9} {:>9} {:>8}",
            "Class", "Precision", "Recall", "F1", "Support"
        )?;
        for m in &self.class_metrics {
            writeln!(
                f,
                "{:<10} {:>8.2}% {:>8.2}% {:>8.2}% {:>8}",
                m.category.name(),
                m.precision * 100.0,
                m.recall * 100.0,
                m.f1_score * 100.0,
                m.support
            )?;
        }
        writeln!(f, "Macro F1: {:.2}%", self.macro_f1() * 100.0)?;
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows: true, columns: predicted):")?;
        write!(f, "{}", self.confusion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(truth: DefectType, predicted: DefectType) -> PredictionResult {
        let mut r = PredictionResult::new(format!("/d/{}/x.bmp", truth.name()));
        r.set_true_label(truth.name());
        r.predict_class_id = predicted;
        r.predict_label = predicted.prediction_label().to_string();
        r.processing_success = true;
        r
    }

    fn sample() -> Vec<PredictionResult> {
        use DefectType::*;
        let mut failed = scored(Rolled, Rolled);
        failed.processing_success = false;
        vec![
            scored(Crazing, Crazing),
            scored(Crazing, Crazing),
            scored(Crazing, Pitted),
            scored(Pitted, Pitted),
            scored(Rolled, Crazing),
            failed,
        ]
    }

    #[test]
    fn class_metrics_follow_one_vs_rest_counts() {
        let metrics = compute_class_metrics(&sample());
        let categories: Vec<_> = metrics.iter().map(|m| m.category).collect();
        assert_eq!(
            categories,
            vec![DefectType::Crazing, DefectType::Pitted, DefectType::Rolled]
        );

        let crazing = &metrics[0];
        assert_eq!(
            (
                crazing.true_positives,
                crazing.false_positives,
                crazing.false_negatives,
                crazing.true_negatives
            ),
            (2, 1, 1, 1)
        );
        assert_eq!(crazing.support, 3);
        assert!((crazing.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((crazing.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((crazing.f1_score - 2.0 / 3.0).abs() < 1e-12);

        let rolled = &metrics[2];
        assert_eq!(rolled.support, 1);
        assert_eq!(rolled.precision, 0.0);
        assert_eq!(rolled.f1_score, 0.0);
    }

    #[test]
    fn failed_results_are_skipped_not_fatal() {
        let report = BatchReport::from_results(&sample(), Duration::from_secs(1));
        assert_eq!(report.total_support(), 5);
        assert_eq!(report.confusion.total(), 5);
        assert_eq!(report.stats.failed, 1);
    }

    #[test]
    fn confusion_matrix_is_indexed_by_class_id() {
        let matrix = ConfusionMatrix::from_results(&sample());
        assert_eq!(matrix.get(DefectType::Crazing, DefectType::Crazing), 2);
        assert_eq!(matrix.get(DefectType::Crazing, DefectType::Pitted), 1);
        assert_eq!(matrix.get(DefectType::Rolled, DefectType::Crazing), 1);
        assert_eq!(matrix.get(DefectType::Rolled, DefectType::Rolled), 0);
        assert!((matrix.accuracy() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn report_renders_table() {
        let report = BatchReport::from_results(&sample(), Duration::from_millis(1500));
        let text = report.to_string();
        assert!(text.contains("Crazing"));
        assert!(text.contains("Macro F1"));
        assert!(text.contains("Elapsed: 1.50 s"));
    }
}
