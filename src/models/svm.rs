//! Kernel support vector machine stored in the OpenCV `opencv_ml_svm` layout.
//!
//! Models are read from and written to the YAML persistence format used by
//! OpenCV's machine learning module. Only inference is provided: the model
//! must have been trained elsewhere.

use crate::core::DefectError;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Formulation the model was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SvmType {
    /// C-support vector classification.
    CSvc,
    /// Nu-support vector classification.
    NuSvc,
    /// Distribution estimation (one-class).
    OneClass,
    /// Epsilon-support vector regression.
    EpsSvr,
    /// Nu-support vector regression.
    NuSvr,
}

impl SvmType {
    /// Numeric code used by OpenCV.
    pub fn code(self) -> i32 {
        match self {
            SvmType::CSvc => 100,
            SvmType::NuSvc => 101,
            SvmType::OneClass => 102,
            SvmType::EpsSvr => 103,
            SvmType::NuSvr => 104,
        }
    }

    /// Name as written in the model file.
    pub fn name(self) -> &'static str {
        match self {
            SvmType::CSvc => "C_SVC",
            SvmType::NuSvc => "NU_SVC",
            SvmType::OneClass => "ONE_CLASS",
            SvmType::EpsSvr => "EPS_SVR",
            SvmType::NuSvr => "NU_SVR",
        }
    }

    /// Parses the name written in the model file.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "C_SVC" => Some(SvmType::CSvc),
            "NU_SVC" => Some(SvmType::NuSvc),
            "ONE_CLASS" => Some(SvmType::OneClass),
            "EPS_SVR" => Some(SvmType::EpsSvr),
            "NU_SVR" => Some(SvmType::NuSvr),
            _ => None,
        }
    }

    /// True for the two classification formulations.
    pub fn is_classifier(self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel function family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelType {
    /// `<x, y>`
    Linear,
    /// `(gamma * <x, y> + coef0) ^ degree`
    Poly,
    /// `exp(-gamma * |x - y|^2)`
    Rbf,
    /// `tanh(gamma * <x, y> + coef0)`
    Sigmoid,
    /// `exp(-gamma * chi2(x, y))`
    Chi2,
    /// Histogram intersection `sum(min(x_i, y_i))`.
    Inter,
}

impl KernelType {
    /// Numeric code used by OpenCV.
    pub fn code(self) -> i32 {
        match self {
            KernelType::Linear => 0,
            KernelType::Poly => 1,
            KernelType::Rbf => 2,
            KernelType::Sigmoid => 3,
            KernelType::Chi2 => 4,
            KernelType::Inter => 5,
        }
    }

    /// Name as written in the model file.
    pub fn name(self) -> &'static str {
        match self {
            KernelType::Linear => "LINEAR",
            KernelType::Poly => "POLY",
            KernelType::Rbf => "RBF",
            KernelType::Sigmoid => "SIGMOID",
            KernelType::Chi2 => "CHI2",
            KernelType::Inter => "INTER",
        }
    }

    /// Parses the name written in the model file.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LINEAR" => Some(KernelType::Linear),
            "POLY" => Some(KernelType::Poly),
            "RBF" => Some(KernelType::Rbf),
            "SIGMOID" => Some(KernelType::Sigmoid),
            "CHI2" => Some(KernelType::Chi2),
            "INTER" => Some(KernelType::Inter),
            _ => None,
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Kernel family and its parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    pub kind: KernelType,
    pub gamma: f64,
    pub coef0: f64,
    pub degree: f64,
}

impl Kernel {
    /// Creates a kernel with OpenCV's default parameters.
    pub fn new(kind: KernelType) -> Self {
        Self {
            kind,
            gamma: 1.0,
            coef0: 0.0,
            degree: 0.0,
        }
    }

    /// Evaluates the kernel between a support vector and a sample.
    pub fn eval(&self, sv: ArrayView1<'_, f32>, sample: ArrayView1<'_, f32>) -> f64 {
        let pairs = sv.iter().zip(sample.iter()).map(|(a, b)| (*a as f64, *b as f64));
        match self.kind {
            KernelType::Linear => pairs.map(|(a, b)| a * b).sum(),
            KernelType::Poly => {
                let dot: f64 = pairs.map(|(a, b)| a * b).sum();
                (self.gamma * dot + self.coef0).powf(self.degree)
            }
            KernelType::Rbf => {
                let dist: f64 = pairs.map(|(a, b)| (a - b) * (a - b)).sum();
                (-self.gamma * dist).exp()
            }
            KernelType::Sigmoid => {
                let dot: f64 = pairs.map(|(a, b)| a * b).sum();
                (self.gamma * dot + self.coef0).tanh()
            }
            KernelType::Chi2 => {
                let chi2: f64 = pairs
                    .map(|(a, b)| {
                        let sum = a + b;
                        if sum != 0.0 { (a - b) * (a - b) / sum } else { 0.0 }
                    })
                    .sum();
                (-self.gamma * chi2).exp()
            }
            KernelType::Inter => pairs.map(|(a, b)| a.min(b)).sum(),
        }
    }
}

/// One binary decision function over a subset of the support vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionFunction {
    pub rho: f64,
    pub alpha: Vec<f64>,
    /// Row indices into the support vector matrix, parallel to `alpha`.
    pub index: Vec<usize>,
}

/// Output of a single prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvmPrediction {
    /// Predicted class label, or the regression value.
    pub label: f32,
    /// Raw decision value backing the prediction.
    ///
    /// For two-class models this is the decision function value; for more
    /// classes it is the mean of the winning class's pairwise decision
    /// values, oriented so that positive favours the winner.
    pub decision: f64,
}

/// A trained support vector machine.
#[derive(Debug, Clone, PartialEq)]
pub struct SvmModel {
    pub svm_type: SvmType,
    pub kernel: Kernel,
    pub c: f64,
    pub nu: f64,
    pub p: f64,
    /// Class labels in training order; empty for one-class and regression.
    pub class_labels: Vec<i32>,
    /// One support vector per row.
    pub support_vectors: Array2<f32>,
    /// `k * (k - 1) / 2` functions for `k` classes, ordered (0,1), (0,2), ..., (1,2), ...;
    /// a single function otherwise.
    pub decision_functions: Vec<DecisionFunction>,
}

impl SvmModel {
    /// Assembles a model from its parts and checks their consistency.
    pub fn new(
        svm_type: SvmType,
        kernel: Kernel,
        class_labels: Vec<i32>,
        support_vectors: Array2<f32>,
        decision_functions: Vec<DecisionFunction>,
    ) -> Result<Self, DefectError> {
        let model = Self {
            svm_type,
            kernel,
            c: 1.0,
            nu: 0.0,
            p: 0.0,
            class_labels,
            support_vectors,
            decision_functions,
        };
        model.validate()?;
        Ok(model)
    }

    /// Length of the feature vectors the model accepts.
    pub fn var_count(&self) -> usize {
        self.support_vectors.ncols()
    }

    /// Number of support vectors.
    pub fn sv_total(&self) -> usize {
        self.support_vectors.nrows()
    }

    /// Number of classes; zero for one-class and regression models.
    pub fn class_count(&self) -> usize {
        self.class_labels.len()
    }

    fn validate(&self) -> Result<(), DefectError> {
        if self.sv_total() == 0 || self.var_count() == 0 {
            return Err(DefectError::invalid_model("model has no support vectors"));
        }

        let expected_functions = if self.svm_type.is_classifier() {
            let k = self.class_count();
            if k < 2 {
                return Err(DefectError::invalid_model(format!(
                    "classification model needs at least 2 classes, found {}",
                    k
                )));
            }
            k * (k - 1) / 2
        } else {
            1
        };
        if self.decision_functions.len() != expected_functions {
            return Err(DefectError::invalid_model(format!(
                "expected {} decision functions, found {}",
                expected_functions,
                self.decision_functions.len()
            )));
        }

        for (i, df) in self.decision_functions.iter().enumerate() {
            if df.alpha.len() != df.index.len() {
                return Err(DefectError::invalid_model(format!(
                    "decision function {} has {} weights but {} indices",
                    i,
                    df.alpha.len(),
                    df.index.len()
                )));
            }
            if let Some(bad) = df.index.iter().find(|&&idx| idx >= self.sv_total()) {
                return Err(DefectError::invalid_model(format!(
                    "decision function {} references support vector {} of {}",
                    i,
                    bad,
                    self.sv_total()
                )));
            }
        }
        Ok(())
    }

    /// Reads a model from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DefectError> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Parses a model from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, DefectError> {
        // "%YAML:1.0" is not a valid YAML 1.2 directive.
        let body = text
            .lines()
            .filter(|line| !line.trim_start().starts_with('%'))
            .collect::<Vec<_>>()
            .join("\n");

        let document: ModelDocument = serde_yaml::from_str(&body)?;
        Self::from_record(document.opencv_ml_svm)
    }

    fn from_record(record: SvmRecord) -> Result<Self, DefectError> {
        let svm_type = SvmType::from_name(&record.svm_type).ok_or_else(|| {
            DefectError::invalid_model(format!("unsupported svmType '{}'", record.svm_type))
        })?;

        let kind = KernelType::from_name(&record.kernel.kind).ok_or_else(|| {
            DefectError::invalid_model(format!("unsupported kernel type '{}'", record.kernel.kind))
        })?;
        let mut kernel = Kernel::new(kind);
        kernel.gamma = record.kernel.gamma.unwrap_or(kernel.gamma);
        kernel.coef0 = record.kernel.coef0.unwrap_or(kernel.coef0);
        kernel.degree = record.kernel.degree.unwrap_or(kernel.degree);

        let class_labels = if svm_type.is_classifier() {
            record.class_labels.map(|m| m.data).unwrap_or_default()
        } else {
            Vec::new()
        };
        if let Some(declared) = record.class_count {
            if svm_type.is_classifier() && declared != class_labels.len() {
                return Err(DefectError::invalid_model(format!(
                    "class_count {} does not match {} class labels",
                    declared,
                    class_labels.len()
                )));
            }
        }

        if record.support_vectors.len() != record.sv_total {
            return Err(DefectError::invalid_model(format!(
                "sv_total is {} but {} support vectors are stored",
                record.sv_total,
                record.support_vectors.len()
            )));
        }
        if let Some((i, row)) = record
            .support_vectors
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != record.var_count)
        {
            return Err(DefectError::invalid_model(format!(
                "support vector {} has {} values, expected {}",
                i,
                row.len(),
                record.var_count
            )));
        }
        let flat: Vec<f32> = record.support_vectors.into_iter().flatten().collect();
        let support_vectors = Array2::from_shape_vec((record.sv_total, record.var_count), flat)?;

        let mut decision_functions = Vec::with_capacity(record.decision_functions.len());
        let mut offset = 0usize;
        for (i, df) in record.decision_functions.into_iter().enumerate() {
            if df.alpha.len() != df.sv_count {
                return Err(DefectError::invalid_model(format!(
                    "decision function {} declares {} support vectors but has {} weights",
                    i,
                    df.sv_count,
                    df.alpha.len()
                )));
            }
            let index = df
                .index
                .unwrap_or_else(|| (offset..offset + df.sv_count).collect());
            offset += df.sv_count;
            decision_functions.push(DecisionFunction {
                rho: df.rho,
                alpha: df.alpha,
                index,
            });
        }

        let model = Self {
            svm_type,
            kernel,
            c: record.c.unwrap_or(1.0),
            nu: record.nu.unwrap_or(0.0),
            p: record.p.unwrap_or(0.0),
            class_labels,
            support_vectors,
            decision_functions,
        };
        model.validate()?;
        Ok(model)
    }

    fn to_record(&self) -> SvmRecord {
        let kind = self.kernel.kind;
        let uses_gamma = !matches!(kind, KernelType::Linear | KernelType::Inter);
        let uses_coef0 = matches!(kind, KernelType::Poly | KernelType::Sigmoid);
        let classifier = self.svm_type.is_classifier();

        SvmRecord {
            format: Some(3),
            svm_type: self.svm_type.name().to_string(),
            kernel: KernelRecord {
                kind: kind.name().to_string(),
                degree: (kind == KernelType::Poly).then_some(self.kernel.degree),
                gamma: uses_gamma.then_some(self.kernel.gamma),
                coef0: uses_coef0.then_some(self.kernel.coef0),
            },
            c: matches!(self.svm_type, SvmType::CSvc | SvmType::EpsSvr | SvmType::NuSvr)
                .then_some(self.c),
            nu: matches!(self.svm_type, SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr)
                .then_some(self.nu),
            p: (self.svm_type == SvmType::EpsSvr).then_some(self.p),
            var_count: self.var_count(),
            class_count: classifier.then_some(self.class_count()),
            class_labels: classifier.then(|| MatrixRecord {
                rows: self.class_count(),
                cols: 1,
                dt: "i".to_string(),
                data: self.class_labels.clone(),
            }),
            sv_total: self.sv_total(),
            support_vectors: self
                .support_vectors
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            decision_functions: self
                .decision_functions
                .iter()
                .map(|df| DecisionRecord {
                    sv_count: df.alpha.len(),
                    rho: df.rho,
                    alpha: df.alpha.clone(),
                    index: Some(df.index.clone()),
                })
                .collect(),
        }
    }

    /// Serializes the model to YAML text with the `%YAML:1.0` header OpenCV expects.
    pub fn to_yaml_string(&self) -> Result<String, DefectError> {
        let document = ModelDocument {
            opencv_ml_svm: self.to_record(),
        };
        let body = serde_yaml::to_string(&document)?;
        Ok(format!("%YAML:1.0\n---\n{}", body))
    }

    /// Writes the model to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DefectError> {
        fs::write(path.as_ref(), self.to_yaml_string()?)?;
        Ok(())
    }

    /// Predicts the label of one sample.
    ///
    /// # Errors
    ///
    /// Returns `DefectError::InvalidInput` when the sample length differs
    /// from the model's feature count.
    pub fn predict(&self, sample: ArrayView1<'_, f32>) -> Result<SvmPrediction, DefectError> {
        if sample.len() != self.var_count() {
            return Err(DefectError::validation_error(
                "SvmModel",
                "feature length",
                &self.var_count().to_string(),
                &sample.len().to_string(),
            ));
        }

        let kernel_values: Vec<f64> = self
            .support_vectors
            .rows()
            .into_iter()
            .map(|sv| self.kernel.eval(sv, sample))
            .collect();
        let decide = |df: &DecisionFunction| -> f64 {
            df.alpha
                .iter()
                .zip(&df.index)
                .fold(-df.rho, |sum, (alpha, idx)| sum + alpha * kernel_values[*idx])
        };

        if !self.svm_type.is_classifier() {
            let sum = decide(&self.decision_functions[0]);
            let label = if self.svm_type == SvmType::OneClass {
                if sum > 0.0 { 1.0 } else { 0.0 }
            } else {
                sum as f32
            };
            return Ok(SvmPrediction {
                label,
                decision: sum,
            });
        }

        let k = self.class_count();
        let mut votes = vec![0usize; k];
        let mut pair_sums = Vec::with_capacity(self.decision_functions.len());
        let mut functions = self.decision_functions.iter();
        for i in 0..k {
            for j in i + 1..k {
                let Some(df) = functions.next() else {
                    break;
                };
                let sum = decide(df);
                votes[if sum > 0.0 { i } else { j }] += 1;
                pair_sums.push((i, j, sum));
            }
        }

        let mut winner = 0;
        for (class, count) in votes.iter().enumerate().skip(1) {
            if *count > votes[winner] {
                winner = class;
            }
        }

        let decision = if k == 2 {
            pair_sums[0].2
        } else {
            let oriented: Vec<f64> = pair_sums
                .iter()
                .filter_map(|&(i, j, sum)| {
                    if i == winner {
                        Some(sum)
                    } else if j == winner {
                        Some(-sum)
                    } else {
                        None
                    }
                })
                .collect();
            oriented.iter().sum::<f64>() / oriented.len() as f64
        };

        Ok(SvmPrediction {
            label: self.class_labels[winner] as f32,
            decision,
        })
    }
}

/// Document root of a serialized model.
#[derive(Debug, Serialize, Deserialize)]
struct ModelDocument {
    opencv_ml_svm: SvmRecord,
}

/// The `opencv_ml_svm` node.
#[derive(Debug, Serialize, Deserialize)]
struct SvmRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format: Option<i32>,
    #[serde(rename = "svmType")]
    svm_type: String,
    kernel: KernelRecord,
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    c: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    p: Option<f64>,
    var_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    class_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    class_labels: Option<MatrixRecord<i32>>,
    sv_total: usize,
    support_vectors: Vec<Vec<f32>>,
    decision_functions: Vec<DecisionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct KernelRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    degree: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gamma: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    coef0: Option<f64>,
}

/// An `!!opencv-matrix` node. The tag itself is not kept.
#[derive(Debug, Serialize, Deserialize)]
struct MatrixRecord<T> {
    rows: usize,
    cols: usize,
    dt: String,
    data: Vec<T>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DecisionRecord {
    sv_count: usize,
    rho: f64,
    alpha: Vec<f64>,
    /// Absent when each function owns a consecutive run of support vectors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<Vec<usize>>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    /// Three classes split along the first feature at 2.5, 5 and 7.5.
    ///
    /// Every support vector is `[1, 0]`, so each pairwise decision value is
    /// `threshold - x`: positive (a vote for the lower class) left of the threshold.
    pub(crate) fn three_class_linear() -> SvmModel {
        let svs = arr2(&[[1.0f32, 0.0], [1.0, 0.0], [1.0, 0.0]]);
        let dfs = [(-2.5, 0), (-5.0, 1), (-7.5, 2)]
            .into_iter()
            .map(|(rho, sv)| DecisionFunction {
                rho,
                alpha: vec![-1.0],
                index: vec![sv],
            })
            .collect();
        SvmModel::new(
            SvmType::CSvc,
            Kernel::new(KernelType::Linear),
            vec![1, 2, 3],
            svs,
            dfs,
        )
        .unwrap()
    }

    fn two_class_rbf() -> SvmModel {
        let mut kernel = Kernel::new(KernelType::Rbf);
        kernel.gamma = 0.5;
        SvmModel::new(
            SvmType::CSvc,
            kernel,
            vec![4, 6],
            arr2(&[[0.0f32, 0.0], [4.0, 4.0]]),
            vec![DecisionFunction {
                rho: 0.0,
                alpha: vec![1.0, -1.0],
                index: vec![0, 1],
            }],
        )
        .unwrap()
    }

    #[test]
    fn multiclass_votes_pick_the_nearest_class() {
        let model = three_class_linear();
        assert_eq!(model.predict(arr1(&[1.0, 0.0]).view()).unwrap().label, 1.0);
        assert_eq!(model.predict(arr1(&[4.0, 0.0]).view()).unwrap().label, 2.0);
        assert_eq!(model.predict(arr1(&[9.0, 0.0]).view()).unwrap().label, 3.0);
    }

    #[test]
    fn multiclass_decision_favours_winner() {
        let model = three_class_linear();
        let prediction = model.predict(arr1(&[0.0, 0.0]).view()).unwrap();
        assert!(prediction.decision > 0.0);
    }

    #[test]
    fn two_class_rbf_decision_sign_matches_label() {
        let model = two_class_rbf();
        let near_first = model.predict(arr1(&[0.1, 0.2]).view()).unwrap();
        assert_eq!(near_first.label, 4.0);
        assert!(near_first.decision > 0.0);

        let near_second = model.predict(arr1(&[3.9, 4.1]).view()).unwrap();
        assert_eq!(near_second.label, 6.0);
        assert!(near_second.decision < 0.0);
    }

    #[test]
    fn wrong_feature_length_is_rejected() {
        let model = two_class_rbf();
        assert!(model.predict(arr1(&[1.0, 2.0, 3.0]).view()).is_err());
    }

    #[test]
    fn kernels_match_closed_forms() {
        let a = arr1(&[1.0f32, 2.0]);
        let b = arr1(&[3.0f32, 1.0]);
        let mut kernel = Kernel::new(KernelType::Linear);
        assert_eq!(kernel.eval(a.view(), b.view()), 5.0);

        kernel.kind = KernelType::Inter;
        assert_eq!(kernel.eval(a.view(), b.view()), 2.0);

        kernel.kind = KernelType::Poly;
        kernel.gamma = 1.0;
        kernel.coef0 = 1.0;
        kernel.degree = 2.0;
        assert_eq!(kernel.eval(a.view(), b.view()), 36.0);

        kernel.kind = KernelType::Rbf;
        kernel.gamma = 0.1;
        assert!((kernel.eval(a.view(), b.view()) - (-0.5f64).exp()).abs() < 1e-12);

        kernel.kind = KernelType::Chi2;
        kernel.gamma = 1.0;
        // (1-3)^2/4 + (2-1)^2/3
        let chi2: f64 = 1.0 + 1.0 / 3.0;
        assert!((kernel.eval(a.view(), b.view()) - (-chi2).exp()).abs() < 1e-12);
    }

    #[test]
    fn yaml_output_loads_back_identically() {
        let model = two_class_rbf();
        let text = model.to_yaml_string().unwrap();
        assert!(text.starts_with("%YAML:1.0\n---\nopencv_ml_svm:"));
        let loaded = SvmModel::from_yaml_str(&text).unwrap();
        assert_eq!(loaded, model);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svm_rbf.yml");
        three_class_linear().save(&path).unwrap();
        assert_eq!(SvmModel::load(&path).unwrap(), three_class_linear());
    }

    #[test]
    fn parses_opencv_layout_with_implicit_indices() {
        let text = r#"%YAML:1.0
---
opencv_ml_svm:
   format: 3
   svmType: C_SVC
   kernel:
      type: LINEAR
   C: 1.
   term_criteria: { epsilon: 1.1920928955078125e-07, iterations: 1000 }
   var_count: 2
   class_count: 2
   class_labels: !!opencv-matrix
      rows: 2
      cols: 1
      dt: i
      data: [ 1, 5 ]
   sv_total: 1
   support_vectors:
      - [ 1., -1. ]
   decision_functions:
      -
         sv_count: 1
         rho: 0.
         alpha: [ 1. ]
"#;
        let model = SvmModel::from_yaml_str(text).unwrap();
        assert_eq!(model.class_labels, vec![1, 5]);
        assert_eq!(model.decision_functions[0].index, vec![0]);
        assert_eq!(model.predict(arr1(&[2.0, 0.0]).view()).unwrap().label, 1.0);
        assert_eq!(model.predict(arr1(&[0.0, 2.0]).view()).unwrap().label, 5.0);
    }

    #[test]
    fn opencv_multiclass_model_predicts_known_labels() {
        // Pairwise thresholds at 2.5, 5 and 7.5 along the first feature, with
        // each decision function pointing at a differently scaled support vector.
        let text = r#"%YAML:1.0
---
opencv_ml_svm:
   format: 3
   svmType: C_SVC
   kernel:
      type: LINEAR
   C: 2.5000000000000000e+00
   term_criteria: { epsilon: 1.0000000000000000e-06, iterations: 1000 }
   var_count: 2
   class_count: 3
   class_labels: !!opencv-matrix
      rows: 3
      cols: 1
      dt: i
      data: [ 1, 2, 6 ]
   sv_total: 3
   support_vectors:
      - [ 2., 0. ]
      - [ 5.00000000e-01, 0. ]
      - [ 1., 0. ]
   decision_functions:
      -
         sv_count: 1
         rho: -2.5000000000000000e+00
         alpha: [ -1. ]
         index: [ 2 ]
      -
         sv_count: 1
         rho: -5.
         alpha: [ -5.0000000000000000e-01 ]
         index: [ 0 ]
      -
         sv_count: 1
         rho: -7.5000000000000000e+00
         alpha: [ -2. ]
         index: [ 1 ]
"#;
        let model = SvmModel::from_yaml_str(text).unwrap();
        assert_eq!(model.c, 2.5);
        assert_eq!(model.class_count(), 3);

        let cases = [(1.0, 1.0), (4.0, 2.0), (6.0, 2.0), (9.0, 6.0)];
        for (x, expected) in cases {
            let prediction = model.predict(arr1(&[x, 0.0]).view()).unwrap();
            assert_eq!(prediction.label, expected, "x = {x}");
        }

        // The second feature carries no weight.
        let shifted = model.predict(arr1(&[1.0, 100.0]).view()).unwrap();
        assert_eq!(shifted.label, 1.0);
    }

    #[test]
    fn class_count_must_match_labels() {
        let text = "opencv_ml_svm:\n  svmType: C_SVC\n  kernel:\n    type: LINEAR\n  var_count: 1\n  class_count: 3\n  class_labels:\n    rows: 2\n    cols: 1\n    dt: i\n    data: [1, 2]\n  sv_total: 1\n  support_vectors:\n    - [1.0]\n  decision_functions:\n    - sv_count: 1\n      rho: 0.0\n      alpha: [1.0]\n";
        assert!(matches!(
            SvmModel::from_yaml_str(text),
            Err(DefectError::InvalidModel { .. })
        ));
    }

    #[test]
    fn malformed_models_are_rejected() {
        assert!(SvmModel::from_yaml_str("opencv_ml_svm:\n   svmType: C_SVC\n").is_err());
        assert!(SvmModel::from_yaml_str("- 1\n- 2\n").is_err());

        let bad_index = SvmModel::new(
            SvmType::CSvc,
            Kernel::new(KernelType::Linear),
            vec![1, 2],
            arr2(&[[1.0f32]]),
            vec![DecisionFunction {
                rho: 0.0,
                alpha: vec![1.0],
                index: vec![3],
            }],
        );
        assert!(matches!(bad_index, Err(DefectError::InvalidModel { .. })));
    }

    #[test]
    fn one_class_returns_membership() {
        let mut kernel = Kernel::new(KernelType::Rbf);
        kernel.gamma = 1.0;
        let model = SvmModel::new(
            SvmType::OneClass,
            kernel,
            Vec::new(),
            arr2(&[[0.0f32]]),
            vec![DecisionFunction {
                rho: 0.5,
                alpha: vec![1.0],
                index: vec![0],
            }],
        )
        .unwrap();
        assert_eq!(model.predict(arr1(&[0.0]).view()).unwrap().label, 1.0);
        assert_eq!(model.predict(arr1(&[3.0]).view()).unwrap().label, 0.0);
    }
}
