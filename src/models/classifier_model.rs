//! Shared handle to the loaded classifier.
//!
//! [`ClassifierModel`] owns at most one [`SvmModel`] at a time. Every
//! operation (load, reload, predict, confidence and the metadata queries)
//! takes the same lock, so a reload atomically replaces the active model and
//! concurrent predictions never observe a half-loaded one. The handle is
//! created explicitly and shared between workers as `Arc<ClassifierModel>`.

use super::svm::{KernelType, SvmModel, SvmType};
use crate::core::DefectError;
use crate::core::constants::MODEL_FILE_EXTENSIONS;
use ndarray::ArrayView2;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Class id returned by [`ClassifierModel::predict`] when no prediction is possible.
pub const PREDICTION_SENTINEL: f32 = -1.0;

/// Model type reported when no model is loaded.
pub const MODEL_NOT_LOADED: &str = "not loaded";

/// Model type reported when neither the path nor the parameters identify it.
pub const UNKNOWN_MODEL_TYPE: &str = "unknown";

/// Model type names recognized in model file paths.
const KNOWN_MODEL_TYPES: [&str; 3] = ["svm_brf", "svm_linear", "svm_cnn"];

#[derive(Debug)]
struct LoadedModel {
    svm: SvmModel,
    path: PathBuf,
}

impl LoadedModel {
    fn type_name(&self) -> String {
        let path = self.path.to_string_lossy();
        if let Some(name) = KNOWN_MODEL_TYPES.iter().find(|name| path.contains(*name)) {
            return name.to_string();
        }

        match (self.svm.svm_type, self.svm.kernel.kind) {
            (SvmType::CSvc, KernelType::Rbf) => "svm_brf".to_string(),
            (SvmType::CSvc, KernelType::Linear) => "svm_linear".to_string(),
            _ => UNKNOWN_MODEL_TYPE.to_string(),
        }
    }
}

/// Prediction and score for one feature row.
///
/// The model identity is read under the same lock as the prediction, so it
/// names the model that produced it even across a concurrent reload.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    /// Raw class id as returned by the model.
    pub class_id: i32,
    /// Raw decision value.
    pub decision: f64,
    /// Logistic of the decision value, clamped to `[0, 1]`.
    pub confidence: f64,
    /// Type name of the predicting model, see [`ClassifierModel::model_type`].
    pub model_name: String,
    /// File the predicting model was loaded from.
    pub model_path: PathBuf,
}

/// A lock-protected, replaceable classifier instance.
#[derive(Debug, Default)]
pub struct ClassifierModel {
    inner: Mutex<Option<LoadedModel>>,
}

impl ClassifierModel {
    /// Creates a handle with no model loaded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a handle and loads the model at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DefectError> {
        let model = Self::new();
        model.load(path)?;
        Ok(model)
    }

    /// Creates a handle around an already constructed model.
    pub fn from_svm(svm: SvmModel, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Mutex::new(Some(LoadedModel {
                svm,
                path: path.into(),
            })),
        }
    }

    fn guard(&self) -> MutexGuard<'_, Option<LoadedModel>> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a consistent model.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads the model at `path`, replacing the active model on success.
    ///
    /// On failure the previously loaded model, if any, stays active.
    ///
    /// # Errors
    ///
    /// Returns `DefectError::ModelLoad` if the file is missing, uses an
    /// unsupported format, or does not contain a valid model.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(), DefectError> {
        let path = path.as_ref();
        let mut guard = self.guard();

        if !path.is_file() {
            warn!("Model file does not exist: {}", path.display());
            return Err(DefectError::model_load(
                path.display().to_string(),
                "file does not exist",
            ));
        }
        let is_yaml = path.extension().is_some_and(|ext| {
            MODEL_FILE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });
        if !is_yaml {
            warn!("Unsupported model format: {}", path.display());
            return Err(DefectError::model_load(
                path.display().to_string(),
                "only YAML model files (.yml, .yaml) are supported",
            ));
        }

        let svm = SvmModel::load(path).map_err(|e| {
            warn!("Failed to load model {}: {}", path.display(), e);
            DefectError::model_load(path.display().to_string(), e.to_string())
        })?;

        info!(
            "Model loaded: {} ({} {}, {} support vectors, {} features)",
            path.display(),
            svm.svm_type,
            svm.kernel.kind,
            svm.sv_total(),
            svm.var_count()
        );
        *guard = Some(LoadedModel {
            svm,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    /// Reloads the model from the path it was last loaded from.
    pub fn reload(&self) -> Result<(), DefectError> {
        let path = self
            .model_path()
            .ok_or_else(|| DefectError::model_load("", "no model path to reload from"))?;
        debug!("Reloading model from {}", path.display());
        self.load(path)
    }

    /// Returns true if a model is loaded.
    pub fn is_loaded(&self) -> bool {
        self.guard().is_some()
    }

    /// Path of the loaded model.
    pub fn model_path(&self) -> Option<PathBuf> {
        self.guard().as_ref().map(|model| model.path.clone())
    }

    /// Number of features the loaded model expects.
    pub fn var_count(&self) -> Option<usize> {
        self.guard().as_ref().map(|model| model.svm.var_count())
    }

    /// Short name identifying the kind of model.
    ///
    /// A known type name in the file path wins; otherwise C-SVC models with
    /// RBF or linear kernels are named after their kernel.
    pub fn model_type(&self) -> String {
        self.guard()
            .as_ref()
            .map_or_else(|| MODEL_NOT_LOADED.to_string(), LoadedModel::type_name)
    }

    /// Key training parameters of the loaded model: `C`, `gamma`, `type` and `kernel`.
    ///
    /// The map is empty when no model is loaded.
    pub fn parameters(&self) -> BTreeMap<String, f64> {
        let guard = self.guard();
        let mut params = BTreeMap::new();
        if let Some(model) = guard.as_ref() {
            params.insert("C".to_string(), model.svm.c);
            params.insert("gamma".to_string(), model.svm.kernel.gamma);
            params.insert("type".to_string(), model.svm.svm_type.code() as f64);
            params.insert("kernel".to_string(), model.svm.kernel.kind.code() as f64);
        }
        params
    }

    /// Classifies a single feature row.
    ///
    /// # Errors
    ///
    /// * `DefectError::ModelNotLoaded` if no model is loaded.
    /// * `DefectError::InvalidInput` if `features` is empty, has more than
    ///   one row, or does not match the model's feature count.
    pub fn try_predict(&self, features: ArrayView2<'_, f32>) -> Result<ModelOutput, DefectError> {
        let guard = self.guard();
        let model = guard.as_ref().ok_or(DefectError::ModelNotLoaded)?;

        if features.is_empty() {
            return Err(DefectError::invalid_input("feature vector is empty"));
        }
        if features.nrows() != 1 {
            return Err(DefectError::validation_error(
                "ClassifierModel",
                "rows",
                "1",
                &features.nrows().to_string(),
            ));
        }

        let prediction = model.svm.predict(features.row(0))?;
        Ok(ModelOutput {
            class_id: prediction.label.round() as i32,
            decision: prediction.decision,
            confidence: logistic_confidence(prediction.decision),
            model_name: model.type_name(),
            model_path: model.path.clone(),
        })
    }

    /// Predicts the class id of a feature row, or `-1.0` if that is not possible.
    pub fn predict(&self, features: ArrayView2<'_, f32>) -> f32 {
        match self.try_predict(features) {
            Ok(output) => output.class_id as f32,
            Err(e) => {
                warn!("Prediction unavailable: {}", e);
                PREDICTION_SENTINEL
            }
        }
    }

    /// Confidence of the prediction for a feature row, or `0.0` if unavailable.
    pub fn confidence(&self, features: ArrayView2<'_, f32>) -> f64 {
        self.try_predict(features)
            .map(|output| output.confidence)
            .unwrap_or(0.0)
    }
}

/// Maps a decision value to `[0, 1]` through the logistic function.
pub fn logistic_confidence(decision: f64) -> f64 {
    let value = 1.0 / (1.0 + (-decision).exp());
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::svm::tests::three_class_linear;
    use ndarray::{Array2, arr2};
    use std::sync::Arc;
    use std::thread;

    fn row(x: f32) -> Array2<f32> {
        arr2(&[[x, 0.0]])
    }

    #[test]
    fn unloaded_model_returns_sentinels() {
        let model = ClassifierModel::new();
        assert!(!model.is_loaded());
        assert_eq!(model.predict(row(1.0).view()), -1.0);
        assert_eq!(model.confidence(row(1.0).view()), 0.0);
        assert!(matches!(
            model.try_predict(row(1.0).view()),
            Err(DefectError::ModelNotLoaded)
        ));
        assert_eq!(model.model_type(), MODEL_NOT_LOADED);
        assert!(model.parameters().is_empty());
        assert!(model.reload().is_err());
    }

    #[test]
    fn loaded_model_predicts_and_scores() {
        let model = ClassifierModel::from_svm(three_class_linear(), "models/custom.yml");
        assert_eq!(model.predict(row(1.0).view()), 1.0);
        assert_eq!(model.predict(row(9.0).view()), 3.0);
        let confidence = model.confidence(row(0.0).view());
        assert!(confidence > 0.5 && confidence <= 1.0);
    }

    #[test]
    fn output_names_the_model_that_predicted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svm_cnn_v1.yml");
        three_class_linear().save(&path).unwrap();

        let model = ClassifierModel::from_svm(three_class_linear(), "models/custom.yml");
        let before = model.try_predict(row(4.0).view()).unwrap();
        assert_eq!(before.class_id, 2);
        assert_eq!(before.model_name, "svm_linear");
        assert_eq!(before.model_path, PathBuf::from("models/custom.yml"));

        model.load(&path).unwrap();
        let after = model.try_predict(row(4.0).view()).unwrap();
        assert_eq!(after.model_name, "svm_cnn");
        assert_eq!(after.model_path, path);
        assert_eq!(after.model_name, model.model_type());
    }

    #[test]
    fn empty_features_yield_sentinel() {
        let model = ClassifierModel::from_svm(three_class_linear(), "m.yml");
        let empty = Array2::<f32>::zeros((1, 0));
        assert_eq!(model.predict(empty.view()), -1.0);
        assert_eq!(model.confidence(empty.view()), 0.0);
    }

    #[test]
    fn confidence_is_bounded() {
        for decision in [-1e6, -3.0, 0.0, 2.5, 1e6, f64::NAN, f64::INFINITY] {
            let c = logistic_confidence(decision);
            assert!((0.0..=1.0).contains(&c), "{} -> {}", decision, c);
        }
        assert_eq!(logistic_confidence(0.0), 0.5);
    }

    #[test]
    fn model_type_prefers_path_then_kernel() {
        let by_path = ClassifierModel::from_svm(three_class_linear(), "models/svm_cnn_v2.yml");
        assert_eq!(by_path.model_type(), "svm_cnn");

        let by_kernel = ClassifierModel::from_svm(three_class_linear(), "models/custom.yml");
        assert_eq!(by_kernel.model_type(), "svm_linear");

        let params = by_kernel.parameters();
        assert_eq!(params["type"], 100.0);
        assert_eq!(params["kernel"], 0.0);
        assert_eq!(params["C"], 1.0);
    }

    #[test]
    fn load_and_reload_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("svm_linear.yml");
        three_class_linear().save(&path).unwrap();

        let model = ClassifierModel::from_path(&path).unwrap();
        assert!(model.is_loaded());
        assert_eq!(model.model_path(), Some(path.clone()));
        assert_eq!(model.var_count(), Some(2));
        model.reload().unwrap();
        assert_eq!(model.predict(row(4.0).view()), 2.0);
    }

    #[test]
    fn failed_load_keeps_active_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = ClassifierModel::from_svm(three_class_linear(), "active.yml");

        let missing = dir.path().join("missing.yml");
        assert!(matches!(
            model.load(&missing),
            Err(DefectError::ModelLoad { .. })
        ));

        let garbage = dir.path().join("garbage.yml");
        std::fs::write(&garbage, "not: [a, model").unwrap();
        assert!(matches!(
            model.load(&garbage),
            Err(DefectError::ModelLoad { .. })
        ));

        let xml = dir.path().join("model.xml");
        std::fs::write(&xml, "<opencv_storage/>").unwrap();
        assert!(matches!(
            model.load(&xml),
            Err(DefectError::ModelLoad { .. })
        ));

        assert_eq!(model.model_path(), Some(PathBuf::from("active.yml")));
        assert_eq!(model.predict(row(1.0).view()), 1.0);
    }

    #[test]
    fn concurrent_predictions_share_one_model() {
        let model = Arc::new(ClassifierModel::from_svm(three_class_linear(), "m.yml"));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let model = Arc::clone(&model);
                thread::spawn(move || {
                    (0..50)
                        .map(|_| model.predict(row(i as f32 * 3.0).view()))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let expected = [1.0, 2.0, 2.0, 3.0];
        for (handle, want) in handles.into_iter().zip(expected) {
            assert!(handle.join().unwrap().iter().all(|p| *p == want));
        }
    }
}
