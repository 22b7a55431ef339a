//! Dataset and model directory layout.
//!
//! A dataset directory holds one subdirectory per defect category; the name
//! of an image's parent directory is its ground-truth label. A dataset root
//! groups a `valid` and a `test` split of that layout.

use crate::core::DefectError;
use crate::core::config::BatchConfig;
use crate::core::constants::{MODEL_FILE_EXTENSIONS, TEST_SPLIT_DIR, VALID_SPLIT_DIR};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Evaluation split of a dataset root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSplit {
    Valid,
    Test,
}

impl DatasetSplit {
    /// Directory name of the split under the dataset root.
    pub fn dir_name(self) -> &'static str {
        match self {
            DatasetSplit::Valid => VALID_SPLIT_DIR,
            DatasetSplit::Test => TEST_SPLIT_DIR,
        }
    }

    /// Resolves the split directory under `root`.
    ///
    /// # Errors
    ///
    /// Returns `DefectError::DatasetStructure` unless `root` contains both
    /// the `valid` and `test` directories.
    pub fn resolve(self, root: &Path) -> Result<PathBuf, DefectError> {
        if !has_standard_splits(root) {
            return Err(DefectError::DatasetStructure {
                message: format!(
                    "'{}' does not contain the '{}' and '{}' directories",
                    root.display(),
                    VALID_SPLIT_DIR,
                    TEST_SPLIT_DIR
                ),
            });
        }
        Ok(root.join(self.dir_name()))
    }
}

impl fmt::Display for DatasetSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Returns true if `root` holds both standard split directories.
pub fn has_standard_splits(root: &Path) -> bool {
    root.join(VALID_SPLIT_DIR).is_dir() && root.join(TEST_SPLIT_DIR).is_dir()
}

/// Ground-truth label of an image: the name of its parent directory.
pub fn true_label_for(path: &Path) -> String {
    path.parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lists the image files under `dir` matching the configured extensions.
///
/// Paths are sorted, so enumeration order is stable across runs.
///
/// # Errors
///
/// * `DefectError::DatasetStructure` if `dir` is not a directory.
/// * `DefectError::EmptyDataset` if no matching file is found.
pub fn enumerate_images(dir: &Path, config: &BatchConfig) -> Result<Vec<PathBuf>, DefectError> {
    if !dir.is_dir() {
        return Err(DefectError::DatasetStructure {
            message: format!("dataset directory does not exist: {}", dir.display()),
        });
    }

    let mut walker = WalkDir::new(dir).follow_links(true);
    if !config.recursive {
        walker = walker.max_depth(1);
    }

    let mut images: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable dataset entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| config.matches_extension(path))
        .collect();
    images.sort();

    if images.is_empty() {
        return Err(DefectError::EmptyDataset {
            path: dir.display().to_string(),
        });
    }
    debug!("Found {} images under {}", images.len(), dir.display());
    Ok(images)
}

/// Lists the model files (`.yml`, `.yaml`) directly inside `dir`, sorted by name.
pub fn list_model_files(dir: &Path) -> Result<Vec<PathBuf>, DefectError> {
    let mut models = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            DefectError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        let path = entry.path();
        let is_model = path.extension().is_some_and(|ext| {
            MODEL_FILE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        });
        if entry.file_type().is_file() && is_model {
            models.push(entry.into_path());
        }
    }
    models.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn enumeration_is_recursive_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Rolled/b.bmp"));
        touch(&dir.path().join("Crazing/a.BMP"));
        touch(&dir.path().join("Crazing/notes.txt"));
        touch(&dir.path().join("top.bmp"));

        let images = enumerate_images(dir.path(), &BatchConfig::default()).unwrap();
        let names: Vec<_> = images
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("Crazing/a.BMP"),
                PathBuf::from("Rolled/b.bmp"),
                PathBuf::from("top.bmp"),
            ]
        );

        let flat = BatchConfig::default().with_recursive(false);
        assert_eq!(enumerate_images(dir.path(), &flat).unwrap().len(), 1);
    }

    #[test]
    fn empty_and_missing_directories_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("Pitted/readme.txt"));
        assert!(matches!(
            enumerate_images(dir.path(), &BatchConfig::default()),
            Err(DefectError::EmptyDataset { .. })
        ));
        assert!(matches!(
            enumerate_images(&dir.path().join("nope"), &BatchConfig::default()),
            Err(DefectError::DatasetStructure { .. })
        ));
    }

    #[test]
    fn label_comes_from_parent_directory() {
        assert_eq!(
            true_label_for(Path::new("/data/valid/Scratches/sc_1.bmp")),
            "Scratches"
        );
        assert_eq!(true_label_for(Path::new("img.bmp")), "");
    }

    #[test]
    fn splits_require_both_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("valid")).unwrap();
        assert!(DatasetSplit::Valid.resolve(dir.path()).is_err());

        fs::create_dir(dir.path().join("test")).unwrap();
        assert_eq!(
            DatasetSplit::Test.resolve(dir.path()).unwrap(),
            dir.path().join("test")
        );
    }

    #[test]
    fn model_listing_filters_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("svm_linear.yml"));
        touch(&dir.path().join("a_model.YAML"));
        touch(&dir.path().join("legacy.xml"));
        touch(&dir.path().join("readme.md"));
        touch(&dir.path().join("nested/deep.yml"));

        let names: Vec<_> = list_model_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_model.YAML", "svm_linear.yml"]);
    }
}
