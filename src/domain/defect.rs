//! Surface defect categories and label mapping.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Label reported for predictions whose class id has no defect category.
pub const UNKNOWN_PREDICTION_LABEL: &str = "UNKNOWN";

/// Closed set of surface defect categories.
///
/// The discriminants are the class ids the classifier model was trained with.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum DefectType {
    /// No recognized defect category.
    #[default]
    Unknown = 0,
    /// Fine network of surface cracks.
    Crazing = 1,
    /// Non-metallic inclusions embedded in the surface.
    Inclusion = 2,
    /// Locally uneven color or texture.
    Patches = 3,
    /// Small pits left by local corrosion.
    Pitted = 4,
    /// Rolled-in scale and folds from the rolling process.
    Rolled = 5,
    /// Linear mechanical scratches.
    Scratches = 6,
}

impl DefectType {
    /// All categories in canonical display order.
    ///
    /// This order defines confusion-matrix axes and report ordering.
    pub const ALL: [DefectType; 7] = [
        DefectType::Unknown,
        DefectType::Crazing,
        DefectType::Inclusion,
        DefectType::Patches,
        DefectType::Pitted,
        DefectType::Rolled,
        DefectType::Scratches,
    ];

    /// Numeric class id.
    pub fn class_id(self) -> i32 {
        self as i32
    }

    /// Index of this category in [`DefectType::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Category name as used for dataset directories.
    pub fn name(self) -> &'static str {
        match self {
            DefectType::Unknown => "Unknown",
            DefectType::Crazing => "Crazing",
            DefectType::Inclusion => "Inclusion",
            DefectType::Patches => "Patches",
            DefectType::Pitted => "Pitted",
            DefectType::Rolled => "Rolled",
            DefectType::Scratches => "Scratches",
        }
    }

    /// Label reported by the classifier for this category.
    pub fn prediction_label(self) -> &'static str {
        match self {
            DefectType::Unknown => UNKNOWN_PREDICTION_LABEL,
            other => other.name(),
        }
    }

    /// Maps a raw class id to a category; ids without a category map to `Unknown`.
    pub fn from_class_id(class_id: i32) -> Self {
        match class_id {
            1 => DefectType::Crazing,
            2 => DefectType::Inclusion,
            3 => DefectType::Patches,
            4 => DefectType::Pitted,
            5 => DefectType::Rolled,
            6 => DefectType::Scratches,
            _ => DefectType::Unknown,
        }
    }

    /// Maps a category name to a category; unrecognized names map to `Unknown`.
    ///
    /// Matching is exact, as dataset directory names are.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Crazing" => DefectType::Crazing,
            "Inclusion" => DefectType::Inclusion,
            "Patches" => DefectType::Patches,
            "Pitted" => DefectType::Pitted,
            "Rolled" => DefectType::Rolled,
            "Scratches" => DefectType::Scratches,
            _ => DefectType::Unknown,
        }
    }

    /// Returns true for the six named defect categories.
    pub fn is_defect(self) -> bool {
        self != DefectType::Unknown
    }
}

impl fmt::Display for DefectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps a raw classifier output id to its prediction label.
///
/// Ids `<= 0` and ids beyond the known categories map to `"UNKNOWN"`.
pub fn label_for_class_id(class_id: i32) -> &'static str {
    DefectType::from_class_id(class_id).prediction_label()
}

/// Sorts a set of category names into canonical display order.
///
/// Names that are not canonical category names are dropped.
pub fn sort_category_names(names: &HashSet<String>) -> Vec<String> {
    DefectType::ALL
        .iter()
        .map(|category| category.name())
        .filter(|name| names.contains(*name))
        .map(str::to_string)
        .collect()
}
