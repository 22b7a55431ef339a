//! CSV export of batch results.

use crate::core::DefectError;
use crate::domain::PredictionResult;
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Header row of the exported CSV.
pub const CSV_HEADER: &str =
    "filename,trueLabel,predictLabel,confidence,correct,errorType,processingTimeMs,path,timestamp";

/// Label written for results without a ground truth.
const MISSING_TRUE_LABEL: &str = "Unknown";

/// Default export file name for a run finished at `now`.
pub fn default_export_file_name(now: DateTime<Local>) -> String {
    format!("validation_results_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// Formats one result as a CSV row, without the line terminator.
pub fn csv_row(result: &PredictionResult) -> String {
    let true_label = if result.true_label.is_empty() {
        MISSING_TRUE_LABEL
    } else {
        result.true_label.as_str()
    };
    [
        quoted(&result.image_name),
        quoted(true_label),
        quoted(&result.predict_label),
        format!("{:.2}", result.confidence * 100.0),
        quoted(if result.is_correct() { "yes" } else { "no" }),
        quoted(&result.outcome().to_string()),
        format!("{:.2}", result.processing_time_ms),
        quoted(&result.image_path.to_string_lossy()),
        quoted(&result.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()),
    ]
    .join(",")
}

/// Writes the header and one row per result.
pub fn write_csv<W: Write>(mut writer: W, results: &[PredictionResult]) -> std::io::Result<()> {
    writeln!(writer, "{}", CSV_HEADER)?;
    for result in results {
        writeln!(writer, "{}", csv_row(result))?;
    }
    writer.flush()
}

/// Exports results to a UTF-8 CSV file at `path`.
///
/// # Errors
///
/// Returns `DefectError::InvalidInput` when there is nothing to export and
/// `DefectError::Io` when the file cannot be written.
pub fn export_csv(path: &Path, results: &[PredictionResult]) -> Result<(), DefectError> {
    if results.is_empty() {
        return Err(DefectError::invalid_input("no results to export"));
    }
    let file = File::create(path)?;
    write_csv(BufWriter::new(file), results)?;
    info!("Exported {} results to {}", results.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DefectType;
    use chrono::TimeZone;

    fn sample() -> PredictionResult {
        let mut result = PredictionResult::new("/data/valid/Crazing/cr \"1\".bmp");
        result.set_true_label("Crazing");
        result.predict_class_id = DefectType::Crazing;
        result.predict_label = "Crazing".to_string();
        result.confidence = 0.87654;
        result.processing_time_ms = 12.5;
        result.processing_success = true;
        result.timestamp = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        result
    }

    #[test]
    fn row_quotes_and_formats_fields() {
        let row = csv_row(&sample());
        assert_eq!(
            row,
            "\"cr \"\"1\"\".bmp\",\"Crazing\",\"Crazing\",87.65,\"yes\",\"Correct\",12.50,\
             \"/data/valid/Crazing/cr \"\"1\"\".bmp\",\"2024-03-09T14:05:07\""
        );
    }

    #[test]
    fn missing_true_label_is_written_as_unknown() {
        let mut result = sample();
        result.true_label.clear();
        let row = csv_row(&result);
        assert!(row.contains(",\"Unknown\","));
        assert!(row.contains(",\"no\",\"Unlabeled\","));
    }

    #[test]
    fn export_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        export_csv(&path, &[sample(), sample()]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], CSV_HEADER);

        assert!(export_csv(&dir.path().join("empty.csv"), &[]).is_err());
    }

    #[test]
    fn default_name_embeds_timestamp() {
        let now = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(
            default_export_file_name(now),
            "validation_results_20250102_030405.csv"
        );
    }
}
