//! Batch Validation Example
//!
//! This example validates a classifier model against a labeled dataset. Images
//! are expected under `<dataset>/<Category>/*.bmp`; the category directory name
//! is the ground truth. Progress is logged while the workers run, and a report
//! plus an optional CSV export are produced at the end.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example batch_validation -- [OPTIONS] --model-path <MODEL> <DATASET>
//! ```
//!
//! # Arguments
//!
//! * `-m, --model-path` - Path to the SVM model file (OpenCV YAML)
//! * `-s, --split` - Dataset split to use when `<DATASET>` has `valid/` and `test/`
//! * `-w, --workers` - Number of worker threads
//! * `-o, --output` - CSV file to export the per-image results to
//! * `<DATASET>` - Dataset directory
//!
//! # Example
//!
//! ```bash
//! cargo run --example batch_validation -- -m models/svm_brf.yml -s test -o results.csv NEU/
//! ```

use clap::Parser;
use metal_defect::core::BatchConfig;
use metal_defect::models::ClassifierModel;
use metal_defect::pipeline::{BatchCoordinator, BatchEvent, BatchReport};
use metal_defect::utils::{DatasetSplit, default_export_file_name, export_csv, has_standard_splits};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Command-line arguments for the batch validation example
#[derive(Parser)]
#[command(name = "batch_validation")]
#[command(about = "Batch Validation Example - evaluates a defect classifier on a dataset")]
struct Args {
    /// Path to the SVM model file
    #[arg(short, long)]
    model_path: PathBuf,

    /// Dataset directory, either a split directory or a root with valid/ and test/
    dataset: PathBuf,

    /// Split to evaluate when the dataset root has valid/ and test/ (valid or test)
    #[arg(short, long, default_value = "test")]
    split: String,

    /// Number of worker threads (default: available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// CSV file to export results to; a directory gets a timestamped file name
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log every result as it arrives
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    metal_defect::utils::init_tracing();
    let args = Args::parse();

    info!("Batch Validation Example");

    let dataset_dir = if has_standard_splits(&args.dataset) {
        let split = match args.split.to_lowercase().as_str() {
            "valid" => DatasetSplit::Valid,
            "test" => DatasetSplit::Test,
            other => return Err(format!("Unknown split '{}', use valid or test", other).into()),
        };
        info!("Using the {} split", split);
        split.resolve(&args.dataset)?
    } else {
        args.dataset.clone()
    };

    let config = BatchConfig::new().with_worker_count(args.workers);
    info!("Workers: {}", config.effective_worker_count());

    let coordinator = BatchCoordinator::with_config(Arc::new(ClassifierModel::new()), config);
    let start = Instant::now();
    let run = coordinator.start(&dataset_dir, &args.model_path)?;
    info!(
        "Validating {} images from {}",
        run.total(),
        dataset_dir.display()
    );

    let step = (run.total() / 20).max(1);
    for event in run.events() {
        match event {
            BatchEvent::Progress { current, total, .. } => {
                if current % step == 0 || current == total {
                    info!("Progress: {}/{}", current, total);
                }
            }
            BatchEvent::Result(result) => {
                if !result.processing_success {
                    warn!(
                        "{}: {}",
                        result.image_name,
                        result.error_message.as_deref().unwrap_or("failed")
                    );
                } else if args.verbose {
                    info!(
                        "{}: {} -> {} ({:.1}%)",
                        result.image_name,
                        result.true_label,
                        result.predict_label,
                        result.confidence * 100.0
                    );
                }
            }
            BatchEvent::Completed(_) => {
                info!("Batch validation completed");
                break;
            }
            BatchEvent::Stopped(_) => {
                warn!("Batch validation stopped");
                break;
            }
            BatchEvent::Error(message) => {
                error!("Batch validation failed: {}", message);
                break;
            }
        }
    }

    let outcome = run.wait();
    let report = BatchReport::from_results(&outcome.results, start.elapsed());
    println!("{}", report);

    if let Some(output) = args.output {
        let path = if output.is_dir() {
            output.join(default_export_file_name(chrono::Local::now()))
        } else {
            output
        };
        export_csv(&path, &outcome.results)?;
        info!("Results exported to {}", path.display());
    }

    Ok(())
}
