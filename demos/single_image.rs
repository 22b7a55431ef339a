//! Single Image Example
//!
//! This example classifies individual images with a trained SVM model and
//! prints the predicted defect category, the confidence and the stage timings.
//! With `--visualize-dir` a gradient visualization of every image is saved.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example single_image -- [OPTIONS] --model-path <MODEL> <IMAGES>...
//! ```
//!
//! # Example
//!
//! ```bash
//! cargo run --example single_image -- -m models/svm_brf.yml NEU/test/Crazing/crazing_1.bmp
//! ```

use clap::Parser;
use metal_defect::models::ClassifierModel;
use metal_defect::predictor::DefectDetector;
use metal_defect::utils::load_image;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Command-line arguments for the single image example
#[derive(Parser)]
#[command(name = "single_image")]
#[command(about = "Single Image Example - classifies surface defect images")]
struct Args {
    /// Path to the SVM model file
    #[arg(short, long)]
    model_path: PathBuf,

    /// Paths to input images to classify
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Directory to save gradient visualizations to
    #[arg(long)]
    visualize_dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    metal_defect::utils::init_tracing();
    let args = Args::parse();

    let model = Arc::new(ClassifierModel::from_path(&args.model_path)?);
    info!(
        "Loaded {} model with {} features",
        model.model_type(),
        model.var_count().unwrap_or(0)
    );
    for (name, value) in model.parameters() {
        info!("  {}: {}", name, value);
    }

    let detector = DefectDetector::new(Arc::clone(&model))
        .with_visualization(args.visualize_dir.is_some());
    if let Some(dir) = &args.visualize_dir {
        std::fs::create_dir_all(dir)?;
    }

    for path in &args.images {
        let image = match load_image(path) {
            Ok(image) => image,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                continue;
            }
        };

        let detection = match detector.detect_image(&image) {
            Ok(detection) => detection,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                continue;
            }
        };

        let classification = &detection.classification;
        println!(
            "{}: {} (class {}, {:.1}%)",
            path.display(),
            classification.label,
            classification.raw_class_id,
            classification.confidence * 100.0
        );
        info!(
            "  preprocess {:.2} ms, features {:.2} ms, classify {:.2} ms, total {:.2} ms",
            detection.preprocess_time.as_secs_f64() * 1000.0,
            detection.extraction.extraction_time.as_secs_f64() * 1000.0,
            classification.classify_time.as_secs_f64() * 1000.0,
            detection.total_time.as_secs_f64() * 1000.0
        );

        if let (Some(dir), Some(vis)) = (&args.visualize_dir, &detection.extraction.visualization) {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            let output = dir.join(format!("{}_gradients.png", stem));
            vis.save(&output)?;
            info!("  Saved: {}", output.display());
        }
    }

    Ok(())
}
