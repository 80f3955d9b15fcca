//! kasane-bench: CLI tool for pipeline experimentation and diagnostics.
//!
//! Loads an image, applies a pipeline described as a JSON array of
//! operations, and prints a per-step timing report. When the pipeline
//! ends in a binary mask, `--rois` extracts regions of interest and
//! tabulates their descriptors. Useful for:
//!
//! - Tuning thresholds and morphology radii against real images
//! - Measuring per-step durations to identify expensive operations
//! - Inspecting ROI descriptor values outside the GUI
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin kasane-bench -- <IMAGE_PATH> --pipeline steps.json [--rois]
//! ```
//!
//! where `steps.json` holds an array of operations, e.g.:
//!
//! ```json
//! [
//!   {"type": "grey"},
//!   {"type": "gaussian-blur", "sigma": 1.4},
//!   {"type": "threshold", "value": 128},
//!   {"type": "open", "radius": 1}
//! ]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use kasane_pipeline::ops::OperationKind;
use kasane_roi::extract::{ExtractOptions, MaskPolarity};
use kasane_roi::roi::Roi;
use kasane_session::Workspace;

/// Which mask value counts as foreground during ROI extraction.
#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Polarity {
    /// Nonzero mask pixels are foreground.
    Bright,
    /// Zero mask pixels are foreground.
    Dark,
}

impl From<Polarity> for MaskPolarity {
    fn from(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Bright => Self::Bright,
            Polarity::Dark => Self::Dark,
        }
    }
}

/// Pipeline experimentation and diagnostics for kasane.
///
/// Applies a JSON-described pipeline to an image and prints per-step
/// timing diagnostics, optionally followed by an ROI table.
#[derive(Parser)]
#[command(name = "kasane-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Path to the pipeline description: a JSON array of operations.
    #[arg(long)]
    pipeline: PathBuf,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Extract ROIs from the final mask and print their descriptors.
    #[arg(long)]
    rois: bool,

    /// Discard ROIs with a smaller surface (inclusive).
    #[arg(long)]
    min_surface: Option<u32>,

    /// Discard ROIs with a larger surface (inclusive).
    #[arg(long)]
    max_surface: Option<u32>,

    /// Which mask value counts as foreground during extraction.
    #[arg(long, value_enum, default_value_t = Polarity::Bright)]
    polarity: Polarity,
}

/// Parse a pipeline description from JSON.
fn parse_pipeline(json: &str) -> Result<Vec<OperationKind>, String> {
    serde_json::from_str(json).map_err(|e| format!("Error parsing pipeline JSON: {e}"))
}

/// Render ROI descriptors as an aligned table.
fn roi_table(rois: &[Roi]) -> String {
    let mut lines = Vec::with_capacity(rois.len() + 2);
    lines.push(format!(
        "{:>4} {:>5} {:>5} {:>5} {:>5} {:>8} {:>9} {:>9} {:>7} {:>7} {:>7}",
        "id", "x", "y", "w", "h", "surface", "feretMin", "feretMax", "round", "solid", "fill",
    ));
    lines.push("-".repeat(82));
    for roi in rois {
        lines.push(format!(
            "{:>4} {:>5} {:>5} {:>5} {:>5} {:>8} {:>9.2} {:>9.2} {:>7.3} {:>7.3} {:>7.3}",
            roi.id,
            roi.column,
            roi.row,
            roi.width,
            roi.height,
            roi.surface,
            roi.feret_min,
            roi.feret_max,
            roi.roundness,
            roi.solidity,
            roi.fill_ratio,
        ));
    }
    lines.join("\n")
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let image = match image::open(&cli.image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    let pipeline_json = match std::fs::read_to_string(&cli.pipeline) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.pipeline.display());
            return ExitCode::FAILURE;
        }
    };
    let kinds = match parse_pipeline(&pipeline_json) {
        Ok(kinds) => kinds,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let mut workspace = Workspace::new();
    let id = workspace.load_image(image);
    for kind in kinds {
        if let Err(e) = workspace.append_operation(id, kind) {
            eprintln!("Error building pipeline: {e}");
            return ExitCode::FAILURE;
        }
    }

    let diagnostics = match workspace.diagnostics(id) {
        Ok(diagnostics) => diagnostics,
        Err(e) => {
            eprintln!("Error collecting diagnostics: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&diagnostics) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing diagnostics: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", diagnostics.report());
    }

    if diagnostics.failure.is_some() {
        return ExitCode::FAILURE;
    }

    if cli.rois {
        let options = ExtractOptions {
            polarity: cli.polarity.into(),
            min_surface: cli.min_surface,
            max_surface: cli.max_surface,
        };
        match workspace.extract_rois(id, &options) {
            Ok(count) => {
                println!();
                println!("{count} ROI(s)");
                match workspace.rois(id) {
                    Ok(rois) => println!("{}", roi_table(rois)),
                    Err(e) => {
                        eprintln!("Error listing ROIs: {e}");
                        return ExitCode::FAILURE;
                    }
                }
            }
            Err(e) => {
                eprintln!("Error extracting ROIs: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
