// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanslice — split a flatbed scan into individual photo files.
//
// Entry point. Initialises logging, builds the extraction config from an
// optional JSON file plus flags, runs the extractor on the blocking pool and
// prints the paths of the saved photos.

mod data_dir;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use scanslice_core::config::ExtractConfig;
use scanslice_core::error::{Result, ScansliceError};
use scanslice_core::human_errors::humanize_error;
use scanslice_core::types::{DetectionMode, OutputFormat};

const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Parser)]
#[command(name = "scanslice", version)]
#[command(about = "Split a flatbed scan of several photographs into upright photo files")]
struct Cli {
    /// Scanned image (JPEG, PNG, TIFF, ...)
    #[arg(value_name = "SCAN")]
    scan: PathBuf,

    /// Output directory (default: ~/.local/share/scanslice/crops)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// JSON config file; missing keys keep their defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Minimum-area preset
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Minimum photo area in square pixels (overrides --mode)
    #[arg(long, value_name = "N")]
    min_area: Option<u64>,

    /// Color distance from the background that counts as photo
    #[arg(long, value_name = "T")]
    threshold: Option<f32>,

    /// Seed for background sampling
    #[arg(long, value_name = "N")]
    seed: Option<u64>,

    /// SeetaFace frontal-face model used to turn photos upright
    #[arg(long, value_name = "FILE")]
    face_model: Option<PathBuf>,

    /// Add Canny/Hough edge cues to the mask (photos close to the bed color)
    #[arg(long)]
    edge_mask: bool,

    /// Write diagnostic images to the output directory
    #[arg(long)]
    debug: bool,

    /// Save photos as PNG instead of JPEG
    #[arg(long)]
    png: bool,

    /// Do not write manifest.json
    #[arg(long)]
    no_manifest: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Sensitive,
    Balanced,
    Strict,
}

impl From<Mode> for DetectionMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Sensitive => DetectionMode::Sensitive,
            Mode::Balanced => DetectionMode::Balanced,
            Mode::Strict => DetectionMode::Strict,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!(scan = %cli.scan.display(), "Scanslice starting");

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Extraction failed");
            let human = humanize_error(&err);
            eprintln!("{}\n  {}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;
    config.validate()?;

    let detector = scanslice_extract::detector_from_config(&config.orientation)?;
    let scan = image_from(cli)?;
    let output_dir = config.output_dir.clone();
    let manifest = scanslice_extract::extract_photos_async(scan, config, detector).await?;

    if !cli.no_manifest {
        let path = output_dir.join(MANIFEST_FILE);
        manifest.write_json(&path)?;
        tracing::info!(path = %path.display(), "Manifest written");
    }

    if manifest.is_empty() {
        tracing::warn!("No photos found in scan");
    }
    for path in manifest.paths() {
        println!("{}", path.display());
    }
    Ok(())
}

fn image_from(cli: &Cli) -> Result<image::RgbImage> {
    let decoded = image::open(&cli.scan).map_err(|err| {
        ScansliceError::Input(format!("failed to decode scan {}: {err}", cli.scan.display()))
    })?;
    Ok(decoded.to_rgb8())
}

/// Defaults (output in the data dir), then config file, then preset, then
/// individual flags.
fn build_config(cli: &Cli) -> Result<ExtractConfig> {
    let base = ExtractConfig {
        output_dir: data_dir::default_output_dir(),
        ..ExtractConfig::default()
    };
    let mut config = match &cli.config {
        Some(path) => ExtractConfig::from_json_file_over(path, &base)?,
        None => base,
    };

    if let Some(mode) = cli.mode {
        config.contours.min_area = DetectionMode::from(mode).min_area();
    }
    if let Some(min_area) = cli.min_area {
        config.contours.min_area = min_area;
    }
    if let Some(threshold) = cli.threshold {
        config.mask.color_threshold = threshold;
    }
    if let Some(seed) = cli.seed {
        config.background.seed = seed;
    }
    if let Some(output) = &cli.output {
        config.output_dir = output.clone();
    }
    if let Some(model) = &cli.face_model {
        config.orientation.face_model = Some(model.clone());
    }
    config.mask.use_edge_mask |= cli.edge_mask;
    config.debug |= cli.debug;
    if cli.png {
        config.output_format = OutputFormat::Png;
    }
    Ok(config)
}
