// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end extraction: background → mask → candidates → rectify → orient →
// persist, once per scan.

use std::path::Path;

use image::RgbImage;
use scanslice_core::config::{BackgroundConfig, ExtractConfig};
use scanslice_core::error::{Result, ScansliceError};
use scanslice_core::manifest::{CandidateFailure, OutputManifest, PhotoEntry};
use scanslice_core::types::ErrorClass;
use tracing::{info, instrument, warn};

use crate::background::estimate_background;
use crate::contours::extract_candidates;
use crate::debug;
use crate::mask::build_mask;
use crate::orient::{FaceDetector, OrientedPhoto, correct_orientation};
use crate::output;
use crate::rectify::{RectifiedPhoto, rectify};

/// Smallest side the segmentation stages can work with.
const MIN_SIDE: u32 = 3;

/// Extract every photograph from one flatbed scan.
///
/// Accepted photos are rectified, turned upright and written to
/// `config.output_dir` in descending-area order. A scan without photos
/// yields an empty manifest; candidates that fail to rectify are recorded in
/// `manifest.failures` and skipped.
#[instrument(skip_all, fields(width = scan.width(), height = scan.height()))]
pub fn extract_photos(
    scan: &RgbImage,
    config: &ExtractConfig,
    detector: Option<&dyn FaceDetector>,
) -> Result<OutputManifest> {
    config.validate()?;
    let (width, height) = scan.dimensions();
    if width == 0 || height == 0 {
        return Err(ScansliceError::Input(format!(
            "scan has zero pixels ({width}x{height})"
        )));
    }
    std::fs::create_dir_all(&config.output_dir)?;
    let stamp = output::timestamp();

    if let Err(err) = check_dimensions(scan, &config.background) {
        warn!(error = %err, "Treating the whole scan as a single photo");
        return whole_scan(scan, config, detector, &stamp);
    }

    let background = estimate_background(scan, &config.background)?;
    let masks = build_mask(scan, &background, &config.mask);
    let candidates = extract_candidates(&masks.mask, &config.contours);

    let mut manifest = OutputManifest::new(Some(background.clone()));
    manifest.rejected = candidates.iter().filter(|c| !c.is_accepted()).count();

    for candidate in candidates.iter().filter(|c| c.is_accepted()) {
        let rectified = rectify(scan, candidate, &background, &config.rectify);
        record_candidate(&mut manifest, candidate.index, rectified, config, &stamp, detector)?;
    }

    if config.debug {
        manifest.debug_artifacts =
            debug::write_artifacts(&config.output_dir, scan, &background, &masks, &candidates);
    }

    info!(
        photos = manifest.photos.len(),
        rejected = manifest.rejected,
        failed = manifest.failures.len(),
        output_dir = %config.output_dir.display(),
        "Extraction complete"
    );
    Ok(manifest)
}

/// Orient and save one rectified candidate.
///
/// A recoverable rectification error is recorded in `manifest.failures` and
/// the run goes on; anything else aborts it.
fn record_candidate(
    manifest: &mut OutputManifest,
    candidate: usize,
    rectified: Result<RectifiedPhoto>,
    config: &ExtractConfig,
    stamp: &str,
    detector: Option<&dyn FaceDetector>,
) -> Result<()> {
    let photo = match rectified {
        Ok(photo) => photo,
        Err(err) if err.class() == ErrorClass::Recoverable => {
            warn!(candidate, error = %err, "Skipping candidate");
            manifest.failures.push(CandidateFailure {
                candidate,
                reason: err.to_string(),
            });
            return Ok(());
        }
        Err(err) => return Err(err),
    };

    let oriented = correct_orientation(&photo, &config.orientation, detector);
    let entry = persist(config, stamp, manifest.photos.len() + 1, oriented)?;
    manifest.photos.push(entry);
    Ok(())
}

/// Decode an image file and run [`extract_photos`] on it.
pub fn extract_photos_from_path(
    path: impl AsRef<Path>,
    config: &ExtractConfig,
    detector: Option<&dyn FaceDetector>,
) -> Result<OutputManifest> {
    let path = path.as_ref();
    let scan = image::open(path)
        .map_err(|err| {
            ScansliceError::Input(format!("failed to decode scan {}: {err}", path.display()))
        })?
        .to_rgb8();
    info!(path = %path.display(), width = scan.width(), height = scan.height(), "Scan loaded");
    extract_photos(&scan, config, detector)
}

/// Reject scans too small for clustering and morphology.
fn check_dimensions(scan: &RgbImage, config: &BackgroundConfig) -> Result<()> {
    let (width, height) = scan.dimensions();
    let pixels = width as u64 * height as u64;
    if pixels < config.k_clusters as u64 {
        return Err(ScansliceError::DegenerateImage(format!(
            "{pixels} pixels for {} clusters",
            config.k_clusters
        )));
    }
    if width < MIN_SIDE || height < MIN_SIDE {
        return Err(ScansliceError::DegenerateImage(format!(
            "{width}x{height} is below the {MIN_SIDE}px minimum side"
        )));
    }
    Ok(())
}

/// Degenerate-scan fallback: the scan itself is the only photo.
fn whole_scan(
    scan: &RgbImage,
    config: &ExtractConfig,
    detector: Option<&dyn FaceDetector>,
    stamp: &str,
) -> Result<OutputManifest> {
    let photo = RectifiedPhoto {
        image: scan.clone(),
        candidate: 0,
    };
    let oriented = correct_orientation(&photo, &config.orientation, detector);
    let mut manifest = OutputManifest::new(None);
    manifest.photos.push(persist(config, stamp, 1, oriented)?);
    Ok(manifest)
}

fn persist(
    config: &ExtractConfig,
    stamp: &str,
    number: usize,
    oriented: OrientedPhoto,
) -> Result<PhotoEntry> {
    let path = output::persist_photo(
        &config.output_dir,
        stamp,
        number,
        &oriented.image,
        config.output_format,
        config.jpeg_quality,
    )?;
    Ok(PhotoEntry {
        path,
        candidate: oriented.candidate,
        width: oriented.image.width(),
        height: oriented.image.height(),
        rotation: oriented.rotation,
        method: oriented.method,
    })
}
