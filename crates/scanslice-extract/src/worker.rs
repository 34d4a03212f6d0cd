// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async entry point. Extraction is CPU-bound, so it runs on tokio's blocking
// pool and the manifest is delivered as the single awaited result.

use std::sync::Arc;

use image::RgbImage;
use scanslice_core::config::ExtractConfig;
use scanslice_core::error::{Result, ScansliceError};
use scanslice_core::manifest::OutputManifest;
use tracing::{debug, error};

use crate::orient::FaceDetector;
use crate::pipeline::extract_photos;

/// Run [`extract_photos`] off the async runtime's worker threads.
///
/// A panicking or cancelled task is reported as `ScansliceError::Worker`.
pub async fn extract_photos_async(
    scan: RgbImage,
    config: ExtractConfig,
    detector: Option<Arc<dyn FaceDetector>>,
) -> Result<OutputManifest> {
    debug!(
        width = scan.width(),
        height = scan.height(),
        "Dispatching extraction to blocking pool"
    );
    tokio::task::spawn_blocking(move || extract_photos(&scan, &config, detector.as_deref()))
        .await
        .map_err(|err| {
            error!(error = %err, "Extraction task failed");
            ScansliceError::Worker(err.to_string())
        })?
}
