// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frontal face detection backed by the SeetaFace cascade in `rustface`.

use std::path::Path;
use std::sync::Arc;

use image::GrayImage;
use rustface::ImageData;
use scanslice_core::config::OrientConfig;
use scanslice_core::error::{Result, ScansliceError};
use tracing::{info, warn};

use crate::orient::{FaceBox, FaceDetector};

/// [`FaceDetector`] running a SeetaFace funnel-structured cascade.
///
/// The model is parsed once on load to validate it. `rustface` detectors are
/// stateful and not `Sync`, so each call builds its own from the kept bytes.
pub struct SeetaFaceDetector {
    model: Vec<u8>,
    min_face_size: u32,
    score_threshold: f64,
}

impl SeetaFaceDetector {
    /// Load a SeetaFace model file (e.g. `seeta_fd_frontal_v1.0.bin`).
    pub fn from_file(
        path: impl AsRef<Path>,
        min_face_size: u32,
        score_threshold: f64,
    ) -> Result<Self> {
        let path = path.as_ref();
        let model = std::fs::read(path).map_err(|err| {
            ScansliceError::Config(format!("cannot read face model {}: {err}", path.display()))
        })?;
        rustface::read_model(model.as_slice()).map_err(|err| {
            ScansliceError::Config(format!("invalid face model {}: {err}", path.display()))
        })?;
        info!(path = %path.display(), bytes = model.len(), "Face model loaded");
        Ok(Self {
            model,
            min_face_size,
            score_threshold,
        })
    }
}

impl FaceDetector for SeetaFaceDetector {
    fn detect(&self, gray: &GrayImage) -> Vec<FaceBox> {
        let model = match rustface::read_model(self.model.as_slice()) {
            Ok(model) => model,
            Err(err) => {
                warn!(error = %err, "Face model could not be parsed");
                return Vec::new();
            }
        };
        let mut detector = rustface::create_detector_with_model(model);
        detector.set_min_face_size(self.min_face_size);
        detector.set_score_thresh(self.score_threshold);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        let mut image = ImageData::new(gray.as_raw(), gray.width(), gray.height());
        detector
            .detect(&mut image)
            .into_iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBox {
                    x: bbox.x() as f32,
                    y: bbox.y() as f32,
                    width: bbox.width() as f32,
                    height: bbox.height() as f32,
                    confidence: face.score() as f32,
                }
            })
            .collect()
    }
}

/// The detector named by `config.face_model`, if any.
///
/// A configured model that cannot be loaded is a `Config` error rather than
/// a silent fall back to entropy.
pub fn detector_from_config(config: &OrientConfig) -> Result<Option<Arc<dyn FaceDetector>>> {
    let Some(path) = &config.face_model else {
        info!("No face model configured; orientation uses the entropy fallback");
        return Ok(None);
    };
    let detector =
        SeetaFaceDetector::from_file(path, config.face_min_size, config.face_score_threshold)?;
    Ok(Some(Arc::new(detector)))
}
