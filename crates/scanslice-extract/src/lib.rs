// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanslice-extract — Photo extraction for Scanslice.
//
// Splits a flatbed scan holding several photographs into individual files:
// background color estimation (k-means), foreground masking (color distance,
// optional Canny/Hough edges, morphology), contour analysis with rotated
// rectangles, perspective rectification, orientation correction (SeetaFace
// or any pluggable face detector, with an entropy fallback) and persistence.

pub mod background;
pub mod contours;
pub mod debug;
pub mod face;
pub mod geometry;
pub mod mask;
pub mod orient;
pub mod output;
pub mod pipeline;
pub mod rectify;
pub mod worker;

// Re-export the entry points so callers can use `scanslice_extract::extract_photos` etc.
pub use background::estimate_background;
pub use contours::{BlobCandidate, extract_candidates};
pub use face::{SeetaFaceDetector, detector_from_config};
pub use mask::{MaskOutput, build_mask};
pub use orient::{FaceBox, FaceDetector, OrientedPhoto, correct_orientation};
pub use pipeline::{extract_photos, extract_photos_from_path};
pub use rectify::{RectifiedPhoto, rectify};
pub use worker::extract_photos_async;
