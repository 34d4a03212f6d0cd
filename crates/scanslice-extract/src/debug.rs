// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Diagnostic images for tuning the pipeline. Written only when the debug flag
// is set; a failed write is logged and never fails the run.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use scanslice_core::types::BackgroundColor;
use tracing::{debug, warn};

use crate::contours::BlobCandidate;
use crate::geometry::Point;
use crate::mask::MaskOutput;

pub const BACKGROUND_FILE: &str = "debug_background.jpg";
pub const MASK_FILE: &str = "debug_mask.png";
pub const EDGES_FILE: &str = "debug_edges.png";
pub const CONTOURS_FILE: &str = "debug_contours.jpg";

const CONTOUR_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const ACCEPTED_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const REJECTED_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
const SWATCH_SIZE: u32 = 128;

/// Write every diagnostic image into `dir` and return the paths that were
/// actually written.
pub fn write_artifacts(
    dir: &Path,
    scan: &RgbImage,
    background: &BackgroundColor,
    masks: &MaskOutput,
    candidates: &[BlobCandidate],
) -> Vec<PathBuf> {
    let mut written = Vec::new();

    let swatch = RgbImage::from_pixel(SWATCH_SIZE, SWATCH_SIZE, Rgb(background.rgb));
    save(&swatch, dir.join(BACKGROUND_FILE), &mut written);
    save(&masks.mask, dir.join(MASK_FILE), &mut written);
    if let Some(edges) = &masks.edges {
        save(edges, dir.join(EDGES_FILE), &mut written);
    }
    save(&contour_overlay(scan, candidates), dir.join(CONTOURS_FILE), &mut written);

    debug!(count = written.len(), "Debug artifacts written");
    written
}

/// The scan with every contour in red and each candidate rectangle in green
/// (accepted) or yellow (rejected).
pub fn contour_overlay(scan: &RgbImage, candidates: &[BlobCandidate]) -> RgbImage {
    let mut canvas = scan.clone();
    for candidate in candidates {
        draw_closed(&mut canvas, &candidate.polygon, CONTOUR_COLOR);
    }
    for candidate in candidates {
        let color = if candidate.is_accepted() {
            ACCEPTED_COLOR
        } else {
            REJECTED_COLOR
        };
        draw_closed(&mut canvas, &candidate.rect.corners(), color);
    }
    canvas
}

fn draw_closed(canvas: &mut RgbImage, points: &[Point], color: Rgb<u8>) {
    let n = points.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        draw_line_segment_mut(canvas, points[i], points[(i + 1) % n], color);
    }
}

fn save<P>(image: &image::ImageBuffer<P, Vec<u8>>, path: PathBuf, written: &mut Vec<PathBuf>)
where
    P: image::PixelWithColorType<Subpixel = u8>,
{
    match image.save(&path) {
        Ok(()) => written.push(path),
        Err(err) => warn!(path = %path.display(), error = %err, "Failed to write debug image"),
    }
}
