// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Candidate photo regions — external contours of the foreground mask, their
// minimum-area rotated rectangles, and the acceptance policy.

use image::GrayImage;
use imageproc::contours::{BorderType, find_contours};
use imageproc::geometry::{arc_length, contour_area};
use imageproc::point::Point as PixelPoint;
use scanslice_core::config::ContourConfig;
use scanslice_core::types::{RejectReason, RotatedRect, Verdict};
use tracing::{debug, info, instrument};

use crate::geometry::{self, Point};

/// A connected foreground region considered as a photograph.
#[derive(Debug, Clone)]
pub struct BlobCandidate {
    /// Position in descending-area order.
    pub index: usize,
    /// External contour, in scan pixel coordinates.
    pub polygon: Vec<Point>,
    /// Minimum-area rectangle covering the region's pixels.
    pub rect: RotatedRect,
    /// Rectangle corners `[tl, tr, br, bl]` after border inset and clamping.
    /// These are the source points for rectification.
    pub corners: [Point; 4],
    /// Rectangle area in whole pixels (the quantity the policy checks).
    pub area: u64,
    /// Shoelace area of the contour itself.
    pub contour_area: f32,
    /// Vertices left after Douglas-Peucker simplification.
    pub simplified_corners: usize,
    pub aspect_ratio: f32,
    pub verdict: Verdict,
}

impl BlobCandidate {
    pub fn is_accepted(&self) -> bool {
        self.verdict.is_accepted()
    }
}

/// Apply the acceptance policy. Checks run in order: corners, area, aspect
/// band; the first failing check names the rejection.
pub fn evaluate(
    simplified_corners: usize,
    area: u64,
    aspect_ratio: f32,
    config: &ContourConfig,
) -> Verdict {
    if simplified_corners < config.min_corners {
        return Verdict::Rejected(RejectReason::TooFewCorners(simplified_corners));
    }
    if area < config.min_area {
        return Verdict::Rejected(RejectReason::TooSmall(area));
    }
    let (lo, hi) = config.aspect_ratio_band;
    if !(lo..=hi).contains(&aspect_ratio) {
        return Verdict::Rejected(RejectReason::AspectRatio(aspect_ratio));
    }
    Verdict::Accepted
}

/// Find every external contour in the mask and classify it.
///
/// All candidates are returned (accepted and rejected), sorted by
/// descending rectangle area.
#[instrument(skip_all, fields(width = mask.width(), height = mask.height()))]
pub fn extract_candidates(mask: &GrayImage, config: &ContourConfig) -> Vec<BlobCandidate> {
    let (width, height) = mask.dimensions();
    let contours = find_contours::<i32>(mask);

    let mut candidates: Vec<BlobCandidate> = contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| analyse(&c.points, width, height, config))
        .collect();

    candidates.sort_by(|a, b| b.area.cmp(&a.area));
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.index = i;
        debug!(
            index = i,
            area = candidate.area,
            contour_area = candidate.contour_area,
            aspect_ratio = candidate.aspect_ratio,
            angle = candidate.rect.angle,
            corners = candidate.simplified_corners,
            verdict = ?candidate.verdict,
            "Contour analysed"
        );
    }

    let accepted = candidates.iter().filter(|c| c.is_accepted()).count();
    info!(total = candidates.len(), accepted, "Contours classified");
    candidates
}

fn analyse(
    points: &[PixelPoint<i32>],
    width: u32,
    height: u32,
    config: &ContourConfig,
) -> BlobCandidate {
    let mut rect = geometry::min_area_rect(points);
    // Contour points are pixel centres; the region covers half a pixel more
    // on every side.
    rect.width += 1.0;
    rect.height += 1.0;

    let epsilon = config.simplify_epsilon as f64 * arc_length(points, true);
    let simplified_corners = geometry::simplify_closed(points, epsilon).len();
    let contour_area = contour_area(points) as f32;
    let polygon: Vec<Point> = points.iter().map(|p| (p.x as f32, p.y as f32)).collect();
    let area = rect.area();
    let aspect_ratio = rect.aspect_ratio();
    let verdict = evaluate(simplified_corners, area, aspect_ratio, config);
    let corners = fit_corners(rect.corners(), width, height, config);

    BlobCandidate {
        index: 0,
        polygon,
        rect,
        corners,
        area,
        contour_area,
        simplified_corners,
        aspect_ratio,
        verdict,
    }
}

/// Inset corners that sit on the scan frame (the contour was probably
/// truncated there), then clamp everything inside the image.
pub fn fit_corners(
    corners: [Point; 4],
    width: u32,
    height: u32,
    config: &ContourConfig,
) -> [Point; 4] {
    let (w, h) = (width as f32, height as f32);
    let touch = (w * config.edge_touch_fraction).max(1.0);
    let inset = config.edge_inset_px;
    let margin = config.clamp_margin_px;

    corners.map(|(mut x, mut y)| {
        if x <= touch {
            x += inset;
        } else if x >= w - touch {
            x -= inset;
        }
        if y <= touch {
            y += inset;
        } else if y >= h - touch {
            y -= inset;
        }
        (
            x.clamp(margin.min(w / 2.0), (w - margin).max(w / 2.0)),
            y.clamp(margin.min(h / 2.0), (h - margin).max(h / 2.0)),
        )
    })
}
