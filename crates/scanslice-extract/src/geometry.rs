// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Polygon helpers for contour analysis. Hull, Douglas-Peucker, perimeter and
// area come from `imageproc::geometry`; the minimum-area rectangle is computed
// here because imageproc rounds its corners to the pixel grid.

use imageproc::geometry::{approximate_polygon_dp, convex_hull};
use imageproc::point::Point as PixelPoint;
use scanslice_core::types::RotatedRect;

pub type Point = (f32, f32);

/// Minimum-area enclosing rectangle of contour points, using rotating
/// calipers over the convex hull. Center and sides keep sub-pixel precision.
///
/// The returned angle is normalised to (-45, 45] degrees, swapping width and
/// height as needed. Fewer than three distinct hull points fall back to the
/// axis-aligned bounding box.
pub fn min_area_rect(points: &[PixelPoint<i32>]) -> RotatedRect {
    let mut distinct = points.to_vec();
    distinct.sort_unstable_by_key(|p| (p.x, p.y));
    distinct.dedup();

    let hull: Vec<Point> = convex_hull(distinct)
        .into_iter()
        .map(|p| (p.x as f32, p.y as f32))
        .collect();
    if hull.len() < 3 {
        return bounding_rect(points);
    }

    let mut best: Option<(f32, RotatedRect)> = None;
    let n = hull.len();
    for i in 0..n {
        let a = hull[i];
        let b = hull[(i + 1) % n];
        let (ex, ey) = (b.0 - a.0, b.1 - a.1);
        let len = (ex * ex + ey * ey).sqrt();
        if len < f32::EPSILON {
            continue;
        }
        let (ux, uy) = (ex / len, ey / len);
        let (vx, vy) = (-uy, ux);

        let (mut min_u, mut max_u) = (f32::MAX, f32::MIN);
        let (mut min_v, mut max_v) = (f32::MAX, f32::MIN);
        for p in &hull {
            let (dx, dy) = (p.0 - a.0, p.1 - a.1);
            let pu = dx * ux + dy * uy;
            let pv = dx * vx + dy * vy;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let (width, height) = (max_u - min_u, max_v - min_v);
        let area = width * height;
        if best.as_ref().is_none_or(|(best_area, _)| area < *best_area) {
            let cu = (min_u + max_u) / 2.0;
            let cv = (min_v + max_v) / 2.0;
            best = Some((
                area,
                RotatedRect {
                    center: (a.0 + cu * ux + cv * vx, a.1 + cu * uy + cv * vy),
                    width,
                    height,
                    angle: uy.atan2(ux).to_degrees(),
                },
            ));
        }
    }

    match best {
        Some((_, rect)) => normalize_rect(rect),
        None => bounding_rect(points),
    }
}

/// Rotate the rectangle's frame by quarter turns until the angle is in (-45, 45].
pub fn normalize_rect(mut rect: RotatedRect) -> RotatedRect {
    while rect.angle > 45.0 {
        rect.angle -= 90.0;
        std::mem::swap(&mut rect.width, &mut rect.height);
    }
    while rect.angle <= -45.0 {
        rect.angle += 90.0;
        std::mem::swap(&mut rect.width, &mut rect.height);
    }
    rect
}

fn bounding_rect(points: &[PixelPoint<i32>]) -> RotatedRect {
    let (Some(min_x), Some(max_x)) = (
        points.iter().map(|p| p.x).min(),
        points.iter().map(|p| p.x).max(),
    ) else {
        return RotatedRect {
            center: (0.0, 0.0),
            width: 0.0,
            height: 0.0,
            angle: 0.0,
        };
    };
    let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
    let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
    RotatedRect {
        center: ((min_x + max_x) as f32 / 2.0, (min_y + max_y) as f32 / 2.0),
        width: (max_x - min_x) as f32,
        height: (max_y - min_y) as f32,
        angle: 0.0,
    }
}

/// Douglas-Peucker simplification of a closed contour.
///
/// The contour is split at the point farthest from the first one and each
/// half is simplified as an open chain, so the result does not depend on a
/// chord between two neighbouring points.
pub fn simplify_closed(points: &[PixelPoint<i32>], epsilon: f64) -> Vec<PixelPoint<i32>> {
    if points.len() < 3 || !(epsilon > 0.0) {
        return points.to_vec();
    }

    let start = points[0];
    let sq_dist = |p: &PixelPoint<i32>| {
        let (dx, dy) = ((p.x - start.x) as i64, (p.y - start.y) as i64);
        dx * dx + dy * dy
    };
    let (far, far_dist) = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, sq_dist(p)))
        .fold((0, 0), |acc, cur| if cur.1 > acc.1 { cur } else { acc });
    if far_dist == 0 {
        return vec![start];
    }

    let mut second: Vec<PixelPoint<i32>> = points[far..].to_vec();
    second.push(start);

    let mut first_half = approximate_polygon_dp(&points[..=far], epsilon, false);
    let mut second_half = approximate_polygon_dp(&second, epsilon, false);
    first_half.pop();
    second_half.pop();
    first_half.extend(second_half);
    first_half
}
