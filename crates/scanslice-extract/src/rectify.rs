// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective rectification — warp an accepted rotated rectangle into an
// upright crop, then trim the scanner-bed bleed left around the photo.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use imageproc::region_labelling::{Connectivity, connected_components};
use scanslice_core::config::RectifyConfig;
use scanslice_core::error::{Result, ScansliceError};
use scanslice_core::types::BackgroundColor;
use tracing::{debug, instrument};

use crate::contours::BlobCandidate;
use crate::geometry::Point;

/// An upright, cropped photograph cut out of the scan.
#[derive(Debug, Clone)]
pub struct RectifiedPhoto {
    pub image: RgbImage,
    /// Index of the source candidate.
    pub candidate: usize,
}

impl RectifiedPhoto {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Rectify one accepted candidate.
pub fn rectify(
    scan: &RgbImage,
    candidate: &BlobCandidate,
    background: &BackgroundColor,
    config: &RectifyConfig,
) -> Result<RectifiedPhoto> {
    let image = warp_quad(
        scan,
        candidate.corners,
        (candidate.rect.width, candidate.rect.height),
        background,
        config,
    )?;
    Ok(RectifiedPhoto {
        image,
        candidate: candidate.index,
    })
}

/// Map the quadrilateral `corners` (`[tl, tr, br, bl]`) onto an upright
/// `size` rectangle and trim the background bleed.
///
/// `corners` lie on the outer pixel edges of the region. They are pulled in
/// by half a pixel so the outermost pixel centres land on the first and last
/// output rows and columns.
///
/// Fails with `ScansliceError::Geometry` for a target under 2 px on a side
/// or a singular transform.
#[instrument(skip(scan, background, config), fields(w = size.0, h = size.1))]
pub fn warp_quad(
    scan: &RgbImage,
    corners: [Point; 4],
    size: (f32, f32),
    background: &BackgroundColor,
    config: &RectifyConfig,
) -> Result<RgbImage> {
    let out_w = size.0.round();
    let out_h = size.1.round();
    if !(out_w >= 2.0 && out_h >= 2.0) {
        return Err(ScansliceError::Geometry(format!(
            "degenerate rectangle {}x{}",
            size.0, size.1
        )));
    }
    let (out_w, out_h) = (out_w as u32, out_h as u32);

    if scan.width() == 0 || scan.height() == 0 {
        return Err(ScansliceError::Geometry("empty scan".into()));
    }

    let (window, (off_x, off_y)) = sampling_window(scan, &corners, background);
    let source = inset_half_pixel(corners).map(|(x, y)| (x - off_x, y - off_y));
    let (last_x, last_y) = ((out_w - 1) as f32, (out_h - 1) as f32);
    let dest: [Point; 4] = [(0.0, 0.0), (last_x, 0.0), (last_x, last_y), (0.0, last_y)];
    let projection = Projection::from_control_points(source, dest).ok_or_else(|| {
        ScansliceError::Geometry(format!("singular transform for corners {corners:?}"))
    })?;

    let mut warped = RgbImage::new(out_w, out_h);
    warp_into(
        &window,
        &projection,
        Interpolation::Bilinear,
        Rgb(background.rgb),
        &mut warped,
    );

    let mut photo = warped;
    if config.blind_margin_trim {
        let m = config.margin_px;
        photo = trim(&photo, m, m, m, m);
    }

    let trimmed = trim_bleed(&photo, background, config);
    debug!(
        warped_w = out_w,
        warped_h = out_h,
        out_w = trimmed.width(),
        out_h = trimmed.height(),
        "Candidate rectified"
    );
    Ok(trimmed)
}

/// Copy of the scan under `corners` plus a one-pixel ring of repeated edge
/// pixels, so bilinear sampling reaches the last scan row and column. Area
/// further outside the scan is bed colored.
///
/// Returns the window and its origin in scan coordinates.
fn sampling_window(
    scan: &RgbImage,
    corners: &[Point; 4],
    background: &BackgroundColor,
) -> (RgbImage, (f32, f32)) {
    let (w, h) = (scan.width() as i64, scan.height() as i64);
    let span = |axis: fn(&Point) -> f32| {
        let lo = corners.iter().map(axis).fold(f32::INFINITY, f32::min);
        let hi = corners.iter().map(axis).fold(f32::NEG_INFINITY, f32::max);
        (lo.floor() as i64 - 1, hi.ceil() as i64 + 2)
    };
    let (x0, x1) = span(|c| c.0);
    let (y0, y1) = span(|c| c.1);

    let window = RgbImage::from_fn((x1 - x0) as u32, (y1 - y0) as u32, |x, y| {
        let (sx, sy) = (x0 + x as i64, y0 + y as i64);
        if sx < -1 || sy < -1 || sx > w || sy > h {
            Rgb(background.rgb)
        } else {
            *scan.get_pixel(sx.clamp(0, w - 1) as u32, sy.clamp(0, h - 1) as u32)
        }
    });
    (window, (x0 as f32, y0 as f32))
}

/// Move each corner half a pixel along both of its edges, into the quad.
fn inset_half_pixel(corners: [Point; 4]) -> [Point; 4] {
    let toward = |from: Point, to: Point| {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let len = (dx * dx + dy * dy).sqrt();
        if len > f32::EPSILON {
            (0.5 * dx / len, 0.5 * dy / len)
        } else {
            (0.0, 0.0)
        }
    };
    let mut inset = corners;
    for (i, corner) in inset.iter_mut().enumerate() {
        let here = corners[i];
        let next = toward(here, corners[(i + 1) % 4]);
        let prev = toward(here, corners[(i + 3) % 4]);
        *corner = (here.0 + next.0 + prev.0, here.1 + next.1 + prev.1);
    }
    inset
}

/// Trim the residual background strip around the photo, at most
/// `margin_px` per side.
///
/// Pixels closer than `refine_threshold` to the background count as bed;
/// the bounding box of the largest remaining component is the photo.
pub fn trim_bleed(
    photo: &RgbImage,
    background: &BackgroundColor,
    config: &RectifyConfig,
) -> RgbImage {
    let Some((x0, y0, x1, y1)) =
        largest_foreground_bounds(photo, background, config.refine_threshold)
    else {
        debug!("No foreground inside crop; keeping it whole");
        return photo.clone();
    };

    let (w, h) = photo.dimensions();
    let m = config.margin_px;
    let left = x0.min(m);
    let top = y0.min(m);
    let right = (w - 1 - x1).min(m);
    let bottom = (h - 1 - y1).min(m);
    trim(photo, left, top, right, bottom)
}

/// Bounding box `(x0, y0, x1, y1)` (inclusive) of the largest 8-connected
/// region whose distance to the background exceeds `threshold`.
///
/// Interpolated border pixels of that region only count when they are at
/// least half as far from the background as its median pixel.
fn largest_foreground_bounds(
    photo: &RgbImage,
    background: &BackgroundColor,
    threshold: f32,
) -> Option<(u32, u32, u32, u32)> {
    let distances: Vec<f32> = photo.pixels().map(|p| background.distance(p.0)).collect();
    let width = photo.width() as usize;
    let strict = image::GrayImage::from_fn(photo.width(), photo.height(), |x, y| {
        let d = distances[y as usize * width + x as usize];
        image::Luma([if d > threshold { 255u8 } else { 0 }])
    });
    let labels = connected_components(&strict, Connectivity::Eight, image::Luma([0u8]));

    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    if max_label == 0 {
        return None;
    }
    let mut sizes = vec![0u64; max_label + 1];
    for p in labels.pixels() {
        sizes[p.0[0] as usize] += 1;
    }
    let largest = (1..=max_label).max_by_key(|l| (sizes[*l], std::cmp::Reverse(*l)))? as u32;

    let mut region: Vec<f32> = labels
        .pixels()
        .zip(&distances)
        .filter(|(label, _)| label.0[0] == largest)
        .map(|(_, d)| *d)
        .collect();
    let mid = region.len() / 2;
    let (_, median, _) = region.select_nth_unstable_by(mid, f32::total_cmp);
    let edge_threshold = threshold.max(*median * 0.5);

    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, label) in labels.enumerate_pixels() {
        let d = distances[y as usize * width + x as usize];
        if label.0[0] == largest && d >= edge_threshold {
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
    }
    (x0 <= x1 && y0 <= y1).then_some((x0, y0, x1, y1))
}

/// Crop the given amounts off each side, never below one pixel.
fn trim(photo: &RgbImage, left: u32, top: u32, right: u32, bottom: u32) -> RgbImage {
    let (w, h) = photo.dimensions();
    let left = left.min(w.saturating_sub(1));
    let top = top.min(h.saturating_sub(1));
    let new_w = w.saturating_sub(left + right).max(1).min(w - left);
    let new_h = h.saturating_sub(top + bottom).max(1).min(h - top);
    image::imageops::crop_imm(photo, left, top, new_w, new_h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use scanslice_core::types::{EstimationMethod, RotatedRect};

    fn bed(rgb: [u8; 3]) -> BackgroundColor {
        BackgroundColor {
            rgb,
            method: EstimationMethod::KMeans,
            support: 0.9,
        }
    }

    fn gradient_photo(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([
                (x * 255 / w.max(1)) as u8,
                (y * 255 / h.max(1)) as u8,
                ((x + y) % 64) as u8,
            ])
        })
    }

    fn rectify_rect(
        scan: &RgbImage,
        rect: RotatedRect,
        bg: &BackgroundColor,
        config: &RectifyConfig,
    ) -> Result<RgbImage> {
        warp_quad(scan, rect.corners(), (rect.width, rect.height), bg, config)
    }

    fn assert_close(a: &Rgb<u8>, b: &Rgb<u8>, tolerance: i16) {
        for c in 0..3 {
            assert!(
                (a.0[c] as i16 - b.0[c] as i16).abs() <= tolerance,
                "{a:?} vs {b:?}"
            );
        }
    }

    #[test]
    fn rectifying_an_upright_crop_is_idempotent() {
        let photo = gradient_photo(200, 150);
        let bg = bed([250, 250, 255]);
        let out = rectify_rect(
            &photo,
            RotatedRect::axis_aligned(200, 150),
            &bg,
            &RectifyConfig::default(),
        )
        .unwrap();

        assert_eq!(out.dimensions(), photo.dimensions());
        for (a, b) in out.pixels().zip(photo.pixels()) {
            assert_close(a, b, 1);
        }
    }

    #[test]
    fn outermost_pixels_are_sampled_from_the_scan() {
        let mut scan = RgbImage::from_pixel(40, 30, Rgb([10, 200, 10]));
        scan.put_pixel(0, 0, Rgb([200, 10, 10]));
        scan.put_pixel(39, 29, Rgb([10, 10, 200]));
        let out = rectify_rect(
            &scan,
            RotatedRect::axis_aligned(40, 30),
            &bed([255, 255, 255]),
            &RectifyConfig::default(),
        )
        .unwrap();

        assert_eq!(out.dimensions(), (40, 30));
        assert_close(out.get_pixel(0, 0), &Rgb([200, 10, 10]), 1);
        assert_close(out.get_pixel(39, 29), &Rgb([10, 10, 200]), 1);
        assert_close(out.get_pixel(39, 0), &Rgb([10, 200, 10]), 1);
    }

    #[test]
    fn background_strip_is_trimmed() {
        let mut scan = RgbImage::from_pixel(300, 200, Rgb([240, 240, 240]));
        draw_filled_rect_mut(
            &mut scan,
            Rect::at(56, 46).of_size(188, 108),
            Rgb([60, 80, 120]),
        );
        // pixels 50..=249 by 40..=159
        let rect = RotatedRect {
            center: (149.5, 99.5),
            width: 200.0,
            height: 120.0,
            angle: 0.0,
        };

        let out = rectify_rect(&scan, rect, &bed([240, 240, 240]), &RectifyConfig::default())
            .unwrap();
        assert_eq!(out.dimensions(), (188, 108));
        for p in out.pixels() {
            assert_close(p, &Rgb([60, 80, 120]), 1);
        }
    }

    #[test]
    fn bleed_trim_is_bounded_by_margin() {
        let mut scan = RgbImage::from_pixel(300, 200, Rgb([240, 240, 240]));
        draw_filled_rect_mut(
            &mut scan,
            Rect::at(70, 40).of_size(160, 120),
            Rgb([60, 80, 120]),
        );
        let rect = RotatedRect {
            center: (149.5, 99.5),
            width: 200.0,
            height: 120.0,
            angle: 0.0,
        };

        let out = rectify_rect(&scan, rect, &bed([240, 240, 240]), &RectifyConfig::default())
            .unwrap();
        // 20 px of bed on the left and right, only 10 px may go per side
        assert_eq!(out.dimensions(), (180, 120));
    }

    #[test]
    fn blind_trim_removes_fixed_margin() {
        let photo = gradient_photo(120, 90);
        let config = RectifyConfig {
            blind_margin_trim: true,
            ..RectifyConfig::default()
        };
        let out = rectify_rect(
            &photo,
            RotatedRect::axis_aligned(120, 90),
            &bed([0, 0, 255]),
            &config,
        )
        .unwrap();
        assert_eq!(out.dimensions(), (100, 70));
    }

    #[test]
    fn rotated_photo_is_deskewed() {
        let mut scan = RgbImage::from_pixel(400, 400, Rgb([240, 240, 240]));
        // the filled polygon covers its boundary, one pixel more per side
        let drawn = RotatedRect {
            center: (200.0, 200.0),
            width: 159.0,
            height: 219.0,
            angle: 12.0,
        };
        let poly: Vec<imageproc::point::Point<i32>> = drawn
            .corners()
            .iter()
            .map(|(x, y)| imageproc::point::Point::new(x.round() as i32, y.round() as i32))
            .collect();
        imageproc::drawing::draw_polygon_mut(&mut scan, &poly, Rgb([120, 120, 120]));

        let search = RotatedRect {
            width: 172.0,
            height: 232.0,
            ..drawn
        };
        let out = rectify_rect(&scan, search, &bed([240, 240, 240]), &RectifyConfig::default())
            .unwrap();
        assert!((out.width() as i32 - 160).abs() <= 2, "width {}", out.width());
        assert!((out.height() as i32 - 220).abs() <= 2, "height {}", out.height());
    }

    #[test]
    fn faint_interpolated_border_is_not_photo() {
        let mut photo = RgbImage::from_pixel(60, 40, Rgb([240, 240, 240]));
        draw_filled_rect_mut(&mut photo, Rect::at(5, 5).of_size(50, 30), Rgb([40, 40, 40]));
        // a one-pixel ring a quarter of the way from bed to photo
        for x in 4..56 {
            photo.put_pixel(x, 4, Rgb([190, 190, 190]));
            photo.put_pixel(x, 35, Rgb([190, 190, 190]));
        }
        for y in 4..36 {
            photo.put_pixel(4, y, Rgb([190, 190, 190]));
            photo.put_pixel(55, y, Rgb([190, 190, 190]));
        }

        let bounds = largest_foreground_bounds(&photo, &bed([240, 240, 240]), 20.0);
        assert_eq!(bounds, Some((5, 5, 54, 34)));
    }

    #[test]
    fn degenerate_rectangle_is_a_geometry_error() {
        let scan = RgbImage::new(50, 50);
        let rect = RotatedRect {
            center: (25.0, 25.0),
            width: 0.2,
            height: 30.0,
            angle: 0.0,
        };
        let err = rectify_rect(&scan, rect, &bed([0, 0, 0]), &RectifyConfig::default())
            .unwrap_err();
        assert!(matches!(err, ScansliceError::Geometry(_)));
    }

    #[test]
    fn trim_never_empties_the_image() {
        let img = RgbImage::new(5, 5);
        assert_eq!(trim(&img, 10, 10, 10, 10).dimensions(), (1, 1));
    }
}
