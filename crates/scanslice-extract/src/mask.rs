// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Foreground mask construction — color distance thresholding against the
// estimated background, optional Canny/Hough edge cues, border suppression,
// morphological merging and small-blob removal.

use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_line_segment_mut;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::hough::{LineDetectionOptions, PolarLine, detect_lines};
use imageproc::morphology::{close, dilate};
use imageproc::region_labelling::{Connectivity, connected_components};
use scanslice_core::config::{EdgeConfig, MaskConfig};
use scanslice_core::types::BackgroundColor;
use tracing::{debug, info, instrument};

const FOREGROUND: Luma<u8> = Luma([255u8]);

/// Binary foreground mask plus the edge map that fed into it, if any.
pub struct MaskOutput {
    /// 255 = photo, 0 = scanner bed. Same dimensions as the scan.
    pub mask: GrayImage,
    /// Completed edge map (only with `use_edge_mask`).
    pub edges: Option<GrayImage>,
}

/// Build the cleaned foreground mask for a scan.
#[instrument(
    skip_all,
    fields(width = scan.width(), height = scan.height(), edges = config.use_edge_mask)
)]
pub fn build_mask(
    scan: &RgbImage,
    background: &BackgroundColor,
    config: &MaskConfig,
) -> MaskOutput {
    let mut mask = color_mask(scan, background, config.color_threshold);
    debug!(
        foreground = count_foreground(&mask),
        threshold = config.color_threshold,
        "Color distance mask computed"
    );

    let edges = if config.use_edge_mask {
        let edges = edge_mask(scan, &config.edges);
        for (m, e) in mask.pixels_mut().zip(edges.pixels()) {
            m.0[0] = m.0[0].max(e.0[0]);
        }
        debug!(foreground = count_foreground(&mask), "Edge mask merged");
        Some(edges)
    } else {
        None
    };

    clear_border(&mut mask, config.border_fraction);

    let radius = config.kernel_size / 2;
    if radius > 0 {
        for _ in 0..config.dilate_iterations {
            mask = dilate(&mask, Norm::LInf, radius);
        }
        mask = close(&mask, Norm::LInf, radius);
    }

    let (width, height) = mask.dimensions();
    let min_pixels =
        (width as f64 * height as f64 * config.min_component_fraction as f64).ceil() as u32;
    let dropped = remove_small_components(&mut mask, min_pixels);

    info!(
        foreground = count_foreground(&mask),
        dropped,
        min_pixels,
        "Foreground mask built"
    );

    MaskOutput { mask, edges }
}

/// Pixels whose RGB distance to the background exceeds `threshold`.
pub fn color_mask(scan: &RgbImage, background: &BackgroundColor, threshold: f32) -> GrayImage {
    GrayImage::from_fn(scan.width(), scan.height(), |x, y| {
        if background.distance(scan.get_pixel(x, y).0) > threshold {
            FOREGROUND
        } else {
            Luma([0u8])
        }
    })
}

/// Canny edges with faint straight borders completed along Hough lines.
pub fn edge_mask(scan: &RgbImage, config: &EdgeConfig) -> GrayImage {
    let gray = image::imageops::grayscale(scan);
    let blurred = gaussian_blur_f32(&gray, config.blur_sigma);
    let edges = canny(&blurred, config.canny_low, config.canny_high);

    let options = LineDetectionOptions {
        vote_threshold: config.vote_threshold,
        suppression_radius: 8,
    };
    let lines = detect_lines(&edges, options);
    debug!(line_count = lines.len(), "Hough lines detected");

    complete_lines(&edges, &lines, config.min_line_length, config.max_line_gap)
}

/// Walk each line across the edge map and redraw the stretches that have
/// edge support, bridging gaps up to `max_gap` pixels. Stretches shorter
/// than `min_length` are left alone.
pub fn complete_lines(
    edges: &GrayImage,
    lines: &[PolarLine],
    min_length: u32,
    max_gap: u32,
) -> GrayImage {
    let mut completed = edges.clone();
    let (width, height) = edges.dimensions();
    let diagonal = ((width as f32).powi(2) + (height as f32).powi(2)).sqrt().ceil() as i32;

    for line in lines {
        let theta = (line.angle_in_degrees as f32).to_radians();
        let (sin, cos) = theta.sin_cos();
        let origin = (line.r * cos, line.r * sin);
        let at = |t: i32| (origin.0 - t as f32 * sin, origin.1 + t as f32 * cos);

        let mut run: Option<(i32, i32)> = None;
        let mut segments = Vec::new();
        for t in -diagonal..=diagonal {
            let (px, py) = at(t);
            if !has_edge_near(edges, px, py) {
                continue;
            }
            run = match run {
                Some((start, last)) if t - last <= max_gap as i32 => Some((start, t)),
                Some(done) => {
                    segments.push(done);
                    Some((t, t))
                }
                None => Some((t, t)),
            };
        }
        segments.extend(run);

        for (start, end) in segments {
            if (end - start) as u32 >= min_length {
                draw_line_segment_mut(&mut completed, at(start), at(end), FOREGROUND);
            }
        }
    }

    completed
}

fn has_edge_near(edges: &GrayImage, x: f32, y: f32) -> bool {
    let (cx, cy) = (x.round() as i64, y.round() as i64);
    let (width, height) = (edges.width() as i64, edges.height() as i64);
    for dy in -1..=1 {
        for dx in -1..=1 {
            let (nx, ny) = (cx + dx, cy + dy);
            if nx >= 0
                && ny >= 0
                && nx < width
                && ny < height
                && edges.get_pixel(nx as u32, ny as u32).0[0] > 0
            {
                return true;
            }
        }
    }
    false
}

/// Zero a band of `fraction` x dimension along every edge of the mask.
pub fn clear_border(mask: &mut GrayImage, fraction: f32) {
    let (width, height) = mask.dimensions();
    let bx = ((width as f32 * fraction).ceil() as u32).min(width);
    let by = ((height as f32 * fraction).ceil() as u32).min(height);
    for (x, y, pixel) in mask.enumerate_pixels_mut() {
        if x < bx || y < by || x >= width - bx || y >= height - by {
            pixel.0[0] = 0;
        }
    }
}

/// Erase 8-connected foreground components with fewer than `min_pixels`
/// pixels. Returns how many components were erased.
pub fn remove_small_components(mask: &mut GrayImage, min_pixels: u32) -> usize {
    let labels = connected_components(&*mask, Connectivity::Eight, Luma([0u8]));
    let max_label = labels.pixels().map(|p| p.0[0]).max().unwrap_or(0) as usize;
    let mut sizes = vec![0u32; max_label + 1];
    for p in labels.pixels() {
        sizes[p.0[0] as usize] += 1;
    }

    for (pixel, label) in mask.pixels_mut().zip(labels.pixels()) {
        let label = label.0[0] as usize;
        if label != 0 && sizes[label] < min_pixels {
            pixel.0[0] = 0;
        }
    }

    sizes
        .iter()
        .skip(1)
        .filter(|size| **size > 0 && **size < min_pixels)
        .count()
}

fn count_foreground(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p.0[0] > 0).count()
}
