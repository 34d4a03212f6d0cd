// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the scanslice-extract crate. Covers the two stages
// that dominate a real scan (background clustering and mask construction)
// and the full pipeline on a small synthetic scan.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use scanslice_core::config::{BackgroundConfig, ExtractConfig, MaskConfig};
use scanslice_core::types::DetectionMode;
use scanslice_extract::{build_mask, estimate_background, extract_photos};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// 1200x900 off-white bed with three photos of different tones.
fn synthetic_scan() -> RgbImage {
    let mut scan = RgbImage::from_pixel(1200, 900, Rgb([245, 245, 240]));
    draw_filled_rect_mut(&mut scan, Rect::at(80, 80).of_size(400, 300), Rgb([120, 90, 60]));
    draw_filled_rect_mut(&mut scan, Rect::at(600, 120).of_size(300, 420), Rgb([40, 70, 130]));
    draw_filled_rect_mut(&mut scan, Rect::at(150, 520).of_size(350, 260), Rgb([90, 90, 90]));
    scan
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_background(c: &mut Criterion) {
    let scan = synthetic_scan();
    let config = BackgroundConfig::default();

    c.bench_function("estimate_background (1200x900)", |b| {
        b.iter(|| black_box(estimate_background(black_box(&scan), &config)));
    });
}

fn bench_mask(c: &mut Criterion) {
    let scan = synthetic_scan();
    let background = match estimate_background(&scan, &BackgroundConfig::default()) {
        Ok(bg) => bg,
        Err(err) => panic!("background estimation failed: {err}"),
    };
    let config = MaskConfig::default();

    c.bench_function("build_mask (1200x900)", |b| {
        b.iter(|| black_box(build_mask(black_box(&scan), &background, &config)));
    });
}

/// Full pipeline including encoding, writing into a temporary directory.
fn bench_pipeline(c: &mut Criterion) {
    let scan = synthetic_scan();
    let dir = match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(err) => panic!("tempdir: {err}"),
    };
    let mut config = ExtractConfig::for_mode(DetectionMode::Sensitive);
    config.output_dir = dir.path().to_path_buf();

    c.bench_function("extract_photos (1200x900, 3 photos)", |b| {
        b.iter(|| black_box(extract_photos(black_box(&scan), &config, None)));
    });
}

criterion_group!(benches, bench_background, bench_mask, bench_pipeline);
criterion_main!(benches);
