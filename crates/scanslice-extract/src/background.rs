// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background color estimation — seeded pixel sampling followed by k-means
// clustering in RGB space. The centroid of the most populated cluster is the
// scanner-bed color.

use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use scanslice_core::config::BackgroundConfig;
use scanslice_core::error::{Result, ScansliceError};
use scanslice_core::types::{BackgroundColor, EstimationMethod};
use tracing::{debug, info, instrument};

/// Estimate the dominant background color of a scan.
///
/// Draws `sample_size` pixels without replacement (capped at the pixel
/// count), clusters them into `k_clusters` groups and returns the centroid of
/// the largest one. Both the sample and the centroid initialisation come from
/// a single RNG seeded with `config.seed`, so results are reproducible.
///
/// Fails only when the scan has no pixels.
#[instrument(skip(scan, config), fields(width = scan.width(), height = scan.height()))]
pub fn estimate_background(scan: &RgbImage, config: &BackgroundConfig) -> Result<BackgroundColor> {
    let total = scan.width() as usize * scan.height() as usize;
    if total == 0 {
        return Err(ScansliceError::Input("scan has zero pixels".into()));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let sample_size = config.sample_size.clamp(1, total);
    let raw = scan.as_raw();
    let samples: Vec<[f64; 3]> = index::sample(&mut rng, total, sample_size)
        .iter()
        .map(|i| {
            let p = &raw[i * 3..i * 3 + 3];
            [p[0] as f64, p[1] as f64, p[2] as f64]
        })
        .collect();

    if samples.iter().all(|s| *s == samples[0]) {
        let rgb = to_rgb(&samples[0]);
        info!(?rgb, "Uniform sample, background color is exact");
        return Ok(BackgroundColor {
            rgb,
            method: EstimationMethod::Uniform,
            support: 1.0,
        });
    }

    let k = config.k_clusters.clamp(1, samples.len());
    let clusters = kmeans(&samples, k, config.max_iterations, &mut rng);

    // Largest cluster; ties resolve to the lowest index.
    let mut best = 0;
    for (i, count) in clusters.counts.iter().enumerate() {
        if *count > clusters.counts[best] {
            best = i;
        }
    }

    let rgb = to_rgb(&clusters.centroids[best]);
    let support = clusters.counts[best] as f32 / samples.len() as f32;
    info!(?rgb, support, k, "Estimated background color via k-means");

    Ok(BackgroundColor {
        rgb,
        method: EstimationMethod::KMeans,
        support,
    })
}

struct Clusters {
    centroids: Vec<[f64; 3]>,
    counts: Vec<usize>,
}

/// Lloyd's algorithm with k-means++ seeding and a fixed iteration budget.
fn kmeans(samples: &[[f64; 3]], k: usize, max_iterations: usize, rng: &mut StdRng) -> Clusters {
    let mut centroids = init_plus_plus(samples, k, rng);
    let mut assignment = vec![0usize; samples.len()];

    for iteration in 0..max_iterations.max(1) {
        let mut changed = false;
        for (slot, sample) in assignment.iter_mut().zip(samples) {
            let nearest = nearest_centroid(sample, &centroids);
            if *slot != nearest {
                *slot = nearest;
                changed = true;
            }
        }

        let mut sums = vec![[0f64; 3]; k];
        let mut counts = vec![0usize; k];
        for (cluster, sample) in assignment.iter().zip(samples) {
            counts[*cluster] += 1;
            for c in 0..3 {
                sums[*cluster][c] += sample[c];
            }
        }
        for (i, centroid) in centroids.iter_mut().enumerate() {
            // Empty clusters keep their previous centroid.
            if counts[i] > 0 {
                let n = counts[i] as f64;
                *centroid = [sums[i][0] / n, sums[i][1] / n, sums[i][2] / n];
            }
        }

        if !changed && iteration > 0 {
            debug!(iteration, "k-means converged");
            break;
        }
    }

    let mut counts = vec![0usize; k];
    for sample in samples {
        counts[nearest_centroid(sample, &centroids)] += 1;
    }
    Clusters { centroids, counts }
}

/// k-means++ initialisation: each new centroid is drawn with probability
/// proportional to its squared distance from the nearest existing one.
fn init_plus_plus(samples: &[[f64; 3]], k: usize, rng: &mut StdRng) -> Vec<[f64; 3]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(samples[rng.gen_range(0..samples.len())]);

    while centroids.len() < k {
        let weights: Vec<f64> = samples
            .iter()
            .map(|s| {
                centroids
                    .iter()
                    .map(|c| squared_distance(s, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let pick = if total <= 0.0 {
            rng.gen_range(0..samples.len())
        } else {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = samples.len() - 1;
            for (i, w) in weights.iter().enumerate() {
                if target < *w {
                    chosen = i;
                    break;
                }
                target -= w;
            }
            chosen
        };
        centroids.push(samples[pick]);
    }

    centroids
}

fn nearest_centroid(sample: &[f64; 3], centroids: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(sample, c);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

fn to_rgb(c: &[f64; 3]) -> [u8; 3] {
    [
        c[0].round().clamp(0.0, 255.0) as u8,
        c[1].round().clamp(0.0, 255.0) as u8,
        c[2].round().clamp(0.0, 255.0) as u8,
    ]
}
