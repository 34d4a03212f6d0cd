// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Orientation correction — try each quarter turn with a pluggable frontal
// face detector, fall back to grayscale Shannon entropy when no upright face
// shows up.

use image::{GrayImage, RgbImage};
use scanslice_core::config::OrientConfig;
use scanslice_core::types::{OrientationMethod, Rotation};
use tracing::{debug, info, instrument};

use crate::rectify::RectifiedPhoto;

/// Bounding box of a detected face, in pixels of the image handed to the
/// detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detector-specific score; not used for the decision.
    pub confidence: f32,
}

impl FaceBox {
    pub fn aspect_ratio(&self) -> f32 {
        if self.height <= 0.0 {
            return 0.0;
        }
        self.width / self.height
    }
}

/// Pluggable face detection backend.
///
/// [`crate::face::SeetaFaceDetector`] is the bundled backend; any other
/// frontal-face detector can implement this trait and be passed to
/// [`correct_orientation`] or [`crate::extract_photos`].
pub trait FaceDetector: Send + Sync {
    /// Detect faces in a grayscale image.
    fn detect(&self, gray: &GrayImage) -> Vec<FaceBox>;
}

/// A rectified photo turned the right way up.
#[derive(Debug, Clone)]
pub struct OrientedPhoto {
    pub image: RgbImage,
    /// Clockwise rotation applied to the rectified photo.
    pub rotation: Rotation,
    pub method: OrientationMethod,
    /// Index of the source candidate.
    pub candidate: usize,
}

/// Rotate clockwise by a quarter-turn multiple.
pub fn rotate(image: &RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::Deg0 => image.clone(),
        Rotation::Deg90 => image::imageops::rotate90(image),
        Rotation::Deg180 => image::imageops::rotate180(image),
        Rotation::Deg270 => image::imageops::rotate270(image),
    }
}

/// Shannon entropy (bits) of the 256-bin grayscale histogram.
pub fn shannon_entropy(gray: &GrayImage) -> f64 {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }
    let total = gray.width() as f64 * gray.height() as f64;
    if total == 0.0 {
        return 0.0;
    }
    histogram
        .iter()
        .filter(|count| **count > 0)
        .map(|count| {
            let p = *count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Decide and apply the rotation that makes `photo` upright.
///
/// 1. With a detector: the first rotation (in configured order) whose image
///    contains a face with a width/height ratio inside `face_aspect_band`
///    wins immediately.
/// 2. Otherwise the rotation with the highest grayscale entropy wins; ties go
///    to the earliest candidate.
/// 3. With the entropy fallback disabled, the first candidate is used as is.
#[instrument(skip_all, fields(candidate = rectified.candidate, detector = detector.is_some()))]
pub fn correct_orientation(
    rectified: &RectifiedPhoto,
    config: &OrientConfig,
    detector: Option<&dyn FaceDetector>,
) -> OrientedPhoto {
    let photo = &rectified.image;
    let candidate = rectified.candidate;
    let candidates: &[Rotation] = if config.rotation_candidates.is_empty() {
        &[Rotation::Deg0]
    } else {
        &config.rotation_candidates
    };
    let (min_aspect, max_aspect) = config.face_aspect_band;

    if let Some(detector) = detector {
        for rotation in candidates {
            let rotated = rotate(photo, *rotation);
            let gray = image::imageops::grayscale(&rotated);
            let faces = detector.detect(&gray);
            debug!(%rotation, faces = faces.len(), "Face pass");

            if let Some(face) = faces
                .iter()
                .find(|f| (min_aspect..=max_aspect).contains(&f.aspect_ratio()))
            {
                info!(%rotation, aspect = face.aspect_ratio(), "Upright face found");
                return OrientedPhoto {
                    image: rotated,
                    rotation: *rotation,
                    method: OrientationMethod::Face,
                    candidate,
                };
            }
        }
    }

    if !config.entropy_fallback {
        let rotation = candidates[0];
        debug!(%rotation, "No face and entropy fallback disabled");
        return OrientedPhoto {
            image: rotate(photo, rotation),
            rotation,
            method: OrientationMethod::Unchanged,
            candidate,
        };
    }

    let mut best: Option<(f64, Rotation, RgbImage)> = None;
    for rotation in candidates {
        let rotated = rotate(photo, *rotation);
        let entropy = shannon_entropy(&image::imageops::grayscale(&rotated));
        debug!(%rotation, entropy, "Entropy pass");
        if best.as_ref().is_none_or(|(top, _, _)| entropy > *top) {
            best = Some((entropy, *rotation, rotated));
        }
    }

    // `candidates` is never empty, so the loop always sets `best`.
    let (entropy, rotation, image) = match best {
        Some(found) => found,
        None => (0.0, Rotation::Deg0, photo.clone()),
    };
    info!(%rotation, entropy, "Using entropy fallback");
    OrientedPhoto {
        image,
        rotation,
        method: OrientationMethod::Entropy,
        candidate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;

    const FACE: u8 = 0;
    const CHIN: u8 = 60;

    /// Finds a dark square "face" and only reports it when the "chin" bar
    /// sits underneath it.
    struct MarkerDetector;

    fn bounds_of(gray: &GrayImage, value: u8) -> Option<(u32, u32, u32, u32)> {
        let mut found: Option<(u32, u32, u32, u32)> = None;
        for (x, y, p) in gray.enumerate_pixels() {
            if p.0[0] == value {
                found = Some(match found {
                    None => (x, y, x, y),
                    Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                });
            }
        }
        found
    }

    impl FaceDetector for MarkerDetector {
        fn detect(&self, gray: &GrayImage) -> Vec<FaceBox> {
            let (Some(face), Some(chin)) = (bounds_of(gray, FACE), bounds_of(gray, CHIN)) else {
                return Vec::new();
            };
            let chin_cx = (chin.0 + chin.2) / 2;
            if chin.1 > face.3 && chin_cx >= face.0 && chin_cx <= face.2 {
                vec![FaceBox {
                    x: face.0 as f32,
                    y: face.1 as f32,
                    width: (face.2 - face.0 + 1) as f32,
                    height: (face.3 - face.1 + 1) as f32,
                    confidence: 1.0,
                }]
            } else {
                Vec::new()
            }
        }
    }

    /// Reports a face only when the image is landscape.
    struct LandscapeDetector;

    impl FaceDetector for LandscapeDetector {
        fn detect(&self, gray: &GrayImage) -> Vec<FaceBox> {
            if gray.width() > gray.height() {
                vec![FaceBox {
                    x: 0.0,
                    y: 0.0,
                    width: 20.0,
                    height: 20.0,
                    confidence: 0.5,
                }]
            } else {
                Vec::new()
            }
        }
    }

    /// Always sees a very elongated "face".
    struct ElongatedDetector;

    impl FaceDetector for ElongatedDetector {
        fn detect(&self, _gray: &GrayImage) -> Vec<FaceBox> {
            vec![FaceBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 40.0,
                confidence: 0.9,
            }]
        }
    }

    fn upright_portrait() -> RgbImage {
        let mut img = RgbImage::from_pixel(200, 120, Rgb([180, 180, 180]));
        draw_filled_rect_mut(&mut img, Rect::at(80, 20).of_size(30, 30), Rgb([FACE; 3]));
        draw_filled_rect_mut(&mut img, Rect::at(80, 60).of_size(30, 8), Rgb([CHIN; 3]));
        img
    }

    fn rectified(image: RgbImage) -> RectifiedPhoto {
        RectifiedPhoto {
            image,
            candidate: 4,
        }
    }

    fn inverse(rotation: Rotation) -> Rotation {
        Rotation::from_degrees(360 - rotation.degrees() as i32).unwrap()
    }

    #[test]
    fn face_marker_rotation_is_recovered() {
        for rotation in Rotation::ALL {
            let stored = rotate(&upright_portrait(), inverse(rotation));
            let out = correct_orientation(
                &rectified(stored),
                &OrientConfig::default(),
                Some(&MarkerDetector),
            );
            assert_eq!(out.rotation, rotation);
            assert_eq!(out.method, OrientationMethod::Face);
            assert_eq!(out.image, upright_portrait());
            assert_eq!(out.candidate, 4);
        }
    }

    #[test]
    fn first_satisfying_rotation_wins() {
        let photo = RgbImage::from_pixel(60, 100, Rgb([90, 90, 90]));
        let out = correct_orientation(
            &rectified(photo),
            &OrientConfig::default(),
            Some(&LandscapeDetector),
        );
        assert_eq!(out.rotation, Rotation::Deg90);
        assert_eq!(out.method, OrientationMethod::Face);
        assert_eq!(out.image.dimensions(), (100, 60));
    }

    #[test]
    fn elongated_faces_fall_through_to_entropy() {
        let photo = RgbImage::from_pixel(60, 100, Rgb([90, 90, 90]));
        let out = correct_orientation(
            &rectified(photo),
            &OrientConfig::default(),
            Some(&ElongatedDetector),
        );
        assert_eq!(out.method, OrientationMethod::Entropy);
    }

    #[test]
    fn featureless_photo_uses_max_entropy_rotation() {
        let mut photo = RgbImage::from_pixel(90, 60, Rgb([30, 30, 30]));
        draw_filled_rect_mut(&mut photo, Rect::at(0, 0).of_size(45, 20), Rgb([200, 200, 200]));
        draw_filled_rect_mut(&mut photo, Rect::at(50, 30).of_size(10, 10), Rgb([120, 90, 60]));
        let config = OrientConfig::default();

        let out = correct_orientation(&rectified(photo.clone()), &config, None);

        // brute force: entropy of every candidate, earliest maximum wins
        let scores: Vec<f64> = config
            .rotation_candidates
            .iter()
            .map(|r| shannon_entropy(&image::imageops::grayscale(&rotate(&photo, *r))))
            .collect();
        let top = scores.iter().cloned().fold(f64::MIN, f64::max);
        let expected = config.rotation_candidates[scores.iter().position(|s| *s == top).unwrap()];

        assert_eq!(out.method, OrientationMethod::Entropy);
        assert_eq!(out.rotation, expected);
        assert_eq!(out.image, rotate(&photo, expected));
    }

    #[test]
    fn entropy_ties_prefer_earliest_candidate() {
        let photo = RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]));
        let config = OrientConfig {
            rotation_candidates: vec![Rotation::Deg180, Rotation::Deg0],
            ..OrientConfig::default()
        };
        let out = correct_orientation(&rectified(photo), &config, None);
        assert_eq!(out.rotation, Rotation::Deg180);
    }

    #[test]
    fn disabled_fallback_keeps_first_candidate() {
        let photo = RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]));
        let config = OrientConfig {
            entropy_fallback: false,
            ..OrientConfig::default()
        };
        let out = correct_orientation(&rectified(photo), &config, Some(&ElongatedDetector));
        assert_eq!(out.rotation, Rotation::Deg0);
        assert_eq!(out.method, OrientationMethod::Unchanged);
    }

    #[test]
    fn empty_candidate_list_means_no_rotation() {
        let photo = RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]));
        let config = OrientConfig {
            rotation_candidates: Vec::new(),
            ..OrientConfig::default()
        };
        let out = correct_orientation(&rectified(photo), &config, None);
        assert_eq!(out.rotation, Rotation::Deg0);
    }

    #[test]
    fn entropy_of_known_histograms() {
        assert_eq!(shannon_entropy(&GrayImage::from_pixel(8, 8, Luma([7]))), 0.0);

        let mut halves = GrayImage::from_pixel(8, 8, Luma([0]));
        draw_filled_rect_mut(&mut halves, Rect::at(0, 0).of_size(4, 8), Luma([255]));
        assert!((shannon_entropy(&halves) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rotate_quarter_turn_is_clockwise() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        let turned = rotate(&img, Rotation::Deg90);
        assert_eq!(turned.dimensions(), (2, 3));
        assert_eq!(turned.get_pixel(1, 0).0, [255, 0, 0]);
    }
}
