// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanslice photo extraction pipeline.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Classification of errors for the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Abort the invocation and report the reason.
    Fatal,
    /// Skip the affected candidate (or fall back) and keep going.
    Recoverable,
}

// -- Background ---------------------------------------------------------------

/// How the background color was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EstimationMethod {
    /// Centroid of the largest k-means cluster.
    KMeans,
    /// Every sampled pixel had the same color.
    Uniform,
}

/// Dominant scanner-bed color of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundColor {
    /// RGB channels.
    pub rgb: [u8; 3],
    pub method: EstimationMethod,
    /// Fraction of samples that fell into the winning cluster (0..=1).
    pub support: f32,
}

impl BackgroundColor {
    /// Euclidean RGB distance from `pixel` to this color.
    pub fn distance(&self, pixel: [u8; 3]) -> f32 {
        let dr = pixel[0] as f32 - self.rgb[0] as f32;
        let dg = pixel[1] as f32 - self.rgb[1] as f32;
        let db = pixel[2] as f32 - self.rgb[2] as f32;
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

// -- Geometry -----------------------------------------------------------------

/// Rotated rectangle in scan pixel coordinates.
///
/// `angle` is in degrees, normalised to (-45, 45]. `width` runs along the
/// direction of `angle`, `height` perpendicular to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: (f32, f32),
    pub width: f32,
    pub height: f32,
    pub angle: f32,
}

impl RotatedRect {
    /// Axis-aligned rectangle covering `width` x `height` pixels from the origin.
    ///
    /// Coordinates are pixel centres, so the corners sit on the outer pixel
    /// edges at `-0.5` and `width - 0.5`.
    pub fn axis_aligned(width: u32, height: u32) -> Self {
        Self {
            center: ((width as f32 - 1.0) / 2.0, (height as f32 - 1.0) / 2.0),
            width: width as f32,
            height: height as f32,
            angle: 0.0,
        }
    }

    /// Rectangle area using whole-pixel side lengths.
    pub fn area(&self) -> u64 {
        self.width.max(0.0).floor() as u64 * self.height.max(0.0).floor() as u64
    }

    /// `max(w, h) / min(w, h)`, or 0 when the short side is empty.
    pub fn aspect_ratio(&self) -> f32 {
        let short = self.width.min(self.height);
        if short <= 0.0 {
            return 0.0;
        }
        self.width.max(self.height) / short
    }

    /// Corners as `[top_left, top_right, bottom_right, bottom_left]` in the
    /// rectangle's own frame.
    pub fn corners(&self) -> [(f32, f32); 4] {
        let (sin, cos) = self.angle.to_radians().sin_cos();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);
        let (cx, cy) = self.center;
        let at = |su: f32, sv: f32| {
            (
                cx + su * hw * cos - sv * hh * sin,
                cy + su * hw * sin + sv * hh * cos,
            )
        };
        [at(-1.0, -1.0), at(1.0, -1.0), at(1.0, 1.0), at(-1.0, 1.0)]
    }
}

/// Why a contour was not accepted as a photograph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RejectReason {
    /// Simplified polygon had fewer than four corners.
    TooFewCorners(usize),
    /// Rectangle area below the configured minimum.
    TooSmall(u64),
    /// Aspect ratio outside the configured band.
    AspectRatio(f32),
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewCorners(n) => write!(f, "only {n} corners"),
            Self::TooSmall(area) => write!(f, "area {area} below minimum"),
            Self::AspectRatio(ratio) => write!(f, "aspect ratio {ratio:.2} outside band"),
        }
    }
}

/// Acceptance decision for a candidate region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Verdict {
    Accepted,
    Rejected(RejectReason),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

// -- Orientation --------------------------------------------------------------

/// Clockwise quarter-turn applied to a rectified photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// All quarter turns in the default trial order.
    pub const ALL: [Rotation; 4] = [Self::Deg0, Self::Deg90, Self::Deg180, Self::Deg270];

    pub fn degrees(&self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Parse a multiple of 90 degrees (negative and >= 360 values wrap).
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::from_degrees(value as i32)
            .ok_or_else(|| format!("rotation must be a multiple of 90, got {value}"))
    }
}

impl From<Rotation> for u16 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

impl std::fmt::Display for Rotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Which stage of the orientation state machine decided the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrientationMethod {
    /// A near-square frontal face was found at this rotation.
    Face,
    /// Maximum grayscale entropy.
    Entropy,
    /// Entropy fallback disabled and no face found.
    Unchanged,
}

// -- Output -------------------------------------------------------------------

/// Encoding used for persisted photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

/// Minimum-area presets for typical scanning resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    /// Small prints or low-resolution scans.
    Sensitive,
    Balanced,
    /// High-resolution scans with lots of debris.
    Strict,
}

impl DetectionMode {
    /// Minimum rectangle area in square pixels.
    pub fn min_area(&self) -> u64 {
        match self {
            Self::Sensitive => 10_000,
            Self::Balanced => 30_000,
            Self::Strict => 50_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_ratio_of_empty_rect_is_zero() {
        let rect = RotatedRect {
            center: (5.0, 5.0),
            width: 0.0,
            height: 40.0,
            angle: 0.0,
        };
        assert_eq!(rect.aspect_ratio(), 0.0);
        assert_eq!(rect.area(), 0);
    }

    #[test]
    fn axis_aligned_corners_are_outer_pixel_edges() {
        let corners = RotatedRect::axis_aligned(200, 100).corners();
        let expected = [(-0.5, -0.5), (199.5, -0.5), (199.5, 99.5), (-0.5, 99.5)];
        for (got, want) in corners.iter().zip(expected.iter()) {
            assert!((got.0 - want.0).abs() < 1e-3 && (got.1 - want.1).abs() < 1e-3);
        }
    }

    #[test]
    fn rotated_corners_keep_side_lengths() {
        let rect = RotatedRect {
            center: (100.0, 100.0),
            width: 60.0,
            height: 80.0,
            angle: 15.0,
        };
        let [tl, tr, br, _] = rect.corners();
        let top = ((tr.0 - tl.0).powi(2) + (tr.1 - tl.1).powi(2)).sqrt();
        let right = ((br.0 - tr.0).powi(2) + (br.1 - tr.1).powi(2)).sqrt();
        assert!((top - 60.0).abs() < 1e-3);
        assert!((right - 80.0).abs() < 1e-3);
    }

    #[test]
    fn rotation_wraps_degrees() {
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn rotation_serializes_as_degrees() {
        let json = serde_json::to_string(&Rotation::Deg180).unwrap();
        assert_eq!(json, "180");
        let back: Rotation = serde_json::from_str("270").unwrap();
        assert_eq!(back, Rotation::Deg270);
        assert!(serde_json::from_str::<Rotation>("45").is_err());
    }

    #[test]
    fn background_distance_is_euclidean() {
        let bg = BackgroundColor {
            rgb: [10, 20, 30],
            method: EstimationMethod::KMeans,
            support: 1.0,
        };
        assert_eq!(bg.distance([10, 20, 30]), 0.0);
        assert!((bg.distance([13, 24, 30]) - 5.0).abs() < 1e-6);
    }
}
