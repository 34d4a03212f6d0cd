// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. Every struct deserialises with defaults for missing
// fields, so a config file only needs to name the knobs it changes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScansliceError};
use crate::types::{DetectionMode, OutputFormat, Rotation};

/// Background color estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Pixels sampled for clustering (capped at the scan's pixel count).
    pub sample_size: usize,
    /// Number of color clusters.
    pub k_clusters: usize,
    /// Lloyd iteration budget.
    pub max_iterations: usize,
    /// Seed for both the pixel sample and the centroid initialisation.
    pub seed: u64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            sample_size: 10_000,
            k_clusters: 3,
            max_iterations: 20,
            seed: 42,
        }
    }
}

/// Edge-cue strategy parameters (only used when `MaskConfig::use_edge_mask`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub blur_sigma: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Minimum Hough accumulator votes for a line.
    pub vote_threshold: u32,
    /// Shortest completed segment, in pixels.
    pub min_line_length: u32,
    /// Largest gap bridged between edge pixels on one line, in pixels.
    pub max_line_gap: u32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.4,
            canny_low: 50.0,
            canny_high: 150.0,
            vote_threshold: 100,
            min_line_length: 50,
            max_line_gap: 500,
        }
    }
}

/// Foreground mask construction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Euclidean RGB distance above which a pixel is foreground.
    pub color_threshold: f32,
    /// Fraction of each dimension zeroed along the scan border.
    pub border_fraction: f32,
    /// Union the color mask with completed Canny/Hough edges.
    pub use_edge_mask: bool,
    pub edges: EdgeConfig,
    /// Side of the square structuring element (odd).
    pub kernel_size: u8,
    pub dilate_iterations: u32,
    /// Components smaller than this fraction of the scan area are dropped.
    pub min_component_fraction: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            color_threshold: 35.0,
            border_fraction: 0.01,
            use_edge_mask: false,
            edges: EdgeConfig::default(),
            kernel_size: 5,
            dilate_iterations: 2,
            min_component_fraction: 0.01,
        }
    }
}

/// Candidate region acceptance policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourConfig {
    /// Minimum rectangle area in square pixels.
    pub min_area: u64,
    /// Inclusive `(min, max)` band for `max(w,h)/min(w,h)`.
    pub aspect_ratio_band: (f32, f32),
    /// Minimum corners after polygon simplification.
    pub min_corners: usize,
    /// Douglas-Peucker tolerance as a fraction of the contour perimeter.
    pub simplify_epsilon: f32,
    /// Corners closer than this fraction of the scan width to a border are inset.
    pub edge_touch_fraction: f32,
    pub edge_inset_px: f32,
    /// Corners are clamped to `[margin, dim - margin]`.
    pub clamp_margin_px: f32,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            min_area: DetectionMode::Strict.min_area(),
            aspect_ratio_band: (0.4, 3.2),
            min_corners: 4,
            simplify_epsilon: 0.04,
            edge_touch_fraction: 0.01,
            edge_inset_px: 5.0,
            clamp_margin_px: 5.0,
        }
    }
}

/// Deskew and bleed-trim settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RectifyConfig {
    /// Interior margin: the most scanner-bed bleed trimmed from any one side.
    pub margin_px: u32,
    /// Stricter background distance used to find the true photo edge.
    pub refine_threshold: f32,
    /// Always trim `margin_px` from every side before refinement.
    pub blind_margin_trim: bool,
}

impl Default for RectifyConfig {
    fn default() -> Self {
        Self {
            margin_px: 10,
            refine_threshold: 20.0,
            blind_margin_trim: false,
        }
    }
}

/// Orientation state machine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientConfig {
    /// Inclusive width/height band for a face box to count as upright.
    pub face_aspect_band: (f32, f32),
    /// Rotations tried, in order.
    pub rotation_candidates: Vec<Rotation>,
    /// Pick the maximum-entropy rotation when no face is found.
    pub entropy_fallback: bool,
    /// SeetaFace frontal-face model file. Without one only the entropy
    /// fallback runs.
    pub face_model: Option<PathBuf>,
    /// Smallest face side searched for, in pixels (at least 20).
    pub face_min_size: u32,
    /// Detector score a window needs to count as a face.
    pub face_score_threshold: f64,
}

impl Default for OrientConfig {
    fn default() -> Self {
        Self {
            face_aspect_band: (0.75, 1.33),
            rotation_candidates: Rotation::ALL.to_vec(),
            entropy_fallback: true,
            face_model: None,
            face_min_size: 20,
            face_score_threshold: 2.0,
        }
    }
}

/// Complete configuration for one `extract_photos` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub background: BackgroundConfig,
    pub mask: MaskConfig,
    pub contours: ContourConfig,
    pub rectify: RectifyConfig,
    pub orientation: OrientConfig,
    /// Write diagnostic images next to the photos.
    pub debug: bool,
    pub output_dir: PathBuf,
    pub output_format: OutputFormat,
    /// JPEG quality (1-100), ignored for PNG.
    pub jpeg_quality: u8,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            background: BackgroundConfig::default(),
            mask: MaskConfig::default(),
            contours: ContourConfig::default(),
            rectify: RectifyConfig::default(),
            orientation: OrientConfig::default(),
            debug: false,
            output_dir: PathBuf::from("crops"),
            output_format: OutputFormat::Jpeg,
            jpeg_quality: 95,
        }
    }
}

impl ExtractConfig {
    /// Defaults with the minimum area taken from a detection preset.
    pub fn for_mode(mode: DetectionMode) -> Self {
        let mut config = Self::default();
        config.contours.min_area = mode.min_area();
        config
    }

    /// Load a (possibly partial) JSON config file over the defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_file_over(path, &Self::default())
    }

    /// Load a (possibly partial) JSON config file over `base`: keys the file
    /// names replace those of `base`, everything else is kept.
    pub fn from_json_file_over(path: impl AsRef<Path>, base: &ExtractConfig) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        let overlay: serde_json::Value = serde_json::from_slice(&data)?;
        let mut merged = serde_json::to_value(base)?;
        merge_json(&mut merged, overlay);
        Ok(serde_json::from_value(merged)?)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(ScansliceError::Config(msg));

        if self.background.sample_size == 0 {
            return fail("sample_size must be positive".into());
        }
        if self.background.k_clusters == 0 {
            return fail("k_clusters must be positive".into());
        }
        if !(self.mask.color_threshold > 0.0) {
            return fail(format!(
                "color_threshold must be positive, got {}",
                self.mask.color_threshold
            ));
        }
        if !(self.rectify.refine_threshold > 0.0) {
            return fail(format!(
                "refine_threshold must be positive, got {}",
                self.rectify.refine_threshold
            ));
        }
        if !(0.0..0.5).contains(&self.mask.border_fraction) {
            return fail(format!(
                "border_fraction must be in [0, 0.5), got {}",
                self.mask.border_fraction
            ));
        }
        if !(0.0..=1.0).contains(&self.mask.min_component_fraction) {
            return fail(format!(
                "min_component_fraction must be in [0, 1], got {}",
                self.mask.min_component_fraction
            ));
        }
        if self.mask.kernel_size == 0 || self.mask.kernel_size % 2 == 0 {
            return fail(format!(
                "kernel_size must be odd, got {}",
                self.mask.kernel_size
            ));
        }
        let (lo, hi) = self.contours.aspect_ratio_band;
        if !(lo <= hi) {
            return fail(format!("aspect_ratio_band is inverted: ({lo}, {hi})"));
        }
        let (lo, hi) = self.orientation.face_aspect_band;
        if !(lo <= hi) {
            return fail(format!("face_aspect_band is inverted: ({lo}, {hi})"));
        }
        if self.orientation.face_min_size < 20 {
            return fail(format!(
                "face_min_size must be at least 20, got {}",
                self.orientation.face_min_size
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return fail(format!(
                "jpeg_quality must be in 1..=100, got {}",
                self.jpeg_quality
            ));
        }
        Ok(())
    }
}

/// Recursively overlay `overlay` onto `base`. Objects merge key by key; any
/// other value replaces what was there.
fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        ExtractConfig::default().validate().unwrap();
    }

    #[test]
    fn mode_sets_min_area() {
        let config = ExtractConfig::for_mode(DetectionMode::Sensitive);
        assert_eq!(config.contours.min_area, 10_000);
    }

    #[test]
    fn inverted_aspect_band_is_rejected() {
        let mut config = ExtractConfig::default();
        config.contours.aspect_ratio_band = (3.2, 0.4);
        assert!(matches!(config.validate(), Err(ScansliceError::Config(_))));
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let mut config = ExtractConfig::default();
        config.mask.color_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "debug": true,
                "contours": {{ "min_area": 12345 }},
                "orientation": {{ "rotation_candidates": [0, 180] }}
            }}"#
        )
        .unwrap();

        let config = ExtractConfig::from_json_file(file.path()).unwrap();
        assert!(config.debug);
        assert_eq!(config.contours.min_area, 12345);
        assert_eq!(config.contours.aspect_ratio_band, (0.4, 3.2));
        assert_eq!(
            config.orientation.rotation_candidates,
            vec![Rotation::Deg0, Rotation::Deg180]
        );
        assert_eq!(config.background.sample_size, 10_000);
    }

    #[test]
    fn file_layers_over_a_custom_base() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "jpeg_quality": 70, "rectify": {{ "margin_px": 4 }} }}"#).unwrap();
        let base = ExtractConfig {
            output_dir: PathBuf::from("/data/crops"),
            debug: true,
            ..ExtractConfig::default()
        };

        let config = ExtractConfig::from_json_file_over(file.path(), &base).unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/data/crops"));
        assert!(config.debug);
        assert_eq!(config.jpeg_quality, 70);
        assert_eq!(config.rectify.margin_px, 4);
        assert_eq!(config.rectify.refine_threshold, 20.0);
    }

    #[test]
    fn explicit_null_clears_an_optional_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "orientation": {{ "face_model": null }} }}"#).unwrap();
        let mut base = ExtractConfig::default();
        base.orientation.face_model = Some(PathBuf::from("/models/seeta.bin"));

        let config = ExtractConfig::from_json_file_over(file.path(), &base).unwrap();
        assert_eq!(config.orientation.face_model, None);
    }

    #[test]
    fn small_face_size_is_rejected() {
        let mut config = ExtractConfig::default();
        config.orientation.face_min_size = 12;
        assert!(matches!(config.validate(), Err(ScansliceError::Config(_))));
    }
}
