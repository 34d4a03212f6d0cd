// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Photo persistence — in-memory encoding (JPEG or PNG), timestamped file
// naming with collision suffixes, and write-then-rename so a partially
// written photo is never visible under its final name.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage};
use scanslice_core::error::{Result, ScansliceError};
use scanslice_core::types::OutputFormat;
use tracing::{debug, info};

/// Local-time stamp shared by every photo of one invocation,
/// e.g. `20260314_091502_337`.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string()
}

/// `photo_<stamp>_<NN>.<ext>`, with `_<suffix>` appended for collisions.
pub fn photo_file_name(stamp: &str, index: usize, suffix: u32, format: OutputFormat) -> String {
    let ext = format.extension();
    if suffix == 0 {
        format!("photo_{stamp}_{index:02}.{ext}")
    } else {
        format!("photo_{stamp}_{index:02}_{suffix}.{ext}")
    }
}

/// Encode an RGB image into the bytes of a file of the requested format.
pub fn encode(image: &RgbImage, format: OutputFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Jpeg => {
            let mut buffer = Vec::new();
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, jpeg_quality);
            image
                .write_with_encoder(encoder)
                .map_err(|err| ScansliceError::Image(format!("JPEG encoding failed: {err}")))?;
            Ok(buffer)
        }
        OutputFormat::Png => encode_to_format(image, ImageFormat::Png),
    }
}

fn encode_to_format(image: &RgbImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut cursor, format)
        .map_err(|err| ScansliceError::Image(format!("{format:?} encoding failed: {err}")))?;
    Ok(cursor.into_inner())
}

/// Write `bytes` to a hidden `.part` sibling, then rename into place.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ScansliceError::Input(format!("invalid output path {}", path.display())))?;
    let part = path.with_file_name(format!(".{file_name}.part"));

    std::fs::write(&part, bytes)?;
    if let Err(err) = std::fs::rename(&part, path) {
        std::fs::remove_file(&part).ok();
        return Err(err.into());
    }
    Ok(())
}

/// First free path for photo `index` (1-based) in `dir`.
pub fn free_photo_path(dir: &Path, stamp: &str, index: usize, format: OutputFormat) -> PathBuf {
    let mut suffix = 0;
    loop {
        let candidate = dir.join(photo_file_name(stamp, index, suffix, format));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

/// Encode and persist one photo, returning its final path.
pub fn persist_photo(
    dir: &Path,
    stamp: &str,
    index: usize,
    image: &RgbImage,
    format: OutputFormat,
    jpeg_quality: u8,
) -> Result<PathBuf> {
    let bytes = encode(image, format, jpeg_quality)?;
    let path = free_photo_path(dir, stamp, index, format);
    write_atomic(&path, &bytes)?;
    debug!(bytes = bytes.len(), "Photo encoded");
    info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "Photo saved"
    );
    Ok(path)
}
