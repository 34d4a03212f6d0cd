// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output manifest returned by one pipeline invocation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{BackgroundColor, OrientationMethod, Rotation, ScanId};

/// One persisted photograph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoEntry {
    pub path: PathBuf,
    /// Index of the source candidate (descending-area order).
    pub candidate: usize,
    pub width: u32,
    pub height: u32,
    pub rotation: Rotation,
    pub method: OrientationMethod,
}

/// A candidate that was accepted but could not be turned into a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFailure {
    pub candidate: usize,
    pub reason: String,
}

/// Result of one `extract_photos` call.
///
/// `photos` is the ordered list of files handed to downstream consumers
/// (gallery, metadata writer). An empty list is a valid outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputManifest {
    pub scan_id: ScanId,
    pub created_at: DateTime<Utc>,
    pub background: Option<BackgroundColor>,
    pub photos: Vec<PhotoEntry>,
    pub failures: Vec<CandidateFailure>,
    /// Contours that failed the acceptance policy.
    pub rejected: usize,
    pub debug_artifacts: Vec<PathBuf>,
}

impl OutputManifest {
    pub fn new(background: Option<BackgroundColor>) -> Self {
        Self {
            scan_id: ScanId::new(),
            created_at: Utc::now(),
            background,
            photos: Vec::new(),
            failures: Vec::new(),
            rejected: 0,
            debug_artifacts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    /// Persisted photo paths in output order.
    pub fn paths(&self) -> Vec<&Path> {
        self.photos.iter().map(|p| p.path.as_path()).collect()
    }

    /// Write the manifest as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EstimationMethod;

    #[test]
    fn manifest_round_trips_through_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = OutputManifest::new(Some(BackgroundColor {
            rgb: [250, 250, 245],
            method: EstimationMethod::KMeans,
            support: 0.8,
        }));
        manifest.photos.push(PhotoEntry {
            path: dir.path().join("photo_1.jpg"),
            candidate: 0,
            width: 600,
            height: 800,
            rotation: Rotation::Deg90,
            method: OrientationMethod::Face,
        });
        manifest.failures.push(CandidateFailure {
            candidate: 1,
            reason: "singular transform".into(),
        });

        let path = dir.path().join("manifest.json");
        manifest.write_json(&path).unwrap();
        let loaded: OutputManifest =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();

        assert_eq!(loaded, manifest);
        assert_eq!(loaded.paths(), vec![dir.path().join("photo_1.jpg").as_path()]);
    }

    #[test]
    fn new_manifest_is_empty() {
        let manifest = OutputManifest::new(None);
        assert!(manifest.is_empty());
        assert_eq!(manifest.rejected, 0);
    }
}
