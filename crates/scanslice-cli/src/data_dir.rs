// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default output location for extracted photos.

use std::path::{Path, PathBuf};

/// `<data home>/scanslice/crops`. The pipeline creates it on first use.
pub fn default_output_dir() -> PathBuf {
    output_dir_under(&data_home(
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    ))
}

fn output_dir_under(base: &Path) -> PathBuf {
    base.join("scanslice").join("crops")
}

fn data_home(xdg: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    // XDG data dir, then ~/.local/share
    if let Some(xdg) = xdg.filter(|p| !p.as_os_str().is_empty()) {
        return xdg;
    }
    if let Some(home) = home {
        return home.join(".local").join("share");
    }
    // Last resort
    std::env::temp_dir()
}
