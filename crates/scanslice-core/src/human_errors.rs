// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for people digitising family photo albums.
//
// Every technical error is mapped to plain English with a clear suggestion.

use crate::error::ScansliceError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Something about the input or settings must change before retrying.
    ActionRequired,
    /// Internal failure; retrying the same scan will not help.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    pub severity: Severity,
}

/// Convert a `ScansliceError` into something printable at the end of a CLI run.
pub fn humanize_error(err: &ScansliceError) -> HumanError {
    match err {
        ScansliceError::Input(detail) => HumanError {
            message: "The scan could not be read.".into(),
            suggestion: format!(
                "Check that the file exists and is a JPEG, PNG or TIFF image. ({detail})"
            ),
            severity: Severity::ActionRequired,
        },

        ScansliceError::Config(detail) => HumanError {
            message: "The settings are not valid.".into(),
            suggestion: format!("Fix the config file or command-line flags. ({detail})"),
            severity: Severity::ActionRequired,
        },

        ScansliceError::DegenerateImage(detail) => HumanError {
            message: "The scan is too small to split into photos.".into(),
            suggestion: format!("Rescan at a higher resolution. ({detail})"),
            severity: Severity::ActionRequired,
        },

        ScansliceError::Geometry(detail) => HumanError {
            message: "One of the photos could not be straightened.".into(),
            suggestion: format!(
                "Leave a little space between photos on the scanner glass. ({detail})"
            ),
            severity: Severity::ActionRequired,
        },

        ScansliceError::Io(io) => HumanError {
            message: "A file could not be written.".into(),
            suggestion: format!(
                "Check that the output folder exists and that there is free disk space. ({io})"
            ),
            severity: Severity::ActionRequired,
        },

        ScansliceError::Image(detail) => HumanError {
            message: "A photo could not be saved.".into(),
            suggestion: format!("Try saving as PNG instead. ({detail})"),
            severity: Severity::Permanent,
        },

        ScansliceError::Serialization(detail) => HumanError {
            message: "The settings or manifest file is damaged.".into(),
            suggestion: format!("Check the JSON syntax. ({detail})"),
            severity: Severity::ActionRequired,
        },

        ScansliceError::Worker(detail) => HumanError {
            message: "Photo extraction stopped unexpectedly.".into(),
            suggestion: format!("Run again with RUST_LOG=debug and report the log. ({detail})"),
            severity: Severity::Permanent,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreadable_scan_needs_action() {
        let human = humanize_error(&ScansliceError::Input("bad magic bytes".into()));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(human.suggestion.contains("bad magic bytes"));
    }

    #[test]
    fn worker_panic_is_permanent() {
        let human = humanize_error(&ScansliceError::Worker("task panicked".into()));
        assert_eq!(human.severity, Severity::Permanent);
    }
}
