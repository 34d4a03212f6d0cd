// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanslice.

use thiserror::Error;

use crate::types::ErrorClass;

/// Top-level error type for all Scanslice operations.
#[derive(Debug, Error)]
pub enum ScansliceError {
    // -- Invocation-fatal --
    #[error("unreadable scan: {0}")]
    Input(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("extraction worker failed: {0}")]
    Worker(String),

    // -- Handled inside the pipeline --
    #[error("degenerate scan: {0}")]
    DegenerateImage(String),

    #[error("candidate geometry rejected: {0}")]
    Geometry(String),

    // -- Output --
    #[error("image processing failed: {0}")]
    Image(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScansliceError {
    /// Whether this error aborts the whole invocation or only one candidate.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::DegenerateImage(_) | Self::Geometry(_) => ErrorClass::Recoverable,
            Self::Input(_)
            | Self::Config(_)
            | Self::Worker(_)
            | Self::Image(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorClass::Fatal,
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScansliceError>;
