/// Common types and utilities for the presentation conversion service
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conversion service errors
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unsupported input format: {0}")]
    UnsupportedSource(String),

    #[error("unsupported output format: {0}")]
    UnsupportedTarget(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("conversion timed out after {0}s")]
    Timeout(u64),

    #[error("conversion engine failed: {stderr}")]
    EngineFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("engine reported success but produced no output file")]
    OutputMissing,

    #[error("unsafe filename rejected: {0}")]
    UnsafeFilename(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("too many conversions in progress, retry later")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for conversion operations
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Whitelisted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Ppt,
    Pptx,
    Odp,
}

impl SourceFormat {
    /// Parse from a filename extension (case-insensitive, no leading dot)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "ppt" => Some(SourceFormat::Ppt),
            "pptx" => Some(SourceFormat::Pptx),
            "odp" => Some(SourceFormat::Odp),
            _ => None,
        }
    }

    /// Canonical filename extension
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            SourceFormat::Ppt => "ppt",
            SourceFormat::Pptx => "pptx",
            SourceFormat::Odp => "odp",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Whitelisted conversion targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Pdf,
    Odp,
    Pptx,
    Html,
}

impl TargetFormat {
    /// Parse from a format name or filename extension (case-insensitive)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(TargetFormat::Pdf),
            "odp" => Some(TargetFormat::Odp),
            "pptx" => Some(TargetFormat::Pptx),
            "html" => Some(TargetFormat::Html),
            _ => None,
        }
    }

    /// Canonical filename extension, also the engine's `--convert-to` filter name
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Pdf => "pdf",
            TargetFormat::Odp => "odp",
            TargetFormat::Pptx => "pptx",
            TargetFormat::Html => "html",
        }
    }
}

impl std::fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}
