//! API request and response types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query parameters for `POST /convert`
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertQuery {
    /// Target format name (pdf, odp, pptx, html)
    #[serde(default = "default_output_format")]
    pub output_format: String,
}

fn default_output_format() -> String {
    "pdf".to_string()
}

/// Successful conversion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertResponse {
    /// Store-unique artifact filename
    pub filename: String,
    /// Artifact size in bytes
    pub size: u64,
    /// Relative download path for the artifact
    pub download_url: String,
    /// Filename the client uploaded under
    pub original_filename: String,
}

/// One artifact in the outputs listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEntry {
    /// Store-unique artifact filename
    pub filename: String,
    /// Artifact size in bytes
    pub size: u64,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Relative download path for the artifact
    pub download_url: String,
}

/// `GET /outputs` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputsResponse {
    /// Number of artifacts in the store
    pub total_count: usize,
    /// Artifacts, newest first
    pub files: Vec<OutputEntry>,
}

/// `DELETE /outputs/{filename}` acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Deleted artifact filename
    pub filename: String,
}

/// `GET /fonts` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontsResponse {
    /// Number of distinct font families
    pub total_count: usize,
    /// Sorted font family names
    pub fonts: Vec<String>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` when the conversion engine answers, `degraded` otherwise
    pub status: String,
    /// Service version
    pub version: String,
    /// Whether the conversion engine binary responded to a version probe
    pub engine_available: bool,
}

/// Error body returned on every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable error kind
    pub error: String,
    /// Human-readable message
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_query_defaults_to_pdf() {
        let query: ConvertQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.output_format, "pdf");

        let query: ConvertQuery = serde_json::from_str(r#"{"output_format": "html"}"#).unwrap();
        assert_eq!(query.output_format, "html");
    }

    #[test]
    fn test_convert_response_serialization() {
        let response = ConvertResponse {
            filename: "abc.pdf".to_string(),
            size: 1024,
            download_url: "/download/abc.pdf".to_string(),
            original_filename: "slides.pptx".to_string(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["filename"], "abc.pdf");
        assert_eq!(json["size"], 1024);
        assert_eq!(json["download_url"], "/download/abc.pdf");
        assert_eq!(json["original_filename"], "slides.pptx");
    }

    #[test]
    fn test_error_body_serialization() {
        let body = ErrorBody {
            error: "validation_error".to_string(),
            message: "unsupported input format: txt".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("validation_error"));
        assert!(json.contains("unsupported input format"));
    }

    #[test]
    fn test_outputs_response_serialization() {
        let response = OutputsResponse {
            total_count: 1,
            files: vec![OutputEntry {
                filename: "a.pdf".to_string(),
                size: 7,
                created_at: Utc::now(),
                download_url: "/download/a.pdf".to_string(),
            }],
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["total_count"], 1);
        assert_eq!(json["files"][0]["filename"], "a.pdf");
    }
}
