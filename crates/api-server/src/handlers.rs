//! HTTP request handlers for API endpoints

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;

use crate::error::ApiError;
use crate::fonts;
use crate::types::{
    ConvertQuery, ConvertResponse, DeleteResponse, FontsResponse, HealthResponse, OutputEntry,
    OutputsResponse,
};
use crate::ApiState;
use slide_convert_common::{ConvertError, SourceFormat, TargetFormat};
use slide_convert_conversion::{convert, probe_engine, ConversionOutcome, StagedInput};

/// Health check endpoint.
///
/// Liveness does not depend on the engine, but the response reports
/// whether the engine binary answers a version probe so operators can
/// spot a broken install.
pub async fn health_check(State(state): State<ApiState>) -> impl IntoResponse {
    let binary = state.config.converter.binary.clone();
    let version_probe = tokio::task::spawn_blocking(move || probe_engine(&binary))
        .await
        .ok()
        .flatten();
    let engine_available = version_probe.is_some();

    Json(HealthResponse {
        status: if engine_available { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine_available,
    })
}

/// Convert an uploaded presentation to the requested target format.
///
/// Validation happens before any staging I/O. Admission is bounded: at
/// most `max_concurrent` engine invocations run at once and at most
/// `max_queued` more wait in FIFO order; anything beyond that is rejected
/// with a backpressure error rather than queued without bound.
pub async fn convert_document(
    State(state): State<ApiState>,
    Query(query): Query<ConvertQuery>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ApiError> {
    let target = TargetFormat::from_extension(&query.output_format)
        .ok_or_else(|| ConvertError::UnsupportedTarget(query.output_format.clone()))?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ConvertError::InvalidRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ConvertError::InvalidRequest(format!("failed to read upload: {e}")))?;
            upload = Some((filename, data.to_vec()));
            break;
        }
    }

    let Some((source_filename, data)) = upload else {
        return Err(ConvertError::InvalidRequest("missing 'file' field".to_string()).into());
    };

    // Fail fast on the extension whitelist, before any file is staged.
    let extension = std::path::Path::new(&source_filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    let source_format = SourceFormat::from_extension(extension)
        .ok_or_else(|| ConvertError::UnsupportedSource(extension.to_string()))?;

    // Bounded admission: running + queued conversions may not exceed the
    // configured total.
    let admission = state
        .admission
        .clone()
        .try_acquire_owned()
        .map_err(|_| ConvertError::Busy)?;

    info!(
        "Conversion request: {} ({} bytes) -> {}",
        source_filename,
        data.len(),
        target
    );

    // The pipeline runs in its own task so a client disconnect cannot
    // cancel a conversion mid-flight; the engine run always completes or
    // times out on its own terms.
    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let _admission = admission;
        let _permit = task_state
            .gate
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ConvertError::Busy)?;
        run_conversion(&task_state, source_format, target, &source_filename, &data).await
    });

    let response = handle
        .await
        .map_err(|e| ConvertError::Io(std::io::Error::other(e)))??;
    Ok(Json(response))
}

/// Stage, invoke, classify, register. Staging is released on every path
/// via the guard's `Drop`; the explicit release keeps the happy path
/// obvious.
async fn run_conversion(
    state: &ApiState,
    source_format: SourceFormat,
    target: TargetFormat,
    source_filename: &str,
    data: &[u8],
) -> Result<ConvertResponse, ConvertError> {
    let mut staged = StagedInput::stage(data, source_format, &state.work_root).await?;

    let outcome = convert(&staged, target, &state.config.converter).await?;

    let result = match outcome {
        ConversionOutcome::Completed {
            output_path,
            output_filename,
            size_bytes,
        } => {
            let store_name = format!("{}.{}", staged.id(), target.extension());
            let artifact = state.store.register(&output_path, &store_name).await?;
            info!(
                "Converted {} -> {} ({} bytes, engine wrote {} at {} bytes)",
                source_filename, artifact.filename, artifact.size, output_filename, size_bytes
            );
            Ok(ConvertResponse {
                download_url: format!("/download/{}", artifact.filename),
                filename: artifact.filename,
                size: artifact.size,
                original_filename: source_filename.to_string(),
            })
        }
        ConversionOutcome::TimedOut => Err(ConvertError::Timeout(
            state.config.converter.timeout.as_secs(),
        )),
        ConversionOutcome::EngineFailed {
            exit_code,
            stderr_excerpt,
        } => Err(ConvertError::EngineFailed {
            exit_code,
            stderr: stderr_excerpt,
        }),
        ConversionOutcome::OutputMissing => Err(ConvertError::OutputMissing),
    };

    staged.release();
    result
}

/// List stored artifacts, newest first
pub async fn list_outputs(
    State(state): State<ApiState>,
) -> Result<Json<OutputsResponse>, ApiError> {
    let artifacts = state.store.list().await?;
    let files: Vec<OutputEntry> = artifacts
        .into_iter()
        .map(|artifact| OutputEntry {
            download_url: format!("/download/{}", artifact.filename),
            filename: artifact.filename,
            size: artifact.size,
            created_at: artifact.created_at,
        })
        .collect();

    Ok(Json(OutputsResponse {
        total_count: files.len(),
        files,
    }))
}

/// Stream a stored artifact
pub async fn download_output(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let bytes = state.store.fetch(&filename).await?;
    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((headers, bytes))
}

/// Permanently delete a stored artifact
pub async fn delete_output(
    State(state): State<ApiState>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.store.delete(&filename).await?;
    Ok(Json(DeleteResponse { filename }))
}

/// List installed font families
pub async fn list_fonts(State(_state): State<ApiState>) -> Json<FontsResponse> {
    let fonts = fonts::list_font_families().await;
    Json(FontsResponse {
        total_count: fonts.len(),
        fonts,
    })
}
