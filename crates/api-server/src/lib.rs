//! REST API server for presentation conversion
//!
//! Exposes the conversion pipeline over HTTP:
//! - `POST /convert` uploads a presentation and returns the produced artifact reference
//! - `GET /outputs`, `GET /download/{filename}`, `DELETE /outputs/{filename}` manage artifacts
//! - `GET /fonts` and `GET /health` are read-only diagnostics

mod error;
mod fonts;
mod handlers;
mod types;

use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{delete, get, post},
    Router,
};
use slide_convert_conversion::ConverterConfig;
use slide_convert_store::OutputStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use handlers::*;
pub use types::*;

/// Default cap on simultaneous engine invocations
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Default cap on conversions waiting behind the gate
pub const DEFAULT_MAX_QUEUED: usize = 8;

/// Default upload size limit (50 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Base data directory; staging lives under `work/`, artifacts under
    /// `outputs/`. Keeping both under one base directory makes artifact
    /// publication a same-filesystem rename.
    pub data_dir: PathBuf,
    /// Simultaneous engine invocations permitted process-wide
    pub max_concurrent: usize,
    /// Conversions allowed to wait behind the gate before backpressure
    pub max_queued: usize,
    /// Upload body size limit in bytes
    pub max_upload_bytes: usize,
    /// Engine invocation configuration
    pub converter: ConverterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let data_dir = std::env::var("SLIDE_CONVERT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("slide-convert"));
        let max_concurrent = env_usize("SLIDE_CONVERT_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT);
        let max_queued = env_usize("SLIDE_CONVERT_MAX_QUEUED", DEFAULT_MAX_QUEUED);
        let max_upload_bytes =
            env_usize("SLIDE_CONVERT_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES);

        Self {
            data_dir,
            max_concurrent,
            max_queued,
            max_upload_bytes,
            converter: ConverterConfig::default(),
        }
    }
}

fn env_usize(var: &str, default: usize) -> usize {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// API server state shared across handlers
#[derive(Clone)]
pub struct ApiState {
    /// Artifact store
    pub store: Arc<OutputStore>,
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Root directory for request-scoped staging
    pub work_root: PathBuf,
    /// Bounds simultaneous engine invocations; waiters are FIFO
    pub gate: Arc<Semaphore>,
    /// Bounds admitted conversions (running + queued); `try_acquire`
    /// failure is the backpressure signal
    pub admission: Arc<Semaphore>,
}

impl ApiState {
    /// Create API state, allocating the work and store directories.
    ///
    /// # Errors
    /// Fails if the data directories cannot be created.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let work_root = config.data_dir.join("work");
        std::fs::create_dir_all(&work_root)?;
        let store = OutputStore::open(config.data_dir.join("outputs"))?;

        let gate = Arc::new(Semaphore::new(config.max_concurrent));
        let admission = Arc::new(Semaphore::new(config.max_concurrent + config.max_queued));

        Ok(Self {
            store: Arc::new(store),
            work_root,
            gate,
            admission,
            config: Arc::new(config),
        })
    }
}

/// Build the API router with all endpoints
pub fn build_router(state: ApiState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Conversion
        .route("/convert", post(convert_document))
        // Artifact management
        .route("/outputs", get(list_outputs))
        .route("/outputs/{filename}", delete(delete_output))
        .route("/download/{filename}", get(download_output))
        // Diagnostics
        .route("/fonts", get(list_fonts))
        // Middleware
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the API server
pub async fn start_server(addr: &str, state: ApiState) -> Result<(), std::io::Error> {
    tracing::info!("Starting API server on {}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}
