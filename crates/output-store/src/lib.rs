//! Durable store for produced conversion artifacts
//!
//! The store is a single directory that outlives individual requests:
//! artifacts are registered by an atomic rename out of a request's private
//! output directory, listed newest-first, and fetched or deleted by
//! logical filename. Because publishing is a same-filesystem rename, a
//! reader can never observe a partially written artifact.
//!
//! Every externally supplied filename passes the same safety rule before
//! any path resolution: exactly one normal path component, no separators,
//! no parent references, no absolute paths. This is a mandatory security
//! invariant of the store, not an optimization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slide_convert_common::ConvertError;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Output store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("unsafe filename rejected: {0}")]
    UnsafeFilename(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for ConvertError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => ConvertError::NotFound(name),
            StoreError::UnsafeFilename(name) => ConvertError::UnsafeFilename(name),
            StoreError::Io(e) => ConvertError::Io(e),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A registered conversion artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Store-unique filename
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

/// Directory-backed artifact store
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    /// Open (and create if needed) a store rooted at `root`.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the root directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Store root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Publish a produced file into the store under `filename`.
    ///
    /// The file is renamed into place, so the move is atomic as long as
    /// the source lives on the same filesystem as the store root (the
    /// service keeps staging and store under one base directory for this
    /// reason).
    ///
    /// # Errors
    /// Returns `StoreError::UnsafeFilename` if `filename` fails the
    /// safety rule, or `StoreError::Io` on filesystem failure.
    pub async fn register(&self, produced: &Path, filename: &str) -> StoreResult<StoredArtifact> {
        let dest = self.resolve(filename)?;
        tokio::fs::rename(produced, &dest).await?;
        let meta = tokio::fs::metadata(&dest).await?;

        info!("Registered artifact {} ({} bytes)", filename, meta.len());
        Ok(StoredArtifact {
            filename: filename.to_string(),
            size: meta.len(),
            created_at: created_at(&meta),
        })
    }

    /// List all artifacts, newest first.
    ///
    /// # Errors
    /// Returns `StoreError::Io` if the store directory cannot be read.
    pub async fn list(&self) -> StoreResult<Vec<StoredArtifact>> {
        let mut artifacts = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let Some(filename) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            artifacts.push(StoredArtifact {
                filename,
                size: meta.len(),
                created_at: created_at(&meta),
            });
        }

        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(artifacts)
    }

    /// Read an artifact's bytes.
    ///
    /// # Errors
    /// `StoreError::UnsafeFilename` on a name failing the safety rule,
    /// `StoreError::NotFound` if absent, `StoreError::Io` otherwise.
    pub async fn fetch(&self, filename: &str) -> StoreResult<Vec<u8>> {
        let path = self.resolve(filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("Fetched artifact {} ({} bytes)", filename, bytes.len());
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Permanently delete an artifact.
    ///
    /// # Errors
    /// `StoreError::UnsafeFilename` on a name failing the safety rule,
    /// `StoreError::NotFound` if absent, `StoreError::Io` otherwise.
    pub async fn delete(&self, filename: &str) -> StoreResult<()> {
        let path = self.resolve(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted artifact {}", filename);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Apply the name-safety rule and resolve against the store root
    fn resolve(&self, filename: &str) -> StoreResult<PathBuf> {
        sanitize(filename)?;
        Ok(self.root.join(filename))
    }
}

/// Reject any filename that could escape the store root.
///
/// Accepts exactly one normal path component: no separators, no `..`, no
/// absolute paths, no empty or dot-leading names.
fn sanitize(filename: &str) -> StoreResult<()> {
    if filename.is_empty()
        || filename.starts_with('.')
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(StoreError::UnsafeFilename(filename.to_string()));
    }

    let mut components = Path::new(filename).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StoreError::UnsafeFilename(filename.to_string())),
    }
}

fn created_at(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.created()
        .or_else(|_| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
