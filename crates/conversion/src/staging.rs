//! Request-scoped staging directories for uploaded documents
//!
//! Every conversion stages its input in a fresh uuid-named directory under
//! the work root:
//!
//! ```text
//! {work_root}/{uuid}/{uuid}.pptx   staged input
//! {work_root}/{uuid}/out/          engine output directory
//! ```
//!
//! The directory is owned by exactly one in-flight conversion and is
//! removed unconditionally once that conversion finishes, whatever the
//! outcome. Cleanup also runs from `Drop`, mirroring the guard pattern
//! used for downloaded temp files elsewhere in the service.

use slide_convert_common::{Result, SourceFormat};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A staged input file, exclusively owned by one conversion
#[derive(Debug)]
pub struct StagedInput {
    id: Uuid,
    dir: PathBuf,
    input_path: PathBuf,
    output_dir: PathBuf,
    released: bool,
}

impl StagedInput {
    /// Write uploaded bytes into a fresh staging directory.
    ///
    /// The staged file is named after the request uuid, never after the
    /// client-supplied filename, so concurrent requests cannot collide and
    /// untrusted names never reach the filesystem.
    ///
    /// # Errors
    /// Returns `ConvertError::Io` if the staging directory or file cannot
    /// be created.
    pub async fn stage(bytes: &[u8], format: SourceFormat, work_root: &Path) -> Result<Self> {
        let id = Uuid::new_v4();
        let dir = work_root.join(id.to_string());
        let output_dir = dir.join("out");
        tokio::fs::create_dir_all(&output_dir).await?;

        let input_path = dir.join(format!("{}.{}", id, format.extension()));
        tokio::fs::write(&input_path, bytes).await?;

        debug!(
            "Staged {} byte upload at {}",
            bytes.len(),
            input_path.display()
        );

        Ok(Self {
            id,
            dir,
            input_path,
            output_dir,
            released: false,
        })
    }

    /// Unique id of this staging, used to derive the store filename
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path to the staged input file
    #[must_use]
    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    /// Directory the engine writes its output into
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Remove the staging directory. Idempotent; also runs from `Drop`.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove staging directory {}: {}",
                    self.dir.display(),
                    e
                );
            }
        } else {
            debug!("Released staging directory {}", self.dir.display());
        }
    }
}

impl Drop for StagedInput {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_writes_input_and_output_dir() {
        let root = tempfile::tempdir().unwrap();
        let staged = StagedInput::stage(b"deck bytes", SourceFormat::Pptx, root.path())
            .await
            .unwrap();

        assert!(staged.input_path().is_file());
        assert!(staged.output_dir().is_dir());
        assert_eq!(
            staged.input_path().extension().and_then(|e| e.to_str()),
            Some("pptx")
        );
        assert_eq!(std::fs::read(staged.input_path()).unwrap(), b"deck bytes");
    }

    #[tokio::test]
    async fn test_concurrent_stagings_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let a = StagedInput::stage(b"a", SourceFormat::Ppt, root.path())
            .await
            .unwrap();
        let b = StagedInput::stage(b"b", SourceFormat::Ppt, root.path())
            .await
            .unwrap();

        assert_ne!(a.input_path(), b.input_path());
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_release_removes_directory_and_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let mut staged = StagedInput::stage(b"x", SourceFormat::Odp, root.path())
            .await
            .unwrap();
        let dir = staged.input_path().parent().unwrap().to_path_buf();

        staged.release();
        assert!(!dir.exists());

        // Second release is a no-op
        staged.release();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_drop_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let dir = {
            let staged = StagedInput::stage(b"x", SourceFormat::Pptx, root.path())
                .await
                .unwrap();
            staged.input_path().parent().unwrap().to_path_buf()
        };
        assert!(!dir.exists());
    }
}
