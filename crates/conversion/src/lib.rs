//! Conversion engine invocation
//!
//! This crate orchestrates the external document-conversion engine
//! (LibreOffice in headless batch mode) around a staged input file:
//! - Staging of uploaded bytes into request-scoped directories
//! - Subprocess invocation with a hard wall-clock timeout
//! - Classification of the run into a [`ConversionOutcome`]
//!
//! The engine is treated as a black box with an untrusted exit status:
//! a zero exit is only believed once the expected output file is actually
//! found in the output directory.
//!
//! # Example
//! ```no_run
//! use slide_convert_common::{SourceFormat, TargetFormat};
//! use slide_convert_conversion::{convert, ConverterConfig, StagedInput};
//! use std::path::Path;
//!
//! # async fn run() -> slide_convert_common::Result<()> {
//! let staged = StagedInput::stage(b"...", SourceFormat::Pptx, Path::new("/tmp/work")).await?;
//! let outcome = convert(&staged, TargetFormat::Pdf, &ConverterConfig::default()).await?;
//! # Ok(())
//! # }
//! ```

pub mod process;
pub mod staging;

pub use staging::StagedInput;

use process::{run_with_deadline, ProcessOutcome};
use slide_convert_common::{ConvertError, Result, TargetFormat};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-invocation wall-clock budget
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Upper bound on the stderr excerpt carried in failure outcomes
pub const STDERR_EXCERPT_LIMIT: usize = 2048;

/// Engine invocation configuration
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Engine executable (a `soffice`-compatible command-line interface)
    pub binary: String,
    /// Hard wall-clock timeout per invocation
    pub timeout: Duration,
    /// Maximum stderr bytes retained for diagnostics
    pub stderr_limit: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        let binary = std::env::var("SLIDE_CONVERT_ENGINE_BIN")
            .unwrap_or_else(|_| "libreoffice".to_string());
        let timeout_secs = std::env::var("SLIDE_CONVERT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            binary,
            timeout: Duration::from_secs(timeout_secs),
            stderr_limit: STDERR_EXCERPT_LIMIT,
        }
    }
}

/// Classified result of one engine invocation
#[derive(Debug, Clone)]
pub enum ConversionOutcome {
    /// The engine exited zero and wrote the expected output file
    Completed {
        output_path: PathBuf,
        output_filename: String,
        size_bytes: u64,
    },
    /// The engine exceeded the wall-clock budget and was killed
    TimedOut,
    /// The engine exited non-zero
    EngineFailed {
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },
    /// The engine claimed success but no output file of the expected
    /// extension exists
    OutputMissing,
}

/// Run the conversion engine against a staged input.
///
/// The invocation is equivalent to
/// `{binary} --headless --convert-to {format} --outdir {out} {input}`
/// and runs on the blocking thread pool so a long conversion never stalls
/// the async reactor.
///
/// # Errors
/// Returns `ConvertError::Io` if the engine cannot be spawned or the
/// output directory cannot be inspected. Engine failures, timeouts, and
/// missing output are reported through [`ConversionOutcome`], not as
/// errors.
pub async fn convert(
    staged: &StagedInput,
    target: TargetFormat,
    config: &ConverterConfig,
) -> Result<ConversionOutcome> {
    let input = staged.input_path().to_path_buf();
    let output_dir = staged.output_dir().to_path_buf();
    let config = config.clone();

    tokio::task::spawn_blocking(move || run_engine(&input, target, &output_dir, &config))
        .await
        .map_err(|e| ConvertError::Io(std::io::Error::other(e)))?
}

/// Query the engine for its version string with a short timeout.
///
/// Used by the health endpoint; any failure yields `None`. This is a
/// blocking call, run it under `spawn_blocking` from async contexts.
#[must_use]
pub fn probe_engine(binary: &str) -> Option<String> {
    let mut cmd = Command::new(binary);
    cmd.arg("--version");

    match run_with_deadline(&mut cmd, Duration::from_secs(5), 4096) {
        Ok(ProcessOutcome::Exited { status, stdout, .. }) if status.success() => {
            String::from_utf8_lossy(&stdout)
                .lines()
                .next()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
        }
        Ok(_) => None,
        Err(e) => {
            debug!("Engine probe failed: {}", e);
            None
        }
    }
}

fn run_engine(
    input: &Path,
    target: TargetFormat,
    output_dir: &Path,
    config: &ConverterConfig,
) -> Result<ConversionOutcome> {
    let mut cmd = Command::new(&config.binary);
    cmd.arg("--headless")
        .arg("--convert-to")
        .arg(target.extension())
        .arg("--outdir")
        .arg(output_dir)
        .arg(input);

    debug!("Engine command: {:?}", cmd);

    let outcome = run_with_deadline(&mut cmd, config.timeout, config.stderr_limit)?;

    let (status, stderr) = match outcome {
        ProcessOutcome::TimedOut => {
            warn!(
                "Engine exceeded {}s budget on {}, killed",
                config.timeout.as_secs(),
                input.display()
            );
            return Ok(ConversionOutcome::TimedOut);
        }
        ProcessOutcome::Exited { status, stderr, .. } => (status, stderr),
    };

    if !status.success() {
        return Ok(ConversionOutcome::EngineFailed {
            exit_code: status.code(),
            stderr_excerpt: String::from_utf8_lossy(&stderr).into_owned(),
        });
    }

    // A zero exit is not proof of success: verify the output file exists.
    match find_output(output_dir, target)? {
        Some(output_path) => {
            let size_bytes = std::fs::metadata(&output_path)?.len();
            let output_filename = output_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(ConversionOutcome::Completed {
                output_path,
                output_filename,
                size_bytes,
            })
        }
        None => Ok(ConversionOutcome::OutputMissing),
    }
}

/// Locate the produced file of the expected extension in the output
/// directory. HTML export also emits auxiliary assets, so only files
/// matching the target extension count.
fn find_output(output_dir: &Path, target: TargetFormat) -> std::io::Result<Option<PathBuf>> {
    let mut matches: Vec<PathBuf> = Vec::new();
    for entry in std::fs::read_dir(output_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(target.extension()))
        {
            matches.push(path);
        }
    }

    matches.sort();
    if matches.len() > 1 {
        warn!(
            "Engine produced {} {} files in {}, taking the first",
            matches.len(),
            target.extension(),
            output_dir.display()
        );
    }
    Ok(matches.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use slide_convert_common::SourceFormat;
    use std::io::Write;
    use std::time::Instant;

    /// Write an executable stub engine script and return its path.
    ///
    /// The engine contract passes arguments as
    /// `--headless --convert-to <fmt> --outdir <dir> <input>`, so inside
    /// the script `$3` is the format, `$5` the output directory, and `$6`
    /// the input file.
    fn stub_engine(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("stub-engine.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "{body}").unwrap();
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    fn config_for(binary: &Path, timeout: Duration) -> ConverterConfig {
        ConverterConfig {
            binary: binary.to_string_lossy().into_owned(),
            timeout,
            stderr_limit: STDERR_EXCERPT_LIMIT,
        }
    }

    #[tokio::test]
    async fn test_completed_outcome_with_output_file() {
        let root = tempfile::tempdir().unwrap();
        let engine = stub_engine(
            root.path(),
            r#"stem=$(basename "$6"); cp "$6" "$5/${stem%.*}.$3""#,
        );
        let staged = StagedInput::stage(b"deck", SourceFormat::Pptx, root.path())
            .await
            .unwrap();

        let outcome = convert(
            &staged,
            TargetFormat::Pdf,
            &config_for(&engine, Duration::from_secs(10)),
        )
        .await
        .unwrap();

        match outcome {
            ConversionOutcome::Completed {
                output_path,
                output_filename,
                size_bytes,
            } => {
                assert!(output_path.is_file());
                assert!(output_filename.ends_with(".pdf"));
                assert_eq!(size_bytes, 4);
            }
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_engine_within_margin() {
        let root = tempfile::tempdir().unwrap();
        let engine = stub_engine(root.path(), "sleep 5");
        let staged = StagedInput::stage(b"deck", SourceFormat::Pptx, root.path())
            .await
            .unwrap();

        let start = Instant::now();
        let outcome = convert(
            &staged,
            TargetFormat::Pdf,
            &config_for(&engine, Duration::from_secs(1)),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, ConversionOutcome::TimedOut));
        assert!(start.elapsed() < Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_engine_failure_carries_stderr_excerpt() {
        let root = tempfile::tempdir().unwrap();
        let engine = stub_engine(root.path(), "echo 'source file could not be loaded' >&2; exit 77");
        let staged = StagedInput::stage(b"deck", SourceFormat::Ppt, root.path())
            .await
            .unwrap();

        let outcome = convert(
            &staged,
            TargetFormat::Pdf,
            &config_for(&engine, Duration::from_secs(10)),
        )
        .await
        .unwrap();

        match outcome {
            ConversionOutcome::EngineFailed {
                exit_code,
                stderr_excerpt,
            } => {
                assert_eq!(exit_code, Some(77));
                assert!(stderr_excerpt.contains("could not be loaded"));
            }
            other => panic!("expected EngineFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_exit_without_output_is_output_missing() {
        let root = tempfile::tempdir().unwrap();
        let engine = stub_engine(root.path(), "exit 0");
        let staged = StagedInput::stage(b"deck", SourceFormat::Odp, root.path())
            .await
            .unwrap();

        let outcome = convert(
            &staged,
            TargetFormat::Html,
            &config_for(&engine, Duration::from_secs(10)),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, ConversionOutcome::OutputMissing));
    }

    #[tokio::test]
    async fn test_stderr_excerpt_is_bounded() {
        let root = tempfile::tempdir().unwrap();
        // ~64 KiB of stderr noise, far beyond the excerpt cap
        let engine = stub_engine(
            root.path(),
            "i=0; while [ $i -lt 2048 ]; do echo 'noisy engine diagnostics' >&2; i=$((i+1)); done; exit 1",
        );
        let staged = StagedInput::stage(b"deck", SourceFormat::Pptx, root.path())
            .await
            .unwrap();

        let outcome = convert(
            &staged,
            TargetFormat::Pdf,
            &config_for(&engine, Duration::from_secs(10)),
        )
        .await
        .unwrap();

        match outcome {
            ConversionOutcome::EngineFailed { stderr_excerpt, .. } => {
                assert!(stderr_excerpt.len() <= STDERR_EXCERPT_LIMIT);
                assert!(stderr_excerpt.contains("noisy engine diagnostics"));
            }
            other => panic!("expected EngineFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_find_output_ignores_auxiliary_files() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("deck.html"), "<html/>").unwrap();
        std::fs::write(root.path().join("deck_img0.png"), "png").unwrap();
        std::fs::write(root.path().join("deck_img1.gif"), "gif").unwrap();

        let found = find_output(root.path(), TargetFormat::Html).unwrap();
        assert_eq!(
            found.and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned())),
            Some("deck.html".to_string())
        );
    }

    #[test]
    fn test_find_output_empty_dir() {
        let root = tempfile::tempdir().unwrap();
        assert!(find_output(root.path(), TargetFormat::Pdf).unwrap().is_none());
    }

    #[test]
    fn test_probe_engine_missing_binary() {
        assert_eq!(probe_engine("/nonexistent/engine-binary"), None);
    }

    #[test]
    fn test_probe_engine_reports_version_line() {
        let root = tempfile::tempdir().unwrap();
        let engine = stub_engine(root.path(), "echo 'StubOffice 7.6.4.1'");
        let version = probe_engine(&engine.to_string_lossy());
        assert_eq!(version.as_deref(), Some("StubOffice 7.6.4.1"));
    }

    #[test]
    fn test_default_config() {
        let config = ConverterConfig::default();
        assert!(!config.binary.is_empty());
        assert_eq!(config.stderr_limit, STDERR_EXCERPT_LIMIT);
    }
}
