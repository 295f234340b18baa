//! Host font introspection via fontconfig
//!
//! The engine renders with whatever fonts the host has installed, so the
//! service exposes the installed font families as a read-only diagnostic.
//! Failures here are never fatal: a missing `fc-list` binary, a non-zero
//! exit, or a timeout all degrade to an empty list with a warning.

use slide_convert_conversion::process::{run_with_deadline, ProcessOutcome};
use std::collections::BTreeSet;
use std::process::Command;
use std::time::Duration;
use tracing::warn;

/// Budget for the fontconfig query
const FC_LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Cap on captured fontconfig output
const FC_LIST_CAPTURE_LIMIT: usize = 1024 * 1024;

/// List installed font family names, deduplicated and sorted
pub async fn list_font_families() -> Vec<String> {
    match tokio::task::spawn_blocking(query_fontconfig).await {
        Ok(families) => families,
        Err(e) => {
            warn!("Font query task failed: {}", e);
            Vec::new()
        }
    }
}

fn query_fontconfig() -> Vec<String> {
    let mut cmd = Command::new("fc-list");
    cmd.arg("--format").arg("%{family}\n");

    let outcome = match run_with_deadline(&mut cmd, FC_LIST_TIMEOUT, FC_LIST_CAPTURE_LIMIT) {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("Failed to run fc-list: {}", e);
            return Vec::new();
        }
    };

    let stdout = match outcome {
        ProcessOutcome::Exited { status, stdout, .. } if status.success() => stdout,
        ProcessOutcome::Exited { status, .. } => {
            warn!("fc-list exited with {}", status);
            return Vec::new();
        }
        ProcessOutcome::TimedOut => {
            warn!("fc-list timed out after {}s", FC_LIST_TIMEOUT.as_secs());
            return Vec::new();
        }
    };

    parse_families(&String::from_utf8_lossy(&stdout))
}

/// Split fontconfig output into distinct, sorted family names.
///
/// fc-list emits one family per line; a line can carry comma-separated
/// aliases (e.g. localized names), each of which counts as a family.
fn parse_families(output: &str) -> Vec<String> {
    let mut families = BTreeSet::new();
    for line in output.lines() {
        for name in line.split(',') {
            let name = name.trim();
            if !name.is_empty() {
                families.insert(name.to_string());
            }
        }
    }
    families.into_iter().collect()
}
