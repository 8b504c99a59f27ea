//! Locating the files an automation leaves in its working directory.
//!
//! When several files match, the lexicographically first path wins. This is
//! deterministic but arbitrary: automations are expected to produce a single
//! artifact per run.

use std::io;
use std::path::{Path, PathBuf};

use jobgate_job_queue::ArtifactKind;

/// Extension of the log file an automation writes when it cannot finish.
pub const LOG_EXTENSION: &str = "log";

/// Last line of `text` that is not blank, trimmed.
pub fn last_non_empty_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// First regular file in `dir` with the given extension, by path order.
///
/// A missing directory yields `None`.
pub async fn first_with_extension(dir: &Path, extension: &str) -> io::Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut matches = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if has_extension(&path, extension) && entry.file_type().await?.is_file() {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches.into_iter().next())
}

/// Find the artifact of a finished run.
///
/// The path the process printed last on stdout is preferred; relative paths
/// resolve against `work_dir`. Otherwise `work_dir` is scanned.
pub async fn locate_artifact(
    work_dir: &Path,
    stdout: &str,
    kind: ArtifactKind,
) -> io::Result<Option<PathBuf>> {
    if let Some(line) = last_non_empty_line(stdout) {
        let declared = work_dir.join(line);
        if has_extension(&declared, kind.extension()) && is_file(&declared).await {
            return Ok(Some(declared));
        }
    }
    first_with_extension(work_dir, kind.extension()).await
}

/// Last non-empty line of the run's log file, if one was written.
pub async fn log_diagnostic(work_dir: &Path) -> io::Result<Option<String>> {
    let Some(log) = first_with_extension(work_dir, LOG_EXTENSION).await? else {
        return Ok(None);
    };
    let bytes = tokio::fs::read(&log).await?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(last_non_empty_line(&text).map(str::to_owned))
}
