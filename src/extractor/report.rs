use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Outcome of extracting a single quick app.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    pub identifier: String,
    pub display_name: String,
    pub output_path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
    /// Regular files found under `output_path` after the pull
    pub files: usize,
    pub bytes: u64,
}

impl ExtractionResult {
    pub fn succeeded(identifier: &str, display_name: String, output_path: PathBuf) -> Self {
        let (files, bytes) = count_tree(&output_path);
        Self {
            identifier: identifier.to_string(),
            display_name,
            output_path,
            success: true,
            error: None,
            files,
            bytes,
        }
    }

    pub fn failed<S: Into<String>>(identifier: &str, output_path: PathBuf, error: S) -> Self {
        Self {
            identifier: identifier.to_string(),
            display_name: identifier.to_string(),
            output_path,
            success: false,
            error: Some(error.into()),
            files: 0,
            bytes: 0,
        }
    }
}

/// One line of the `list` catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageEntry {
    pub identifier: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub results: Vec<ExtractionResult>,
}

impl RunSummary {
    pub fn from_results(results: Vec<ExtractionResult>, elapsed: Duration) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            elapsed,
            results,
        }
    }
}

/// File count and total size of the regular files below `root`.
///
/// Unreadable entries are skipped; a missing root counts as empty.
pub fn count_tree(root: &Path) -> (usize, u64) {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .fold((0, 0), |(files, bytes), metadata| (files + 1, bytes + metadata.len()))
}
