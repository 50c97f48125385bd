//! Provisioning script discovery and execution

pub mod executor;

pub use executor::{ExecutionResult, Interpreter};

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// One script found in the scripts directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub path: PathBuf,
    pub name: String,
}

/// List the scripts in `dir`, sorted by file name
///
/// Sub-directories are skipped. The caller decides what an unreadable or
/// missing directory means.
pub async fn discover(dir: impl AsRef<Path>) -> std::io::Result<Vec<ScriptEntry>> {
    let dir = dir.as_ref();
    let mut entries = Vec::new();

    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let file_type = entry.file_type().await?;
        let path = entry.path();

        if file_type.is_dir() {
            debug!("Skipping directory {}", path.display());
            continue;
        }

        entries.push(ScriptEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path,
        });
    }

    // read_dir order is filesystem-dependent
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(entries)
}
