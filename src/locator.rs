use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub const CONTAINER_EXTENSION: &str = "mkv";

/// Check that `directory` exists and is a directory, returning its absolute path
pub async fn ensure_directory(directory: &Path) -> Result<PathBuf> {
    let not_found = || Error::DirectoryNotFound {
        path: directory.to_path_buf(),
    };
    let metadata = tokio::fs::metadata(directory)
        .await
        .map_err(|_| not_found())?;
    if !metadata.is_dir() {
        return Err(not_found());
    }
    Ok(tokio::fs::canonicalize(directory).await?)
}

/// Every `.mkv` file below `root`, recursively, sorted by file name within each directory
pub async fn find_containers(root: &Path) -> Result<Vec<PathBuf>> {
    let root = root.to_path_buf();
    let files = tokio::task::spawn_blocking(move || walk(&root))
        .await
        .map_err(std::io::Error::other)??;
    info!(count = files.len(), "Found container files");
    Ok(files)
}

fn walk(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() > 0 => {
                warn!(%error, "Skipping unreadable entry");
                continue;
            }
            Err(error) => return Err(std::io::Error::other(error).into()),
        };

        let path = entry.path();
        if entry.file_type().is_file() && is_container(path) {
            debug!(file = %path.display(), "Found container");
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

fn is_container(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CONTAINER_EXTENSION))
}
