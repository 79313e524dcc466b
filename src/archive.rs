//! Packaging of a finished inspection directory.

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Inspection directory {0} does not exist")]
    MissingDirectory(PathBuf),
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

/// What a run left on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub duration_secs: u64,
}

impl CollectionStats {
    /// Count regular files under `dir`; unreadable entries are ignored
    pub fn gather(dir: &Path, duration_secs: u64) -> Self {
        let mut total_files = 0;
        let mut total_size = 0;

        for entry in walkdir::WalkDir::new(dir).into_iter().flatten() {
            if entry.file_type().is_file() {
                total_files += 1;
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }

        Self {
            total_files,
            total_size_bytes: total_size,
            duration_secs,
        }
    }
}

/// `{dir}.tar.gz` next to the inspection directory
pub fn archive_path(dir: &Path) -> PathBuf {
    let mut name = dir.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tar.gz");
    dir.with_file_name(name)
}

/// Pack `dir` into a gzipped tarball whose entries are rooted at the directory's name.
pub fn create_archive(dir: &Path) -> ArchiveResult<PathBuf> {
    if !dir.is_dir() {
        return Err(ArchiveError::MissingDirectory(dir.to_path_buf()));
    }
    let path = archive_path(dir);
    info!("Creating inspection archive at {}", path.display());

    let file = File::create(&path)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    let root = dir.file_name().map(PathBuf::from).unwrap_or_default();
    archive.append_dir_all(&root, dir)?;
    archive.into_inner()?.finish()?;

    info!("Inspection archive created successfully");
    Ok(path)
}
