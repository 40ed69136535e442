//! File snapshots taken when a folder is scanned.

use crate::file_category::{Category, FileMapper, normalize_extension};
use chrono::{DateTime, Local};
use log::{debug, warn};
use serde::Serialize;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Immutable snapshot of one file at scan time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// File name including the extension.
    pub name: String,
    pub size_bytes: u64,
    /// Lower-case extension with a leading dot, empty when the file has none.
    pub extension: String,
    pub modified: DateTime<Local>,
    /// Creation time; platforms without birth time report the modification time.
    pub created: DateTime<Local>,
    pub accessed: DateTime<Local>,
    pub is_hidden: bool,
    pub is_readonly: bool,
    pub category: Category,
}

impl FileRecord {
    /// Builds a record for `path`, reading its metadata.
    pub fn from_path(path: &Path, mapper: &FileMapper) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self::from_metadata(path, &metadata, mapper))
    }

    fn from_metadata(path: &Path, metadata: &Metadata, mapper: &FileMapper) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| normalize_extension(&e.to_string_lossy()))
            .unwrap_or_default();

        let modified: DateTime<Local> = metadata
            .modified()
            .map(DateTime::from)
            .unwrap_or_else(|_| Local::now());
        let created = metadata.created().map(DateTime::from).unwrap_or(modified);
        let accessed = metadata.accessed().map(DateTime::from).unwrap_or(modified);

        let category = mapper.category_of(&extension);

        Self {
            path: path.to_path_buf(),
            is_hidden: is_hidden(&name, metadata),
            is_readonly: metadata.permissions().readonly(),
            name,
            size_bytes: metadata.len(),
            extension,
            modified,
            created,
            accessed,
            category,
        }
    }

    /// Size in mebibytes, as used by size filters and statistics.
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }
}

#[cfg(windows)]
fn is_hidden(name: &str, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0 || name.starts_with('.')
}

#[cfg(not(windows))]
fn is_hidden(name: &str, _metadata: &Metadata) -> bool {
    name.starts_with('.')
}

/// Scans the top level of `folder` and returns a record per regular file.
///
/// Subdirectories are not descended into. Entries that vanish or cannot be
/// inspected between listing and stat are skipped with a warning.
pub fn scan_folder(folder: &Path, mapper: &FileMapper) -> io::Result<Vec<FileRecord>> {
    let mut records = Vec::new();

    for entry in fs::read_dir(folder)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", folder.display(), e);
                continue;
            }
        };

        let path = entry.path();
        match entry.metadata() {
            Ok(metadata) if metadata.is_file() => {
                records.push(FileRecord::from_metadata(&path, &metadata, mapper));
            }
            Ok(_) => {}
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }

    // read_dir order is platform-defined; planning is deterministic over a sorted inventory.
    records.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Scanned {} files in {}", records.len(), folder.display());

    Ok(records)
}
