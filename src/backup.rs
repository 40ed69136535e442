/// Durable, reversible records of organization runs.
///
/// Every run writes one manifest `backup_<id>.json` holding the ordered
/// `(source, destination)` pairs, plus an entry in `backup_index.json`. Restoring a
/// manifest moves each file that is still at its destination back to its source.
///
/// Index updates are serialized by a mutex and written as whole files through a
/// temp-file rename, so a crash leaves either the old or the new index on disk. Opening
/// a ledger reconciles the index with the manifests present in the directory.
///
/// # Examples
///
/// ```no_run
/// use foldersort::backup::BackupLedger;
/// use std::path::Path;
///
/// let ledger = BackupLedger::open(Path::new("/tmp/foldersort-backups"))?;
/// for backup in ledger.list_backups() {
///     println!("{} {} files", backup.id, backup.file_count);
/// }
/// # Ok::<(), foldersort::backup::BackupError>(())
/// ```
use crate::file_organizer::FileOrganizer;
use crate::planner::{MovePair, OrganizationMode};
use chrono::{DateTime, Duration, Local};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const INDEX_FILE_NAME: &str = "backup_index.json";
pub const BACKUP_VERSION: &str = "2.0";
const RECORD_PREFIX: &str = "backup_";
const RECORD_SUFFIX: &str = ".json";
const ID_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Errors raised by the backup ledger.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Invalid backup data in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Backup not found: {0}")]
    NotFound(String),

    #[error("Invalid backup id: {0}")]
    InvalidId(String),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> BackupError + '_ {
    move |source| BackupError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Full manifest of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub id: String,
    pub created_at: DateTime<Local>,
    pub operation_type: String,
    #[serde(default)]
    pub organization_mode: Option<OrganizationMode>,
    pub source_folder: PathBuf,
    pub total_files: usize,
    pub files_moved: Vec<MovePair>,
    pub backup_version: String,
}

impl BackupRecord {
    fn summary(&self) -> BackupSummary {
        BackupSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            operation_type: self.operation_type.clone(),
            file_count: self.files_moved.len(),
            source_folder: self.source_folder.clone(),
        }
    }
}

/// Index entry for a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub id: String,
    pub created_at: DateTime<Local>,
    pub operation_type: String,
    pub file_count: usize,
    pub source_folder: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BackupIndex {
    #[serde(default)]
    backups: Vec<BackupSummary>,
    #[serde(default)]
    last_cleanup: Option<DateTime<Local>>,
}

/// What a restore did, pair by pair.
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub backup_id: String,
    pub restored: usize,
    /// Pairs whose destination no longer exists.
    pub skipped: Vec<MovePair>,
    pub failed: Vec<(MovePair, String)>,
    /// Empty folders removed from the source folder afterwards.
    pub removed_folders: Vec<PathBuf>,
}

impl RestoreReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The backup store rooted at one directory.
pub struct BackupLedger {
    dir: PathBuf,
    index: Mutex<BackupIndex>,
}

impl BackupLedger {
    /// Opens (creating if needed) the ledger in `dir` and repairs its index.
    pub fn open(dir: &Path) -> Result<Self, BackupError> {
        fs::create_dir_all(dir).map_err(io_error(dir))?;

        let ledger = Self {
            dir: dir.to_path_buf(),
            index: Mutex::new(BackupIndex::default()),
        };
        let (index, repaired) = ledger.reload_index();
        if repaired {
            ledger.save_index(&index)?;
        }
        *ledger.index.lock() = index;

        debug!("Backup ledger opened at {}", dir.display());
        Ok(ledger)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn index_path(&self) -> PathBuf {
        self.dir.join(INDEX_FILE_NAME)
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", RECORD_PREFIX, id, RECORD_SUFFIX))
    }

    fn load_index(&self) -> BackupIndex {
        let path = self.index_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return BackupIndex::default(),
            Err(e) => {
                warn!("Cannot read backup index {}: {}", path.display(), e);
                return BackupIndex::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(
                "Backup index {} is corrupted, rebuilding it: {}",
                path.display(),
                e
            );
            BackupIndex::default()
        })
    }

    /// Reads the index from disk and repairs it. Returns whether repair changed it.
    fn reload_index(&self) -> (BackupIndex, bool) {
        let mut index = self.load_index();
        let repaired = self.repair(&mut index);
        (index, repaired)
    }

    fn save_index(&self, index: &BackupIndex) -> Result<(), BackupError> {
        let path = self.index_path();
        let json = serde_json::to_string_pretty(index).map_err(|source| BackupError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, json.as_bytes())
    }

    /// Drops index entries without a manifest and indexes manifests the index lacks.
    /// Returns whether the index changed.
    fn repair(&self, index: &mut BackupIndex) -> bool {
        let before = index.backups.len();
        index
            .backups
            .retain(|entry| self.record_path(&entry.id).is_file());
        let mut changed = index.backups.len() != before;
        if changed {
            warn!(
                "Dropped {} backup index entries without a manifest",
                before - index.backups.len()
            );
        }

        let known: HashSet<String> = index.backups.iter().map(|b| b.id.clone()).collect();
        for id in self.manifest_ids() {
            if known.contains(&id) {
                continue;
            }
            match self.read_record(&id) {
                Ok(record) => {
                    info!("Re-indexed backup manifest {}", id);
                    index.backups.push(record.summary());
                    changed = true;
                }
                Err(e) => warn!("Ignoring unreadable backup manifest {}: {}", id, e),
            }
        }
        changed
    }

    fn manifest_ids(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                if name == INDEX_FILE_NAME {
                    return None;
                }
                name.strip_prefix(RECORD_PREFIX)
                    .and_then(|rest| rest.strip_suffix(RECORD_SUFFIX))
                    .filter(|id| is_valid_id(id))
                    .map(str::to_string)
            })
            .collect()
    }

    fn read_record(&self, id: &str) -> Result<BackupRecord, BackupError> {
        if !is_valid_id(id) {
            return Err(BackupError::InvalidId(id.to_string()));
        }
        let path = self.record_path(id);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BackupError::NotFound(id.to_string()));
            }
            Err(e) => return Err(io_error(&path)(e)),
        };
        serde_json::from_str(&content).map_err(|source| BackupError::Json { path, source })
    }

    /// Persists a manifest for `moves` and returns its id.
    pub fn create_backup(
        &self,
        operation_type: &str,
        source_folder: &Path,
        mode: Option<OrganizationMode>,
        moves: &[MovePair],
    ) -> Result<String, BackupError> {
        let mut cached = self.index.lock();
        // Other processes may have written the index since this ledger was opened.
        let (mut index, _) = self.reload_index();

        let mut created_at = Local::now();
        let mut id = created_at.format(ID_FORMAT).to_string();
        while index.backups.iter().any(|b| b.id == id) || self.record_path(&id).exists() {
            created_at += Duration::microseconds(1);
            id = created_at.format(ID_FORMAT).to_string();
        }

        let record = BackupRecord {
            id: id.clone(),
            created_at,
            operation_type: operation_type.to_string(),
            organization_mode: mode,
            source_folder: source_folder.to_path_buf(),
            total_files: moves.len(),
            files_moved: moves.to_vec(),
            backup_version: BACKUP_VERSION.to_string(),
        };

        let path = self.record_path(&id);
        let json = serde_json::to_string_pretty(&record).map_err(|source| BackupError::Json {
            path: path.clone(),
            source,
        })?;
        write_atomic(&path, json.as_bytes())?;

        index.backups.push(record.summary());
        if let Err(e) = self.save_index(&index) {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
        *cached = index;

        info!(
            "Backup {} created for {} ({} files)",
            id,
            source_folder.display(),
            moves.len()
        );
        Ok(id)
    }

    /// Index entries, newest first.
    pub fn list_backups(&self) -> Vec<BackupSummary> {
        let mut backups = self.index.lock().backups.clone();
        backups.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        backups
    }

    pub fn get_backup(&self, id: &str) -> Result<BackupRecord, BackupError> {
        self.read_record(id)
    }

    /// Newest backup whose source folder is `folder`.
    pub fn latest_for_folder(&self, folder: &Path) -> Option<BackupSummary> {
        self.list_backups()
            .into_iter()
            .find(|b| b.source_folder == folder)
    }

    pub fn last_cleanup(&self) -> Option<DateTime<Local>> {
        self.index.lock().last_cleanup
    }

    /// Moves every file still at its recorded destination back to its source.
    ///
    /// Pairs are undone in reverse order. A source path that is occupied is never
    /// overwritten; that pair is reported as failed. The manifest is kept.
    pub fn restore_backup(&self, id: &str) -> Result<RestoreReport, BackupError> {
        let record = self.read_record(id)?;
        let mut report = RestoreReport {
            backup_id: id.to_string(),
            ..RestoreReport::default()
        };

        for pair in record.files_moved.iter().rev() {
            if fs::symlink_metadata(&pair.destination).is_err() {
                debug!("Skipping {}: no longer at destination", pair.destination.display());
                report.skipped.push(pair.clone());
                continue;
            }
            if fs::symlink_metadata(&pair.source).is_ok() {
                report
                    .failed
                    .push((pair.clone(), "original location is occupied".to_string()));
                continue;
            }

            match FileOrganizer::move_file(&pair.destination, &pair.source) {
                Ok(()) => report.restored += 1,
                Err(e) => {
                    warn!("Failed to restore {}: {}", pair.source.display(), e);
                    report.failed.push((pair.clone(), e.to_string()));
                }
            }
        }

        report.removed_folders = remove_empty_subfolders(&record.source_folder);

        info!(
            "Backup {} restored: {} files back, {} skipped, {} failed",
            id,
            report.restored,
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Deletes a manifest and its index entry. Never touches organized files.
    /// Returns `false` when the backup did not exist.
    pub fn delete_backup(&self, id: &str) -> Result<bool, BackupError> {
        if !is_valid_id(id) {
            return Err(BackupError::InvalidId(id.to_string()));
        }
        let mut cached = self.index.lock();

        let path = self.record_path(id);
        let file_removed = match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(io_error(&path)(e)),
        };

        let mut index = self.load_index();
        let before = index.backups.len();
        index.backups.retain(|b| b.id != id);
        let entry_removed = index.backups.len() != before;
        let repaired = self.repair(&mut index);
        if entry_removed || repaired {
            self.save_index(&index)?;
        }
        *cached = index;

        if file_removed || entry_removed {
            info!("Backup {} deleted", id);
        }
        Ok(file_removed || entry_removed)
    }

    /// Keeps the `keep` newest backups and deletes the rest. Returns how many were deleted.
    pub fn prune_old_backups(&self, keep: usize) -> Result<usize, BackupError> {
        let mut deleted = 0;
        for backup in self.list_backups().into_iter().skip(keep) {
            if self.delete_backup(&backup.id)? {
                deleted += 1;
            }
        }

        let mut cached = self.index.lock();
        let (mut index, _) = self.reload_index();
        index.last_cleanup = Some(Local::now());
        self.save_index(&index)?;
        *cached = index;

        if deleted > 0 {
            info!("Pruned {} old backups, kept {}", deleted, keep);
        }
        Ok(deleted)
    }
}

/// Backup ids are generated from timestamps; anything else could escape the directory.
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), BackupError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).map_err(io_error(&tmp))?;
    fs::rename(&tmp, path).map_err(io_error(path))
}

/// Removes folders directly under `base` that are empty. Not recursive.
fn remove_empty_subfolders(base: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(base) else {
        return Vec::new();
    };

    let mut removed = Vec::new();
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        // remove_dir refuses non-empty folders.
        if fs::remove_dir(&path).is_ok() {
            debug!("Removed empty folder {}", path.display());
            removed.push(path);
        }
    }
    removed
}
