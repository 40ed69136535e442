//! Analysis and execution of organization runs.
//!
//! An [`Organizer`] scans a folder, filters and plans the moves, then executes a plan
//! file by file. Only one run may be in flight per organizer; runs can be cancelled
//! cooperatively between files and report progress through an [`EventSink`].

use crate::backup::{BackupError, BackupLedger};
use crate::file_category::FileMapper;
use crate::file_organizer::FileOrganizer;
use crate::filters::FilterManager;
use crate::planner::{
    self, AnalysisStats, MovePair, MoveSuggestion, OrganizationMode, PreviewEntry,
};
use crate::record::{self, FileRecord};
use crate::validator::{BatchValidator, FileValidator, ValidationReport};
use chrono::{DateTime, Local};
use crossbeam::channel::Sender;
use log::{Level, debug, error, info, log};
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;

const OPERATION_TYPE: &str = "organization";

#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("An organization is already running")]
    Busy,

    #[error("Validation failed: {}", .0.errors.join("; "))]
    Validation(ValidationReport),

    #[error("Failed to scan {}: {source}", path.display())]
    Scan { path: PathBuf, source: io::Error },

    #[error("Backup failed: {0}")]
    Backup(#[from] BackupError),

    #[error("Failed to start worker thread: {0}")]
    Spawn(io::Error),

    #[error("Worker thread panicked")]
    WorkerPanicked,
}

/// What to do when the backup for a run cannot be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupFailurePolicy {
    /// Log a warning and move the files anyway.
    #[default]
    Proceed,
    /// Fail the run before any file is moved.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupPolicy {
    pub enabled: bool,
    pub on_failure: BackupFailurePolicy,
    /// Backups kept after a successful run; `None` keeps everything.
    pub retain: Option<usize>,
}

impl Default for BackupPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            on_failure: BackupFailurePolicy::Proceed,
            retain: Some(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Counters for the current or last run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub moved_files: usize,
    pub skipped_files: usize,
    pub errors: usize,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
}

impl OperationStats {
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

/// A file that could not be moved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileError {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: String,
}

/// Result of one executed batch.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub state: OperationState,
    /// No per-file errors and not cancelled.
    pub success: bool,
    pub stats: OperationStats,
    pub moved_files: Vec<MoveSuggestion>,
    pub errors: Vec<FileError>,
    pub backup_id: Option<String>,
    /// Validation warnings and backup problems that did not stop the run.
    pub warnings: Vec<String>,
}

/// Output of [`Organizer::analyze_folder`].
#[derive(Debug, Clone)]
pub struct Analysis {
    pub folder: PathBuf,
    pub mode: OrganizationMode,
    /// Records that passed the active filters.
    pub files: Vec<FileRecord>,
    pub suggestions: Vec<MoveSuggestion>,
    pub stats: AnalysisStats,
}

#[derive(Debug, Clone)]
pub struct Preview {
    pub structure: BTreeMap<String, Vec<PreviewEntry>>,
    pub stats: AnalysisStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrganizerEvent {
    Progress {
        current: usize,
        total: usize,
        message: String,
    },
    Log {
        level: Level,
        message: String,
    },
}

/// Receives progress and log events from a run.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: OrganizerEvent);
}

impl EventSink for Sender<OrganizerEvent> {
    fn emit(&self, event: OrganizerEvent) {
        // A dropped receiver only means nobody is watching.
        let _ = self.send(event);
    }
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: OrganizerEvent) {}
}

/// Adapts a closure into an [`EventSink`].
pub struct CallbackSink<F>(pub F);

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(OrganizerEvent) + Send + Sync,
{
    fn emit(&self, event: OrganizerEvent) {
        (self.0)(event)
    }
}

/// Requests cancellation of the running batch from any thread.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A batch running on a worker thread.
pub struct OperationHandle {
    handle: JoinHandle<Result<ExecutionReport, OrganizeError>>,
    cancel: CancelHandle,
}

impl OperationHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Blocks until the worker finishes.
    pub fn wait(self) -> Result<ExecutionReport, OrganizeError> {
        self.handle
            .join()
            .map_err(|_| OrganizeError::WorkerPanicked)?
    }
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Plans and executes organization runs.
pub struct Organizer {
    mapper: FileMapper,
    filters: Mutex<FilterManager>,
    ledger: Option<Arc<BackupLedger>>,
    validator: Box<dyn BatchValidator>,
    backup_policy: BackupPolicy,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    state: Mutex<OperationState>,
    stats: Mutex<OperationStats>,
}

impl Organizer {
    /// An organizer with the default table, no filters, no backups and the default validator.
    pub fn new() -> Self {
        Self {
            mapper: FileMapper::default(),
            filters: Mutex::new(FilterManager::default()),
            ledger: None,
            validator: Box::new(FileValidator::default()),
            backup_policy: BackupPolicy::default(),
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(OperationState::Idle),
            stats: Mutex::new(OperationStats::default()),
        }
    }

    pub fn with_ledger(mut self, ledger: Arc<BackupLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_validator(mut self, validator: Box<dyn BatchValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_backup_policy(mut self, policy: BackupPolicy) -> Self {
        self.backup_policy = policy;
        self
    }

    pub fn with_mapper(mut self, mapper: FileMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_filters(mut self, filters: FilterManager) -> Self {
        self.filters = Mutex::new(filters);
        self
    }

    pub fn ledger(&self) -> Option<&Arc<BackupLedger>> {
        self.ledger.as_ref()
    }

    /// The filter manager; hold the guard only briefly.
    pub fn filters(&self) -> MutexGuard<'_, FilterManager> {
        self.filters.lock()
    }

    pub fn state(&self) -> OperationState {
        *self.state.lock()
    }

    /// Snapshot of the counters of the current or last run.
    pub fn stats(&self) -> OperationStats {
        self.stats.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    /// The raw cancel flag, for signal handlers.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Requests cancellation of the running batch. Returns `false` when idle.
    pub fn cancel_operation(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.cancel.store(true, Ordering::SeqCst);
        info!("Cancellation requested");
        true
    }

    /// Validates, scans, filters and plans `folder`. Touches nothing on disk.
    pub fn analyze_folder(
        &self,
        folder: &Path,
        mode: OrganizationMode,
    ) -> Result<Analysis, OrganizeError> {
        let report = self.validator.validate_folder(folder);
        if !report.is_valid() {
            return Err(OrganizeError::Validation(report));
        }

        let scanned =
            record::scan_folder(folder, &self.mapper).map_err(|source| OrganizeError::Scan {
                path: folder.to_path_buf(),
                source,
            })?;
        let scanned_count = scanned.len();
        let files = self.filters.lock().active().apply(scanned);

        let suggestions = planner::plan(&files, folder, mode);
        let stats = planner::analysis_stats(&files, &suggestions);

        info!(
            "Analyzed {}: {} files, {} after filters, {} categories",
            folder.display(),
            scanned_count,
            files.len(),
            stats.categories_count()
        );

        Ok(Analysis {
            folder: folder.to_path_buf(),
            mode,
            files,
            suggestions,
            stats,
        })
    }

    /// The planned folder structure for `folder`.
    pub fn preview_organization(
        &self,
        folder: &Path,
        mode: OrganizationMode,
    ) -> Result<Preview, OrganizeError> {
        let analysis = self.analyze_folder(folder, mode)?;
        Ok(Preview {
            structure: planner::preview(&analysis.suggestions),
            stats: analysis.stats,
        })
    }

    /// Executes `suggestions` on the calling thread.
    pub fn execute_organization(
        &self,
        suggestions: &[MoveSuggestion],
        create_backup: bool,
        events: &dyn EventSink,
    ) -> Result<ExecutionReport, OrganizeError> {
        let guard = self.try_begin()?;
        self.run_batch(guard, suggestions, None, create_backup, events)
    }

    /// Executes the plan of `analysis`, recording its mode in the backup.
    pub fn execute_analysis(
        &self,
        analysis: &Analysis,
        create_backup: bool,
        events: &dyn EventSink,
    ) -> Result<ExecutionReport, OrganizeError> {
        let guard = self.try_begin()?;
        self.run_batch(
            guard,
            &analysis.suggestions,
            Some(analysis.mode),
            create_backup,
            events,
        )
    }

    /// Executes the plan of `analysis` on a worker thread.
    ///
    /// A concurrent run is rejected here, before the thread is spawned.
    pub fn spawn_organization<S>(
        self: &Arc<Self>,
        analysis: Analysis,
        create_backup: bool,
        events: S,
    ) -> Result<OperationHandle, OrganizeError>
    where
        S: EventSink + 'static,
    {
        let guard = self.try_begin()?;
        let organizer = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("foldersort-worker".to_string())
            .spawn(move || {
                organizer.run_batch(
                    guard,
                    &analysis.suggestions,
                    Some(analysis.mode),
                    create_backup,
                    &events,
                )
            });
        let handle = self.worker_started(spawned)?;

        Ok(OperationHandle {
            handle,
            cancel: self.cancel_handle(),
        })
    }

    /// The worker's closure owns the run guard, so a failed spawn has already released it.
    fn worker_started<T>(
        &self,
        spawned: io::Result<JoinHandle<T>>,
    ) -> Result<JoinHandle<T>, OrganizeError> {
        spawned.map_err(|e| {
            error!("Cannot start organization worker: {}", e);
            self.fail();
            OrganizeError::Spawn(e)
        })
    }

    fn try_begin(&self) -> Result<RunGuard, OrganizeError> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| OrganizeError::Busy)?;
        self.cancel.store(false, Ordering::SeqCst);
        *self.state.lock() = OperationState::Running;
        Ok(RunGuard {
            running: Arc::clone(&self.running),
        })
    }

    fn run_batch(
        &self,
        _guard: RunGuard,
        suggestions: &[MoveSuggestion],
        mode: Option<OrganizationMode>,
        create_backup: bool,
        events: &dyn EventSink,
    ) -> Result<ExecutionReport, OrganizeError> {
        let total = suggestions.len();
        *self.stats.lock() = OperationStats {
            total_files: total,
            started_at: Some(Local::now()),
            ..OperationStats::default()
        };

        if suggestions.is_empty() {
            self.emit_log(events, Level::Info, "Nothing to organize".to_string());
            return Ok(self.finish(
                OperationState::Completed,
                Vec::new(),
                Vec::new(),
                None,
                Vec::new(),
            ));
        }

        self.emit_log(
            events,
            Level::Info,
            format!("Starting organization of {} files", total),
        );

        let folder = suggestions[0]
            .source
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let pairs: Vec<MovePair> = suggestions.iter().map(MoveSuggestion::pair).collect();

        let validation = self.validator.validate_batch(&folder, &pairs);
        for warning in &validation.warnings {
            self.emit_log(events, Level::Warn, warning.clone());
        }
        if !validation.is_valid() {
            for error in &validation.errors {
                self.emit_log(events, Level::Error, error.clone());
            }
            self.fail();
            return Err(OrganizeError::Validation(validation));
        }
        let mut warnings = validation.warnings;

        let backup_id = if create_backup && self.backup_policy.enabled {
            match self.write_backup(&folder, mode, &pairs) {
                Ok(id) => id,
                Err(e) if self.backup_policy.on_failure == BackupFailurePolicy::Proceed => {
                    let message = format!("Continuing without backup: {}", e);
                    self.emit_log(events, Level::Warn, message.clone());
                    warnings.push(message);
                    None
                }
                Err(e) => {
                    self.emit_log(events, Level::Error, format!("Backup failed: {}", e));
                    self.fail();
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let mut moved_files = Vec::new();
        let mut errors = Vec::new();
        let mut cancelled = false;

        for (index, suggestion) in suggestions.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                cancelled = true;
                self.emit_log(events, Level::Warn, "Operation cancelled by user".to_string());
                break;
            }

            match FileOrganizer::move_file(&suggestion.source, &suggestion.destination) {
                Ok(()) => {
                    self.emit_log(
                        events,
                        Level::Debug,
                        format!(
                            "Moved: {} -> {}/{}",
                            suggestion.source_name,
                            suggestion.dest_folder_name(),
                            suggestion.final_name
                        ),
                    );
                    self.stats.lock().moved_files += 1;
                    moved_files.push(suggestion.clone());
                }
                Err(e) => {
                    self.emit_log(
                        events,
                        Level::Error,
                        format!("Error moving {}: {}", suggestion.source_name, e),
                    );
                    self.stats.lock().errors += 1;
                    errors.push(FileError {
                        source: suggestion.source.clone(),
                        destination: suggestion.destination.clone(),
                        reason: e.to_string(),
                    });
                }
            }

            self.stats.lock().processed_files = index + 1;
            events.emit(OrganizerEvent::Progress {
                current: index + 1,
                total,
                message: format!("Processing: {}", suggestion.source_name),
            });
        }

        let state = if cancelled {
            OperationState::Cancelled
        } else if errors.is_empty() {
            OperationState::Completed
        } else {
            OperationState::Failed
        };

        if state == OperationState::Completed
            && backup_id.is_some()
            && let (Some(ledger), Some(keep)) = (&self.ledger, self.backup_policy.retain)
            && let Err(e) = ledger.prune_old_backups(keep)
        {
            warnings.push(format!("Failed to prune old backups: {}", e));
        }

        let report = self.finish(state, moved_files, errors, backup_id, warnings);
        self.emit_log(
            events,
            Level::Info,
            format!(
                "Organization finished: {} moved, {} errors, {} skipped",
                report.stats.moved_files, report.stats.errors, report.stats.skipped_files
            ),
        );
        Ok(report)
    }

    fn write_backup(
        &self,
        folder: &Path,
        mode: Option<OrganizationMode>,
        pairs: &[MovePair],
    ) -> Result<Option<String>, BackupError> {
        let Some(ledger) = &self.ledger else {
            debug!("No backup ledger configured, skipping backup");
            return Ok(None);
        };
        ledger
            .create_backup(OPERATION_TYPE, folder, mode, pairs)
            .map(Some)
    }

    fn fail(&self) {
        self.stats.lock().finished_at = Some(Local::now());
        *self.state.lock() = OperationState::Failed;
    }

    fn finish(
        &self,
        state: OperationState,
        moved_files: Vec<MoveSuggestion>,
        errors: Vec<FileError>,
        backup_id: Option<String>,
        warnings: Vec<String>,
    ) -> ExecutionReport {
        let stats = {
            let mut stats = self.stats.lock();
            if state == OperationState::Cancelled {
                stats.skipped_files = stats.total_files - stats.processed_files;
            }
            stats.finished_at = Some(Local::now());
            stats.clone()
        };
        *self.state.lock() = state;

        ExecutionReport {
            state,
            success: state == OperationState::Completed,
            stats,
            moved_files,
            errors,
            backup_id,
            warnings,
        }
    }

    fn emit_log(&self, events: &dyn EventSink, level: Level, message: String) {
        log!(level, "{}", message);
        events.emit(OrganizerEvent::Log { level, message });
    }
}

impl Default for Organizer {
    fn default() -> Self {
        Self::new()
    }
}
