//! foldersort - organize the files of a folder, reversibly
//!
//! This library classifies the top-level files of a folder by extension, filters them,
//! plans collision-free moves by type, date or name, executes the plan on a worker
//! thread with progress reporting and cancellation, and records every run in a backup
//! ledger that can restore it.

pub mod backup;
pub mod cli;
pub mod config;
pub mod file_category;
pub mod file_organizer;
pub mod filters;
pub mod logging;
pub mod organizer;
pub mod output;
pub mod planner;
pub mod record;
pub mod validator;

pub use backup::{BackupError, BackupLedger, BackupRecord, BackupSummary, RestoreReport};
pub use config::{ConfigError, Settings};
pub use file_category::{Category, FileMapper};
pub use filters::{Filter, FilterError, FilterManager, FilterSet, FilterSpec};
pub use organizer::{
    EventSink, ExecutionReport, OperationState, OrganizeError, Organizer, OrganizerEvent,
};
pub use planner::{MovePair, MoveSuggestion, OrganizationMode};
pub use record::FileRecord;
pub use validator::{BatchValidator, FileValidator, ValidationReport};
