//! Planning: where each file goes, and how name collisions are resolved.
//!
//! Planning only ever checks whether a path exists. It never creates folders
//! or moves files; that is the job of the [`Organizer`](crate::organizer::Organizer).

use crate::file_category::Category;
use crate::record::FileRecord;
use chrono::{DateTime, Datelike, Local};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Counter attempts before falling back to a timestamp suffix.
pub const MAX_COUNTER_ATTEMPTS: u32 = 9999;

/// Folder used by the custom mode.
pub const CUSTOM_FOLDER: &str = "Organized";

/// How destination folders are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationMode {
    /// `<base>/<category label>`
    #[default]
    ByType,
    /// `<base>/<year>-<month>` from the modification time
    ByDate,
    /// `<base>/<first letter>`, `#` for anything not alphabetic
    ByName,
    /// `<base>/Organized`
    Custom,
}

impl OrganizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationMode::ByType => "by_type",
            OrganizationMode::ByDate => "by_date",
            OrganizationMode::ByName => "by_name",
            OrganizationMode::Custom => "custom",
        }
    }

    /// The destination folder for `record` under `base_folder`.
    pub fn destination_folder(&self, base_folder: &Path, record: &FileRecord) -> PathBuf {
        match self {
            OrganizationMode::ByType => base_folder.join(record.category.label()),
            OrganizationMode::ByDate => base_folder.join(date_bucket(&record.modified)),
            OrganizationMode::ByName => base_folder.join(name_bucket(&record.name)),
            OrganizationMode::Custom => base_folder.join(CUSTOM_FOLDER),
        }
    }
}

impl fmt::Display for OrganizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrganizationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "by_type" | "type" => Ok(OrganizationMode::ByType),
            "by_date" | "date" => Ok(OrganizationMode::ByDate),
            "by_name" | "name" => Ok(OrganizationMode::ByName),
            "custom" => Ok(OrganizationMode::Custom),
            other => Err(format!(
                "unknown organization mode '{}': expected by_type, by_date, by_name or custom",
                other
            )),
        }
    }
}

fn date_bucket(modified: &DateTime<Local>) -> String {
    format!("{}-{:02}", modified.year(), modified.month())
}

fn name_bucket(name: &str) -> String {
    match name.chars().next() {
        Some(c) if c.is_alphabetic() => c.to_uppercase().collect(),
        _ => "#".to_string(),
    }
}

/// A planned, not yet executed, relocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveSuggestion {
    pub source: PathBuf,
    pub source_name: String,
    /// Folder the mode picked for this file.
    pub dest_folder: PathBuf,
    /// Collision-free name inside `dest_folder`.
    pub final_name: String,
    /// `dest_folder/final_name`
    pub destination: PathBuf,
    pub category: Category,
    pub size_bytes: u64,
}

impl MoveSuggestion {
    pub fn dest_folder_name(&self) -> String {
        self.dest_folder
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn is_renamed(&self) -> bool {
        self.final_name != self.source_name
    }

    pub fn pair(&self) -> MovePair {
        MovePair {
            source: self.source.clone(),
            destination: self.destination.clone(),
        }
    }
}

/// A `(source, destination)` pair as validated and recorded in backups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePair {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Tracks names handed out during one planning pass, per destination folder.
#[derive(Debug, Default)]
pub struct NameAllocator {
    allocated: HashMap<PathBuf, HashSet<String>>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks a name for `file_name` inside `folder` that is neither on disk
    /// nor already handed out, and reserves it.
    ///
    /// Dangling symlinks count as occupied, the same as for the validator and the mover.
    pub fn allocate(&mut self, folder: &Path, file_name: &str) -> String {
        let taken = self.allocated.entry(folder.to_path_buf()).or_default();
        let name = resolve_name(file_name, Local::now(), |candidate| {
            taken.contains(candidate) || fs::symlink_metadata(folder.join(candidate)).is_ok()
        });
        taken.insert(name.clone());
        name
    }
}

/// Resolves a collision for `file_name`.
///
/// Returns the name unchanged when `is_taken` rejects it, otherwise `stem_N.ext` for
/// the first free `N` in `1..=MAX_COUNTER_ATTEMPTS`, otherwise `stem_YYYYMMDD_HHMMSS.ext`.
pub fn resolve_name<F>(file_name: &str, now: DateTime<Local>, is_taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    if !is_taken(file_name) {
        return file_name.to_string();
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| file_name.to_string());
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    for counter in 1..=MAX_COUNTER_ATTEMPTS {
        let candidate = format!("{}_{}{}", stem, counter, extension);
        if !is_taken(&candidate) {
            return candidate;
        }
    }

    format!("{}_{}{}", stem, now.format("%Y%m%d_%H%M%S"), extension)
}

/// Computes one suggestion per record, in input order.
///
/// Destinations are pairwise unique: collisions are resolved against the filesystem
/// and against names allocated earlier in the same pass.
pub fn plan(
    records: &[FileRecord],
    base_folder: &Path,
    mode: OrganizationMode,
) -> Vec<MoveSuggestion> {
    let mut allocator = NameAllocator::new();

    records
        .iter()
        .map(|record| {
            let dest_folder = mode.destination_folder(base_folder, record);
            let final_name = allocator.allocate(&dest_folder, &record.name);
            MoveSuggestion {
                source: record.path.clone(),
                source_name: record.name.clone(),
                destination: dest_folder.join(&final_name),
                dest_folder,
                final_name,
                category: record.category,
                size_bytes: record.size_bytes,
            }
        })
        .collect()
}

/// Count and size of the planned files of one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryStats {
    pub count: usize,
    pub size_mb: f64,
}

/// Summary of an analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisStats {
    pub total_files: usize,
    pub total_size_mb: f64,
    pub categories: BTreeMap<Category, CategoryStats>,
    pub largest_file: Option<String>,
    pub smallest_file: Option<String>,
}

impl AnalysisStats {
    pub fn categories_count(&self) -> usize {
        self.categories.len()
    }
}

/// Computes totals over `records` and per-category figures over `suggestions`.
pub fn analysis_stats(records: &[FileRecord], suggestions: &[MoveSuggestion]) -> AnalysisStats {
    let mut categories: BTreeMap<Category, CategoryStats> = BTreeMap::new();
    for suggestion in suggestions {
        let entry = categories.entry(suggestion.category).or_default();
        entry.count += 1;
        entry.size_mb += suggestion.size_mb();
    }

    AnalysisStats {
        total_files: records.len(),
        total_size_mb: records.iter().map(FileRecord::size_mb).sum(),
        categories,
        largest_file: records
            .iter()
            .max_by_key(|r| r.size_bytes)
            .map(|r| r.name.clone()),
        smallest_file: records
            .iter()
            .min_by_key(|r| r.size_bytes)
            .map(|r| r.name.clone()),
    }
}

/// One file as it would appear after organization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewEntry {
    pub name: String,
    pub size_mb: f64,
    pub category: Category,
}

/// Groups the planned files by destination folder name.
pub fn preview(suggestions: &[MoveSuggestion]) -> BTreeMap<String, Vec<PreviewEntry>> {
    let mut structure: BTreeMap<String, Vec<PreviewEntry>> = BTreeMap::new();
    for suggestion in suggestions {
        structure
            .entry(suggestion.dest_folder_name())
            .or_default()
            .push(PreviewEntry {
                name: suggestion.final_name.clone(),
                size_mb: suggestion.size_mb(),
                category: suggestion.category,
            });
    }
    structure
}
