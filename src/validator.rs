//! Pre-flight checks for a folder and for a batch of planned moves.
//!
//! Errors are hard stops: nothing is moved when a report carries any. Warnings are
//! advisory; the executor still attempts those files and records per-file failures.

use crate::planner::MovePair;
use log::debug;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Component, Path, PathBuf};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const MAX_FILENAME_LEN: usize = 255;
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

const WINDOWS_PROTECTED: &[&str] = &[
    "c:\\windows",
    "c:\\program files",
    "c:\\program files (x86)",
    "c:\\system volume information",
    "c:\\$recycle.bin",
];
/// Matched as a path prefix, component by component.
const UNIX_PROTECTED_TREES: &[&str] = &[
    "/bin", "/boot", "/dev", "/etc", "/lib", "/lib64", "/proc", "/sbin", "/sys", "/usr",
    "/System", "/Library",
];
/// Matched exactly; their children (e.g. temp dirs under /var/folders) are allowed.
const UNIX_PROTECTED_EXACT: &[&str] = &["/", "/var"];

/// Two or more sources planned onto the same destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationConflict {
    pub destination: PathBuf,
    pub sources: Vec<PathBuf>,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub destination_conflicts: Vec<DestinationConflict>,
    pub total_files: usize,
    /// Files that passed every per-file check.
    pub valid_files: usize,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn error(&mut self, message: String) {
        debug!("validation error: {}", message);
        self.errors.push(message);
    }

    fn warning(&mut self, message: String) {
        debug!("validation warning: {}", message);
        self.warnings.push(message);
    }
}

/// Checks run before a folder is analyzed and before a batch is executed.
pub trait BatchValidator: Send + Sync {
    /// Validates that `folder` can be organized at all.
    fn validate_folder(&self, folder: &Path) -> ValidationReport;

    /// Validates a batch of moves rooted at `folder`.
    fn validate_batch(&self, folder: &Path, moves: &[MovePair]) -> ValidationReport;
}

/// The default validator.
#[derive(Debug, Clone)]
pub struct FileValidator {
    file_size_limit_mb: f64,
}

impl FileValidator {
    pub fn new(file_size_limit_mb: f64) -> Self {
        Self { file_size_limit_mb }
    }

    fn check_folder(&self, folder: &Path, report: &mut ValidationReport) -> bool {
        let metadata = match fs::metadata(folder) {
            Ok(metadata) => metadata,
            Err(_) => {
                report.error(format!("Folder not found: {}", folder.display()));
                return false;
            }
        };
        if !metadata.is_dir() {
            report.error(format!("Path is not a folder: {}", folder.display()));
            return false;
        }
        if fs::read_dir(folder).is_err() {
            report.error(format!("No read permission: {}", folder.display()));
            return false;
        }
        if metadata.permissions().readonly() {
            report.error(format!("No write permission: {}", folder.display()));
            return false;
        }
        if is_protected_folder(folder) {
            report.error(format!(
                "System folder cannot be organized: {}",
                folder.display()
            ));
            return false;
        }
        true
    }

    /// Per-file checks. Every problem found here is a warning.
    fn check_file(&self, path: &Path, report: &mut ValidationReport) -> bool {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(_) => {
                report.warning(format!("File not found: {}", path.display()));
                return false;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        if !metadata.is_file() {
            report.warning(format!("Not a file: {}", path.display()));
            return false;
        }
        if metadata.permissions().readonly() {
            report.warning(format!("No permission to move: {}", name));
            return false;
        }
        if is_in_use(path) {
            report.warning(format!("File in use: {}", name));
            return false;
        }

        let size_mb = metadata.len() as f64 / BYTES_PER_MB;
        if size_mb > self.file_size_limit_mb {
            report.warning(format!("File too large: {} ({:.1}MB)", name, size_mb));
            return false;
        }

        if let Err(problem) = validate_filename(&name) {
            report.warning(problem);
            return false;
        }
        true
    }

    fn check_destinations(&self, moves: &[MovePair], report: &mut ValidationReport) {
        let mut by_destination: HashMap<&Path, Vec<PathBuf>> = HashMap::new();
        let mut order = Vec::new();
        for pair in moves {
            let sources = by_destination
                .entry(pair.destination.as_path())
                .or_insert_with(|| {
                    order.push(pair.destination.as_path());
                    Vec::new()
                });
            sources.push(pair.source.clone());
        }

        for destination in order {
            let sources = &by_destination[destination];
            if sources.len() > 1 {
                report.error(format!(
                    "{} files planned onto {}",
                    sources.len(),
                    destination.display()
                ));
                report.destination_conflicts.push(DestinationConflict {
                    destination: destination.to_path_buf(),
                    sources: sources.clone(),
                });
            }
            if fs::symlink_metadata(destination).is_ok() {
                report.error(format!(
                    "Destination already exists: {}",
                    destination.display()
                ));
            }
        }
    }
}

impl Default for FileValidator {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

impl BatchValidator for FileValidator {
    fn validate_folder(&self, folder: &Path) -> ValidationReport {
        let mut report = ValidationReport::default();
        self.check_folder(folder, &mut report);
        report
    }

    fn validate_batch(&self, folder: &Path, moves: &[MovePair]) -> ValidationReport {
        let mut report = ValidationReport {
            total_files: moves.len(),
            ..ValidationReport::default()
        };
        if !self.check_folder(folder, &mut report) {
            return report;
        }

        for pair in moves {
            if self.check_file(&pair.source, &mut report) {
                report.valid_files += 1;
            }
        }
        self.check_destinations(moves, &mut report);

        debug!(
            "Validated {} moves in {}: {} errors, {} warnings",
            moves.len(),
            folder.display(),
            report.errors.len(),
            report.warnings.len()
        );
        report
    }
}

/// Checks a file name against the portable rules: no reserved device names,
/// none of `< > : " | ? *`, at most 255 bytes.
///
/// ```
/// use foldersort::validator::validate_filename;
///
/// assert!(validate_filename("report.pdf").is_ok());
/// assert!(validate_filename("con.txt").is_err());
/// assert!(validate_filename("what?.txt").is_err());
/// ```
pub fn validate_filename(name: &str) -> Result<(), String> {
    if let Some(c) = name.chars().find(|c| INVALID_FILENAME_CHARS.contains(c)) {
        return Err(format!("Invalid file name: {} (contains '{}')", name, c));
    }

    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_uppercase())
        .unwrap_or_default();
    if RESERVED_NAMES.contains(&stem.as_str()) {
        return Err(format!("Reserved file name: {}", name));
    }

    if name.len() > MAX_FILENAME_LEN {
        return Err(format!("File name too long: {}", name));
    }
    Ok(())
}

/// Whether `path` is (or lies inside) a folder that must never be reorganized.
pub fn is_protected_folder(path: &Path) -> bool {
    let lowered = path.to_string_lossy().to_lowercase();
    if WINDOWS_PROTECTED
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return true;
    }

    if UNIX_PROTECTED_EXACT
        .iter()
        .any(|exact| normalized(path) == Path::new(exact))
    {
        return true;
    }
    UNIX_PROTECTED_TREES
        .iter()
        .any(|tree| normalized(path).starts_with(tree))
}

fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Best-effort lock probe: a file that cannot be opened for read and write is
/// considered in use.
fn is_in_use(path: &Path) -> bool {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pair(source: &Path, destination: &Path) -> MovePair {
        MovePair {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
        }
    }

    #[test]
    fn test_valid_batch() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.png"), "a").unwrap();
        fs::write(base.join("b.txt"), "b").unwrap();

        let moves = vec![
            pair(&base.join("a.png"), &base.join("Imagens").join("a.png")),
            pair(&base.join("b.txt"), &base.join("Documentos").join("b.txt")),
        ];
        let report = FileValidator::default().validate_batch(base, &moves);

        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(!report.has_warnings());
        assert_eq!(report.total_files, 2);
        assert_eq!(report.valid_files, 2);
    }

    #[test]
    fn test_missing_folder_is_error() {
        let report =
            FileValidator::default().validate_folder(Path::new("/non/existent/folder/xyz"));
        assert!(!report.is_valid());
        assert!(report.errors[0].contains("Folder not found"));
    }

    #[test]
    fn test_file_instead_of_folder_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        let report = FileValidator::default().validate_folder(&file);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_missing_source_is_only_a_warning() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "a").unwrap();

        let moves = vec![
            pair(&base.join("a.txt"), &base.join("Documentos").join("a.txt")),
            pair(&base.join("gone.txt"), &base.join("Documentos").join("gone.txt")),
        ];
        let report = FileValidator::default().validate_batch(base, &moves);

        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.valid_files, 1);
    }

    #[test]
    fn test_duplicate_destination_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("a.txt"), "a").unwrap();
        fs::write(base.join("b.txt"), "b").unwrap();

        let target = base.join("Documentos").join("same.txt");
        let moves = vec![
            pair(&base.join("a.txt"), &target),
            pair(&base.join("b.txt"), &target),
        ];
        let report = FileValidator::default().validate_batch(base, &moves);

        assert!(!report.is_valid());
        assert_eq!(report.destination_conflicts.len(), 1);
        assert_eq!(report.destination_conflicts[0].sources.len(), 2);
    }

    #[test]
    fn test_occupied_destination_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::create_dir(base.join("Documentos")).unwrap();
        fs::write(base.join("a.txt"), "a").unwrap();
        fs::write(base.join("Documentos").join("a.txt"), "old").unwrap();

        let moves = vec![pair(
            &base.join("a.txt"),
            &base.join("Documentos").join("a.txt"),
        )];
        let report = FileValidator::default().validate_batch(base, &moves);

        assert!(!report.is_valid());
        assert!(report.errors[0].contains("already exists"));
    }

    #[test]
    fn test_size_limit_warning() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();
        fs::write(base.join("big.bin"), vec![0u8; 2 * 1024 * 1024]).unwrap();

        let moves = vec![pair(&base.join("big.bin"), &base.join("Outros").join("big.bin"))];
        let report = FileValidator::new(1.0).validate_batch(base, &moves);

        assert!(report.is_valid());
        assert!(report.warnings[0].contains("too large"));
        assert_eq!(report.valid_files, 0);
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("notes.txt").is_ok());
        assert!(validate_filename("NUL").is_err());
        assert!(validate_filename("lpt1.log").is_err());
        assert!(validate_filename("a|b.txt").is_err());
        assert!(validate_filename(&"x".repeat(256)).is_err());
        assert!(validate_filename(&"x".repeat(255)).is_ok());
    }

    #[test]
    fn test_protected_folders() {
        assert!(is_protected_folder(Path::new("/")));
        assert!(is_protected_folder(Path::new("/etc")));
        assert!(is_protected_folder(Path::new("/usr/share/doc")));
        assert!(is_protected_folder(Path::new("/var")));
        assert!(is_protected_folder(Path::new("C:\\Windows\\System32")));
        assert!(is_protected_folder(Path::new("c:\\program files\\app")));

        assert!(!is_protected_folder(Path::new("/var/folders/xy/T/tmp1")));
        assert!(!is_protected_folder(Path::new("/home/user/Downloads")));
        assert!(!is_protected_folder(Path::new("/etcetera")));
        assert!(!is_protected_folder(Path::new("/tmp")));
    }
}
