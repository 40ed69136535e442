use clap::Parser;
use foldersort::backup::BackupLedger;
use foldersort::cli::{Cli, run};
use foldersort::config::Settings;
use foldersort::filters::{Filter, FilterSpec};
use foldersort::organizer::{NullSink, OperationState, Organizer};
use foldersort::planner::OrganizationMode;
/// Integration tests for foldersort
///
/// These tests exercise complete workflows against real temporary folders:
/// 1. Organization by type, date and name
/// 2. Collision handling against existing files
/// 3. Backup, restore and undo round trips
/// 4. Filters from presets and configuration
/// 5. The command line front end
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A temporary workspace holding the folder to organize and a backup directory
/// outside of it.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::create_dir(temp_dir.path().join("work")).expect("Failed to create work directory");
        TestFixture { temp_dir }
    }

    /// The folder being organized.
    fn path(&self) -> PathBuf {
        self.temp_dir
            .path()
            .join("work")
            .canonicalize()
            .expect("Failed to canonicalize work directory")
    }

    fn backup_dir(&self) -> PathBuf {
        self.temp_dir.path().join("backups")
    }

    fn ledger(&self) -> Arc<BackupLedger> {
        Arc::new(BackupLedger::open(&self.backup_dir()).expect("Failed to open ledger"))
    }

    fn create_file(&self, name: &str, content: &[u8]) {
        let mut file = File::create(self.path().join(name)).expect("Failed to create file");
        file.write_all(content)
            .expect("Failed to write file content");
    }

    fn create_files(&self, names: &[&str]) {
        for name in names {
            self.create_file(name, name.as_bytes());
        }
    }

    /// Writes a config file pointing backups into the fixture and returns its path.
    fn write_config(&self, extra: &str) -> PathBuf {
        let path = self.temp_dir.path().join("foldersort.toml");
        let content = format!(
            "[organizer]\nbackup_dir = {:?}\n\n{}",
            self.backup_dir().display().to_string(),
            extra
        );
        fs::write(&path, content).expect("Failed to write config");
        path
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(path.is_file(), "File should exist: {}", path.display());
    }

    fn assert_file_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    fn assert_dir_not_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "Directory should not exist: {}", path.display());
    }
}

fn run_cli(args: &[&str]) {
    let cli = Cli::parse_from(args);
    run(cli).expect("command failed");
}

// ============================================================================
// Organization
// ============================================================================

#[test]
fn test_organize_by_type_records_backup() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.png", "b.txt", "c.png"]);
    let ledger = fixture.ledger();
    let organizer = Organizer::new().with_ledger(Arc::clone(&ledger));

    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByType)
        .unwrap();
    let report = organizer
        .execute_analysis(&analysis, true, &NullSink)
        .unwrap();

    assert!(report.success);
    assert_eq!(report.stats.moved_files, 3);
    fixture.assert_file_exists("Imagens/a.png");
    fixture.assert_file_exists("Imagens/c.png");
    fixture.assert_file_exists("Documentos/b.txt");
    fixture.assert_file_not_exists("a.png");

    let backups = ledger.list_backups();
    assert_eq!(backups.len(), 1);
    assert_eq!(backups[0].file_count, 3);
    assert_eq!(backups[0].source_folder, fixture.path());
}

#[test]
fn test_existing_files_are_never_overwritten() {
    let fixture = TestFixture::new();
    fs::create_dir(fixture.path().join("Documentos")).unwrap();
    fs::write(fixture.path().join("Documentos").join("report.pdf"), "first").unwrap();
    fixture.create_file("report.pdf", b"second");

    let organizer = Organizer::new();
    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByType)
        .unwrap();
    assert_eq!(analysis.suggestions[0].final_name, "report_1.pdf");
    organizer
        .execute_analysis(&analysis, false, &NullSink)
        .unwrap();

    fixture.create_file("report.pdf", b"third");
    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByType)
        .unwrap();
    assert_eq!(analysis.suggestions[0].final_name, "report_2.pdf");
    organizer
        .execute_analysis(&analysis, false, &NullSink)
        .unwrap();

    let docs = fixture.path().join("Documentos");
    assert_eq!(fs::read_to_string(docs.join("report.pdf")).unwrap(), "first");
    assert_eq!(fs::read_to_string(docs.join("report_1.pdf")).unwrap(), "second");
    assert_eq!(fs::read_to_string(docs.join("report_2.pdf")).unwrap(), "third");
}

#[test]
fn test_organize_by_date_uses_modification_month() {
    let fixture = TestFixture::new();
    fixture.create_file("old.txt", b"old");
    // 2021-03-15T12:00:00Z; mid-month so any local offset stays in March.
    let march = SystemTime::UNIX_EPOCH + Duration::from_secs(1_615_809_600);
    File::options()
        .write(true)
        .open(fixture.path().join("old.txt"))
        .unwrap()
        .set_modified(march)
        .unwrap();

    let organizer = Organizer::new();
    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByDate)
        .unwrap();
    organizer
        .execute_analysis(&analysis, false, &NullSink)
        .unwrap();

    fixture.assert_file_exists("2021-03/old.txt");
}

#[test]
fn test_organize_by_name() {
    let fixture = TestFixture::new();
    fixture.create_files(&["apple.txt", "Avocado.png", "1999.csv"]);

    let organizer = Organizer::new();
    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByName)
        .unwrap();
    organizer
        .execute_analysis(&analysis, false, &NullSink)
        .unwrap();

    fixture.assert_file_exists("A/apple.txt");
    fixture.assert_file_exists("A/Avocado.png");
    fixture.assert_file_exists("#/1999.csv");
}

#[test]
fn test_subfolders_are_left_alone() {
    let fixture = TestFixture::new();
    fs::create_dir(fixture.path().join("projects")).unwrap();
    fs::write(fixture.path().join("projects").join("main.rs"), "fn main() {}").unwrap();
    fixture.create_files(&["notes.txt"]);

    let organizer = Organizer::new();
    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByType)
        .unwrap();
    assert_eq!(analysis.suggestions.len(), 1);
    organizer
        .execute_analysis(&analysis, false, &NullSink)
        .unwrap();

    fixture.assert_file_exists("projects/main.rs");
    fixture.assert_file_exists("Documentos/notes.txt");
}

// ============================================================================
// Backup and restore
// ============================================================================

#[test]
fn test_restore_round_trip() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.png", "b.txt", "c.mp3", "d.zip"]);
    let ledger = fixture.ledger();
    let organizer = Organizer::new().with_ledger(Arc::clone(&ledger));

    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByType)
        .unwrap();
    let report = organizer
        .execute_analysis(&analysis, true, &NullSink)
        .unwrap();
    let backup_id = report.backup_id.expect("backup id");

    let restore = ledger.restore_backup(&backup_id).unwrap();
    assert!(restore.is_success());
    assert_eq!(restore.restored, 4);

    for name in ["a.png", "b.txt", "c.mp3", "d.zip"] {
        fixture.assert_file_exists(name);
        assert_eq!(
            fs::read_to_string(fixture.path().join(name)).unwrap(),
            name,
            "content of {} changed",
            name
        );
    }
    for folder in ["Imagens", "Documentos", "Audio", "Compactados"] {
        fixture.assert_dir_not_exists(folder);
    }
}

#[test]
fn test_restore_after_partial_run() {
    let fixture = TestFixture::new();
    fixture.create_files(&["1.txt", "2.txt", "3.txt"]);
    let ledger = fixture.ledger();
    let organizer = Organizer::new().with_ledger(Arc::clone(&ledger));

    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByType)
        .unwrap();
    fs::remove_file(fixture.path().join("2.txt")).unwrap();
    let report = organizer
        .execute_analysis(&analysis, true, &NullSink)
        .unwrap();
    assert_eq!(report.state, OperationState::Failed);
    assert_eq!(report.stats.moved_files, 2);

    let restore = ledger
        .restore_backup(&report.backup_id.expect("backup id"))
        .unwrap();
    assert!(restore.is_success());
    assert_eq!(restore.restored, 2);
    assert_eq!(restore.skipped.len(), 1);
    fixture.assert_file_exists("1.txt");
    fixture.assert_file_exists("3.txt");
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn test_preset_limits_what_moves() {
    let fixture = TestFixture::new();
    fixture.create_files(&["photo.jpg", "song.mp3", "readme.txt", ".hidden.png"]);

    let organizer = Organizer::new();
    organizer.filters().apply_preset("images-only").unwrap();
    organizer
        .filters()
        .add_filter(Filter::hidden(false));

    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByType)
        .unwrap();
    organizer
        .execute_analysis(&analysis, false, &NullSink)
        .unwrap();

    fixture.assert_file_exists("Imagens/photo.jpg");
    fixture.assert_file_exists("song.mp3");
    fixture.assert_file_exists("readme.txt");
    fixture.assert_file_exists(".hidden.png");
}

#[test]
fn test_filters_from_configuration() {
    let fixture = TestFixture::new();
    fixture.create_file("big.bin", &vec![0u8; 2 * 1024 * 1024]);
    fixture.create_file("small.bin", b"tiny");
    fixture.create_file("photo.heic", b"heic");

    let config = fixture.write_config(
        "[[filters]]\nkind = \"size\"\nmin_mb = 1.0\n\n[categories]\n\".heic\" = \"Imagens\"\n",
    );
    let settings = Settings::load(Some(&config)).unwrap();
    let organizer = Organizer::new()
        .with_mapper(settings.file_mapper())
        .with_filters(settings.filter_manager().unwrap());

    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByType)
        .unwrap();
    let names: Vec<_> = analysis
        .suggestions
        .iter()
        .map(|s| s.source_name.as_str())
        .collect();
    assert_eq!(names, vec!["big.bin"]);

    organizer.filters().clear_filters();
    let analysis = organizer
        .analyze_folder(&fixture.path(), OrganizationMode::ByType)
        .unwrap();
    let heic = analysis
        .suggestions
        .iter()
        .find(|s| s.source_name == "photo.heic")
        .unwrap();
    assert_eq!(heic.dest_folder_name(), "Imagens");
}

// ============================================================================
// Command line
// ============================================================================

#[test]
fn test_cli_dry_run_changes_nothing() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.png", "b.txt"]);
    let config = fixture.write_config("");
    let dir = fixture.path();

    run_cli(&[
        "foldersort",
        "--config",
        config.to_str().unwrap(),
        "organize",
        "--dry-run",
        dir.to_str().unwrap(),
    ]);

    fixture.assert_file_exists("a.png");
    fixture.assert_file_exists("b.txt");
    fixture.assert_dir_not_exists("Imagens");
    assert!(!fixture.backup_dir().exists());
}

#[test]
fn test_cli_organize_then_undo() {
    let fixture = TestFixture::new();
    fixture.create_files(&["a.png", "b.txt", "c.png"]);
    let config = fixture.write_config("");
    let config = config.to_str().unwrap();
    let dir = fixture.path();
    let dir = dir.to_str().unwrap();

    run_cli(&["foldersort", "--config", config, "organize", dir]);
    fixture.assert_file_exists("Imagens/a.png");
    fixture.assert_file_exists("Documentos/b.txt");
    assert_eq!(fixture.ledger().list_backups().len(), 1);

    run_cli(&["foldersort", "--config", config, "undo", dir]);
    fixture.assert_file_exists("a.png");
    fixture.assert_file_exists("b.txt");
    fixture.assert_file_exists("c.png");
    fixture.assert_dir_not_exists("Imagens");
}

#[test]
fn test_cli_no_backup_and_prune() {
    let fixture = TestFixture::new();
    let config = fixture.write_config("");
    let config = config.to_str().unwrap();
    let dir = fixture.path();
    let dir = dir.to_str().unwrap();

    fixture.create_files(&["a.txt"]);
    run_cli(&["foldersort", "--config", config, "organize", "--no-backup", dir]);
    fixture.assert_file_exists("Documentos/a.txt");
    assert!(fixture.ledger().list_backups().is_empty());

    for name in ["b.txt", "c.txt", "d.txt"] {
        fixture.create_files(&[name]);
        run_cli(&["foldersort", "--config", config, "organize", dir]);
    }
    assert_eq!(fixture.ledger().list_backups().len(), 3);

    run_cli(&["foldersort", "--config", config, "backups", "prune", "--keep", "1"]);
    assert_eq!(fixture.ledger().list_backups().len(), 1);
}

#[test]
fn test_cli_save_preset() {
    let fixture = TestFixture::new();
    let config = fixture.write_config("[[filters]]\nkind = \"extension\"\nextensions = [\"png\"]\n");
    let config_str = config.to_str().unwrap();

    run_cli(&["foldersort", "--config", config_str, "presets", "save", "pngs"]);

    let settings = Settings::load(Some(Path::new(&config))).unwrap();
    let saved = &settings.presets["pngs"];
    assert_eq!(saved.len(), 1);
    assert!(matches!(
        &saved[0],
        FilterSpec::Extension { extensions, include: true } if extensions == &vec![".png".to_string()]
    ));
    let manager = settings.filter_manager().unwrap();
    assert!(manager.available_presets().contains(&"pngs".to_string()));
}
