//! Command-line interface for foldersort.
//!
//! Parses the command line with clap and drives the library: organize a folder, undo
//! the last organization, manage backups and filter presets.

use crate::backup::BackupLedger;
use crate::config::{Settings, user_config_path};
use crate::filters::FilterSet;
use crate::organizer::{OrganizeError, Organizer, OrganizerEvent};
use crate::output::OutputFormatter;
use crate::planner::{self, OrganizationMode};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::Level;
use signal_hook::consts::SIGINT;
use signal_hook::flag;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "foldersort",
    version,
    about = "Organize a folder by type, date or name, with reversible backups",
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file to use instead of the lookup chain.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Move the files of a folder into subfolders.
    ///
    /// Example:
    ///   foldersort organize ~/Downloads
    ///   foldersort organize --mode by_date --dry-run ~/Pictures
    Organize(OrganizeArgs),

    /// Restore the most recent organization of a folder.
    Undo(UndoArgs),

    /// Inspect and manage recorded backups.
    Backups(BackupsArgs),

    /// List or save filter presets.
    Presets(PresetsArgs),
}

#[derive(Args, Debug)]
pub struct OrganizeArgs {
    /// Folder to organize.
    pub dir: PathBuf,

    /// by_type, by_date, by_name or custom. Defaults to the configured mode.
    #[arg(short, long)]
    pub mode: Option<OrganizationMode>,

    /// Show the plan without moving anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Do not record a backup for this run.
    #[arg(long)]
    pub no_backup: bool,

    /// Replace the configured filters with a preset.
    #[arg(short, long, value_name = "NAME")]
    pub preset: Option<String>,
}

#[derive(Args, Debug)]
pub struct UndoArgs {
    /// Folder whose last organization should be reverted.
    pub dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct BackupsArgs {
    #[command(subcommand)]
    pub action: BackupsAction,
}

#[derive(Subcommand, Debug)]
pub enum BackupsAction {
    /// List backups, newest first.
    List,
    /// Show every move recorded in a backup.
    Show { id: String },
    /// Move the files of a backup back to where they were.
    Restore { id: String },
    /// Delete a backup record. Organized files are not touched.
    Delete { id: String },
    /// Keep only the newest backups.
    Prune {
        /// How many to keep. Defaults to `max_backups`.
        #[arg(long)]
        keep: Option<usize>,
    },
}

#[derive(Args, Debug)]
pub struct PresetsArgs {
    #[command(subcommand)]
    pub action: PresetsAction,
}

#[derive(Subcommand, Debug)]
pub enum PresetsAction {
    /// List built-in and custom presets.
    List,
    /// Save the configured `[[filters]]` as a custom preset.
    Save { name: String },
}

/// Loaded settings and where they came from.
struct Session {
    settings: Settings,
    config_path: Option<PathBuf>,
}

/// Runs a parsed command line.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use foldersort::cli::{Cli, run};
///
/// let cli = Cli::parse_from(["foldersort", "organize", "--dry-run", "/tmp/inbox"]);
/// let code = run(cli).expect("foldersort failed");
/// ```
pub fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::load(cli.config.as_deref()).context("Error loading configuration")?;
    crate::logging::init(settings.organizer.log_level.as_deref()).ok();

    let ctx = Session {
        settings,
        config_path: cli.config.or_else(Settings::locate),
    };

    match cli.command {
        Command::Organize(args) => organize(&ctx, args),
        Command::Undo(args) => undo(&ctx, args),
        Command::Backups(args) => backups(&ctx, args.action),
        Command::Presets(args) => presets(&ctx, args.action),
    }
}

fn open_ledger(settings: &Settings) -> Result<Arc<BackupLedger>> {
    let dir = settings.backup_dir();
    let ledger = BackupLedger::open(&dir)
        .with_context(|| format!("Failed to open backup directory {}", dir.display()))?;
    Ok(Arc::new(ledger))
}

/// Backups are matched by folder, so both organize and undo use the canonical path.
fn canonical(dir: &Path) -> PathBuf {
    fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

fn organize(ctx: &Session, args: OrganizeArgs) -> Result<ExitCode> {
    let settings = &ctx.settings;
    let folder = canonical(&args.dir);
    let mode = args.mode.unwrap_or(settings.organizer.default_mode);

    let mut organizer = Organizer::new()
        .with_mapper(settings.file_mapper())
        .with_filters(settings.filter_manager()?)
        .with_validator(Box::new(settings.validator()))
        .with_backup_policy(settings.backup_policy());
    let create_backup = !args.no_backup && settings.organizer.auto_backup;
    if create_backup && !args.dry_run {
        organizer = organizer.with_ledger(open_ledger(settings)?);
    }
    if let Some(preset) = &args.preset {
        organizer.filters().apply_preset(preset)?;
    }

    OutputFormatter::info(&format!("Organizing {} ({})", folder.display(), mode));
    for (name, description) in organizer.filters().summary() {
        OutputFormatter::plain(&format!("  filter: {} ({})", name, description));
    }

    let analysis = match organizer.analyze_folder(&folder, mode) {
        Ok(analysis) => analysis,
        Err(OrganizeError::Validation(report)) => {
            OutputFormatter::validation_issues(&report);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    if analysis.suggestions.is_empty() {
        OutputFormatter::info("Nothing to organize");
        return Ok(ExitCode::SUCCESS);
    }

    OutputFormatter::plan_table(&planner::preview(&analysis.suggestions));
    OutputFormatter::summary_table(&analysis.stats);

    if args.dry_run {
        OutputFormatter::dry_run_notice(&format!(
            "{} files would be moved; nothing was changed",
            analysis.suggestions.len()
        ));
        return Ok(ExitCode::SUCCESS);
    }

    let organizer = Arc::new(organizer);
    flag::register(SIGINT, organizer.cancel_flag())
        .context("Failed to register the interrupt handler")?;

    let total = analysis.suggestions.len() as u64;
    let (tx, rx) = crossbeam::channel::unbounded::<OrganizerEvent>();
    let handle = organizer.spawn_organization(analysis, create_backup, tx)?;

    let pb = OutputFormatter::create_progress_bar(total);
    for event in rx {
        match event {
            OrganizerEvent::Progress {
                current, message, ..
            } => {
                pb.set_position(current as u64);
                pb.set_message(message);
            }
            // Warnings and errors already reach stderr through the logger.
            OrganizerEvent::Log {
                level: Level::Info,
                message,
            } => pb.println(message),
            OrganizerEvent::Log { .. } => {}
        }
    }
    pb.finish_and_clear();

    let report = match handle.wait() {
        Ok(report) => report,
        Err(OrganizeError::Validation(report)) => {
            OutputFormatter::validation_issues(&report);
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e.into()),
    };

    OutputFormatter::execution_summary(&report);
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn undo(ctx: &Session, args: UndoArgs) -> Result<ExitCode> {
    let folder = canonical(&args.dir);
    let ledger = open_ledger(&ctx.settings)?;

    let Some(latest) = ledger.latest_for_folder(&folder) else {
        OutputFormatter::warning(&format!("No backup recorded for {}", folder.display()));
        return Ok(ExitCode::FAILURE);
    };

    OutputFormatter::info(&format!(
        "Restoring backup {} ({} files)",
        latest.id, latest.file_count
    ));
    let report = ledger.restore_backup(&latest.id)?;
    OutputFormatter::restore_summary(&report);

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn backups(ctx: &Session, action: BackupsAction) -> Result<ExitCode> {
    let ledger = open_ledger(&ctx.settings)?;

    match action {
        BackupsAction::List => OutputFormatter::backups_table(&ledger.list_backups()),
        BackupsAction::Show { id } => {
            let record = ledger.get_backup(&id)?;
            OutputFormatter::header(&format!("BACKUP {}", record.id));
            OutputFormatter::plain(&format!("Created: {}", record.created_at.to_rfc3339()));
            OutputFormatter::plain(&format!("Operation: {}", record.operation_type));
            if let Some(mode) = record.organization_mode {
                OutputFormatter::plain(&format!("Mode: {}", mode));
            }
            OutputFormatter::plain(&format!("Folder: {}", record.source_folder.display()));
            OutputFormatter::plain(&format!("Files: {}", record.total_files));
            for pair in &record.files_moved {
                OutputFormatter::plain(&format!(
                    "  {} -> {}",
                    pair.source.display(),
                    pair.destination.display()
                ));
            }
        }
        BackupsAction::Restore { id } => {
            let report = ledger.restore_backup(&id)?;
            OutputFormatter::restore_summary(&report);
            if !report.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        BackupsAction::Delete { id } => {
            if ledger.delete_backup(&id)? {
                OutputFormatter::success(&format!("Backup {} deleted", id));
            } else {
                OutputFormatter::warning(&format!("Backup {} not found", id));
                return Ok(ExitCode::FAILURE);
            }
        }
        BackupsAction::Prune { keep } => {
            let keep = keep.unwrap_or(ctx.settings.organizer.max_backups);
            let deleted = ledger.prune_old_backups(keep)?;
            OutputFormatter::success(&format!("Deleted {} backups, kept {}", deleted, keep));
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn presets(ctx: &Session, action: PresetsAction) -> Result<ExitCode> {
    let mut manager = ctx.settings.filter_manager()?;

    match action {
        PresetsAction::List => {
            OutputFormatter::header("PRESETS");
            for name in manager.available_presets() {
                let kind = if manager.is_builtin(&name) {
                    "built-in"
                } else {
                    "custom"
                };
                let specs = manager.preset(&name).unwrap_or_default();
                let filters: Vec<String> = FilterSet::from_specs(specs)?
                    .filters()
                    .iter()
                    .map(|f| f.name_label())
                    .collect();
                OutputFormatter::plain(&format!(
                    "{:<20} {:<9} {}",
                    name,
                    kind,
                    filters.join(", ")
                ));
            }
        }
        PresetsAction::Save { name } => {
            if manager.is_builtin(&name) {
                bail!("'{}' is a built-in preset and cannot be replaced", name);
            }
            if manager.active().is_empty() {
                bail!("No active filters: add [[filters]] entries to the configuration first");
            }

            let path = ctx
                .config_path
                .clone()
                .or_else(user_config_path)
                .context("No configuration file location available")?;

            manager.save_current_as_preset(&name);
            let mut settings = ctx.settings.clone();
            settings.presets = manager.custom_presets();
            settings
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            OutputFormatter::success(&format!("Preset '{}' saved to {}", name, path.display()));
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_organize() {
        let cli = Cli::parse_from([
            "foldersort",
            "organize",
            "--mode",
            "by_date",
            "--dry-run",
            "--preset",
            "media",
            "/tmp/inbox",
        ]);
        let Command::Organize(args) = cli.command else {
            panic!("expected organize");
        };
        assert_eq!(args.dir, PathBuf::from("/tmp/inbox"));
        assert_eq!(args.mode, Some(OrganizationMode::ByDate));
        assert!(args.dry_run);
        assert!(!args.no_backup);
        assert_eq!(args.preset.as_deref(), Some("media"));
    }

    #[test]
    fn test_parse_rejects_unknown_mode() {
        let result = Cli::try_parse_from(["foldersort", "organize", "--mode", "size", "/tmp"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_backups_prune_with_global_config() {
        let cli = Cli::parse_from([
            "foldersort",
            "backups",
            "prune",
            "--keep",
            "3",
            "--config",
            "/etc/foldersort.toml",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/foldersort.toml")));
        match cli.command {
            Command::Backups(BackupsArgs {
                action: BackupsAction::Prune { keep },
            }) => assert_eq!(keep, Some(3)),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
