//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored messages, the progress
//! bar fed by organizer events, and the plan, summary and backup tables.

use crate::backup::{BackupSummary, RestoreReport};
use crate::organizer::{ExecutionReport, OperationState};
use crate::planner::{AnalysisStats, PreviewEntry};
use crate::validator::ValidationReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
///
/// This struct provides methods for:
/// - Success messages (green with ✓)
/// - Error messages (red with ✗)
/// - Warning messages (yellow with ⚠)
/// - Info messages (cyan)
/// - Progress bars for operations
/// - Summary tables with statistics
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersort::output::OutputFormatter;
    /// OutputFormatter::success("Folder organized successfully!");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for `total` file moves.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use foldersort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.set_position(1);
    /// pb.finish_with_message("Completed!");
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map(|style| style.progress_chars("█▓░"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }

    /// Prints the planned folder structure: each destination folder with its files.
    pub fn plan_table(structure: &BTreeMap<String, Vec<PreviewEntry>>) {
        Self::header("PLAN");
        for (folder, entries) in structure {
            println!("{}/ ({})", folder.bold(), entries.len());
            for entry in entries {
                println!("    {} {}", entry.name, format!("{:.2}MB", entry.size_mb).dimmed());
            }
        }
    }

    /// Prints a summary table with file statistics by category.
    ///
    /// # Arguments
    ///
    /// * `stats` - Statistics of an analysis
    pub fn summary_table(stats: &AnalysisStats) {
        Self::header("SUMMARY");

        let max_category_len = stats
            .categories
            .keys()
            .map(|category| category.label().len())
            .max()
            .unwrap_or(0)
            .max(8); // At least "Category" width

        println!(
            "{:<width$} | {:>7} | {}",
            "Category".bold(),
            "Files".bold(),
            "Size".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 24));

        for (category, entry) in &stats.categories {
            println!(
                "{:<width$} | {:>7} | {:.2}MB",
                category.label(),
                entry.count.to_string().green(),
                entry.size_mb,
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 24));
        println!(
            "{:<width$} | {:>7} | {:.2}MB",
            "Total".bold(),
            stats.total_files.to_string().green().bold(),
            stats.total_size_mb,
            width = max_category_len
        );

        if let Some(largest) = &stats.largest_file {
            println!("Largest: {}", largest);
        }
        if let Some(smallest) = &stats.smallest_file {
            println!("Smallest: {}", smallest);
        }
    }

    /// Prints the outcome of an executed batch.
    pub fn execution_summary(report: &ExecutionReport) {
        Self::header("RESULT");
        let stats = &report.stats;
        println!(
            "Moved {} of {} files, {} errors, {} skipped",
            stats.moved_files.to_string().green(),
            stats.total_files,
            stats.errors.to_string().red(),
            stats.skipped_files
        );
        if let Some(duration) = stats.duration() {
            println!("Duration: {:.2}s", duration.num_milliseconds() as f64 / 1000.0);
        }
        if let Some(id) = &report.backup_id {
            println!("Backup: {}", id.cyan());
        }

        for warning in &report.warnings {
            Self::warning(warning);
        }
        for error in &report.errors {
            Self::error(&format!("{}: {}", error.source.display(), error.reason));
        }

        match report.state {
            OperationState::Completed => Self::success("Organization completed"),
            OperationState::Cancelled => Self::warning("Organization cancelled"),
            _ => Self::error("Organization finished with errors"),
        }
    }

    /// Prints validation errors and warnings.
    pub fn validation_issues(report: &ValidationReport) {
        for error in &report.errors {
            Self::error(error);
        }
        for conflict in &report.destination_conflicts {
            Self::error(&format!(
                "{} sources target {}",
                conflict.sources.len(),
                conflict.destination.display()
            ));
        }
        for warning in &report.warnings {
            Self::warning(warning);
        }
    }

    /// Prints the backup list, newest first.
    pub fn backups_table(backups: &[BackupSummary]) {
        if backups.is_empty() {
            Self::info("No backups recorded");
            return;
        }

        Self::header("BACKUPS");
        for backup in backups {
            println!(
                "{}  {}  {:>5} files  {}",
                backup.id.cyan(),
                backup.created_at.format("%Y-%m-%d %H:%M:%S"),
                backup.file_count,
                backup.source_folder.display()
            );
        }
    }

    pub fn restore_summary(report: &RestoreReport) {
        println!(
            "Restored {} files, {} skipped, {} failed",
            report.restored.to_string().green(),
            report.skipped.len(),
            report.failed.len().to_string().red()
        );
        for (pair, reason) in &report.failed {
            Self::error(&format!("{}: {}", pair.source.display(), reason));
        }
        if report.is_success() {
            Self::success(&format!("Backup {} restored", report.backup_id));
        } else {
            Self::warning(&format!("Backup {} partially restored", report.backup_id));
        }
    }

    /// Prints a dry-run notice message.
    ///
    /// # Arguments
    ///
    /// * `message` - The dry-run message
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }
}
