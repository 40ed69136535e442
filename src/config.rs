//! Settings loaded from TOML configuration files.
//!
//! Settings cover the organizer defaults, the active filters, custom filter presets and
//! extra extension mappings. Every section is optional.
//!
//! # Configuration File Format
//!
//! ```toml
//! [organizer]
//! default_mode = "by_type"
//! auto_backup = true
//! max_backups = 10
//! backup_failure = "proceed"
//! file_size_limit_mb = 1000.0
//! backup_dir = "/custom/path"
//! log_level = "info"
//!
//! [[filters]]
//! kind = "size"
//! min_mb = 1.0
//!
//! [[presets.photos]]
//! kind = "extension"
//! extensions = ["jpg", "png"]
//!
//! [categories]
//! ".heic" = "Imagens"
//! ```

use crate::file_category::{Category, FileMapper};
use crate::filters::{FilterError, FilterManager, FilterSet, FilterSpec};
use crate::organizer::{BackupFailurePolicy, BackupPolicy};
use crate::planner::OrganizationMode;
use crate::validator::FileValidator;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".foldersortrc.toml";

/// Errors that can occur while loading or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// A filter or preset in the file does not compile.
    #[error("Invalid filter in configuration: {0}")]
    Filter(#[from] FilterError),

    #[error("IO error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// All settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub organizer: OrganizerSettings,

    /// Filters active for every run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<FilterSpec>,

    /// Custom presets by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub presets: BTreeMap<String, Vec<FilterSpec>>,

    /// Extra extension mappings. They never override the built-in table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: BTreeMap<String, Category>,
}

/// The `[organizer]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerSettings {
    pub default_mode: OrganizationMode,
    pub auto_backup: bool,
    pub max_backups: usize,
    pub backup_failure: BackupFailurePolicy,
    pub file_size_limit_mb: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for OrganizerSettings {
    fn default() -> Self {
        Self {
            default_mode: OrganizationMode::ByType,
            auto_backup: true,
            max_backups: 10,
            backup_failure: BackupFailurePolicy::Proceed,
            file_size_limit_mb: 1000.0,
            backup_dir: None,
            log_level: None,
        }
    }
}

impl Settings {
    /// Load settings, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.foldersortrc.toml` in the current directory
    /// 3. Look for `~/.config/foldersort/config.toml`
    /// 4. Fall back to default settings
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any file found is not valid.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        match Self::locate() {
            Some(path) => Self::load_from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// The first existing configuration file of the lookup chain.
    pub fn locate() -> Option<PathBuf> {
        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Some(local_config);
        }
        user_config_path().filter(|path| path.exists())
    }

    /// Load settings from a specific file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ConfigNotFound` if the file does not exist and
    /// `ConfigError::ConfigInvalid` if TOML parsing fails.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self =
            toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;

        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Writes the settings to `path`, creating parent folders.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds the filter manager: built-in presets, custom presets, active filters.
    ///
    /// # Errors
    ///
    /// Returns an error if any filter or preset does not compile.
    pub fn filter_manager(&self) -> Result<FilterManager, ConfigError> {
        let mut manager = FilterManager::new();
        for (name, specs) in &self.presets {
            if manager.is_builtin(name) {
                warn!("Custom preset '{}' shadows a built-in preset", name);
            }
            manager.create_custom_preset(name, specs.clone())?;
        }
        manager.set_active(FilterSet::from_specs(&self.filters)?);
        Ok(manager)
    }

    /// The extension table plus the `[categories]` additions.
    pub fn file_mapper(&self) -> FileMapper {
        let mut mapper = FileMapper::new();
        for (extension, category) in &self.categories {
            if !mapper.add_extension_mapping(extension, *category) {
                warn!(
                    "Ignoring mapping {} -> {}: extension already mapped",
                    extension, category
                );
            }
        }
        mapper
    }

    pub fn backup_policy(&self) -> BackupPolicy {
        BackupPolicy {
            enabled: self.organizer.auto_backup,
            on_failure: self.organizer.backup_failure,
            retain: Some(self.organizer.max_backups),
        }
    }

    pub fn validator(&self) -> FileValidator {
        FileValidator::new(self.organizer.file_size_limit_mb)
    }

    /// Configured backup directory, or the platform default.
    pub fn backup_dir(&self) -> PathBuf {
        self.organizer
            .backup_dir
            .clone()
            .unwrap_or_else(default_backup_dir)
    }
}

/// `~/.config/foldersort/config.toml`
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("foldersort")
            .join("config.toml")
    })
}

/// `<state dir>/foldersort/backups`, falling back to the local data dir and then to
/// `./.foldersort/backups`.
pub fn default_backup_dir() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .map(|dir| dir.join("foldersort").join("backups"))
        .unwrap_or_else(|| PathBuf::from(".foldersort").join("backups"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.organizer.default_mode, OrganizationMode::ByType);
        assert!(settings.organizer.auto_backup);
        assert_eq!(settings.organizer.max_backups, 10);
        assert_eq!(settings.organizer.backup_failure, BackupFailurePolicy::Proceed);
        assert!(settings.filters.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [organizer]
            default_mode = "by_date"
            auto_backup = false
            max_backups = 3
            backup_failure = "abort"
            file_size_limit_mb = 50.0
            backup_dir = "/tmp/foldersort-test"
            log_level = "debug"

            [[filters]]
            kind = "size"
            min_mb = 1.0

            [[filters]]
            kind = "hidden"
            include_hidden = false

            [[presets.photos]]
            kind = "extension"
            extensions = ["jpg", "png"]

            [categories]
            ".heic" = "Imagens"
        "#;
        let settings: Settings = toml::from_str(toml).expect("Failed to parse config");

        assert_eq!(settings.organizer.default_mode, OrganizationMode::ByDate);
        assert!(!settings.organizer.auto_backup);
        assert_eq!(settings.organizer.backup_failure, BackupFailurePolicy::Abort);
        assert_eq!(settings.filters.len(), 2);
        assert_eq!(settings.presets["photos"].len(), 1);
        assert_eq!(settings.backup_dir(), PathBuf::from("/tmp/foldersort-test"));

        let policy = settings.backup_policy();
        assert!(!policy.enabled);
        assert_eq!(policy.retain, Some(3));

        let manager = settings.filter_manager().expect("filters should compile");
        assert_eq!(manager.active().len(), 2);
        assert!(manager.preset("photos").is_some());
        assert!(!manager.is_builtin("photos"));

        assert_eq!(settings.file_mapper().category_of(".heic"), Category::Image);
    }

    #[test]
    fn test_partial_organizer_section_keeps_defaults() {
        let settings: Settings = toml::from_str("[organizer]\nmax_backups = 2\n").unwrap();
        assert_eq!(settings.organizer.max_backups, 2);
        assert!(settings.organizer.auto_backup);
        assert_eq!(settings.organizer.file_size_limit_mb, 1000.0);
    }

    #[test]
    fn test_invalid_filter_in_config() {
        let toml = r#"
            [[filters]]
            kind = "name"
            pattern = "[unclosed"
            use_regex = true
        "#;
        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(matches!(
            settings.filter_manager(),
            Err(ConfigError::Filter(_))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[organizer\nmax_backups = ").unwrap();

        assert!(matches!(
            Settings::load(Some(&path)),
            Err(ConfigError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_explicit_missing_config_fails() {
        let result = Settings::load(Some(Path::new("/non/existent/foldersort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.organizer.max_backups = 4;
        settings.presets.insert(
            "big".to_string(),
            vec![FilterSpec::Size {
                min_mb: 10.0,
                max_mb: None,
            }],
        );
        settings.save(&path).expect("Failed to save settings");

        let reloaded = Settings::load(Some(&path)).expect("Failed to reload settings");
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn test_default_backup_dir_is_named() {
        assert!(default_backup_dir().ends_with("foldersort/backups"));
    }
}
