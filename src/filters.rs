//! File filters and filter presets.
//!
//! A [`Filter`] is a pure predicate over a [`FileRecord`]. Filters are combined into a
//! [`FilterSet`] whose predicate is the logical AND of its members; an empty set accepts
//! everything. Filters are described by serializable [`FilterSpec`]s so they can live in
//! the TOML configuration and in saved presets:
//!
//! ```toml
//! [[filters]]
//! kind = "size"
//! min_mb = 1.0
//!
//! [[filters]]
//! kind = "name"
//! pattern = "IMG_*"
//!
//! [[presets.photos]]
//! kind = "category"
//! categories = ["Imagens"]
//! ```

use crate::file_category::{Category, normalize_extension};
use crate::record::FileRecord;
use chrono::{DateTime, Duration, Local};
use glob::{MatchOptions, Pattern};
use log::{debug, info};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised while building filters or activating presets.
#[derive(Debug, Clone, Error)]
pub enum FilterError {
    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    #[error("Invalid wildcard pattern '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("Invalid size range: minimum {min_mb}MB is above maximum {max_mb}MB")]
    InvalidSizeRange { min_mb: f64, max_mb: f64 },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),
}

fn default_true() -> bool {
    true
}

/// Serializable description of a filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSpec {
    /// Passes when `min_mb <= size <= max_mb`; no `max_mb` means unbounded.
    Size {
        #[serde(default)]
        min_mb: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_mb: Option<f64>,
    },
    /// Either the last `days_ago` days, or an explicit range with optional bounds.
    Date {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days_ago: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<DateTime<Local>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<DateTime<Local>>,
    },
    Extension {
        extensions: Vec<String>,
        #[serde(default = "default_true")]
        include: bool,
    },
    /// Wildcard (`*`, `?`) match over the whole name, or a regex search.
    Name {
        pattern: String,
        #[serde(default)]
        use_regex: bool,
        #[serde(default)]
        case_sensitive: bool,
    },
    Category {
        categories: Vec<Category>,
        #[serde(default = "default_true")]
        include: bool,
    },
    Hidden {
        #[serde(default)]
        include_hidden: bool,
    },
    ReadOnly {
        #[serde(default = "default_true")]
        include_readonly: bool,
    },
}

/// Compiled matcher behind a name filter.
#[derive(Debug, Clone)]
pub enum NameMatcher {
    Glob(Pattern),
    Regex(Regex),
}

/// A compiled filter.
#[derive(Debug, Clone)]
pub enum Filter {
    Size {
        min_mb: f64,
        max_mb: Option<f64>,
    },
    Date {
        days_ago: Option<u32>,
        start: Option<DateTime<Local>>,
        end: Option<DateTime<Local>>,
    },
    Extension {
        extensions: BTreeSet<String>,
        include: bool,
    },
    Name {
        pattern: String,
        use_regex: bool,
        case_sensitive: bool,
        matcher: NameMatcher,
    },
    Category {
        categories: BTreeSet<Category>,
        include: bool,
    },
    Hidden {
        include_hidden: bool,
    },
    ReadOnly {
        include_readonly: bool,
    },
}

impl Filter {
    /// Files whose size lies in `[min_mb, max_mb]`.
    pub fn size(min_mb: f64, max_mb: Option<f64>) -> Result<Self, FilterError> {
        if let Some(max_mb) = max_mb
            && max_mb < min_mb
        {
            return Err(FilterError::InvalidSizeRange { min_mb, max_mb });
        }
        Ok(Filter::Size { min_mb, max_mb })
    }

    /// Files modified within the last `days` days, counted from now. Future
    /// modification times fall outside the window.
    pub fn days_ago(days: u32) -> Self {
        let now = Local::now();
        Filter::Date {
            days_ago: Some(days),
            start: Some(now - Duration::days(i64::from(days))),
            end: Some(now),
        }
    }

    /// Files modified inside `[start, end]`; a missing bound is unbounded.
    pub fn date_range(start: Option<DateTime<Local>>, end: Option<DateTime<Local>>) -> Self {
        Filter::Date {
            days_ago: None,
            start,
            end,
        }
    }

    pub fn extensions<S: AsRef<str>>(extensions: &[S], include: bool) -> Self {
        Filter::Extension {
            extensions: extensions
                .iter()
                .map(|e| normalize_extension(e.as_ref()))
                .collect(),
            include,
        }
    }

    pub fn name(pattern: &str, use_regex: bool, case_sensitive: bool) -> Result<Self, FilterError> {
        let matcher = if use_regex {
            let regex = RegexBuilder::new(pattern)
                .case_insensitive(!case_sensitive)
                .build()
                .map_err(|e| FilterError::InvalidRegex {
                    pattern: pattern.to_string(),
                    reason: e.to_string(),
                })?;
            NameMatcher::Regex(regex)
        } else {
            // glob only folds ASCII, so case-insensitive patterns are lowered up front.
            let source = if case_sensitive {
                pattern.to_string()
            } else {
                pattern.to_lowercase()
            };
            let glob = Pattern::new(&source).map_err(|e| FilterError::InvalidGlob {
                pattern: pattern.to_string(),
                reason: e.msg.to_string(),
            })?;
            NameMatcher::Glob(glob)
        };

        Ok(Filter::Name {
            pattern: pattern.to_string(),
            use_regex,
            case_sensitive,
            matcher,
        })
    }

    pub fn categories(categories: &[Category], include: bool) -> Self {
        Filter::Category {
            categories: categories.iter().copied().collect(),
            include,
        }
    }

    pub fn hidden(include_hidden: bool) -> Self {
        Filter::Hidden { include_hidden }
    }

    pub fn read_only(include_readonly: bool) -> Self {
        Filter::ReadOnly { include_readonly }
    }

    /// Compiles a spec. Relative date windows are anchored at the time of the call.
    pub fn from_spec(spec: &FilterSpec) -> Result<Self, FilterError> {
        match spec {
            FilterSpec::Size { min_mb, max_mb } => Filter::size(*min_mb, *max_mb),
            FilterSpec::Date {
                days_ago: Some(days),
                ..
            } => Ok(Filter::days_ago(*days)),
            FilterSpec::Date { start, end, .. } => Ok(Filter::date_range(*start, *end)),
            FilterSpec::Extension {
                extensions,
                include,
            } => Ok(Filter::extensions(extensions.as_slice(), *include)),
            FilterSpec::Name {
                pattern,
                use_regex,
                case_sensitive,
            } => Filter::name(pattern, *use_regex, *case_sensitive),
            FilterSpec::Category {
                categories,
                include,
            } => Ok(Filter::categories(categories, *include)),
            FilterSpec::Hidden { include_hidden } => Ok(Filter::hidden(*include_hidden)),
            FilterSpec::ReadOnly { include_readonly } => Ok(Filter::read_only(*include_readonly)),
        }
    }

    /// The spec this filter was built from.
    pub fn spec(&self) -> FilterSpec {
        match self {
            Filter::Size { min_mb, max_mb } => FilterSpec::Size {
                min_mb: *min_mb,
                max_mb: *max_mb,
            },
            Filter::Date {
                days_ago: Some(days),
                ..
            } => FilterSpec::Date {
                days_ago: Some(*days),
                start: None,
                end: None,
            },
            Filter::Date { start, end, .. } => FilterSpec::Date {
                days_ago: None,
                start: *start,
                end: *end,
            },
            Filter::Extension {
                extensions,
                include,
            } => FilterSpec::Extension {
                extensions: extensions.iter().cloned().collect(),
                include: *include,
            },
            Filter::Name {
                pattern,
                use_regex,
                case_sensitive,
                ..
            } => FilterSpec::Name {
                pattern: pattern.clone(),
                use_regex: *use_regex,
                case_sensitive: *case_sensitive,
            },
            Filter::Category {
                categories,
                include,
            } => FilterSpec::Category {
                categories: categories.iter().copied().collect(),
                include: *include,
            },
            Filter::Hidden { include_hidden } => FilterSpec::Hidden {
                include_hidden: *include_hidden,
            },
            Filter::ReadOnly { include_readonly } => FilterSpec::ReadOnly {
                include_readonly: *include_readonly,
            },
        }
    }

    /// Returns true if the record passes this filter.
    pub fn apply(&self, record: &FileRecord) -> bool {
        match self {
            Filter::Size { min_mb, max_mb } => {
                let size_mb = record.size_mb();
                *min_mb <= size_mb && max_mb.is_none_or(|max| size_mb <= max)
            }
            Filter::Date { start, end, .. } => {
                start.is_none_or(|start| record.modified >= start)
                    && end.is_none_or(|end| record.modified <= end)
            }
            Filter::Extension {
                extensions,
                include,
            } => extensions.contains(&record.extension) == *include,
            Filter::Name {
                case_sensitive,
                matcher,
                ..
            } => match matcher {
                NameMatcher::Regex(regex) => regex.is_match(&record.name),
                NameMatcher::Glob(glob) if !*case_sensitive => glob.matches_with(
                    &record.name.to_lowercase(),
                    MatchOptions {
                        case_sensitive: true,
                        require_literal_separator: false,
                        require_literal_leading_dot: false,
                    },
                ),
                NameMatcher::Glob(glob) => glob.matches_with(
                    &record.name,
                    MatchOptions {
                        case_sensitive: *case_sensitive,
                        require_literal_separator: false,
                        require_literal_leading_dot: false,
                    },
                ),
            },
            Filter::Category {
                categories,
                include,
            } => categories.contains(&record.category) == *include,
            Filter::Hidden { include_hidden } => !record.is_hidden || *include_hidden,
            Filter::ReadOnly { include_readonly } => !record.is_readonly || *include_readonly,
        }
    }

    /// Short display name, also used to remove a filter from the active set.
    pub fn name_label(&self) -> String {
        match self {
            Filter::Size { min_mb, max_mb } => match max_mb {
                Some(max) => format!("Size ({}MB - {}MB)", min_mb, max),
                None => format!("Size (>= {}MB)", min_mb),
            },
            Filter::Date {
                days_ago: Some(days),
                ..
            } => format!("Last {} days", days),
            Filter::Date { start, end, .. } => format!(
                "Date ({} - {})",
                start
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "start".to_string()),
                end.map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "end".to_string()),
            ),
            Filter::Extension {
                extensions,
                include,
            } => format!(
                "{} extensions: {}",
                polarity(*include),
                extensions.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
            Filter::Name {
                pattern, use_regex, ..
            } => format!(
                "Name: {} ({})",
                pattern,
                if *use_regex { "regex" } else { "wildcard" }
            ),
            Filter::Category {
                categories,
                include,
            } => format!(
                "{} categories: {}",
                polarity(*include),
                categories
                    .iter()
                    .map(|c| c.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Filter::Hidden { include_hidden } => {
                format!("{} hidden files", polarity(*include_hidden))
            }
            Filter::ReadOnly { include_readonly } => {
                format!("{} read-only files", polarity(*include_readonly))
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Filter::Size { .. } => "Files within the given size range",
            Filter::Date { .. } => "Files modified in the given period",
            Filter::Extension { include: true, .. } => "Only files with the given extensions",
            Filter::Extension { include: false, .. } => "Files without the given extensions",
            Filter::Name {
                use_regex: true, ..
            } => "Files whose name matches a regular expression",
            Filter::Name { .. } => "Files whose name matches a wildcard pattern",
            Filter::Category { include: true, .. } => "Only files from the given categories",
            Filter::Category { include: false, .. } => "Files outside the given categories",
            Filter::Hidden { .. } => "Controls whether hidden files are considered",
            Filter::ReadOnly { .. } => "Controls whether read-only files are considered",
        }
    }
}

fn polarity(include: bool) -> &'static str {
    if include { "Include" } else { "Exclude" }
}

/// An ordered AND-combination of filters.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self { filters }
    }

    pub fn from_specs(specs: &[FilterSpec]) -> Result<Self, FilterError> {
        specs
            .iter()
            .map(Filter::from_spec)
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    pub fn specs(&self) -> Vec<FilterSpec> {
        self.filters.iter().map(Filter::spec).collect()
    }

    pub fn push(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true if the record passes every filter.
    pub fn matches(&self, record: &FileRecord) -> bool {
        self.filters.iter().all(|filter| filter.apply(record))
    }

    /// Keeps the records passing every filter, in their original order.
    pub fn apply(&self, records: Vec<FileRecord>) -> Vec<FileRecord> {
        if self.filters.is_empty() {
            return records;
        }
        let before = records.len();
        let kept: Vec<_> = records.into_iter().filter(|r| self.matches(r)).collect();
        info!("Filters applied: {} -> {} files", before, kept.len());
        kept
    }
}

const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".svg",
];
const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt", ".xls", ".xlsx", ".ppt", ".pptx",
];
const VIDEO_EXTENSIONS: &[&str] = &[
    ".mp4", ".avi", ".mov", ".wmv", ".flv", ".mkv", ".webm", ".m4v",
];
const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".flac", ".aac", ".wma", ".m4a"];

fn extension_spec(groups: &[&[&str]]) -> FilterSpec {
    FilterSpec::Extension {
        extensions: groups
            .iter()
            .flat_map(|g| g.iter().map(|e| e.to_string()))
            .collect(),
        include: true,
    }
}

/// The built-in presets.
pub fn builtin_presets() -> BTreeMap<String, Vec<FilterSpec>> {
    let mut documents_with_csv: Vec<&str> = DOCUMENT_EXTENSIONS.to_vec();
    documents_with_csv.push(".csv");

    let presets = [
        ("images-only", vec![extension_spec(&[IMAGE_EXTENSIONS])]),
        ("documents-only", vec![extension_spec(&[DOCUMENT_EXTENSIONS])]),
        ("videos-only", vec![extension_spec(&[VIDEO_EXTENSIONS])]),
        ("audio-only", vec![extension_spec(&[AUDIO_EXTENSIONS])]),
        (
            "large-files",
            vec![FilterSpec::Size {
                min_mb: 100.0,
                max_mb: None,
            }],
        ),
        (
            "small-files",
            vec![FilterSpec::Size {
                min_mb: 0.0,
                max_mb: Some(1.0),
            }],
        ),
        (
            "last-30-days",
            vec![FilterSpec::Date {
                days_ago: Some(30),
                start: None,
                end: None,
            }],
        ),
        (
            "no-hidden-files",
            vec![FilterSpec::Hidden {
                include_hidden: false,
            }],
        ),
        (
            "cleanup-candidates",
            vec![
                extension_spec(&[&[".tmp", ".temp", ".cache", ".log"]]),
                FilterSpec::Date {
                    days_ago: Some(90),
                    start: None,
                    end: None,
                },
                FilterSpec::Size {
                    min_mb: 0.0,
                    max_mb: Some(500.0),
                },
            ],
        ),
        (
            "media",
            vec![
                extension_spec(&[IMAGE_EXTENSIONS, VIDEO_EXTENSIONS, AUDIO_EXTENSIONS]),
                FilterSpec::Size {
                    min_mb: 0.1,
                    max_mb: None,
                },
            ],
        ),
        ("documents", vec![extension_spec(&[documents_with_csv.as_slice()])]),
    ];

    presets
        .into_iter()
        .map(|(name, specs)| (name.to_string(), specs))
        .collect()
}

/// Holds the active filters and the named presets.
#[derive(Debug, Clone)]
pub struct FilterManager {
    active: FilterSet,
    presets: BTreeMap<String, Vec<FilterSpec>>,
    builtin: BTreeSet<String>,
}

impl FilterManager {
    pub fn new() -> Self {
        let presets = builtin_presets();
        let builtin = presets.keys().cloned().collect();
        Self {
            active: FilterSet::default(),
            presets,
            builtin,
        }
    }

    pub fn active(&self) -> &FilterSet {
        &self.active
    }

    pub fn add_filter(&mut self, filter: Filter) {
        debug!("Filter added: {}", filter.name_label());
        self.active.push(filter);
    }

    /// Removes every active filter whose display name equals `name`.
    pub fn remove_filter(&mut self, name: &str) -> bool {
        let before = self.active.filters.len();
        self.active.filters.retain(|f| f.name_label() != name);
        debug!("Filter removed: {}", name);
        self.active.filters.len() != before
    }

    pub fn clear_filters(&mut self) {
        self.active.filters.clear();
        debug!("All filters removed");
    }

    pub fn set_active(&mut self, filters: FilterSet) {
        self.active = filters;
    }

    /// Replaces the active set with the named preset.
    pub fn apply_preset(&mut self, name: &str) -> Result<(), FilterError> {
        let specs = self
            .presets
            .get(name)
            .ok_or_else(|| FilterError::UnknownPreset(name.to_string()))?;
        self.active = FilterSet::from_specs(specs)?;
        info!("Preset applied: {}", name);
        Ok(())
    }

    pub fn available_presets(&self) -> Vec<String> {
        self.presets.keys().cloned().collect()
    }

    pub fn preset(&self, name: &str) -> Option<&[FilterSpec]> {
        self.presets.get(name).map(Vec::as_slice)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin.contains(name)
    }

    /// Registers a custom preset after checking that every spec compiles.
    pub fn create_custom_preset(
        &mut self,
        name: &str,
        specs: Vec<FilterSpec>,
    ) -> Result<(), FilterError> {
        FilterSet::from_specs(&specs)?;
        self.presets.insert(name.to_string(), specs);
        info!("Custom preset created: {}", name);
        Ok(())
    }

    /// Saves the active filters under `name`.
    pub fn save_current_as_preset(&mut self, name: &str) {
        self.presets.insert(name.to_string(), self.active.specs());
        info!("Active filters saved as preset: {}", name);
    }

    /// Presets that are not built in, for persisting to the config file.
    pub fn custom_presets(&self) -> BTreeMap<String, Vec<FilterSpec>> {
        self.presets
            .iter()
            .filter(|(name, _)| !self.builtin.contains(*name))
            .map(|(name, specs)| (name.clone(), specs.clone()))
            .collect()
    }

    /// `(name, description)` for every active filter.
    pub fn summary(&self) -> Vec<(String, &'static str)> {
        self.active
            .filters
            .iter()
            .map(|f| (f.name_label(), f.description()))
            .collect()
    }
}

impl Default for FilterManager {
    fn default() -> Self {
        Self::new()
    }
}
