/// File categorization by extension.
///
/// The extension table is static data: every category owns a list of extensions and
/// an extension belongs to the first category that lists it. Anything not listed falls
/// into [`Category::Other`].
///
/// # Examples
///
/// ```
/// use foldersort::file_category::{Category, FileMapper};
///
/// let mapper = FileMapper::default();
/// assert_eq!(mapper.category_of(".png"), Category::Image);
/// assert_eq!(mapper.category_of(".PDF"), Category::Document);
/// assert_eq!(mapper.category_of(".unknown"), Category::Other);
/// ```
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// A coarse file-kind label.
///
/// The label returned by [`Category::label`] doubles as the destination folder name
/// when organizing by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Image files (PNG, JPG, PSD, etc.)
    Image,
    /// Document and office files (PDF, DOCX, XLSX, CSV, etc.)
    Document,
    /// Video files (MP4, MKV, AVI, etc.)
    Video,
    /// Audio files (MP3, FLAC, WAV, etc.)
    Audio,
    /// Compressed archives and disk images (ZIP, 7Z, ISO, etc.)
    Archive,
    /// Installers, packages and scripts meant to be run
    Executable,
    /// Source code and structured text (RS, PY, JSON, etc.)
    Code,
    /// Font files (TTF, OTF, WOFF, etc.)
    Font,
    /// Electronic books (EPUB, MOBI, etc.)
    Ebook,
    /// Catch-all for unknown extensions
    Other,
}

/// The extension table, in lookup order.
const CATEGORY_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Image,
        &[
            ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp", ".svg", ".ico", ".raw",
            ".psd",
        ],
    ),
    (
        Category::Document,
        &[
            ".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt", ".xls", ".xlsx", ".ppt", ".pptx",
            ".csv",
        ],
    ),
    (
        Category::Video,
        &[
            ".mp4", ".avi", ".mov", ".wmv", ".flv", ".mkv", ".webm", ".m4v", ".3gp", ".mpg",
            ".mpeg",
        ],
    ),
    (
        Category::Audio,
        &[
            ".mp3", ".wav", ".ogg", ".flac", ".aac", ".wma", ".m4a", ".opus", ".aiff",
        ],
    ),
    (
        Category::Archive,
        &[
            ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz", ".cab", ".iso",
        ],
    ),
    (
        Category::Executable,
        &[
            ".exe", ".msi", ".bat", ".cmd", ".sh", ".app", ".deb", ".rpm", ".dmg",
        ],
    ),
    (
        Category::Code,
        &[
            ".py", ".java", ".js", ".html", ".css", ".php", ".c", ".cpp", ".h", ".cs", ".json",
            ".xml", ".sql", ".r", ".go", ".rs", ".swift",
        ],
    ),
    (Category::Font, &[".ttf", ".otf", ".woff", ".woff2", ".eot"]),
    (Category::Ebook, &[".epub", ".mobi", ".azw", ".azw3", ".fb2"]),
    (Category::Other, &[]),
];

impl Category {
    /// Every category, in table order.
    pub const ALL: [Category; 10] = [
        Category::Image,
        Category::Document,
        Category::Video,
        Category::Audio,
        Category::Archive,
        Category::Executable,
        Category::Code,
        Category::Font,
        Category::Ebook,
        Category::Other,
    ];

    /// Returns the label of this category, also used as its folder name.
    ///
    /// # Examples
    ///
    /// ```
    /// use foldersort::file_category::Category;
    ///
    /// assert_eq!(Category::Image.label(), "Imagens");
    /// assert_eq!(Category::Other.label(), "Outros");
    /// ```
    pub fn label(&self) -> &'static str {
        match self {
            Category::Image => "Imagens",
            Category::Document => "Documentos",
            Category::Video => "Videos",
            Category::Audio => "Audio",
            Category::Archive => "Compactados",
            Category::Executable => "Executaveis",
            Category::Code => "Codigo",
            Category::Font => "Fontes",
            Category::Ebook => "Ebooks",
            Category::Other => "Outros",
        }
    }

    /// Returns a human-readable description of this category.
    pub fn description(&self) -> &'static str {
        match self {
            Category::Image => "Image files",
            Category::Document => "Documents, spreadsheets and presentations",
            Category::Video => "Video files",
            Category::Audio => "Audio files",
            Category::Archive => "Compressed archives and disk images",
            Category::Executable => "Installers, packages and scripts",
            Category::Code => "Source code and structured text",
            Category::Font => "Font files",
            Category::Ebook => "Electronic books",
            Category::Other => "Other files",
        }
    }

    /// Parses a category from its label, ignoring case.
    pub fn from_label(label: &str) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(label.trim()))
    }

    /// The extensions the static table assigns to this category.
    pub fn extensions(&self) -> &'static [&'static str] {
        CATEGORY_TABLE
            .iter()
            .find(|(category, _)| category == self)
            .map(|(_, exts)| *exts)
            .unwrap_or(&[])
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for Category {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Category::from_label(&label)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown category '{}'", label)))
    }
}

/// Normalizes an extension to lower case with a single leading dot.
///
/// An empty input stays empty (files without an extension).
///
/// ```
/// use foldersort::file_category::normalize_extension;
///
/// assert_eq!(normalize_extension("PNG"), ".png");
/// assert_eq!(normalize_extension(".Tar"), ".tar");
/// assert_eq!(normalize_extension(""), "");
/// ```
pub fn normalize_extension(ext: &str) -> String {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{}", trimmed.to_lowercase())
    }
}

/// Maps file extensions to categories.
///
/// Built from the static table; extra mappings (from the `[categories]` config section)
/// can be layered on top but never replace an extension the table already owns.
#[derive(Debug, Clone)]
pub struct FileMapper {
    extension_map: HashMap<String, Category>,
}

impl FileMapper {
    /// Creates a new `FileMapper` with the standard table.
    pub fn new() -> Self {
        let mut mapper = Self {
            extension_map: HashMap::new(),
        };
        for (category, extensions) in CATEGORY_TABLE {
            for ext in *extensions {
                mapper.add_extension_mapping(ext, *category);
            }
        }
        mapper
    }

    /// Adds an extension mapping. First mapping wins, so an extension already
    /// claimed by another category is left alone and `false` is returned.
    pub fn add_extension_mapping(&mut self, ext: &str, category: Category) -> bool {
        let ext = normalize_extension(ext);
        if ext.is_empty() || self.extension_map.contains_key(&ext) {
            return false;
        }
        self.extension_map.insert(ext, category);
        true
    }

    /// Maps an extension to its category, defaulting to [`Category::Other`].
    ///
    /// The lookup is case-insensitive. A leading dot is expected; callers with raw
    /// extensions should go through [`normalize_extension`] first.
    pub fn category_of(&self, extension: &str) -> Category {
        self.extension_map
            .get(&extension.to_lowercase())
            .copied()
            .unwrap_or(Category::Other)
    }
}

impl Default for FileMapper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_category_labels() {
        assert_eq!(Category::Image.label(), "Imagens");
        assert_eq!(Category::Document.label(), "Documentos");
        assert_eq!(Category::Video.label(), "Videos");
        assert_eq!(Category::Audio.label(), "Audio");
        assert_eq!(Category::Archive.label(), "Compactados");
        assert_eq!(Category::Executable.label(), "Executaveis");
        assert_eq!(Category::Code.label(), "Codigo");
        assert_eq!(Category::Font.label(), "Fontes");
        assert_eq!(Category::Ebook.label(), "Ebooks");
        assert_eq!(Category::Other.label(), "Outros");
    }

    #[test]
    fn test_category_of_known_extensions() {
        let mapper = FileMapper::default();
        assert_eq!(mapper.category_of(".png"), Category::Image);
        assert_eq!(mapper.category_of(".txt"), Category::Document);
        assert_eq!(mapper.category_of(".mkv"), Category::Video);
        assert_eq!(mapper.category_of(".flac"), Category::Audio);
        assert_eq!(mapper.category_of(".7z"), Category::Archive);
        assert_eq!(mapper.category_of(".deb"), Category::Executable);
        assert_eq!(mapper.category_of(".rs"), Category::Code);
        assert_eq!(mapper.category_of(".woff2"), Category::Font);
        assert_eq!(mapper.category_of(".epub"), Category::Ebook);
    }

    #[test]
    fn test_category_of_is_case_insensitive() {
        let mapper = FileMapper::default();
        assert_eq!(mapper.category_of(".PNG"), Category::Image);
        assert_eq!(mapper.category_of(".Pdf"), Category::Document);
    }

    #[test]
    fn test_category_of_defaults_to_other() {
        let mapper = FileMapper::default();
        assert_eq!(mapper.category_of(".xyz"), Category::Other);
        assert_eq!(mapper.category_of(""), Category::Other);
        // Without the leading dot the lookup misses.
        assert_eq!(mapper.category_of("png"), Category::Other);
    }

    #[test]
    fn test_no_extension_in_two_categories() {
        let mut seen = HashSet::new();
        for (_, extensions) in CATEGORY_TABLE {
            for ext in *extensions {
                assert!(seen.insert(*ext), "{} appears in two categories", ext);
            }
        }
    }

    #[test]
    fn test_table_entries_map_back_to_their_category() {
        let mapper = FileMapper::default();
        for category in Category::ALL {
            for ext in category.extensions() {
                assert_eq!(mapper.category_of(ext), category);
            }
        }
    }

    #[test]
    fn test_from_label() {
        assert_eq!(Category::from_label("imagens"), Some(Category::Image));
        assert_eq!(Category::from_label("OUTROS"), Some(Category::Other));
        assert_eq!(Category::from_label("pictures"), None);
    }

    #[test]
    fn test_custom_mapping_never_overrides_table() {
        let mut mapper = FileMapper::default();
        assert!(mapper.add_extension_mapping("heic", Category::Image));
        assert!(!mapper.add_extension_mapping(".png", Category::Document));

        assert_eq!(mapper.category_of(".heic"), Category::Image);
        assert_eq!(mapper.category_of(".png"), Category::Image);
    }

    #[test]
    fn test_category_serde_uses_label() {
        let json = serde_json::to_string(&Category::Archive).unwrap();
        assert_eq!(json, "\"Compactados\"");
        let back: Category = serde_json::from_str("\"codigo\"").unwrap();
        assert_eq!(back, Category::Code);
    }
}
