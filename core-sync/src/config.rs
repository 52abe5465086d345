//! Tunables for scanning and import.

use crate::drive::ListOptions;

/// Names ending with any of these are never indexed.
///
/// Covers the index's own storage files, lock files and platform litter.
pub const DEFAULT_IGNORED_SUFFIXES: &[&str] = &[
    ".sqlite",
    ".sqlite-wal",
    ".sqlite-shm",
    ".db",
    ".db-wal",
    ".db-shm",
    "-journal",
    ".lock",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    ".tmp",
    ".part",
    ".icloud",
];

/// Directories ending with these are treated as a single package.
pub const DEFAULT_OPAQUE_SUFFIXES: &[&str] = &[".epub", ".cbz", ".zip", ".bundle"];

/// File extensions whose entries are listed through the archive reader.
pub const DEFAULT_ARCHIVE_EXTENSIONS: &[&str] = &["zip", "epub", "cbz"];

/// Characters of the content hash used to disambiguate import names.
pub const DEFAULT_HASH_LENGTH: usize = 6;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Suffixes of entries skipped during listing (case-insensitive)
    pub ignored_suffixes: Vec<String>,

    /// Suffixes that make a directory an opaque package (case-insensitive)
    pub opaque_suffixes: Vec<String>,

    /// Extensions read through the archive reader for entry listings
    pub archive_extensions: Vec<String>,

    /// Length of the uppercase hex hash appended to clashing import names
    pub hash_length: usize,

    /// Options for every directory listing
    pub list_options: ListOptions,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ignored_suffixes: to_owned(DEFAULT_IGNORED_SUFFIXES),
            opaque_suffixes: to_owned(DEFAULT_OPAQUE_SUFFIXES),
            archive_extensions: to_owned(DEFAULT_ARCHIVE_EXTENSIONS),
            hash_length: DEFAULT_HASH_LENGTH,
            list_options: ListOptions::default(),
        }
    }
}

impl SyncConfig {
    /// Add opaque package suffixes on top of the defaults.
    pub fn with_extra_opaque_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opaque_suffixes
            .extend(suffixes.into_iter().map(Into::into));
        self
    }

    pub fn with_extra_ignored_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_suffixes
            .extend(suffixes.into_iter().map(Into::into));
        self
    }

    /// Whether files with `extension` carry an archive entry listing.
    pub fn is_archive_extension(&self, extension: &str) -> bool {
        self.archive_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

fn to_owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.hash_length, 6);
        assert!(config.is_archive_extension("ZIP"));
        assert!(!config.is_archive_extension("txt"));
        assert!(config.ignored_suffixes.iter().any(|s| s == ".sqlite-wal"));
        assert!(config.is_ignored("index.db-wal"));
        assert!(config.is_ignored("index.db-shm"));
        assert!(config.is_ignored("index.db"));
    }

    #[test]
    fn test_extra_suffixes_extend_defaults() {
        let config = SyncConfig::default().with_extra_opaque_suffixes([".pages"]);
        assert!(config.opaque_suffixes.iter().any(|s| s == ".epub"));
        assert!(config.opaque_suffixes.iter().any(|s| s == ".pages"));
    }
}
