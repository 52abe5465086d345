//! Pure classification of directory entries.
//!
//! Platform package detection (`FileSystemAccess::is_file_package`) is a
//! separate, I/O-bound check layered on top by the engine.

use crate::config::SyncConfig;

/// How the scanner treats one listed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file, indexed as a leaf
    File,
    /// Directory indexed as a single leaf
    OpaquePackage,
    /// Directory to descend into
    Directory,
}

impl EntryKind {
    pub fn is_leaf(self) -> bool {
        !matches!(self, EntryKind::Directory)
    }
}

fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name
            .get(name.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

/// Whether `name` is reserved and must never be indexed.
pub fn is_ignored(name: &str, ignored_suffixes: &[String]) -> bool {
    ignored_suffixes
        .iter()
        .any(|suffix| ends_with_ignore_case(name, suffix))
}

/// Classify an entry by name and kind alone.
pub fn classify(name: &str, is_directory: bool, opaque_suffixes: &[String]) -> EntryKind {
    if !is_directory {
        EntryKind::File
    } else if opaque_suffixes
        .iter()
        .any(|suffix| ends_with_ignore_case(name, suffix))
    {
        EntryKind::OpaquePackage
    } else {
        EntryKind::Directory
    }
}

impl SyncConfig {
    pub fn is_ignored(&self, name: &str) -> bool {
        is_ignored(name, &self.ignored_suffixes)
    }

    pub fn classify(&self, name: &str, is_directory: bool) -> EntryKind {
        classify(name, is_directory, &self.opaque_suffixes)
    }
}
