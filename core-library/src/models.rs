//! Domain models for the metadata index.

use serde::{Deserialize, Serialize};

/// Separator between a drive tag and the encoded path in an identifier.
pub const IDENTIFIER_SCHEME_SEPARATOR: &str = "://";

/// One discoverable content file.
///
/// Timestamps are Unix milliseconds. `last_refreshed` holds the file
/// modification time observed when the record was last written, and only
/// ever advances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Canonical identifier (primary key), opaque once resolvers ran
    pub id: String,
    /// Tag of the owning drive (`local` or `icloud`)
    pub drive: String,
    /// Drive-relative path, `/`-separated
    pub relative_path: String,
    /// Display title, defaults to the file stem
    pub title: String,
    pub mime_type: String,
    pub file_size: i64,
    pub last_refreshed: i64,
    pub publication_date: Option<i64>,
    /// Set for imported files; protects `publication_date` from mtime churn
    pub physical_media: bool,
    /// Entry listing, only for packages
    pub archive_entries: Option<Vec<String>>,
    /// Where an imported file was downloaded from
    pub source_url: Option<String>,
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ContentRecord {
    /// Fresh, live record with no optional metadata.
    pub fn new(
        id: impl Into<String>,
        drive: impl Into<String>,
        relative_path: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            id: id.into(),
            drive: drive.into(),
            relative_path: relative_path.into(),
            title: String::new(),
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            file_size: 0,
            last_refreshed: 0,
            publication_date: None,
            physical_media: false,
            archive_entries: None,
            source_url: None,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Record identifier cannot be empty".to_string());
        }

        if self.title.trim().is_empty() {
            return Err("Record title cannot be empty".to_string());
        }

        if !self.mime_type.contains('/') {
            return Err(format!("Invalid mime type '{}'", self.mime_type));
        }

        if self.file_size < 0 {
            return Err("File size cannot be negative".to_string());
        }

        Ok(())
    }

    /// Whether the record describes a package with a known entry listing.
    pub fn is_package(&self) -> bool {
        self.archive_entries.is_some()
    }
}

/// Fallback for files whose extension maps to no known type.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Selection for [`list_all`](crate::ContentRecordRepository::list_all).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Exact types (`application/epub+zip`) or wildcards (`text/*`, `*/*`).
    /// Empty means every type.
    pub mime_types: Vec<String>,
    /// Restrict to one drive tag
    pub drive: Option<String>,
    pub include_deleted: bool,
}

impl RecordFilter {
    /// Live records of any type.
    pub fn live() -> Self {
        Self::default()
    }

    pub fn of_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mime_types: types.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn on_drive(mut self, drive: impl Into<String>) -> Self {
        self.drive = Some(drive.into());
        self
    }

    pub fn including_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// In-memory equivalent of the SQL predicate.
    pub fn matches(&self, record: &ContentRecord) -> bool {
        if record.is_deleted && !self.include_deleted {
            return false;
        }
        if let Some(drive) = &self.drive {
            if record.drive != *drive {
                return false;
            }
        }
        self.mime_types.is_empty()
            || self
                .mime_types
                .iter()
                .any(|pattern| mime_matches(pattern, &record.mime_type))
    }
}

/// Match a mime type against an exact type or a `type/*` wildcard.
pub fn mime_matches(pattern: &str, mime_type: &str) -> bool {
    match pattern {
        "*" | "*/*" => true,
        _ => match pattern.strip_suffix("/*") {
            Some(prefix) => mime_type
                .split_once('/')
                .is_some_and(|(top, _)| top.eq_ignore_ascii_case(prefix)),
            None => pattern.eq_ignore_ascii_case(mime_type),
        },
    }
}
