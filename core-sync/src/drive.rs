//! # Drives
//!
//! A [`Drive`] is one file store addressed by paths relative to its root.
//!
//! ## Overview
//!
//! - [`DriveKind`]: device-local store or cloud-synced container
//! - [`RootRelativePath`]: normalized, `/`-separated path below a root
//! - [`Drive`]: listing, existence checks, byte read/write, directory
//!   creation and removal over a [`FileSystemAccess`] bridge
//!
//! Drives are immutable values. Reconfiguration builds a new set and swaps it
//! in; a disconnected drive fails every operation with
//! [`SyncError::DriveUnavailable`].

use crate::{Result, SyncError};
use bridge_traits::storage::{CloudContainerProvider, FileMetadata, FileSystemAccess};
use bytes::Bytes;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::warn;

// ============================================================================
// Drive Kind
// ============================================================================

/// Identifier prefix for a drive kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DriveTag {
    Local,
    Cloud,
}

impl DriveTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            DriveTag::Local => "local",
            DriveTag::Cloud => "icloud",
        }
    }
}

impl FromStr for DriveTag {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(DriveTag::Local),
            "icloud" => Ok(DriveTag::Cloud),
            other => Err(SyncError::InvalidIdentifier(format!(
                "Unknown drive prefix '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DriveTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What backs a drive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DriveKind {
    Local,
    Cloud { container_id: String },
}

impl DriveKind {
    pub fn tag(&self) -> DriveTag {
        match self {
            DriveKind::Local => DriveTag::Local,
            DriveKind::Cloud { .. } => DriveTag::Cloud,
        }
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self, DriveKind::Cloud { .. })
    }
}

impl fmt::Display for DriveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriveKind::Local => f.write_str("local"),
            DriveKind::Cloud { container_id } => write!(f, "icloud({container_id})"),
        }
    }
}

// ============================================================================
// Root-Relative Paths
// ============================================================================

/// Path relative to a drive root.
///
/// Stored as `/`-joined segments without leading or trailing separators; the
/// empty path is the root itself. `..` segments are rejected, so a relative
/// path can never escape its root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootRelativePath(String);

impl RootRelativePath {
    /// Normalize caller-supplied `path`, accepting either separator.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInput`] when a segment is `..`.
    pub fn new(path: impl AsRef<str>) -> Result<Self> {
        Self::from_segments(path.as_ref().split(['/', '\\']))
    }

    /// Rebuild a path stored in its `/`-joined form.
    ///
    /// Other characters, `\` included, stay part of their segment.
    pub fn parse(stored: &str) -> Result<Self> {
        Self::from_segments(stored.split('/'))
    }

    /// Build from individual segments, skipping empty ones and `.`.
    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        for segment in segments {
            let segment = segment.as_ref();
            if segment.is_empty() || segment == "." {
                continue;
            }
            check_segment(segment)?;
            if !joined.is_empty() {
                joined.push('/');
            }
            joined.push_str(segment);
        }
        Ok(Self(joined))
    }

    pub fn root() -> Self {
        Self::default()
    }

    /// Relative path of `absolute` below `root`, if it lies inside it.
    pub fn from_absolute(root: &Path, absolute: &Path) -> Option<Self> {
        let relative = absolute.strip_prefix(root).ok()?;
        Self::from_segments(
            relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned()),
        )
        .ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Append `name` as exactly one segment.
    ///
    /// # Errors
    ///
    /// [`SyncError::InvalidInput`] when `name` is empty, `.`, `..` or
    /// contains `/`.
    pub fn child(&self, name: &str) -> Result<Self> {
        if name.is_empty() || name == "." {
            return Err(SyncError::InvalidInput(format!(
                "'{name}' is not a file name"
            )));
        }
        check_segment(name)?;
        Ok(self.concat(&Self(name.to_string())))
    }

    /// `other` resolved below `self`.
    pub fn concat(&self, other: &RootRelativePath) -> Self {
        match (self.is_root(), other.is_root()) {
            (true, _) => other.clone(),
            (_, true) => self.clone(),
            _ => Self(format!("{}/{}", self.0, other.0)),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rsplit_once('/') {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::root(),
        })
    }

    /// Extension of the last segment, without the dot.
    pub fn extension(&self) -> Option<&str> {
        split_extension(self.file_name()?).1
    }

    /// Last segment without its extension.
    pub fn file_stem(&self) -> Option<&str> {
        Some(split_extension(self.file_name()?).0)
    }

    /// Resolve as a file below `root`. The root itself is never a file.
    pub fn to_file_path(&self, root: &Path) -> Option<PathBuf> {
        if self.is_root() {
            None
        } else {
            Some(self.to_directory_path(root))
        }
    }

    /// Resolve as a directory below `root`.
    pub fn to_directory_path(&self, root: &Path) -> PathBuf {
        self.segments().fold(root.to_path_buf(), |acc, s| acc.join(s))
    }
}

impl fmt::Display for RootRelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

fn check_segment(segment: &str) -> Result<()> {
    if segment == ".." || segment.contains('/') {
        return Err(SyncError::InvalidInput(format!(
            "Path segment '{segment}' escapes its drive root"
        )));
    }
    Ok(())
}

/// Split `name` into stem and extension. Leading dots belong to the stem.
pub(crate) fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(0) | None => (name, None),
        Some(idx) if idx + 1 == name.len() => (name, None),
        Some(idx) => (&name[..idx], Some(&name[idx + 1..])),
    }
}

// ============================================================================
// Listing
// ============================================================================

/// Options for [`Drive::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Include entries whose name starts with `.`
    pub include_hidden: bool,
}

/// One child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveEntry {
    pub path: RootRelativePath,
    pub is_directory: bool,
    pub is_symlink: bool,
    pub size: u64,
    /// Modification time, Unix milliseconds (0 when the platform has none)
    pub modified_at: i64,
}

impl DriveEntry {
    pub fn name(&self) -> &str {
        self.path.file_name().unwrap_or_default()
    }
}

// ============================================================================
// Drive
// ============================================================================

/// One root-relative file store.
#[derive(Clone)]
pub struct Drive {
    kind: DriveKind,
    root: PathBuf,
    connected: bool,
    fs: Arc<dyn FileSystemAccess>,
}

impl fmt::Debug for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Drive")
            .field("kind", &self.kind)
            .field("root", &self.root)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl Drive {
    /// Device-local drive, always connected.
    pub fn local(root: impl Into<PathBuf>, fs: Arc<dyn FileSystemAccess>) -> Self {
        Self {
            kind: DriveKind::Local,
            root: root.into(),
            connected: true,
            fs,
        }
    }

    /// Cloud drive; connected only when the container resolved to a root.
    pub fn cloud(
        container_id: impl Into<String>,
        root: Option<PathBuf>,
        fs: Arc<dyn FileSystemAccess>,
    ) -> Self {
        Self {
            kind: DriveKind::Cloud {
                container_id: container_id.into(),
            },
            connected: root.is_some(),
            root: root.unwrap_or_default(),
            fs,
        }
    }

    /// Look the container up and build the matching cloud drive.
    ///
    /// Lookup failures leave the drive disconnected rather than failing.
    pub async fn resolve_cloud(
        container_id: &str,
        provider: &dyn CloudContainerProvider,
        fs: Arc<dyn FileSystemAccess>,
    ) -> Self {
        let root = match provider.container_root(container_id).await {
            Ok(root) => root,
            Err(e) => {
                warn!(container = %container_id, error = %e, "Cloud container lookup failed");
                None
            }
        };
        Self::cloud(container_id, root, fs)
    }

    pub fn kind(&self) -> &DriveKind {
        &self.kind
    }

    pub fn tag(&self) -> DriveTag {
        self.kind.tag()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn ensure_connected(&self) -> Result<&Path> {
        if self.connected {
            Ok(&self.root)
        } else {
            Err(SyncError::DriveUnavailable(self.kind.to_string()))
        }
    }

    fn file_path(&self, path: &RootRelativePath) -> Result<PathBuf> {
        let root = self.ensure_connected()?;
        path.to_file_path(root)
            .ok_or_else(|| SyncError::InvalidInput("The drive root is not a file".to_string()))
    }

    /// Absolute location of `path`, for identifier resolvers and logging.
    pub fn absolute_path(&self, path: &RootRelativePath) -> PathBuf {
        path.to_directory_path(&self.root)
    }

    pub async fn exists(&self, path: &RootRelativePath) -> Result<bool> {
        let root = self.ensure_connected()?;
        Ok(self.fs.exists(&path.to_directory_path(root)).await?)
    }

    pub async fn is_directory(&self, path: &RootRelativePath) -> Result<bool> {
        let root = self.ensure_connected()?;
        let absolute = path.to_directory_path(root);
        if !self.fs.exists(&absolute).await? {
            return Ok(false);
        }
        Ok(self.fs.metadata(&absolute).await?.is_directory)
    }

    pub async fn metadata(&self, path: &RootRelativePath) -> Result<FileMetadata> {
        let root = self.ensure_connected()?;
        Ok(self.fs.metadata(&path.to_directory_path(root)).await?)
    }

    /// Whether the platform presents this directory as a single file.
    pub async fn is_file_package(&self, path: &RootRelativePath) -> Result<bool> {
        let root = self.ensure_connected()?;
        Ok(self.fs.is_file_package(&path.to_directory_path(root)).await?)
    }

    /// Direct children of `path`, sorted by path.
    pub async fn list(
        &self,
        path: &RootRelativePath,
        options: &ListOptions,
    ) -> Result<Vec<DriveEntry>> {
        let root = self.ensure_connected()?;
        let children = self.fs.list_directory(&path.to_directory_path(root)).await?;

        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            let Some(name) = child.file_name().map(|n| n.to_string_lossy().into_owned()) else {
                continue;
            };
            if !options.include_hidden && name.starts_with('.') {
                continue;
            }
            let metadata = self.fs.metadata(&child).await?;
            entries.push(DriveEntry {
                path: path.child(&name)?,
                is_directory: metadata.is_directory,
                is_symlink: metadata.is_symlink,
                size: metadata.size,
                modified_at: metadata.modified_at.unwrap_or(0),
            });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Every regular file below `path`, sorted, relative to the drive root.
    pub async fn list_files_recursive(
        &self,
        path: &RootRelativePath,
    ) -> Result<Vec<RootRelativePath>> {
        let root = self.ensure_connected()?;
        let files = self
            .fs
            .list_files_recursive(&path.to_directory_path(root))
            .await?;
        let mut relative: Vec<_> = files
            .iter()
            .filter_map(|f| RootRelativePath::from_absolute(root, f))
            .collect();
        relative.sort();
        Ok(relative)
    }

    pub async fn read_bytes(&self, path: &RootRelativePath) -> Result<Bytes> {
        let absolute = self.file_path(path)?;
        Ok(self.fs.read_file(&absolute).await?)
    }

    /// Write `bytes` to `path`, creating parent directories.
    pub async fn write(&self, bytes: Bytes, path: &RootRelativePath) -> Result<()> {
        let absolute = self.file_path(path)?;
        if let Some(parent) = absolute.parent() {
            self.fs.create_dir_all(parent).await?;
        }
        Ok(self.fs.write_file(&absolute, bytes).await?)
    }

    pub async fn create_directory(&self, path: &RootRelativePath) -> Result<()> {
        let root = self.ensure_connected()?;
        Ok(self.fs.create_dir_all(&path.to_directory_path(root)).await?)
    }

    /// Remove a file or a whole directory tree.
    pub async fn remove(&self, path: &RootRelativePath) -> Result<()> {
        let absolute = self.file_path(path)?;
        if self.fs.metadata(&absolute).await?.is_directory {
            self.fs.delete_dir_all(&absolute).await?;
        } else {
            self.fs.delete_file(&absolute).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockContainers, MockFs};

    fn meta(is_directory: bool, modified_at: i64) -> FileMetadata {
        FileMetadata {
            size: 3,
            created_at: None,
            modified_at: Some(modified_at),
            is_directory,
            is_symlink: false,
        }
    }

    #[test]
    fn test_relative_path_normalization() {
        let path = RootRelativePath::new("/Books\\Fiction//./novel.epub/").unwrap();
        assert_eq!(path.as_str(), "Books/Fiction/novel.epub");
        assert_eq!(path.file_name(), Some("novel.epub"));
        assert_eq!(path.file_stem(), Some("novel"));
        assert_eq!(path.extension(), Some("epub"));
        assert_eq!(path.parent().unwrap().as_str(), "Books/Fiction");
        assert!(RootRelativePath::new("a/../b").is_err());
        assert!(RootRelativePath::new("").unwrap().is_root());
        assert!(RootRelativePath::root().parent().is_none());
    }

    #[test]
    fn test_child_and_parse_keep_backslash_in_segment() {
        let dir = RootRelativePath::new("Inbox").unwrap();
        let child = dir.child("a\\b.zip").unwrap();
        assert_eq!(child.as_str(), "Inbox/a\\b.zip");
        assert_eq!(child.file_name(), Some("a\\b.zip"));
        assert_eq!(RootRelativePath::parse(child.as_str()).unwrap(), child);
        assert_eq!(
            child.to_file_path(Path::new("/root")),
            Some(Path::new("/root/Inbox").join("a\\b.zip"))
        );

        assert!(dir.child("..").is_err());
        assert!(dir.child("a/b").is_err());
        assert!(dir.child("").is_err());
        assert!(RootRelativePath::parse("a/../b").is_err());
    }

    #[test]
    fn test_concat() {
        let root = RootRelativePath::root();
        let pkg = RootRelativePath::new("Novel.epub").unwrap();
        let inner = RootRelativePath::new("OEBPS/ch1.xhtml").unwrap();
        assert_eq!(pkg.concat(&inner).as_str(), "Novel.epub/OEBPS/ch1.xhtml");
        assert_eq!(root.concat(&inner), inner);
        assert_eq!(pkg.concat(&root), pkg);
    }

    #[test]
    fn test_extension_edge_cases() {
        assert_eq!(split_extension(".hidden"), (".hidden", None));
        assert_eq!(split_extension("trailing."), ("trailing.", None));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", Some("gz")));
        assert_eq!(split_extension("README"), ("README", None));
    }

    #[test]
    fn test_file_versus_directory_resolution() {
        let root = Path::new("/data/local");
        let file = RootRelativePath::new("a/b.txt").unwrap();
        assert_eq!(file.to_file_path(root), Some(PathBuf::from("/data/local/a/b.txt")));
        assert_eq!(RootRelativePath::root().to_file_path(root), None);
        assert_eq!(RootRelativePath::root().to_directory_path(root), root);
        assert_eq!(
            RootRelativePath::from_absolute(root, Path::new("/data/local/a/b.txt")),
            Some(file)
        );
        assert_eq!(RootRelativePath::from_absolute(root, Path::new("/elsewhere")), None);
    }

    #[test]
    fn test_drive_tag_parsing() {
        assert_eq!("local".parse::<DriveTag>().unwrap(), DriveTag::Local);
        assert_eq!("icloud".parse::<DriveTag>().unwrap(), DriveTag::Cloud);
        assert!(matches!(
            "dropbox".parse::<DriveTag>(),
            Err(SyncError::InvalidIdentifier(_))
        ));
    }

    #[core_async::test]
    async fn test_disconnected_drive_is_unavailable() {
        let drive = Drive::cloud("iCloud.reader", None, Arc::new(MockFs::new()));
        let path = RootRelativePath::new("a.txt").unwrap();

        assert!(!drive.is_connected());
        assert!(drive.exists(&path).await.unwrap_err().is_drive_unavailable());
        assert!(drive.read_bytes(&path).await.unwrap_err().is_drive_unavailable());
        assert!(drive
            .write(Bytes::from_static(b"x"), &path)
            .await
            .unwrap_err()
            .is_drive_unavailable());
        assert!(drive
            .list(&RootRelativePath::root(), &ListOptions::default())
            .await
            .unwrap_err()
            .is_drive_unavailable());
        assert!(drive.remove(&path).await.unwrap_err().is_drive_unavailable());
    }

    #[core_async::test]
    async fn test_list_sorts_and_skips_hidden() {
        let mut fs = MockFs::new();
        fs.expect_list_directory().returning(|_| {
            Ok(vec![
                PathBuf::from("/root/b.txt"),
                PathBuf::from("/root/.DS_Store"),
                PathBuf::from("/root/a"),
            ])
        });
        fs.expect_metadata()
            .returning(|p| Ok(meta(p.extension().is_none(), 42)));

        let drive = Drive::local("/root", Arc::new(fs));
        let entries = drive
            .list(&RootRelativePath::root(), &ListOptions::default())
            .await
            .unwrap();

        let names: Vec<_> = entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a", "b.txt"]);
        assert_eq!(entries[0].path.as_str(), "a");
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].modified_at, 42);
    }

    #[core_async::test]
    async fn test_list_keeps_backslash_names_whole() {
        let mut fs = MockFs::new();
        fs.expect_list_directory()
            .returning(|_| Ok(vec![Path::new("/root/Inbox").join("a\\b.zip")]));
        fs.expect_metadata().returning(|_| Ok(meta(false, 1)));

        let drive = Drive::local("/root", Arc::new(fs));
        let entries = drive
            .list(&RootRelativePath::new("Inbox").unwrap(), &ListOptions::default())
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path.as_str(), "Inbox/a\\b.zip");
        assert_eq!(entries[0].path.segments().count(), 2);
    }

    #[core_async::test]
    async fn test_write_creates_parent_directories() {
        let mut fs = MockFs::new();
        fs.expect_create_dir_all()
            .withf(|p| p == Path::new("/root/Inbox"))
            .times(1)
            .returning(|_| Ok(()));
        fs.expect_write_file()
            .withf(|p, data| p == Path::new("/root/Inbox/a.txt") && &data[..] == b"hi")
            .times(1)
            .returning(|_, _| Ok(()));

        let drive = Drive::local("/root", Arc::new(fs));
        drive
            .write(Bytes::from_static(b"hi"), &RootRelativePath::new("Inbox/a.txt").unwrap())
            .await
            .unwrap();
    }

    #[core_async::test]
    async fn test_root_is_not_a_file() {
        let drive = Drive::local("/root", Arc::new(MockFs::new()));
        let err = drive.read_bytes(&RootRelativePath::root()).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidInput(_)));
    }

    #[core_async::test]
    async fn test_resolve_cloud_drive() {
        let mut containers = MockContainers::new();
        containers
            .expect_container_root()
            .returning(|id| Ok((id == "iCloud.reader").then(|| PathBuf::from("/cloud"))));

        let fs: Arc<dyn FileSystemAccess> = Arc::new(MockFs::new());
        let connected = Drive::resolve_cloud("iCloud.reader", &containers, fs.clone()).await;
        assert!(connected.is_connected());
        assert_eq!(connected.root(), Path::new("/cloud"));
        assert_eq!(connected.tag(), DriveTag::Cloud);

        let missing = Drive::resolve_cloud("iCloud.other", &containers, fs).await;
        assert!(!missing.is_connected());
    }
}
