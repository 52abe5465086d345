//! Storage and File System Abstractions
//!
//! Provides the raw directory/file primitives the sync engine walks, plus the
//! cloud container lookup used to locate the cloud-synced store.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// File metadata information
///
/// Timestamps are Unix milliseconds. For a symbolic link, size, times and
/// `is_directory` describe the target when it resolves and the link itself
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub created_at: Option<i64>,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
    pub is_symlink: bool,
}

/// File system access trait
///
/// Abstracts the platform's file primitives:
/// - Desktop: Direct filesystem access
/// - iOS: App container plus ubiquity container for cloud documents
/// - Android: App-specific storage, SAF-backed trees
///
/// Every path handed to this trait is absolute. Drive-relative addressing is
/// layered on top by `core-sync`.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn stage(fs: &dyn FileSystemAccess, data: &[u8]) -> Result<()> {
///     let cache_dir = fs.get_cache_directory().await?;
///     fs.write_file(&cache_dir.join("staged.epub"), data.to_vec().into()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Get the application's cache directory
    ///
    /// Suitable for staged downloads that the system may purge.
    async fn get_cache_directory(&self) -> Result<PathBuf>;

    /// Get the application's data directory
    ///
    /// Holds the metadata index and the device-local store.
    async fn get_data_directory(&self) -> Result<PathBuf>;

    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Create a directory and all parent directories if they don't exist
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Read entire file into memory
    async fn read_file(&self, path: &Path) -> Result<Bytes>;

    /// Write data to file (creates or overwrites, parents are created)
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;

    /// Delete a file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// List the direct children of a directory (absolute paths, any order)
    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Whether the platform presents this directory to users as a single file
    /// (macOS bundles, for instance).
    ///
    /// Platforms without such a notion keep the default.
    async fn is_file_package(&self, _path: &Path) -> Result<bool> {
        Ok(false)
    }

    /// Collect every regular file below `path`, sorted by path.
    ///
    /// Symbolic links are skipped, so the walk never leaves `path` or loops.
    async fn list_files_recursive(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut pending = vec![path.to_path_buf()];

        while let Some(dir) = pending.pop() {
            for entry in self.list_directory(&dir).await? {
                let metadata = self.metadata(&entry).await?;
                if metadata.is_symlink {
                    continue;
                }
                if metadata.is_directory {
                    pending.push(entry);
                } else {
                    files.push(entry);
                }
            }
        }

        files.sort();
        Ok(files)
    }
}

/// Resolves cloud container identifiers to a locally mirrored root.
///
/// - **iOS/macOS**: ubiquity container URL for the identifier
/// - **Desktop**: a folder kept in sync by a desktop client
///
/// `Ok(None)` means the container is not reachable right now (signed out,
/// not yet provisioned); the cloud store is then treated as disconnected.
#[async_trait]
pub trait CloudContainerProvider: Send + Sync {
    async fn container_root(&self, container_id: &str) -> Result<Option<PathBuf>>;
}
