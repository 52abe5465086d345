//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::{FileMetadata, FileSystemAccess},
};
use bytes::Bytes;
use core_async::time::system_time_to_millis;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

const APP_DIR_NAME: &str = "reader-core";

/// Directory extensions Finder shows as single documents.
const MACOS_PACKAGE_EXTENSIONS: &[&str] = &[
    "app", "bundle", "framework", "pages", "numbers", "key", "rtfd", "textbundle",
];

/// Tokio-based file system implementation
///
/// Provides async file I/O operations using:
/// - `tokio::fs` for async operations
/// - Platform-specific app directories via `dirs`
pub struct TokioFileSystem {
    cache_dir: PathBuf,
    data_dir: PathBuf,
    package_extensions: Vec<String>,
}

impl TokioFileSystem {
    /// Create a new file system accessor with default directories
    pub fn new() -> Self {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_DIR_NAME);

        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".local")
                    .join("share")
            })
            .join(APP_DIR_NAME);

        Self::with_directories(cache_dir, data_dir)
    }

    /// Create a new file system accessor with custom directories
    pub fn with_directories(cache_dir: PathBuf, data_dir: PathBuf) -> Self {
        let package_extensions = if cfg!(target_os = "macos") {
            MACOS_PACKAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect()
        } else {
            Vec::new()
        };

        Self {
            cache_dir,
            data_dir,
            package_extensions,
        }
    }

    /// Override which directory extensions count as platform file packages.
    pub fn with_package_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.package_extensions = extensions
            .into_iter()
            .map(|e| e.into().to_ascii_lowercase())
            .collect();
        self
    }

    /// Convert std::io::Error to BridgeError
    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        if e.kind() == std::io::ErrorKind::NotFound {
            BridgeError::NotFound(path.to_path_buf())
        } else {
            BridgeError::Io(e)
        }
    }

    async fn ensure_dir(&self, dir: &Path) -> Result<()> {
        if !fs::try_exists(dir)
            .await
            .map_err(|e| Self::map_io_error(dir, e))?
        {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| Self::map_io_error(dir, e))?;
            debug!(path = ?dir, "Created application directory");
        }
        Ok(())
    }
}

impl Default for TokioFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn get_cache_directory(&self) -> Result<PathBuf> {
        self.ensure_dir(&self.cache_dir).await?;
        Ok(self.cache_dir.clone())
    }

    async fn get_data_directory(&self) -> Result<PathBuf> {
        self.ensure_dir(&self.data_dir).await?;
        Ok(self.data_dir.clone())
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        fs::try_exists(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let link = fs::symlink_metadata(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        let is_symlink = link.file_type().is_symlink();
        // Dangling links report on the link itself.
        let metadata = if is_symlink {
            fs::metadata(path).await.unwrap_or(link)
        } else {
            link
        };

        Ok(FileMetadata {
            size: metadata.len(),
            created_at: metadata.created().ok().map(system_time_to_millis),
            modified_at: metadata.modified().ok().map(system_time_to_millis),
            is_directory: metadata.is_dir(),
            is_symlink,
        })
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Created directory");
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> Result<Bytes> {
        let data = fs::read(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, size = data.len(), "Read file");
        Ok(Bytes::from(data))
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent).await?;
        }

        fs::write(path, data.as_ref())
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Deleted file");
        Ok(())
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;
        debug!(path = ?path, "Deleted directory");
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut read_dir = fs::read_dir(path)
            .await
            .map_err(|e| Self::map_io_error(path, e))?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Self::map_io_error(path, e))?
        {
            entries.push(entry.path());
        }

        debug!(path = ?path, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn is_file_package(&self, path: &Path) -> Result<bool> {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Ok(false);
        };
        let ext = ext.to_ascii_lowercase();
        if !self.package_extensions.iter().any(|p| *p == ext) {
            return Ok(false);
        }
        Ok(self.metadata(path).await?.is_directory)
    }
}
