//! # Core Configuration Module
//!
//! Provides configuration management for the content sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding the paths, settings and host bridges the core needs. The builder
//! fails fast when a required bridge is missing.
//!
//! ## Required Dependencies
//!
//! - `FileSystemAccess` - Raw file primitives behind every Drive
//! - `ArchiveReader` - Entry listing for packaged content
//!
//! ## Optional Dependencies
//!
//! - `CloudContainerProvider` - Required only when a cloud container is set
//! - `LifecycleObserver` - App suspension notifications
//! - `Clock` - Defaults to the system clock
//!
//! When the `desktop-shims` feature is enabled, `TokioFileSystem` and
//! `ZipArchiveReader` are injected automatically if not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/data/reader/index.db")
//!     .local_root("/data/reader/Documents")
//!     .cache_dir("/cache/reader")
//!     .cloud_container_id("iCloud.com.example.reader")
//!     .cloud_containers(Arc::new(DirectoryCloudContainers::new("/Users/jo/Library/Mobile Documents")))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing local root
//! let config = CoreConfig::builder()
//!     .database_path("/data/index.db")
//!     .build()
//!     .expect("local root is required");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    ArchiveReader, Clock, CloudContainerProvider, FileSystemAccess, LifecycleObserver, SystemClock,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Core configuration for the content sync core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite metadata index
    pub database_path: PathBuf,

    /// Root of the device-local Drive
    pub local_root: PathBuf,

    /// Directory for staged downloads
    pub cache_dir: PathBuf,

    /// Cloud container backing the cloud Drive, if any
    pub cloud_container_id: Option<String>,

    /// File system access abstraction
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Archive utility for package entry listings
    pub archive_reader: Arc<dyn ArchiveReader>,

    /// Resolves cloud container identifiers to mirrored roots
    pub cloud_containers: Option<Arc<dyn CloudContainerProvider>>,

    /// App lifecycle observer (optional)
    pub lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,

    /// Time source for record bookkeeping
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("local_root", &self.local_root)
            .field("cache_dir", &self.cache_dir)
            .field("cloud_container_id", &self.cloud_container_id)
            .field(
                "cloud_containers",
                &self
                    .cloud_containers
                    .as_ref()
                    .map(|_| "CloudContainerProvider { ... }"),
            )
            .field(
                "lifecycle_observer",
                &self
                    .lifecycle_observer
                    .as_ref()
                    .map(|_| "LifecycleObserver { ... }"),
            )
            .finish_non_exhaustive()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validate paths and the cloud container setup.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.local_root.as_os_str().is_empty() {
            return Err(Error::Config("Local root cannot be empty".to_string()));
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(Error::Config("Cache directory cannot be empty".to_string()));
        }

        if let Some(id) = &self.cloud_container_id {
            if id.trim().is_empty() {
                return Err(Error::Config(
                    "Cloud container identifier cannot be blank".to_string(),
                ));
            }
            if self.cloud_containers.is_none() {
                return Err(Error::CapabilityMissing {
                    capability: "CloudContainerProvider".to_string(),
                    message: "A cloud container identifier was configured but no \
                              CloudContainerProvider was injected to resolve it."
                        .to_string(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system(cache_dir: &std::path::Path, database_path: &std::path::Path) -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let data_dir = database_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| cache_dir.to_path_buf());
    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::with_directories(
        cache_dir.to_path_buf(),
        data_dir,
    ));
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system(_cache_dir: &std::path::Path, _database_path: &std::path::Path) -> Result<Arc<dyn FileSystemAccess>> {
    Err(Error::CapabilityMissing {
        capability: "FileSystemAccess".to_string(),
        message: "FileSystemAccess implementation is required to back the Drives. \
                  Desktop: ensure the 'desktop-shims' feature is enabled to use TokioFileSystem. \
                  Mobile: inject the platform's sandboxed file access."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_archive_reader() -> Result<Arc<dyn ArchiveReader>> {
    let reader: Arc<dyn ArchiveReader> = Arc::new(bridge_desktop::ZipArchiveReader::new());
    Ok(reader)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_archive_reader() -> Result<Arc<dyn ArchiveReader>> {
    Err(Error::CapabilityMissing {
        capability: "ArchiveReader".to_string(),
        message: "ArchiveReader implementation is required for package entry listings. \
                  Desktop: ensure the 'desktop-shims' feature is enabled to use ZipArchiveReader."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    local_root: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    cloud_container_id: Option<String>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    archive_reader: Option<Arc<dyn ArchiveReader>>,
    cloud_containers: Option<Arc<dyn CloudContainerProvider>>,
    lifecycle_observer: Option<Arc<dyn LifecycleObserver>>,
    clock: Option<Arc<dyn Clock>>,
}

impl CoreConfigBuilder {
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    pub fn local_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.local_root = Some(path.into());
        self
    }

    /// Defaults to `<database dir>/cache` when unset.
    pub fn cache_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cache_dir = Some(path.into());
        self
    }

    pub fn cloud_container_id(mut self, id: impl Into<String>) -> Self {
        self.cloud_container_id = Some(id.into());
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn archive_reader(mut self, reader: Arc<dyn ArchiveReader>) -> Self {
        self.archive_reader = Some(reader);
        self
    }

    pub fn cloud_containers(mut self, provider: Arc<dyn CloudContainerProvider>) -> Self {
        self.cloud_containers = Some(provider);
        self
    }

    pub fn lifecycle_observer(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.lifecycle_observer = Some(observer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when a required path is missing or invalid
    /// - [`Error::CapabilityMissing`] when a required bridge is absent and no
    ///   desktop default is available
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let local_root = self.local_root.ok_or_else(|| {
            Error::Config("Local root is required. Use .local_root() to set it.".to_string())
        })?;

        let cache_dir = match self.cache_dir {
            Some(dir) => dir,
            None => database_path
                .parent()
                .map(|p| p.join("cache"))
                .ok_or_else(|| {
                    Error::Config(
                        "Cache directory is required when the database path has no parent."
                            .to_string(),
                    )
                })?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system(&cache_dir, &database_path)?,
        };

        let archive_reader = match self.archive_reader {
            Some(reader) => reader,
            None => provide_default_archive_reader()?,
        };

        let config = CoreConfig {
            database_path,
            local_root,
            cache_dir,
            cloud_container_id: self.cloud_container_id,
            file_system,
            archive_reader,
            cloud_containers: self.cloud_containers,
            lifecycle_observer: self.lifecycle_observer,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;

        Ok(config)
    }
}
