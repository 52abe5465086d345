//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `FileSystemAccess` using `tokio::fs` ([`TokioFileSystem`])
//! - `ArchiveReader` using the `zip` crate ([`ZipArchiveReader`])
//! - `CloudContainerProvider` over locally mirrored folders ([`DirectoryCloudContainers`])
//! - `LifecycleObserver` driven by the host shell ([`DesktopLifecycleObserver`])
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{TokioFileSystem, ZipArchiveReader};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .file_system(Arc::new(TokioFileSystem::new()))
//!     .archive_reader(Arc::new(ZipArchiveReader::new()))
//!     .build()?;
//! ```

mod archive;
mod cloud;
mod filesystem;
mod lifecycle;

pub use archive::ZipArchiveReader;
pub use cloud::DirectoryCloudContainers;
pub use filesystem::TokioFileSystem;
pub use lifecycle::DesktopLifecycleObserver;
