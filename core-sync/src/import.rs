//! # Import Pipeline
//!
//! Copies externally selected files into a managed drive.
//!
//! ## Workflow
//!
//! 1. Pick a connected drive, cloud preferred over local
//! 2. Ask the destination resolvers for a directory (default: drive root)
//! 3. Target `<destination>/<source file name>`
//! 4. When the target is taken, compare contents: identical means no upload;
//!    different means the copy is renamed `<stem> (<HASH>).<ext>`, where
//!    `<HASH>` is the leading uppercase hex digits of the source's SHA-256.
//!    Different content already at the renamed path is overwritten.
//! 5. Upload, then re-scan the destination directory
//!
//! Packages (directories) compare and hash the concatenation of their files,
//! ordered by their `/`-joined path inside the package.

use crate::config::SyncConfig;
use crate::drive::{split_extension, Drive, RootRelativePath};
use crate::resolvers::ResolverRegistry;
use crate::{Result, SyncError};
use bridge_traits::storage::FileSystemAccess;
use bytes::{Bytes, BytesMut};
use core_runtime::logging::strip_path;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Directory below the cache root where downloads are staged.
pub const DOWNLOADS_DIRECTORY: &str = "downloads";

// ============================================================================
// Downloadable
// ============================================================================

/// A remote file the caller is about to download and import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloadable {
    pub url: String,
    pub name: String,
    /// Where the caller should write the downloaded bytes
    pub local_path: PathBuf,
}

impl Downloadable {
    /// Staging location for `name` under `<cache_dir>/downloads/`.
    ///
    /// `None` when the url is blank or the name sanitizes to nothing.
    pub fn stage(cache_dir: &Path, url: &str, name: &str) -> Option<Self> {
        if url.trim().is_empty() {
            return None;
        }
        let name = sanitize_file_name(name)?;
        Some(Self {
            url: url.trim().to_string(),
            local_path: cache_dir.join(DOWNLOADS_DIRECTORY).join(&name),
            name,
        })
    }
}

/// Make `name` safe as a single path segment.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

// ============================================================================
// Hashing and naming
// ============================================================================

/// Uppercase hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    format!("{:X}", Sha256::digest(data))
}

/// `report.txt` + `A1B2C3` → `report (A1B2C3).txt`
pub fn disambiguated_name(file_name: &str, hash: &str) -> String {
    match split_extension(file_name) {
        (stem, Some(ext)) => format!("{stem} ({hash}).{ext}"),
        (stem, None) => format!("{stem} ({hash})"),
    }
}

// ============================================================================
// Planning
// ============================================================================

/// Where an import lands and whether bytes must be copied.
#[derive(Debug, Clone)]
pub struct ImportPlan {
    pub drive: Drive,
    pub destination: RootRelativePath,
    pub target: RootRelativePath,
    /// False when identical content already sits at `target`
    pub upload: bool,
    /// Different content sits at `target` and is removed before upload
    pub replace: bool,
}

impl ImportPlan {
    pub fn is_deduplicated(&self) -> bool {
        !self.upload
    }
}

pub struct ImportPipeline {
    fs: Arc<dyn FileSystemAccess>,
    registry: ResolverRegistry,
    config: SyncConfig,
}

impl ImportPipeline {
    pub fn new(fs: Arc<dyn FileSystemAccess>, registry: ResolverRegistry, config: SyncConfig) -> Self {
        Self { fs, registry, config }
    }

    /// First connected cloud drive, else first connected local drive.
    pub fn pick_drive(drives: &[Drive]) -> Result<Drive> {
        drives
            .iter()
            .filter(|d| d.is_connected())
            .find(|d| d.kind().is_cloud())
            .or_else(|| drives.iter().find(|d| d.is_connected()))
            .cloned()
            .ok_or_else(|| SyncError::DriveUnavailable("no connected drive".to_string()))
    }

    /// Decide drive, target path and whether to upload.
    pub async fn plan(&self, source: &Path, drives: &[Drive]) -> Result<ImportPlan> {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SyncError::InvalidInput(format!("Import source {} has no file name", source.display()))
            })?;
        if !self.fs.exists(source).await? {
            return Err(SyncError::InvalidInput(format!(
                "Import source {} does not exist",
                strip_path(&source.to_string_lossy())
            )));
        }

        let drive = Self::pick_drive(drives)?;
        let destination = self.registry.resolve_destination(source);
        let candidate = destination.child(&file_name)?;

        if !drive.exists(&candidate).await? {
            return Ok(ImportPlan {
                drive,
                destination,
                target: candidate,
                upload: true,
                replace: false,
            });
        }

        let source_bytes = self.source_content(source).await?;
        if drive_content(&drive, &candidate).await? == source_bytes {
            debug!(target = %candidate, "Identical content already present");
            return Ok(ImportPlan {
                drive,
                destination,
                target: candidate,
                upload: false,
                replace: false,
            });
        }

        let hash = content_hash(&source_bytes);
        let short = &hash[..self.config.hash_length.min(hash.len())];
        let renamed = destination.child(&disambiguated_name(&file_name, short))?;

        let occupied = drive.exists(&renamed).await?;
        let identical = occupied && drive_content(&drive, &renamed).await? == source_bytes;
        Ok(ImportPlan {
            drive,
            destination,
            target: renamed,
            upload: !identical,
            replace: occupied && !identical,
        })
    }

    /// Copy `source` to the planned target. Packages are copied file by file.
    pub async fn upload(&self, plan: &ImportPlan, source: &Path) -> Result<()> {
        if !plan.upload {
            return Ok(());
        }
        if plan.replace {
            warn!(target = %plan.target, "Replacing different content at disambiguated name");
            plan.drive.remove(&plan.target).await?;
        }

        if self.fs.metadata(source).await?.is_directory {
            plan.drive.create_directory(&plan.target).await?;
            for (relative, file) in self.package_files(source).await? {
                let data = self.fs.read_file(&file).await?;
                plan.drive
                    .write(data, &plan.target.concat(&relative))
                    .await?;
            }
        } else {
            let data = self.fs.read_file(source).await?;
            plan.drive.write(data, &plan.target).await?;
        }

        info!(
            drive = %plan.drive.kind(),
            target = %plan.target,
            "Uploaded imported file"
        );
        Ok(())
    }

    async fn source_content(&self, source: &Path) -> Result<Bytes> {
        if !self.fs.metadata(source).await?.is_directory {
            return Ok(self.fs.read_file(source).await?);
        }

        let mut buffer = BytesMut::new();
        for (_, file) in self.package_files(source).await? {
            buffer.extend_from_slice(&self.fs.read_file(&file).await?);
        }
        Ok(buffer.freeze())
    }

    /// Files of the source package with their path inside it, in package order.
    async fn package_files(&self, source: &Path) -> Result<Vec<(RootRelativePath, PathBuf)>> {
        let mut files: Vec<_> = self
            .fs
            .list_files_recursive(source)
            .await?
            .into_iter()
            .filter_map(|file| Some((RootRelativePath::from_absolute(source, &file)?, file)))
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

/// Bytes at `path`, concatenating package contents in package order.
async fn drive_content(drive: &Drive, path: &RootRelativePath) -> Result<Bytes> {
    if !drive.is_directory(path).await? {
        return drive.read_bytes(path).await;
    }

    let prefix = format!("{}/", path.as_str());
    let mut files: Vec<(String, RootRelativePath)> = drive
        .list_files_recursive(path)
        .await?
        .into_iter()
        .filter_map(|file| Some((file.as_str().strip_prefix(&prefix)?.to_string(), file)))
        .collect();
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut buffer = BytesMut::new();
    for (_, file) in files {
        buffer.extend_from_slice(&drive.read_bytes(&file).await?);
    }
    Ok(buffer.freeze())
}
