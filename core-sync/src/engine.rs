//! # Synchronization Engine
//!
//! Walks drives and reconciles what it finds with the metadata index.
//!
//! ## Workflow
//!
//! For every connected drive, starting at its root:
//! 1. List a directory, skipping reserved names and symbolic links
//! 2. Descend into plain directories; opaque packages and files become leaves
//! 3. Build a record per leaf (title, mime type, archive listing) unless the
//!    file is unchanged since it was last indexed
//! 4. Write the directory's leaves in one transaction
//!
//! Once every drive has been walked, live records on the covered drives that
//! were not discovered are soft-deleted.
//!
//! The cancellation token is checked before every listing, lookup and write.
//! A cancelled pass stops with [`SyncError::Cancelled`] and never reaches
//! orphan detection, so already committed batches are the only trace it leaves.

use crate::addressing::identifier_for;
use crate::classify::EntryKind;
use crate::config::SyncConfig;
use crate::drive::{Drive, RootRelativePath};
use crate::resolvers::ResolverRegistry;
use crate::{Result, SyncError};
use bridge_traits::archive::ArchiveReader;
use bridge_traits::time::Clock;
use core_async::sync::CancellationToken;
use core_library::models::{ContentRecord, DEFAULT_MIME_TYPE};
use core_library::ContentRecordRepository;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    pub added: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub orphaned: u64,
    /// Identifiers created or rewritten by this pass, in write order
    pub touched: Vec<String>,
    /// Tags of drives walked to completion
    pub covered: Vec<String>,
    /// Tags of drives skipped as unavailable
    pub skipped: Vec<String>,
}

#[derive(Default)]
struct Pass {
    summary: RefreshSummary,
    discovered: HashSet<String>,
    written: HashSet<String>,
    reported: HashSet<String>,
}

struct Leaf {
    path: RootRelativePath,
    kind: EntryKind,
    size: u64,
    modified_at: i64,
}

pub(crate) fn ensure_active(token: &CancellationToken) -> Result<()> {
    if token.is_cancelled() {
        Err(SyncError::Cancelled)
    } else {
        Ok(())
    }
}

pub struct SyncEngine {
    repository: Arc<dyn ContentRecordRepository>,
    archive_reader: Arc<dyn ArchiveReader>,
    registry: ResolverRegistry,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl SyncEngine {
    pub fn new(
        repository: Arc<dyn ContentRecordRepository>,
        archive_reader: Arc<dyn ArchiveReader>,
        registry: ResolverRegistry,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            repository,
            archive_reader,
            registry,
            config,
            clock,
            events,
        }
    }

    pub fn repository(&self) -> &Arc<dyn ContentRecordRepository> {
        &self.repository
    }

    pub fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Walk every drive, then soft-delete what was not found.
    ///
    /// Unavailable drives are skipped and keep their records.
    #[instrument(skip(self, drives, token), fields(drives = drives.len()))]
    pub async fn refresh_all(
        &self,
        drives: &[Drive],
        token: &CancellationToken,
    ) -> Result<RefreshSummary> {
        let mut pass = Pass::default();

        for drive in drives {
            ensure_active(token)?;
            let tag = drive.tag().to_string();

            if !drive.is_connected() || !drive.exists(&RootRelativePath::root()).await? {
                warn!(drive = %drive.kind(), "Skipping unavailable drive");
                pass.summary.skipped.push(tag);
                continue;
            }

            self.walk(drive, &RootRelativePath::root(), token, &mut pass)
                .await?;
            pass.summary.covered.push(tag);
        }

        ensure_active(token)?;
        self.detect_orphans(&mut pass).await?;

        self.registry.run_processors(&pass.summary.touched).await;

        info!(
            added = pass.summary.added,
            updated = pass.summary.updated,
            unchanged = pass.summary.unchanged,
            orphaned = pass.summary.orphaned,
            "Full refresh finished"
        );
        Ok(pass.summary)
    }

    /// Re-scan one file, package or subtree without orphan detection.
    #[instrument(skip(self, drive, path, token), fields(drive = %drive.kind(), path = %path))]
    pub async fn refresh_path(
        &self,
        drive: &Drive,
        path: &RootRelativePath,
        token: &CancellationToken,
    ) -> Result<RefreshSummary> {
        ensure_active(token)?;
        let mut pass = Pass::default();

        if path.is_root() {
            self.walk(drive, path, token, &mut pass).await?;
        } else if drive.exists(path).await? {
            let name = path.file_name().unwrap_or_default();
            if self.config.is_ignored(name) {
                debug!("Scoped refresh target is reserved, nothing to index");
                return Ok(pass.summary);
            }

            let metadata = drive.metadata(path).await?;
            if metadata.is_symlink {
                debug!("Scoped refresh target is a symbolic link, nothing to index");
                return Ok(pass.summary);
            }
            let kind = self.resolve_kind(drive, path, name, metadata.is_directory).await?;
            if kind.is_leaf() {
                let leaf = Leaf {
                    path: path.clone(),
                    kind,
                    size: metadata.size,
                    modified_at: metadata.modified_at.unwrap_or(0),
                };
                self.apply_leaves(drive, vec![leaf], token, &mut pass)
                    .await?;
            } else {
                self.walk(drive, path, token, &mut pass).await?;
            }
        }

        pass.summary.covered.push(drive.tag().to_string());
        self.registry.run_processors(&pass.summary.touched).await;
        Ok(pass.summary)
    }

    async fn resolve_kind(
        &self,
        drive: &Drive,
        path: &RootRelativePath,
        name: &str,
        is_directory: bool,
    ) -> Result<EntryKind> {
        let kind = self.config.classify(name, is_directory);
        if kind == EntryKind::Directory && drive.is_file_package(path).await? {
            return Ok(EntryKind::OpaquePackage);
        }
        Ok(kind)
    }

    async fn walk(
        &self,
        drive: &Drive,
        start: &RootRelativePath,
        token: &CancellationToken,
        pass: &mut Pass,
    ) -> Result<()> {
        let mut pending = vec![start.clone()];

        while let Some(directory) = pending.pop() {
            ensure_active(token)?;
            let entries = drive.list(&directory, &self.config.list_options).await?;

            let mut leaves = Vec::new();
            for entry in entries {
                let name = entry.name();
                if self.config.is_ignored(name) {
                    continue;
                }
                if entry.is_symlink {
                    debug!(path = %entry.path, "Skipping symbolic link");
                    continue;
                }

                ensure_active(token)?;
                let kind = self
                    .resolve_kind(drive, &entry.path, name, entry.is_directory)
                    .await?;
                if kind.is_leaf() {
                    leaves.push(Leaf {
                        path: entry.path,
                        kind,
                        size: entry.size,
                        modified_at: entry.modified_at,
                    });
                } else {
                    pending.push(entry.path);
                }
            }

            debug!(directory = %directory, leaves = leaves.len(), "Listed directory");
            self.apply_leaves(drive, leaves, token, pass).await?;
        }

        Ok(())
    }

    /// Build and commit records for one directory's leaves.
    async fn apply_leaves(
        &self,
        drive: &Drive,
        leaves: Vec<Leaf>,
        token: &CancellationToken,
        pass: &mut Pass,
    ) -> Result<()> {
        if leaves.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = leaves
            .iter()
            .map(|leaf| identifier_for(&self.registry, drive, &leaf.path))
            .collect();
        let mut unique: Vec<String> = ids.clone();
        unique.sort();
        unique.dedup();

        ensure_active(token)?;
        let existing: HashMap<String, ContentRecord> = self
            .repository
            .find_many(&unique)
            .await?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let now = self.clock.unix_timestamp_millis();
        let mut batch: Vec<ContentRecord> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (leaf, id) in leaves.into_iter().zip(ids) {
            ensure_active(token)?;
            pass.discovered.insert(id.clone());

            let prior = match positions.get(&id) {
                Some(&index) => Some(batch[index].clone()),
                None => existing.get(&id).cloned(),
            };

            if let Some(previous) = &prior {
                let unchanged = !previous.is_deleted
                    && leaf.modified_at <= previous.last_refreshed
                    && !pass.written.contains(&id);
                if unchanged {
                    pass.summary.unchanged += 1;
                    continue;
                }
            }

            let record = self.build_record(drive, &leaf, id.clone(), prior, now).await?;
            pass.written.insert(id.clone());
            match positions.get(&id) {
                Some(&index) => batch[index] = record,
                None => {
                    positions.insert(id, batch.len());
                    batch.push(record);
                }
            }
        }

        ensure_active(token)?;
        self.repository.apply_batch(&batch).await?;

        for record in &batch {
            if !pass.reported.insert(record.id.clone()) {
                continue;
            }
            pass.summary.touched.push(record.id.clone());

            let event = if existing.contains_key(&record.id) {
                pass.summary.updated += 1;
                LibraryEvent::RecordUpdated {
                    identifier: record.id.clone(),
                }
            } else {
                pass.summary.added += 1;
                LibraryEvent::RecordAdded {
                    identifier: record.id.clone(),
                    title: record.title.clone(),
                }
            };
            self.events.emit(CoreEvent::Library(event)).ok();
        }

        Ok(())
    }

    async fn build_record(
        &self,
        drive: &Drive,
        leaf: &Leaf,
        id: String,
        prior: Option<ContentRecord>,
        now: i64,
    ) -> Result<ContentRecord> {
        let tag = drive.tag().as_str();
        let relative = leaf.path.as_str();
        let mut record =
            prior.unwrap_or_else(|| ContentRecord::new(id.clone(), tag, relative, now));

        record.drive = tag.to_string();
        record.relative_path = relative.to_string();
        if record.title.trim().is_empty() {
            record.title = leaf
                .path
                .file_stem()
                .filter(|stem| !stem.trim().is_empty())
                .unwrap_or(id.as_str())
                .to_string();
        }
        record.mime_type = mime_guess::from_path(relative)
            .first_raw()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();
        record.file_size = i64::try_from(leaf.size).unwrap_or(i64::MAX);
        record.last_refreshed = record.last_refreshed.max(leaf.modified_at);
        if !record.physical_media {
            record.publication_date = Some(leaf.modified_at);
        }
        record.archive_entries = self.archive_listing(drive, leaf).await?;
        record.is_deleted = false;
        record.updated_at = now;

        Ok(record)
    }

    /// Entry listing for packages; `None` for everything else.
    async fn archive_listing(&self, drive: &Drive, leaf: &Leaf) -> Result<Option<Vec<String>>> {
        if leaf.kind == EntryKind::OpaquePackage {
            let prefix = format!("{}/", leaf.path.as_str());
            let entries = drive
                .list_files_recursive(&leaf.path)
                .await?
                .iter()
                .filter_map(|file| file.as_str().strip_prefix(&prefix).map(str::to_string))
                .collect();
            return Ok(Some(entries));
        }

        let is_archive = leaf
            .path
            .extension()
            .is_some_and(|ext| self.config.is_archive_extension(ext));
        if !is_archive {
            return Ok(None);
        }

        let data = drive.read_bytes(&leaf.path).await?;
        match self.archive_reader.list_entries(data).await {
            Ok(mut entries) => {
                entries.sort();
                Ok(Some(entries))
            }
            Err(e) => {
                let failure = SyncError::ArchiveReadFailure {
                    path: leaf.path.to_string(),
                    message: e.to_string(),
                };
                warn!(error = %failure, "Omitting archive entry listing");
                Ok(None)
            }
        }
    }

    async fn detect_orphans(&self, pass: &mut Pass) -> Result<()> {
        if pass.summary.covered.is_empty() {
            return Ok(());
        }

        let orphans: Vec<String> = self
            .repository
            .live_ids_on(&pass.summary.covered)
            .await?
            .into_iter()
            .filter(|id| !pass.discovered.contains(id))
            .collect();
        if orphans.is_empty() {
            return Ok(());
        }

        let now = self.clock.unix_timestamp_millis();
        pass.summary.orphaned = self.repository.soft_delete(&orphans, now).await?;

        for identifier in orphans {
            debug!(identifier = %identifier, "Soft-deleted vanished record");
            self.events
                .emit(CoreEvent::Library(LibraryEvent::RecordOrphaned { identifier }))
                .ok();
        }
        Ok(())
    }
}
