//! # Sync Coordinator
//!
//! Serializes index-mutating work and owns the single in-flight full refresh.
//!
//! ## Overview
//!
//! - Starting a refresh cancels the one in flight and swaps in a new
//!   generation (cancel-and-replace)
//! - All index mutation (full refreshes, scoped scans, imports) runs under one
//!   work lock, so a superseded pass drains before its replacement starts
//! - Callers awaiting a refresh observe the outcome of the latest started one
//! - Suspension cancels the in-flight refresh; resuming starts a fresh one
//! - Drives are swapped wholesale on reconfiguration
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = SyncCoordinator::new(engine, import, drives);
//!
//! match coordinator.refresh_all().await {
//!     RefreshOutcome::Completed(summary) => println!("{} added", summary.added),
//!     RefreshOutcome::Cancelled => {}
//!     RefreshOutcome::Failed(message) => eprintln!("{message}"),
//! }
//! ```

use crate::addressing::{decode_identifier, identifier_for};
use crate::classify::EntryKind;
use crate::drive::{Drive, DriveTag, RootRelativePath};
use crate::engine::{RefreshSummary, SyncEngine};
use crate::import::ImportPipeline;
use crate::state::RefreshState;
use crate::{Result, SyncError};
use bytes::Bytes;
use core_async::sync::{watch, CancellationToken, Mutex, RwLock};
use core_async::task::JoinHandle;
use core_async::time::Instant;
use core_runtime::events::{CoreEvent, LibraryEvent, SyncEvent};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Result of one full refresh as seen by awaiting callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Completed(RefreshSummary),
    Cancelled,
    Failed(String),
}

impl RefreshOutcome {
    pub fn summary(&self) -> Option<&RefreshSummary> {
        match self {
            RefreshOutcome::Completed(summary) => Some(summary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    state: RefreshState,
    latest_started: u64,
    completed: u64,
    outcome: Option<RefreshOutcome>,
}

impl Snapshot {
    fn advance(&mut self, next: RefreshState) {
        match self.state.transition(next) {
            Ok(state) => self.state = state,
            Err(e) => debug!(error = %e, "Ignoring refresh state change"),
        }
    }

    fn settled(&self) -> bool {
        self.latest_started == 0 || (self.completed == self.latest_started && self.outcome.is_some())
    }
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct SyncCoordinator {
    engine: Arc<SyncEngine>,
    import: ImportPipeline,
    drives: RwLock<Arc<Vec<Drive>>>,
    work_lock: Arc<Mutex<()>>,
    current: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    snapshot: Arc<watch::Sender<Snapshot>>,
    suspended: AtomicBool,
    shutdown: CancellationToken,
}

impl SyncCoordinator {
    pub fn new(engine: SyncEngine, import: ImportPipeline, drives: Vec<Drive>) -> Self {
        let (snapshot, _) = watch::channel(Snapshot::default());
        Self {
            engine: Arc::new(engine),
            import,
            drives: RwLock::new(Arc::new(drives)),
            work_lock: Arc::new(Mutex::new(())),
            current: Mutex::new(None),
            generation: AtomicU64::new(0),
            snapshot: Arc::new(snapshot),
            suspended: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Drives as of now. A later reconfiguration does not affect the copy.
    pub async fn drives(&self) -> Arc<Vec<Drive>> {
        self.drives.read().await.clone()
    }

    pub fn state(&self) -> RefreshState {
        self.snapshot.borrow().state
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    /// Generation of the most recently started full refresh (0 if none).
    pub fn latest_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Full refresh
    // ------------------------------------------------------------------------

    /// Start a full refresh, superseding any in flight.
    ///
    /// Returns the new generation, or `None` while suspended.
    #[instrument(skip(self))]
    pub async fn start_refresh(&self) -> Option<u64> {
        if self.is_suspended() {
            debug!("Refresh requested while suspended; deferred until resume");
            return None;
        }

        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            if !previous.handle.is_finished() {
                info!(generation = previous.generation, "Superseding in-flight refresh");
            }
            previous.token.cancel();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.snapshot.send_modify(|s| {
            s.latest_started = generation;
            if s.state == RefreshState::Refreshing {
                s.advance(RefreshState::Cancelled);
            }
            s.advance(RefreshState::Refreshing);
        });

        let token = self.shutdown.child_token();
        let drives = self.drives().await;
        let handle = core_async::spawn(run_refresh(
            self.engine.clone(),
            self.work_lock.clone(),
            self.snapshot.clone(),
            drives,
            generation,
            token.clone(),
        ));

        *current = Some(InFlight {
            generation,
            token,
            handle,
        });
        Some(generation)
    }

    /// Wait for the latest started refresh to settle.
    ///
    /// If another refresh starts meanwhile, waits for that one instead.
    /// `None` when no refresh was ever started.
    pub async fn wait_for_refresh(&self) -> Option<RefreshOutcome> {
        let mut receiver = self.snapshot.subscribe();
        let outcome = match receiver.wait_for(Snapshot::settled).await {
            Ok(snapshot) => snapshot.outcome.clone(),
            Err(_) => Some(RefreshOutcome::Failed("coordinator shut down".to_string())),
        };
        outcome
    }

    /// Start a full refresh and wait for the latest one to settle.
    pub async fn refresh_all(&self) -> RefreshOutcome {
        match self.start_refresh().await {
            Some(_) => self
                .wait_for_refresh()
                .await
                .unwrap_or(RefreshOutcome::Cancelled),
            None => RefreshOutcome::Cancelled,
        }
    }

    /// Signal the in-flight refresh to stop at its next checkpoint.
    pub async fn cancel_refresh(&self) {
        let current = self.current.lock().await;
        let Some(in_flight) = current.as_ref() else {
            return;
        };
        if in_flight.token.is_cancelled() || in_flight.handle.is_finished() {
            return;
        }

        in_flight.token.cancel();
        let generation = in_flight.generation;
        self.snapshot.send_modify(|s| {
            if s.latest_started == generation {
                s.advance(RefreshState::Cancelled);
            }
        });
        info!(generation, "Cancelled in-flight refresh");
    }

    /// Suspension cancels the in-flight refresh; resuming starts a fresh one.
    pub async fn set_suspended(&self, suspended: bool) {
        let was = self.suspended.swap(suspended, Ordering::SeqCst);
        match (was, suspended) {
            (false, true) => {
                info!("App suspended");
                self.cancel_refresh().await;
            }
            (true, false) => {
                info!("App resumed");
                self.start_refresh().await;
            }
            _ => {}
        }
    }

    /// Replace the drive set and start a full refresh over it.
    pub async fn configure_drives(&self, drives: Vec<Drive>) -> Option<u64> {
        let summary: Vec<String> = drives
            .iter()
            .map(|d| format!("{}{}", d.kind(), if d.is_connected() { "" } else { " (offline)" }))
            .collect();
        *self.drives.write().await = Arc::new(drives);
        info!(drives = ?summary, "Drives reconfigured");
        self.start_refresh().await
    }

    /// Cancel outstanding work and wait for the in-flight task to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let in_flight = self.current.lock().await.take();
        if let Some(in_flight) = in_flight {
            if let Err(e) = in_flight.handle.await {
                warn!(error = %e, "Refresh task ended abnormally");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Scoped work
    // ------------------------------------------------------------------------

    /// Re-scan one path on the drive tagged `tag`.
    pub async fn refresh_path(
        &self,
        tag: DriveTag,
        path: &RootRelativePath,
    ) -> Result<RefreshSummary> {
        let drive = self.drive_for(tag).await?;
        let _guard = self.work_lock.lock().await;
        self.scoped_refresh(&drive, path).await
    }

    async fn scoped_refresh(
        &self,
        drive: &Drive,
        path: &RootRelativePath,
    ) -> Result<RefreshSummary> {
        let events = self.engine.events();
        let generation = self.latest_generation();
        events
            .emit(CoreEvent::Sync(SyncEvent::Started {
                generation,
                drives: vec![drive.tag().to_string()],
                scope: Some(format!("{}:{}", drive.tag(), path)),
            }))
            .ok();

        let started = Instant::now();
        let token = self.shutdown.child_token();
        let result = self.engine.refresh_path(drive, path, &token).await;
        match &result {
            Ok(summary) => {
                events
                    .emit(CoreEvent::Sync(SyncEvent::Completed {
                        generation,
                        added: summary.added,
                        updated: summary.updated,
                        unchanged: summary.unchanged,
                        orphaned: 0,
                        duration_ms: elapsed_ms(started),
                    }))
                    .ok();
            }
            Err(e) => {
                events
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        generation,
                        message: e.to_string(),
                    }))
                    .ok();
            }
        }
        result
    }

    /// Import `source` into a managed drive.
    ///
    /// Returns the identifier of the resulting record, or `None` when the
    /// landed file is not indexable (a reserved name, for instance).
    #[instrument(skip(self, source, source_url))]
    pub async fn import_file(
        &self,
        source: &Path,
        source_url: Option<&str>,
    ) -> Result<Option<String>> {
        let drives = self.drives().await;
        let _guard = self.work_lock.lock().await;

        let plan = self.import.plan(source, &drives).await?;
        self.import.upload(&plan, source).await?;
        self.scoped_refresh(&plan.drive, &plan.destination).await?;

        let identifier = identifier_for(self.engine.registry(), &plan.drive, &plan.target);
        let repository = self.engine.repository();
        let Some(mut record) = repository.find(&identifier).await? else {
            warn!(target = %plan.target, "Imported file produced no record");
            return Ok(None);
        };

        let now = self.engine.clock().unix_timestamp_millis();
        if !record.physical_media {
            record.physical_media = true;
            record.publication_date = Some(now);
        }
        if let Some(url) = source_url.filter(|u| !u.trim().is_empty()) {
            record.source_url = Some(url.to_string());
        }
        record.updated_at = now;
        repository.upsert(&record).await?;

        self.engine
            .events()
            .emit(CoreEvent::Library(LibraryEvent::FileImported {
                identifier: identifier.clone(),
                deduplicated: plan.is_deduplicated(),
            }))
            .ok();
        info!(
            identifier = %identifier,
            deduplicated = plan.is_deduplicated(),
            "Imported file"
        );
        Ok(Some(identifier))
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    async fn drive_for(&self, tag: DriveTag) -> Result<Drive> {
        self.drives()
            .await
            .iter()
            .find(|d| d.tag() == tag)
            .cloned()
            .ok_or_else(|| SyncError::DriveUnavailable(tag.to_string()))
    }

    /// Drive and path behind `identifier`.
    ///
    /// Indexed records answer directly, which covers resolver-rewritten
    /// identifiers; anything else must decode.
    pub async fn locate(&self, identifier: &str) -> Result<(Drive, RootRelativePath)> {
        let (tag, path) = match self.engine.repository().find(identifier).await? {
            Some(record) => (
                record.drive.parse::<DriveTag>()?,
                RootRelativePath::parse(&record.relative_path)?,
            ),
            None => decode_identifier(identifier)?,
        };
        Ok((self.drive_for(tag).await?, path))
    }

    async fn entry_kind(&self, drive: &Drive, path: &RootRelativePath) -> Result<Option<EntryKind>> {
        if path.is_root() || !drive.exists(path).await? {
            return Ok(None);
        }
        let is_directory = drive.metadata(path).await?.is_directory;
        let name = path.file_name().unwrap_or_default();
        let kind = self.engine.config().classify(name, is_directory);
        if kind == EntryKind::Directory && drive.is_file_package(path).await? {
            return Ok(Some(EntryKind::OpaquePackage));
        }
        Ok(Some(kind))
    }

    /// Whether a file (or package) currently exists behind `identifier`.
    pub async fn file_exists(&self, identifier: &str) -> Result<bool> {
        let (drive, path) = self.locate(identifier).await?;
        Ok(self
            .entry_kind(&drive, &path)
            .await?
            .is_some_and(EntryKind::is_leaf))
    }

    /// Whether a plain directory currently exists behind `identifier`.
    pub async fn directory_exists(&self, identifier: &str) -> Result<bool> {
        let (drive, path) = self.locate(identifier).await?;
        if path.is_root() {
            return drive.exists(&path).await;
        }
        Ok(self.entry_kind(&drive, &path).await? == Some(EntryKind::Directory))
    }

    /// Bytes of the file behind `identifier`; `None` for missing files and
    /// directories.
    pub async fn read(&self, identifier: &str) -> Result<Option<Bytes>> {
        let (drive, path) = self.locate(identifier).await?;
        if path.is_root() || !drive.exists(&path).await? || drive.is_directory(&path).await? {
            return Ok(None);
        }
        Ok(Some(drive.read_bytes(&path).await?))
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Body of one full refresh generation.
async fn run_refresh(
    engine: Arc<SyncEngine>,
    work_lock: Arc<Mutex<()>>,
    snapshot: Arc<watch::Sender<Snapshot>>,
    drives: Arc<Vec<Drive>>,
    generation: u64,
    token: CancellationToken,
) {
    let _guard = work_lock.lock().await;
    let events = engine.events();

    let outcome = if token.is_cancelled() {
        debug!(generation, "Refresh superseded before it started");
        events
            .emit(CoreEvent::Sync(SyncEvent::Cancelled { generation }))
            .ok();
        RefreshOutcome::Cancelled
    } else {
        events
            .emit(CoreEvent::Sync(SyncEvent::Started {
                generation,
                drives: drives.iter().map(|d| d.tag().to_string()).collect(),
                scope: None,
            }))
            .ok();

        let started = Instant::now();
        match engine.refresh_all(&drives, &token).await {
            Ok(summary) => {
                events
                    .emit(CoreEvent::Sync(SyncEvent::Completed {
                        generation,
                        added: summary.added,
                        updated: summary.updated,
                        unchanged: summary.unchanged,
                        orphaned: summary.orphaned,
                        duration_ms: elapsed_ms(started),
                    }))
                    .ok();
                RefreshOutcome::Completed(summary)
            }
            Err(e) if e.is_cancelled() => {
                info!(generation, "Refresh cancelled");
                events
                    .emit(CoreEvent::Sync(SyncEvent::Cancelled { generation }))
                    .ok();
                RefreshOutcome::Cancelled
            }
            Err(e) => {
                error!(generation, error = %e, "Refresh failed; previous index state kept");
                events
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        generation,
                        message: e.to_string(),
                    }))
                    .ok();
                RefreshOutcome::Failed(e.to_string())
            }
        }
    };

    snapshot.send_modify(|s| {
        if generation >= s.completed {
            s.completed = generation;
            s.outcome = Some(outcome);
        }
        if generation == s.latest_started {
            s.advance(RefreshState::Idle);
        }
    });
}
