//! Core service façade.
//!
//! Wires a [`CoreConfig`] into the metadata index, the drives and the sync
//! coordinator, and exposes the query, import and identity surfaces host
//! applications call. Desktop apps typically enable the `desktop-shims`
//! feature so the file system and archive bridges default to the
//! `bridge-desktop` implementations.
//!
//! ```ignore
//! let config = CoreConfig::builder()
//!     .database_path(data_dir.join("index.db"))
//!     .local_root(data_dir.join("Documents"))
//!     .build()?;
//! let service = ContentService::new(config).await?;
//!
//! service.refresh_all_files_metadata().await;
//! let books = service.files(&["application/epub+zip"]).await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_async::sync::{Mutex, RwLock};
use core_async::task::JoinHandle;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{ContentRecord, ContentRecordRepository, RecordFilter, SqliteContentRecordRepository};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_sync::{
    Downloadable, Drive, ImportPipeline, RefreshOutcome, ResolverRegistry, SyncConfig,
    SyncCoordinator, SyncEngine,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Primary façade exposed to host applications.
pub struct ContentService {
    config: CoreConfig,
    coordinator: Arc<SyncCoordinator>,
    repository: Arc<dyn ContentRecordRepository>,
    events: EventBus,
    container_id: RwLock<Option<String>>,
    lifecycle_task: Mutex<Option<JoinHandle<()>>>,
}

impl ContentService {
    /// Open the index and connect the drives with default resolvers and
    /// scanning rules.
    pub async fn new(config: CoreConfig) -> Result<Self> {
        Self::with_extensions(config, ResolverRegistry::new(), SyncConfig::default()).await
    }

    /// Like [`new`](Self::new), with collaborator resolvers and processors
    /// registered up front.
    pub async fn with_extensions(
        config: CoreConfig,
        registry: ResolverRegistry,
        sync_config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;

        let pool = create_pool(DatabaseConfig::new(&config.database_path)).await?;
        let repository: Arc<dyn ContentRecordRepository> =
            Arc::new(SqliteContentRecordRepository::new(pool));
        let events = EventBus::new(EVENT_CAPACITY);

        config
            .file_system
            .create_dir_all(&config.local_root)
            .await?;

        let engine = SyncEngine::new(
            repository.clone(),
            config.archive_reader.clone(),
            registry.clone(),
            sync_config.clone(),
            config.clock.clone(),
            events.clone(),
        );
        let import = ImportPipeline::new(config.file_system.clone(), registry, sync_config);
        let drives = build_drives(&config, config.cloud_container_id.as_deref()).await;
        let coordinator = Arc::new(SyncCoordinator::new(engine, import, drives));

        info!(
            local_root = %config.local_root.display(),
            cloud = config.cloud_container_id.is_some(),
            "Content service ready"
        );

        Ok(Self {
            container_id: RwLock::new(config.cloud_container_id.clone()),
            config,
            coordinator,
            repository,
            events,
            lifecycle_task: Mutex::new(None),
        })
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Subscribe to sync and library events.
    pub fn events(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    // ------------------------------------------------------------------------
    // Query surface
    // ------------------------------------------------------------------------

    /// Refresh every drive and wait for the latest refresh to settle.
    ///
    /// A failed refresh keeps the previous index contents; the failure is
    /// logged and reported in the outcome.
    pub async fn refresh_all_files_metadata(&self) -> RefreshOutcome {
        let outcome = self.coordinator.refresh_all().await;
        if let RefreshOutcome::Failed(message) = &outcome {
            error!(error = %message, "Refresh failed");
        }
        outcome
    }

    /// Live records whose mime type matches any of `types` (all when empty).
    pub async fn files(&self, types: &[&str]) -> Result<Vec<ContentRecord>> {
        let filter = RecordFilter::of_types(types.iter().copied());
        Ok(self.repository.list_all(&filter).await?)
    }

    pub async fn file_exists(&self, identifier: &str) -> Result<bool> {
        Ok(self.coordinator.file_exists(identifier).await?)
    }

    pub async fn directory_exists(&self, identifier: &str) -> Result<bool> {
        Ok(self.coordinator.directory_exists(identifier).await?)
    }

    pub async fn read(&self, identifier: &str) -> Result<Option<Bytes>> {
        Ok(self.coordinator.read(identifier).await?)
    }

    // ------------------------------------------------------------------------
    // Import surface
    // ------------------------------------------------------------------------

    /// Import `source`, returning the identifier of its record.
    ///
    /// Failures are logged and yield `None`.
    pub async fn import_file(&self, source: &Path, source_url: Option<&str>) -> Option<String> {
        match self.coordinator.import_file(source, source_url).await {
            Ok(identifier) => identifier,
            Err(e) => {
                error!(
                    source = core_runtime::logging::strip_path(&source.to_string_lossy()),
                    error = %e,
                    "Import failed"
                );
                None
            }
        }
    }

    /// Staging location for a download that will later be imported.
    pub fn downloadable(&self, url: &str, name: &str) -> Option<Downloadable> {
        Downloadable::stage(&self.config.cache_dir, url, name)
    }

    // ------------------------------------------------------------------------
    // Identity and lifecycle
    // ------------------------------------------------------------------------

    /// Point the cloud drive at `container_id` and refresh.
    ///
    /// Re-configuring the current container is a no-op.
    pub async fn configure(&self, container_id: &str) -> Result<()> {
        let container_id = container_id.trim();
        if container_id.is_empty() {
            return Err(core_runtime::Error::Config(
                "Cloud container identifier cannot be blank".to_string(),
            )
            .into());
        }
        if self.config.cloud_containers.is_none() {
            return Err(core_runtime::Error::CapabilityMissing {
                capability: "CloudContainerProvider".to_string(),
                message: "Configuring a cloud container requires a CloudContainerProvider."
                    .to_string(),
            }
            .into());
        }

        let mut current = self.container_id.write().await;
        if current.as_deref() == Some(container_id) {
            debug!(container = container_id, "Cloud container unchanged");
            return Ok(());
        }

        let drives = build_drives(&self.config, Some(container_id)).await;
        *current = Some(container_id.to_string());
        drop(current);

        info!(container = container_id, "Cloud container configured");
        self.coordinator.configure_drives(drives).await;
        Ok(())
    }

    pub async fn on_app_suspension_changed(&self, suspended: bool) {
        self.coordinator.set_suspended(suspended).await;
    }

    /// Follow the configured lifecycle observer, forwarding suspension
    /// changes to the coordinator.
    ///
    /// Returns `false` when no observer was configured.
    pub async fn watch_lifecycle(&self) -> Result<bool> {
        let Some(observer) = self.config.lifecycle_observer.clone() else {
            return Ok(false);
        };

        let initial = observer.get_state().await?;
        self.coordinator.set_suspended(initial.is_suspended()).await;
        let mut changes = observer.subscribe_changes().await?;

        let coordinator = self.coordinator.clone();
        let handle = core_async::spawn(async move {
            while let Some(state) = changes.next().await {
                debug!(?state, "Lifecycle changed");
                coordinator.set_suspended(state.is_suspended()).await;
            }
            debug!("Lifecycle stream closed");
        });

        if let Some(previous) = self.lifecycle_task.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(true)
    }

    /// Stop lifecycle tracking and wait for in-flight work to wind down.
    pub async fn shutdown(&self) {
        if let Some(task) = self.lifecycle_task.lock().await.take() {
            task.abort();
        }
        self.coordinator.shutdown().await;
        info!("Content service shut down");
    }
}

/// Local drive, plus the cloud drive for `container_id` when one is set.
async fn build_drives(config: &CoreConfig, container_id: Option<&str>) -> Vec<Drive> {
    let fs: Arc<dyn FileSystemAccess> = config.file_system.clone();
    let mut drives = vec![Drive::local(&config.local_root, fs.clone())];

    if let Some(id) = container_id {
        let drive = match &config.cloud_containers {
            Some(provider) => Drive::resolve_cloud(id, provider.as_ref(), fs).await,
            None => {
                warn!(container = id, "No cloud container provider; cloud drive offline");
                Drive::cloud(id, None, fs)
            }
        };
        drives.push(drive);
    }
    drives
}
