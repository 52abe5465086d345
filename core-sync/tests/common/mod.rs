//! Shared fixtures: an in-memory file system and a wired coordinator.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_desktop::ZipArchiveReader;
use bridge_traits::archive::ArchiveReader;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::storage::{FileMetadata, FileSystemAccess};
use bridge_traits::time::FixedClock;
use bytes::Bytes;
use core_async::time::Duration;
use core_library::db::create_test_pool;
use core_library::{ContentRecord, ContentRecordRepository, RecordFilter, SqliteContentRecordRepository};
use core_runtime::events::EventBus;
use core_sync::{
    Drive, ImportPipeline, ResolverRegistry, SyncConfig, SyncCoordinator, SyncEngine,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const LOCAL_ROOT: &str = "/local";
pub const CLOUD_ROOT: &str = "/cloud";
pub const CONTAINER_ID: &str = "iCloud.com.example.reader";
pub const START_MILLIS: i64 = 1_700_000_000_000;

// ============================================================================
// In-memory file system
// ============================================================================

#[derive(Debug, Clone)]
enum Node {
    File { data: Bytes, modified_at: i64 },
    Dir { modified_at: i64 },
}

/// File system double with explicit modification times.
pub struct MemoryFs {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    write_time: AtomicI64,
    list_delay: Mutex<Option<Duration>>,
    package_extensions: Mutex<Vec<String>>,
    listings: AtomicUsize,
}

impl MemoryFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: Mutex::new(BTreeMap::new()),
            write_time: AtomicI64::new(START_MILLIS),
            list_delay: Mutex::new(None),
            package_extensions: Mutex::new(Vec::new()),
            listings: AtomicUsize::new(0),
        })
    }

    fn insert_ancestors(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path, modified_at: i64) {
        for ancestor in path.ancestors().skip(1) {
            nodes
                .entry(ancestor.to_path_buf())
                .or_insert(Node::Dir { modified_at });
        }
    }

    pub fn add_dir(&self, path: impl AsRef<Path>, modified_at: i64) {
        let path = path.as_ref();
        let mut nodes = self.nodes.lock().unwrap();
        Self::insert_ancestors(&mut nodes, path, modified_at);
        nodes.insert(path.to_path_buf(), Node::Dir { modified_at });
    }

    pub fn add_file(&self, path: impl AsRef<Path>, data: impl Into<Bytes>, modified_at: i64) {
        let path = path.as_ref();
        let mut nodes = self.nodes.lock().unwrap();
        Self::insert_ancestors(&mut nodes, path, modified_at);
        nodes.insert(
            path.to_path_buf(),
            Node::File {
                data: data.into(),
                modified_at,
            },
        );
    }

    /// Change a node's modification time without touching its content.
    pub fn touch(&self, path: impl AsRef<Path>, at: i64) {
        let mut nodes = self.nodes.lock().unwrap();
        match nodes.get_mut(path.as_ref()) {
            Some(Node::File { modified_at, .. }) | Some(Node::Dir { modified_at }) => {
                *modified_at = at
            }
            None => panic!("touch of missing {}", path.as_ref().display()),
        }
    }

    /// Remove a node and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.nodes
            .lock()
            .unwrap()
            .retain(|candidate, _| !candidate.starts_with(path));
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<Bytes> {
        match self.nodes.lock().unwrap().get(path.as_ref()) {
            Some(Node::File { data, .. }) => Some(data.clone()),
            _ => None,
        }
    }

    /// Files directly or indirectly below `dir`.
    pub fn files_under(&self, dir: impl AsRef<Path>) -> Vec<PathBuf> {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, n)| p.starts_with(dir.as_ref()) && matches!(n, Node::File { .. }))
            .map(|(p, _)| p.clone())
            .collect()
    }

    pub fn set_write_time(&self, millis: i64) {
        self.write_time.store(millis, Ordering::SeqCst);
    }

    pub fn set_list_delay(&self, delay: Option<Duration>) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn treat_as_package(&self, extension: &str) {
        self.package_extensions
            .lock()
            .unwrap()
            .push(extension.to_string());
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFs {
    async fn get_cache_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/cache"))
    }

    async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/data"))
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.nodes.lock().unwrap().contains_key(path))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        match self.nodes.lock().unwrap().get(path) {
            Some(Node::File { data, modified_at }) => Ok(FileMetadata {
                size: data.len() as u64,
                created_at: Some(*modified_at),
                modified_at: Some(*modified_at),
                is_directory: false,
                is_symlink: false,
            }),
            Some(Node::Dir { modified_at }) => Ok(FileMetadata {
                size: 0,
                created_at: Some(*modified_at),
                modified_at: Some(*modified_at),
                is_directory: true,
                is_symlink: false,
            }),
            None => Err(BridgeError::NotFound(path.to_path_buf())),
        }
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        let now = self.write_time.load(Ordering::SeqCst);
        let mut nodes = self.nodes.lock().unwrap();
        Self::insert_ancestors(&mut nodes, path, now);
        nodes
            .entry(path.to_path_buf())
            .or_insert(Node::Dir { modified_at: now });
        Ok(())
    }

    async fn read_file(&self, path: &Path) -> BridgeResult<Bytes> {
        match self.nodes.lock().unwrap().get(path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Dir { .. }) => Err(BridgeError::OperationFailed(format!(
                "{} is a directory",
                path.display()
            ))),
            None => Err(BridgeError::NotFound(path.to_path_buf())),
        }
    }

    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        let now = self.write_time.load(Ordering::SeqCst);
        let mut nodes = self.nodes.lock().unwrap();
        Self::insert_ancestors(&mut nodes, path, now);
        nodes.insert(
            path.to_path_buf(),
            Node::File {
                data,
                modified_at: now,
            },
        );
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        match self.nodes.lock().unwrap().remove(path) {
            Some(_) => Ok(()),
            None => Err(BridgeError::NotFound(path.to_path_buf())),
        }
    }

    async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.remove(path);
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        if let Some(delay) = delay {
            core_async::sleep(delay).await;
        }

        let nodes = self.nodes.lock().unwrap();
        match nodes.get(path) {
            Some(Node::Dir { .. }) => Ok(nodes
                .keys()
                .filter(|candidate| candidate.parent() == Some(path))
                .cloned()
                .collect()),
            Some(Node::File { .. }) => Err(BridgeError::OperationFailed(format!(
                "{} is not a directory",
                path.display()
            ))),
            None => Err(BridgeError::NotFound(path.to_path_buf())),
        }
    }

    async fn is_file_package(&self, path: &Path) -> BridgeResult<bool> {
        let is_dir = matches!(self.nodes.lock().unwrap().get(path), Some(Node::Dir { .. }));
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(is_dir
            && self
                .package_extensions
                .lock()
                .unwrap()
                .iter()
                .any(|p| *p == extension))
    }
}

// ============================================================================
// Zip fixtures
// ============================================================================

/// Build a stored zip containing `entries` (name, content).
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Bytes {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    Bytes::from(writer.finish().unwrap().into_inner())
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub fs: Arc<MemoryFs>,
    pub repository: Arc<SqliteContentRecordRepository>,
    pub clock: Arc<FixedClock>,
    pub events: EventBus,
    pub coordinator: SyncCoordinator,
}

pub struct HarnessBuilder {
    cloud: bool,
    archive_reader: Arc<dyn ArchiveReader>,
    registry: ResolverRegistry,
    config: SyncConfig,
    fs: Option<Arc<MemoryFs>>,
}

impl HarnessBuilder {
    pub fn with_cloud(mut self) -> Self {
        self.cloud = true;
        self
    }

    pub fn archive_reader(mut self, reader: Arc<dyn ArchiveReader>) -> Self {
        self.archive_reader = reader;
        self
    }

    pub fn registry(mut self, registry: ResolverRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fs(mut self, fs: Arc<MemoryFs>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub async fn build(self) -> Harness {
        let fs = self.fs.unwrap_or_else(MemoryFs::new);
        fs.add_dir(LOCAL_ROOT, START_MILLIS);
        if self.cloud {
            fs.add_dir(CLOUD_ROOT, START_MILLIS);
        }

        let pool = create_test_pool().await.unwrap();
        let repository = Arc::new(SqliteContentRecordRepository::new(pool));
        let clock = Arc::new(FixedClock::at_millis(START_MILLIS));
        let events = EventBus::new(256);

        let engine = SyncEngine::new(
            repository.clone(),
            self.archive_reader,
            self.registry.clone(),
            self.config.clone(),
            clock.clone(),
            events.clone(),
        );
        let import = ImportPipeline::new(fs.clone(), self.registry, self.config);
        let coordinator = SyncCoordinator::new(engine, import, drives(&fs, self.cloud));

        Harness {
            fs,
            repository,
            clock,
            events,
            coordinator,
        }
    }
}

/// Local drive, plus the cloud drive when `cloud` is set.
pub fn drives(fs: &Arc<MemoryFs>, cloud: bool) -> Vec<Drive> {
    let mut drives = vec![Drive::local(LOCAL_ROOT, fs.clone())];
    if cloud {
        drives.push(Drive::cloud(
            CONTAINER_ID,
            Some(PathBuf::from(CLOUD_ROOT)),
            fs.clone(),
        ));
    }
    drives
}

impl Harness {
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            cloud: false,
            archive_reader: Arc::new(ZipArchiveReader::new()),
            registry: ResolverRegistry::new(),
            config: SyncConfig::default(),
            fs: None,
        }
    }

    pub async fn local() -> Self {
        Self::builder().build().await
    }

    pub fn local_path(&self, relative: &str) -> PathBuf {
        Path::new(LOCAL_ROOT).join(relative)
    }

    pub fn cloud_path(&self, relative: &str) -> PathBuf {
        Path::new(CLOUD_ROOT).join(relative)
    }

    pub async fn record(&self, identifier: &str) -> Option<ContentRecord> {
        self.repository.find(identifier).await.unwrap()
    }

    pub async fn all_records(&self) -> Vec<ContentRecord> {
        self.repository
            .list_all(&RecordFilter::live().including_deleted())
            .await
            .unwrap()
    }

    pub async fn live_ids(&self) -> Vec<String> {
        self.repository
            .list_all(&RecordFilter::live())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect()
    }
}
