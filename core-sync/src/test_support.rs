//! Mock bridges shared by unit tests.

use async_trait::async_trait;
use bridge_traits::archive::ArchiveReader;
use bridge_traits::error::Result;
use bridge_traits::storage::{CloudContainerProvider, FileMetadata, FileSystemAccess};
use bytes::Bytes;
use mockall::mock;
use std::path::{Path, PathBuf};

mock! {
    pub Fs {}

    #[async_trait]
    impl FileSystemAccess for Fs {
        async fn get_cache_directory(&self) -> Result<PathBuf>;
        async fn get_data_directory(&self) -> Result<PathBuf>;
        async fn exists(&self, path: &Path) -> Result<bool>;
        async fn metadata(&self, path: &Path) -> Result<FileMetadata>;
        async fn create_dir_all(&self, path: &Path) -> Result<()>;
        async fn read_file(&self, path: &Path) -> Result<Bytes>;
        async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;
        async fn delete_file(&self, path: &Path) -> Result<()>;
        async fn delete_dir_all(&self, path: &Path) -> Result<()>;
        async fn list_directory(&self, path: &Path) -> Result<Vec<PathBuf>>;
    }
}

mock! {
    pub Containers {}

    #[async_trait]
    impl CloudContainerProvider for Containers {
        async fn container_root(&self, container_id: &str) -> Result<Option<PathBuf>>;
    }
}

mock! {
    pub Archive {}

    #[async_trait]
    impl ArchiveReader for Archive {
        async fn list_entries(&self, data: Bytes) -> Result<Vec<String>>;
        async fn extract_entry(&self, data: Bytes, entry: &str) -> Result<Option<Bytes>>;
    }
}
