//! Archive reading abstraction.
//!
//! Content packages (`.zip`, `.epub`, `.cbz`, ...) are opened through this
//! trait so the sync engine can record their entry listing without knowing
//! the container format.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Lists and extracts entries of a packaged file held in memory.
#[async_trait]
pub trait ArchiveReader: Send + Sync {
    /// Entry paths of every file in the archive, in archive order.
    ///
    /// Directory entries are not included.
    async fn list_entries(&self, data: Bytes) -> Result<Vec<String>>;

    /// Extract a single entry by its path, `Ok(None)` if absent.
    async fn extract_entry(&self, data: Bytes, entry: &str) -> Result<Option<Bytes>>;
}
