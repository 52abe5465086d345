//! Zip-based archive reader.
//!
//! Covers the zip container family (`.zip`, `.epub`, `.cbz`). Decompression
//! runs on the blocking pool so large packages do not stall the executor.

use async_trait::async_trait;
use bridge_traits::{
    archive::ArchiveReader,
    error::{BridgeError, Result},
};
use bytes::Bytes;
use std::io::{Cursor, Read};
use tracing::debug;

/// `ArchiveReader` backed by the `zip` crate.
#[derive(Debug, Default, Clone)]
pub struct ZipArchiveReader;

impl ZipArchiveReader {
    pub fn new() -> Self {
        Self
    }

    fn open(data: Bytes) -> Result<zip::ZipArchive<Cursor<Bytes>>> {
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| BridgeError::Archive(e.to_string()))
    }
}

fn join_error(e: core_async::task::JoinError) -> BridgeError {
    BridgeError::OperationFailed(format!("archive task failed: {e}"))
}

#[async_trait]
impl ArchiveReader for ZipArchiveReader {
    async fn list_entries(&self, data: Bytes) -> Result<Vec<String>> {
        let entries = core_async::task::spawn_blocking(move || -> Result<Vec<String>> {
            let mut archive = Self::open(data)?;
            let mut entries = Vec::with_capacity(archive.len());
            for index in 0..archive.len() {
                let file = archive
                    .by_index(index)
                    .map_err(|e| BridgeError::Archive(e.to_string()))?;
                if !file.is_dir() {
                    entries.push(file.name().to_string());
                }
            }
            Ok(entries)
        })
        .await
        .map_err(join_error)??;

        debug!(count = entries.len(), "Listed archive entries");
        Ok(entries)
    }

    async fn extract_entry(&self, data: Bytes, entry: &str) -> Result<Option<Bytes>> {
        let entry = entry.to_string();
        core_async::task::spawn_blocking(move || -> Result<Option<Bytes>> {
            let mut archive = Self::open(data)?;
            let mut file = match archive.by_name(&entry) {
                Ok(file) => file,
                Err(zip::result::ZipError::FileNotFound) => return Ok(None),
                Err(e) => return Err(BridgeError::Archive(e.to_string())),
            };
            let mut buf = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut buf)?;
            Ok(Some(Bytes::from(buf)))
        })
        .await
        .map_err(join_error)?
    }
}
