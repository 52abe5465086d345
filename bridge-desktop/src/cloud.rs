//! Cloud containers mirrored into local folders.
//!
//! Desktop sync clients keep a cloud container in a plain directory. Each
//! container identifier maps to `<base>/<identifier>`; a container whose
//! folder is missing is reported as unreachable rather than created.

use async_trait::async_trait;
use bridge_traits::{error::Result, storage::CloudContainerProvider};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Resolves container identifiers to folders under a base directory.
#[derive(Debug, Clone)]
pub struct DirectoryCloudContainers {
    base: PathBuf,
    overrides: HashMap<String, PathBuf>,
}

impl DirectoryCloudContainers {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            overrides: HashMap::new(),
        }
    }

    /// Pin a container identifier to an explicit folder.
    pub fn with_container(mut self, container_id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.overrides.insert(container_id.into(), root.into());
        self
    }

    fn folder_for(&self, container_id: &str) -> Option<PathBuf> {
        if let Some(root) = self.overrides.get(container_id) {
            return Some(root.clone());
        }
        // Identifiers become a single path component.
        let sanitized: String = container_id
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == ':' { '~' } else { c })
            .collect();
        if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
            return None;
        }
        Some(self.base.join(sanitized))
    }
}

#[async_trait]
impl CloudContainerProvider for DirectoryCloudContainers {
    async fn container_root(&self, container_id: &str) -> Result<Option<PathBuf>> {
        let Some(folder) = self.folder_for(container_id) else {
            return Ok(None);
        };
        let present = tokio::fs::try_exists(&folder).await?;
        debug!(container = container_id, present, "Resolved cloud container");
        Ok(present.then_some(folder))
    }
}
