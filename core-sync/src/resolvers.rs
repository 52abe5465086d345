//! # Resolver Registry
//!
//! Caller-constructed hooks consulted by scanning and import:
//!
//! - **Destination resolvers** `(source file) -> RootRelativePath?` choose
//!   where an imported file lands (default: the drive root).
//! - **Identifier resolvers** `(file, default identifier) -> identifier?`
//!   rewrite canonical identifiers (default: unchanged).
//! - **Record processors** receive the identifiers touched by each pass.
//!
//! Resolvers run in registration order and the first `Some` wins.
//!
//! ```rust,ignore
//! let registry = ResolverRegistry::new()
//!     .with_destination_resolver(|source: &Path| {
//!         source.extension()
//!             .filter(|ext| *ext == "opml")
//!             .map(|_| RootRelativePath::new("Feeds").unwrap())
//!     })
//!     .with_processor(Arc::new(EpubMetadataExtractor::new(pool)));
//! ```

use crate::drive::RootRelativePath;
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

pub type DestinationResolver = Arc<dyn Fn(&Path) -> Option<RootRelativePath> + Send + Sync>;
pub type IdentifierResolver = Arc<dyn Fn(&Path, &str) -> Option<String> + Send + Sync>;

/// Post-discovery hook.
///
/// Receives plain identifiers; implementations re-read whatever they need
/// through their own index handle.
#[async_trait]
pub trait RecordProcessor: Send + Sync {
    fn name(&self) -> &str;

    async fn process(&self, identifiers: &[String]) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct ResolverRegistry {
    destination: Vec<DestinationResolver>,
    identifier: Vec<IdentifierResolver>,
    processors: Vec<Arc<dyn RecordProcessor>>,
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("destination_resolvers", &self.destination.len())
            .field("identifier_resolvers", &self.identifier.len())
            .field(
                "processors",
                &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_destination_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Path) -> Option<RootRelativePath> + Send + Sync + 'static,
    {
        self.destination.push(Arc::new(resolver));
        self
    }

    pub fn with_identifier_resolver<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&Path, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.identifier.push(Arc::new(resolver));
        self
    }

    pub fn with_processor(mut self, processor: Arc<dyn RecordProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Destination directory for an imported `source`.
    pub fn resolve_destination(&self, source: &Path) -> RootRelativePath {
        self.destination
            .iter()
            .find_map(|resolve| resolve(source))
            .unwrap_or_else(RootRelativePath::root)
    }

    /// Identifier for `file`, falling back to `default`.
    pub fn resolve_identifier(&self, file: &Path, default: &str) -> String {
        self.identifier
            .iter()
            .find_map(|resolve| resolve(file, default))
            .unwrap_or_else(|| default.to_string())
    }

    /// Hand `identifiers` to every processor. Failures are logged and skipped.
    pub async fn run_processors(&self, identifiers: &[String]) {
        if identifiers.is_empty() {
            return;
        }
        for processor in &self.processors {
            if let Err(e) = processor.process(identifiers).await {
                warn!(
                    processor = processor.name(),
                    count = identifiers.len(),
                    error = %e,
                    "Record processor failed"
                );
            }
        }
    }
}
