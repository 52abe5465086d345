//! Workspace placeholder crate.
//!
//! Exposes the feature flags that map onto the workspace crates so host
//! applications can depend on `reader-sync-workspace` and pick a bridge set
//! without wiring each crate individually. The content service itself lives
//! in `core-service`.

#[cfg(feature = "desktop-shims")]
pub use core_service::{ContentService, CoreError};
