//! # Sync & Indexing Module
//!
//! Reconciles file stores against the metadata index.
//!
//! ## Overview
//!
//! This module manages:
//! - Drives: root-relative file stores over the platform file bridge
//! - Canonical addressing between drive paths and record identifiers
//! - Recursive discovery with opaque packages and archive entry listings
//! - Soft deletion of records whose files vanished
//! - Importing external files with content-aware deduplication
//! - Cancel-and-replace scheduling of full refreshes
//!
//! ## Components
//!
//! - **Drive** (`drive`): `Drive`, `DriveKind`, `RootRelativePath`
//! - **Addressing** (`addressing`): identifier encoding and decoding
//! - **Resolvers** (`resolvers`): destination/identifier resolvers and record processors
//! - **Classification** (`classify`): pure `File | OpaquePackage | Directory` predicate
//! - **Engine** (`engine`): full and scoped refresh passes
//! - **Import** (`import`): destination choice, dedup, upload, staging
//! - **State** (`state`): refresh state machine
//! - **Coordinator** (`coordinator`): serialization, cancellation, suspension

pub mod addressing;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod drive;
pub mod engine;
pub mod error;
pub mod import;
pub mod resolvers;
pub mod state;

#[cfg(test)]
mod test_support;

pub use addressing::{decode_identifier, default_identifier, identifier_for};
pub use classify::EntryKind;
pub use config::SyncConfig;
pub use coordinator::{RefreshOutcome, SyncCoordinator};
pub use drive::{Drive, DriveEntry, DriveKind, DriveTag, ListOptions, RootRelativePath};
pub use engine::{RefreshSummary, SyncEngine};
pub use error::{Result, SyncError};
pub use import::{Downloadable, ImportPipeline, ImportPlan};
pub use resolvers::{RecordProcessor, ResolverRegistry};
pub use state::RefreshState;
