//! # Content Library Module
//!
//! Owns the metadata index: one persisted content record per discoverable
//! file, keyed by its canonical identifier.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite connection pool, pragmas and embedded migrations ([`db`])
//! - The [`ContentRecord`](models::ContentRecord) model and its filters
//! - Repository access with batched, transactional writes ([`repositories`])
//!
//! Records are never hard-deleted. Files that disappear are soft-deleted and
//! come back to life when rediscovered.

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use models::{ContentRecord, RecordFilter};
pub use repositories::{ContentRecordRepository, SqliteContentRecordRepository};
