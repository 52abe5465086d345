//! Repository layer over the metadata index.

pub mod content;

pub use content::{ContentRecordRepository, SqliteContentRecordRepository};
