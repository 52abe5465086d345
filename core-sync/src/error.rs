use bridge_traits::error::BridgeError;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Drive unavailable: {0}")]
    DriveUnavailable(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Failed to read archive {path}: {message}")]
    ArchiveReadFailure { path: String, message: String },

    #[error("Refresh cancelled")]
    Cancelled,

    #[error("Refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyncError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }

    pub fn is_drive_unavailable(&self) -> bool {
        matches!(self, SyncError::DriveUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
