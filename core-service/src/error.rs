use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

impl CoreError {
    /// Whether the error names an identifier that could not be decoded.
    pub fn is_invalid_identifier(&self) -> bool {
        matches!(
            self,
            CoreError::Sync(core_sync::SyncError::InvalidIdentifier(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
