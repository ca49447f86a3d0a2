use thiserror::Error;

/// Errors from the local option database.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database not initialized")]
    NotInitialized,

    #[error("Failed to open database: {0}")]
    Open(#[source] rusqlite::Error),

    #[error("Database version {found} is newer than supported version {expected}")]
    VersionMismatch { found: i32, expected: i32 },

    #[error("Database operation failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create database directory: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the local key-value storage.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}
