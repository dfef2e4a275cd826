use thiserror::Error;

/// Everything that can go wrong between us and the SQLite file
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Invalid value in column {column}: {value}")]
    InvalidColumn { column: &'static str, value: String },
}
