use nutriscout_api::CatalogError;
use nutriscout_cache::StoreError;
use thiserror::Error;

/// All the ways things can go wrong in NutriScout
#[derive(Error, Debug)]
pub enum Error {
    #[error("Catalog request failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Local store failed: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
