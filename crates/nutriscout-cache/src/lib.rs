// SQLite-backed local store for products and scan history
// Serves the last-known-good view while the catalog is slow or offline

pub mod error;
pub mod history;
pub mod sqlite;
pub mod store;
mod watchers;

pub use error::StoreError;
pub use history::{HistoryEntry, HistoryFilter, ScanHistoryRecord, ScanSnapshot, ScanSource};
pub use sqlite::SqliteStore;
pub use store::ProductStore;

pub type Result<T> = std::result::Result<T, StoreError>;
