use nutriscout_api::Product;
use tokio::sync::watch;

use crate::history::{HistoryEntry, HistoryFilter, ScanHistoryRecord};
use crate::Result;

/// Local persistence for products and scan history
///
/// Calls are synchronous and quick, but they do touch disk. Async callers
/// should run them on a blocking thread rather than on whatever drives the UI.
///
/// Observers are `watch` receivers: they hold the current value from the
/// moment they are created and see a new value after every matching write.
/// Dropping a receiver stops delivery to it and nothing else.
pub trait ProductStore: Send + Sync {
    /// Insert or fully replace by `id`
    fn upsert_product(&self, product: &Product) -> Result<()>;

    /// Upsert a batch; every product is written before this returns
    fn upsert_products(&self, products: &[Product]) -> Result<()>;

    fn get_product(&self, id: &str) -> Result<Option<Product>>;

    fn get_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>>;

    fn observe_product(&self, id: &str) -> Result<watch::Receiver<Option<Product>>>;

    fn observe_product_by_barcode(&self, barcode: &str)
        -> Result<watch::Receiver<Option<Product>>>;

    /// All products, in the order they were first stored
    fn observe_all_products(&self) -> Result<watch::Receiver<Vec<Product>>>;

    /// Upsert by barcode. An existing record gets the new snapshot, source and
    /// timestamp; its favorite flag only changes if the entry sets one.
    fn upsert_history(&self, entry: &HistoryEntry) -> Result<ScanHistoryRecord>;

    fn get_history_by_barcode(&self, barcode: &str) -> Result<Option<ScanHistoryRecord>>;

    /// Newest scan first
    fn list_history(&self, filter: HistoryFilter) -> Result<Vec<ScanHistoryRecord>>;

    /// Returns false when no record has that id
    fn set_favorite(&self, id: i64, is_favorite: bool) -> Result<bool>;

    fn delete_history(&self, id: i64) -> Result<bool>;

    /// Delete every non-favorite record, returns how many went
    fn prune_non_favorites(&self) -> Result<usize>;

    fn observe_history(
        &self,
        filter: HistoryFilter,
    ) -> Result<watch::Receiver<Vec<ScanHistoryRecord>>>;
}
