use std::sync::Arc;

use nutriscout_api::Product;
use nutriscout_cache::{
    HistoryEntry, HistoryFilter, ProductStore, ScanHistoryRecord, ScanSnapshot, ScanSource,
};
use tokio::sync::watch;
use tracing::debug;

use crate::health::effective_score;
use crate::{Error, Result};

/// Scan history on top of the product store
///
/// Synchronous like the store underneath; async callers go through
/// `spawn_blocking`.
#[derive(Clone)]
pub struct HistoryTracker {
    store: Arc<dyn ProductStore>,
}

impl HistoryTracker {
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        Self { store }
    }

    /// What history remembers about a product at scan time
    pub fn snapshot_of(product: &Product) -> ScanSnapshot {
        ScanSnapshot {
            product_name: product.name.clone(),
            brand_name: product.brand.clone(),
            image_url: product.image_url.clone(),
            health_score: effective_score(product),
            nutri_score_grade: product.display_grade().map(str::to_string),
            is_organic: product.is_organic,
        }
    }

    /// Record a scan. Re-scanning a barcode refreshes its record in place and
    /// keeps the favorite flag.
    pub fn record(
        &self,
        barcode: &str,
        product: &Product,
        source: ScanSource,
    ) -> Result<ScanHistoryRecord> {
        let entry = HistoryEntry::new(barcode, Self::snapshot_of(product), source);
        let record = self.store.upsert_history(&entry)?;

        debug!(barcode, id = record.id, source = %source, "Scan recorded");
        Ok(record)
    }

    pub fn toggle_favorite(&self, id: i64, is_favorite: bool) -> Result<()> {
        if !self.store.set_favorite(id, is_favorite)? {
            return Err(Error::NotFound(format!("history record {}", id)));
        }
        debug!(id, is_favorite, "Favorite updated");
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        if !self.store.delete_history(id)? {
            return Err(Error::NotFound(format!("history record {}", id)));
        }
        Ok(())
    }

    /// Drop everything that isn't a favorite
    pub fn prune(&self) -> Result<usize> {
        let removed = self.store.prune_non_favorites()?;
        debug!(removed, "Pruned scan history");
        Ok(removed)
    }

    pub fn list(&self, filter: HistoryFilter) -> Result<Vec<ScanHistoryRecord>> {
        Ok(self.store.list_history(filter)?)
    }

    pub fn find(&self, barcode: &str) -> Result<Option<ScanHistoryRecord>> {
        Ok(self.store.get_history_by_barcode(barcode)?)
    }

    pub fn observe(&self, filter: HistoryFilter) -> Result<watch::Receiver<Vec<ScanHistoryRecord>>> {
        Ok(self.store.observe_history(filter)?)
    }
}
