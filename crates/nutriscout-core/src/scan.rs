use std::sync::Arc;

use nutriscout_api::Product;
use nutriscout_cache::{ProductStore, ScanHistoryRecord, ScanSource};
use tracing::{info, warn};

use crate::catalog::CatalogSource;
use crate::history::HistoryTracker;
use crate::Result;

/// What a successful scan produced
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub product: Product,
    pub record: ScanHistoryRecord,
}

/// Barcode scan: look the product up, cache it, remember the scan
///
/// Unlike the coordinator this waits for the network, because the user is
/// standing there waiting for the answer. A failed lookup records nothing.
pub struct ScanService {
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn ProductStore>,
    history: HistoryTracker,
}

impl ScanService {
    pub fn new(catalog: Arc<dyn CatalogSource>, store: Arc<dyn ProductStore>) -> Self {
        let history = HistoryTracker::new(Arc::clone(&store));
        Self {
            catalog,
            store,
            history,
        }
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    pub async fn scan(&self, barcode: &str, source: ScanSource) -> Result<ScanOutcome> {
        let mut product = match self.catalog.get_product_by_barcode(barcode).await {
            Ok(product) => product,
            Err(e) => {
                warn!(barcode, error = %e, "Scan lookup failed");
                return Err(e.into());
            }
        };

        // Later barcode lookups hit the cache even when the catalog left it out
        product.barcode = Some(barcode.to_string());

        let store = Arc::clone(&self.store);
        let history = self.history.clone();
        let barcode = barcode.to_string();

        let outcome = tokio::task::spawn_blocking(move || -> Result<ScanOutcome> {
            store.upsert_product(&product)?;
            let record = history.record(&barcode, &product, source)?;
            Ok(ScanOutcome { product, record })
        })
        .await??;

        info!(
            barcode = %outcome.record.barcode,
            id = %outcome.product.id,
            score = outcome.record.snapshot.health_score,
            "Scanned product"
        );

        Ok(outcome)
    }
}
