// Stale-while-revalidate over the local store
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use nutriscout_api::Product;
use nutriscout_cache::ProductStore;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::catalog::CatalogSource;
use crate::Result;

/// Default listing refresh size
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Failed keys we remember before treating new failures as plain Idle
const MAX_TRACKED_KEYS: usize = 1024;

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// What a refresh is for. At most one refresh per key runs at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefreshKey {
    Product(String),
    Barcode(String),
    Listing { limit: u32, offset: u32 },
}

impl std::fmt::Display for RefreshKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshKey::Product(id) => write!(f, "product:{}", id),
            RefreshKey::Barcode(code) => write!(f, "barcode:{}", code),
            RefreshKey::Listing { limit, offset } => write!(f, "listing:{}+{}", offset, limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
    /// Last refresh failed. The next `get` for the key tries again.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    Started,
    /// `count` products were written to the store
    Completed { count: usize },
    Failed { reason: String },
}

/// Side-channel notification about a background refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshEvent {
    pub key: RefreshKey,
    pub status: RefreshStatus,
}

/// Serves products from the local store and refreshes them from the catalog
/// in the background
///
/// Every `get*` call returns a live view whose first value is whatever the
/// store holds right now (possibly nothing), then kicks off a refresh unless
/// one is already running for that key. A refresh that succeeds writes to the
/// store and every view of that data updates. One that fails is logged and
/// reported on the status channel; the view keeps showing the stale data and
/// nothing retries until the next `get`.
///
/// Store reads for the first value happen on the caller's thread. Refresh
/// tasks run on the runtime passed in, with store writes on its blocking pool.
pub struct CacheCoordinator {
    shared: Arc<Shared>,
    runtime: Handle,
    page_size: u32,
}

struct Shared {
    catalog: Arc<dyn CatalogSource>,
    store: Arc<dyn ProductStore>,
    /// Only Refreshing and Failed keys live here, absent means Idle
    states: Mutex<HashMap<RefreshKey, RefreshState>>,
    events: broadcast::Sender<RefreshEvent>,
}

impl CacheCoordinator {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        store: Arc<dyn ProductStore>,
        runtime: Handle,
    ) -> Self {
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                catalog,
                store,
                states: Mutex::new(HashMap::new()),
                events,
            }),
            runtime,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// How many products a listing refresh fetches
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Live view of one product by catalog id
    ///
    /// Absent until the first successful fetch if we've never seen it.
    pub fn get(&self, id: &str) -> Result<watch::Receiver<Option<Product>>> {
        let view = self.shared.store.observe_product(id)?;
        self.refresh(RefreshKey::Product(id.to_string()));
        Ok(view)
    }

    /// Live view of the product carrying this barcode
    pub fn get_by_barcode(&self, barcode: &str) -> Result<watch::Receiver<Option<Product>>> {
        let view = self.shared.store.observe_product_by_barcode(barcode)?;
        self.refresh(RefreshKey::Barcode(barcode.to_string()));
        Ok(view)
    }

    /// Live view of every stored product; refreshes the first listing page
    pub fn products(&self) -> Result<watch::Receiver<Vec<Product>>> {
        let view = self.shared.store.observe_all_products()?;
        self.refresh(RefreshKey::Listing {
            limit: self.page_size,
            offset: 0,
        });
        Ok(view)
    }

    /// Schedule a refresh for `key` unless one is already running
    ///
    /// Returns whether a new refresh was started. Never waits on the network.
    pub fn refresh(&self, key: RefreshKey) -> bool {
        {
            let mut states = self.shared.lock_states();
            if states.get(&key) == Some(&RefreshState::Refreshing) {
                debug!(key = %key, "Refresh already in flight");
                return false;
            }
            states.insert(key.clone(), RefreshState::Refreshing);
        }

        debug!(key = %key, "Scheduling refresh");
        self.shared.emit(&key, RefreshStatus::Started);

        let shared = Arc::clone(&self.shared);
        self.runtime.spawn(async move {
            shared.run_refresh(key).await;
        });

        true
    }

    pub fn state(&self, key: &RefreshKey) -> RefreshState {
        self.shared
            .lock_states()
            .get(key)
            .cloned()
            .unwrap_or(RefreshState::Idle)
    }

    /// Refresh progress for every key. Receivers that fall behind skip ahead.
    pub fn subscribe_status(&self) -> broadcast::Receiver<RefreshEvent> {
        self.shared.events.subscribe()
    }

    /// Catalog search, straight from the network and never cached
    ///
    /// Failures are logged and come back as no results.
    pub async fn search(&self, query: &str) -> Vec<Product> {
        match self.shared.catalog.search_products(query).await {
            Ok(products) => {
                info!(query, count = products.len(), "Search finished");
                products
            }
            Err(e) => {
                warn!(query, error = %e, "Search failed");
                Vec::new()
            }
        }
    }

    /// Healthier alternatives, straight from the network and never cached
    pub async fn alternatives(&self, id: &str) -> Vec<Product> {
        match self.shared.catalog.get_alternatives(id).await {
            Ok(products) => products,
            Err(e) => {
                warn!(id, error = %e, "Alternatives lookup failed");
                Vec::new()
            }
        }
    }
}

impl Shared {
    fn lock_states(&self) -> MutexGuard<'_, HashMap<RefreshKey, RefreshState>> {
        // The map is always left consistent, so a panic elsewhere doesn't invalidate it
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, key: &RefreshKey, status: RefreshStatus) {
        // No subscribers is fine
        let _ = self.events.send(RefreshEvent {
            key: key.clone(),
            status,
        });
    }

    async fn run_refresh(self: Arc<Self>, key: RefreshKey) {
        let outcome = self.fetch_and_store(&key).await;

        let status = {
            let mut states = self.lock_states();
            match outcome {
                Ok(count) => {
                    states.remove(&key);
                    info!(key = %key, count, "Refresh complete");
                    RefreshStatus::Completed { count }
                }
                Err(e) => {
                    let reason = e.to_string();
                    warn!(key = %key, error = %reason, "Refresh failed, keeping cached data");
                    if states.len() >= MAX_TRACKED_KEYS {
                        states.remove(&key);
                    } else {
                        states.insert(
                            key.clone(),
                            RefreshState::Failed {
                                reason: reason.clone(),
                            },
                        );
                    }
                    RefreshStatus::Failed { reason }
                }
            }
        };

        self.emit(&key, status);
    }

    async fn fetch_and_store(&self, key: &RefreshKey) -> Result<usize> {
        let products = match key {
            RefreshKey::Product(id) => vec![self.catalog.get_product_by_id(id).await?],
            RefreshKey::Barcode(code) => {
                let mut product = self.catalog.get_product_by_barcode(code).await?;
                // The barcode view reads back by the code we asked for
                product.barcode = Some(code.clone());
                vec![product]
            }
            RefreshKey::Listing { limit, offset } => {
                let page = self.catalog.list_products(*limit, *offset).await?;
                debug!(
                    key = %key,
                    returned = page.products.len(),
                    total = page.total,
                    "Catalog listing fetched"
                );
                page.products
            }
        };

        let count = products.len();
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.upsert_products(&products)).await??;

        Ok(count)
    }
}
