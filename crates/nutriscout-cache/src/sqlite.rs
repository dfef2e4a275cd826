use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use nutriscout_api::{Nutrition, Product, ScoreCategory};
use once_cell::sync::OnceCell;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::history::{HistoryEntry, HistoryFilter, ScanHistoryRecord, ScanSnapshot, ScanSource};
use crate::store::ProductStore;
use crate::watchers::Watchers;
use crate::{Result, StoreError};

static SHARED: OnceCell<Arc<SqliteStore>> = OnceCell::new();

const PRODUCT_COLUMNS: &str = "id, barcode, name, brand, image_url, ingredients, score,
    calculated_score, is_organic, nutri_score, nutri_score_grade,
    calories, sugar, fat, saturated_fat, salt, protein, fiber, serving_size, serving_unit,
    additives, score_category";

const HISTORY_COLUMNS: &str = "id, barcode, product_name, brand_name, image_url, health_score,
    nutri_score_grade, is_organic, is_favorite, scanned_at, source";

/// Product and scan-history store on top of SQLite
///
/// SQLite was chosen because:
/// - Zero-config embedded database
/// - Survives restarts, so the last good view is there before the network is
/// - Doesn't require a separate process
///
/// One mutex guards the connection and the live channels together, so a
/// write and the notification it causes can't be reordered with another write.
pub struct SqliteStore {
    inner: Mutex<Inner>,
}

struct Inner {
    conn: Connection,
    by_id: Watchers<String, Option<Product>>,
    by_barcode: Watchers<String, Option<Product>>,
    all_products: Watchers<(), Vec<Product>>,
    history: Watchers<HistoryFilter, Vec<ScanHistoryRecord>>,
}

impl SqliteStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        info!("Opening product store at {:?}", db_path);

        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::from_connection(conn)
    }

    /// In-memory store, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory product store");
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// The process-wide store handle
    ///
    /// The first call opens the database; later calls return the same handle
    /// and ignore `db_path`.
    pub fn shared(db_path: impl AsRef<Path>) -> Result<Arc<Self>> {
        SHARED
            .get_or_try_init(|| Self::open(db_path).map(Arc::new))
            .cloned()
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Initialize schema on first run
        Self::init_schema(&conn)?;

        Ok(Self {
            inner: Mutex::new(Inner {
                conn,
                by_id: Watchers::new(),
                by_barcode: Watchers::new(),
                all_products: Watchers::new(),
                history: Watchers::new(),
            }),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                barcode TEXT,
                name TEXT,
                brand TEXT,
                image_url TEXT,
                ingredients TEXT,
                score REAL NOT NULL DEFAULT 0,
                calculated_score INTEGER NOT NULL DEFAULT 0,
                is_organic INTEGER NOT NULL DEFAULT 0,
                nutri_score TEXT,
                nutri_score_grade TEXT,
                calories REAL,
                sugar REAL,
                fat REAL,
                saturated_fat REAL,
                salt REAL,
                protein REAL,
                fiber REAL,
                serving_size REAL,
                serving_unit TEXT,
                additives TEXT NOT NULL DEFAULT '[]',
                score_category TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_products_barcode ON products(barcode);

            CREATE TABLE IF NOT EXISTS scan_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                barcode TEXT NOT NULL,
                product_name TEXT,
                brand_name TEXT,
                image_url TEXT,
                health_score INTEGER NOT NULL DEFAULT 0,
                nutri_score_grade TEXT,
                is_organic INTEGER NOT NULL DEFAULT 0,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                scanned_at INTEGER NOT NULL,
                source TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_scan_history_barcode ON scan_history(barcode);
            CREATE INDEX IF NOT EXISTS idx_scan_history_favorite_time
                ON scan_history(is_favorite, scanned_at DESC);",
        )?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl Inner {
    fn write_product(conn: &Connection, product: &Product) -> Result<()> {
        let nutrition = product.nutrition.as_ref();
        let additives = serde_json::to_string(&product.additives)?;
        let score_category = product
            .score_category
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        // ON CONFLICT keeps the rowid, so listing order stays stable across refreshes
        conn.execute(
            &format!(
                "INSERT INTO products ({}) VALUES
                    (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                     ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22)
                 ON CONFLICT(id) DO UPDATE SET
                    barcode = excluded.barcode,
                    name = excluded.name,
                    brand = excluded.brand,
                    image_url = excluded.image_url,
                    ingredients = excluded.ingredients,
                    score = excluded.score,
                    calculated_score = excluded.calculated_score,
                    is_organic = excluded.is_organic,
                    nutri_score = excluded.nutri_score,
                    nutri_score_grade = excluded.nutri_score_grade,
                    calories = excluded.calories,
                    sugar = excluded.sugar,
                    fat = excluded.fat,
                    saturated_fat = excluded.saturated_fat,
                    salt = excluded.salt,
                    protein = excluded.protein,
                    fiber = excluded.fiber,
                    serving_size = excluded.serving_size,
                    serving_unit = excluded.serving_unit,
                    additives = excluded.additives,
                    score_category = excluded.score_category",
                PRODUCT_COLUMNS
            ),
            params![
                product.id,
                product.barcode,
                product.name,
                product.brand,
                product.image_url,
                product.ingredients,
                product.score as f64,
                product.calculated_score,
                product.is_organic,
                product.nutri_score,
                product.nutri_score_grade,
                nutrition.map(|n| n.calories),
                nutrition.map(|n| n.sugar),
                nutrition.map(|n| n.fat),
                nutrition.map(|n| n.saturated_fat),
                nutrition.map(|n| n.salt),
                nutrition.map(|n| n.protein),
                nutrition.map(|n| n.fiber),
                nutrition.map(|n| n.serving_size),
                nutrition.and_then(|n| n.serving_unit.clone()),
                additives,
                score_category,
            ],
        )?;

        Ok(())
    }

    fn product(conn: &Connection, id: &str) -> Result<Option<Product>> {
        conn.query_row(
            &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS),
            params![id],
            ProductRow::from_row,
        )
        .optional()?
        .map(ProductRow::into_product)
        .transpose()
    }

    fn product_by_barcode(conn: &Connection, barcode: &str) -> Result<Option<Product>> {
        conn.query_row(
            &format!(
                "SELECT {} FROM products WHERE barcode = ?1 ORDER BY rowid LIMIT 1",
                PRODUCT_COLUMNS
            ),
            params![barcode],
            ProductRow::from_row,
        )
        .optional()?
        .map(ProductRow::into_product)
        .transpose()
    }

    fn all_products(conn: &Connection) -> Result<Vec<Product>> {
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM products ORDER BY rowid", PRODUCT_COLUMNS))?;
        let rows = stmt
            .query_map([], ProductRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter().map(ProductRow::into_product).collect()
    }

    /// Push fresh values to everyone watching products touched by a write
    ///
    /// The write is already committed, so a failed re-read only costs the
    /// observers this update.
    fn publish_products(&mut self, written: &[Product]) {
        if let Err(e) = self.try_publish_products(written) {
            warn!(error = %e, "Failed to notify product observers");
        }
    }

    fn try_publish_products(&mut self, written: &[Product]) -> Result<()> {
        for product in written {
            self.by_id.publish(&product.id, Some(product.clone()));
        }

        // A barcode can move between products, so re-read every watched one
        for barcode in self.by_barcode.watched_keys() {
            let current = Self::product_by_barcode(&self.conn, &barcode)?;
            self.by_barcode.publish(&barcode, current);
        }

        if !self.all_products.watched_keys().is_empty() {
            let all = Self::all_products(&self.conn)?;
            self.all_products.publish(&(), all);
        }

        Ok(())
    }

    fn history_by_barcode(conn: &Connection, barcode: &str) -> Result<Option<ScanHistoryRecord>> {
        conn.query_row(
            &format!(
                "SELECT {} FROM scan_history WHERE barcode = ?1 ORDER BY id LIMIT 1",
                HISTORY_COLUMNS
            ),
            params![barcode],
            history_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn history_by_id(conn: &Connection, id: i64) -> Result<Option<ScanHistoryRecord>> {
        conn.query_row(
            &format!("SELECT {} FROM scan_history WHERE id = ?1", HISTORY_COLUMNS),
            params![id],
            history_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    fn history(conn: &Connection, filter: HistoryFilter) -> Result<Vec<ScanHistoryRecord>> {
        let sql = match filter {
            HistoryFilter::All => format!(
                "SELECT {} FROM scan_history ORDER BY scanned_at DESC, id DESC",
                HISTORY_COLUMNS
            ),
            HistoryFilter::FavoritesOnly => format!(
                "SELECT {} FROM scan_history WHERE is_favorite = 1
                 ORDER BY scanned_at DESC, id DESC",
                HISTORY_COLUMNS
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], history_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn publish_history(&mut self) {
        if let Err(e) = self.try_publish_history() {
            warn!(error = %e, "Failed to notify history observers");
        }
    }

    fn try_publish_history(&mut self) -> Result<()> {
        for filter in self.history.watched_keys() {
            let records = Self::history(&self.conn, filter)?;
            self.history.publish(&filter, records);
        }
        Ok(())
    }
}

impl ProductStore for SqliteStore {
    fn upsert_product(&self, product: &Product) -> Result<()> {
        let mut inner = self.lock()?;
        Inner::write_product(&inner.conn, product)?;
        debug!(id = %product.id, "Upserted product");

        inner.publish_products(std::slice::from_ref(product));
        Ok(())
    }

    fn upsert_products(&self, products: &[Product]) -> Result<()> {
        let mut inner = self.lock()?;

        let tx = inner.conn.transaction()?;
        for product in products {
            Inner::write_product(&tx, product)?;
        }
        tx.commit()?;
        debug!(count = products.len(), "Upserted product batch");

        inner.publish_products(products);
        Ok(())
    }

    fn get_product(&self, id: &str) -> Result<Option<Product>> {
        let inner = self.lock()?;
        Inner::product(&inner.conn, id)
    }

    fn get_product_by_barcode(&self, barcode: &str) -> Result<Option<Product>> {
        let inner = self.lock()?;
        Inner::product_by_barcode(&inner.conn, barcode)
    }

    fn observe_product(&self, id: &str) -> Result<watch::Receiver<Option<Product>>> {
        let mut inner = self.lock()?;
        let Inner { conn, by_id, .. } = &mut *inner;
        by_id.subscribe(id.to_string(), || Inner::product(conn, id))
    }

    fn observe_product_by_barcode(
        &self,
        barcode: &str,
    ) -> Result<watch::Receiver<Option<Product>>> {
        let mut inner = self.lock()?;
        let Inner {
            conn, by_barcode, ..
        } = &mut *inner;
        by_barcode.subscribe(barcode.to_string(), || {
            Inner::product_by_barcode(conn, barcode)
        })
    }

    fn observe_all_products(&self) -> Result<watch::Receiver<Vec<Product>>> {
        let mut inner = self.lock()?;
        let Inner {
            conn, all_products, ..
        } = &mut *inner;
        all_products.subscribe((), || Inner::all_products(conn))
    }

    fn upsert_history(&self, entry: &HistoryEntry) -> Result<ScanHistoryRecord> {
        let mut inner = self.lock()?;

        let tx = inner.conn.transaction()?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM scan_history WHERE barcode = ?1 ORDER BY id LIMIT 1",
                params![entry.barcode],
                |row| row.get(0),
            )
            .optional()?;

        let snapshot = &entry.snapshot;
        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE scan_history SET
                        product_name = ?2,
                        brand_name = ?3,
                        image_url = ?4,
                        health_score = ?5,
                        nutri_score_grade = ?6,
                        is_organic = ?7,
                        is_favorite = COALESCE(?8, is_favorite),
                        scanned_at = ?9,
                        source = ?10
                     WHERE id = ?1",
                    params![
                        id,
                        snapshot.product_name,
                        snapshot.brand_name,
                        snapshot.image_url,
                        snapshot.health_score,
                        snapshot.nutri_score_grade,
                        snapshot.is_organic,
                        entry.is_favorite,
                        entry.scanned_at.timestamp_millis(),
                        entry.source.as_str(),
                    ],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO scan_history
                        (barcode, product_name, brand_name, image_url, health_score,
                         nutri_score_grade, is_organic, is_favorite, scanned_at, source)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    params![
                        entry.barcode,
                        snapshot.product_name,
                        snapshot.brand_name,
                        snapshot.image_url,
                        snapshot.health_score,
                        snapshot.nutri_score_grade,
                        snapshot.is_organic,
                        entry.is_favorite.unwrap_or(false),
                        entry.scanned_at.timestamp_millis(),
                        entry.source.as_str(),
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };

        let record = Inner::history_by_id(&tx, id)?.ok_or_else(|| StoreError::InvalidColumn {
            column: "id",
            value: id.to_string(),
        })?;
        tx.commit()?;

        debug!(barcode = %entry.barcode, id, replaced = existing.is_some(), "Recorded scan");
        inner.publish_history();
        Ok(record)
    }

    fn get_history_by_barcode(&self, barcode: &str) -> Result<Option<ScanHistoryRecord>> {
        let inner = self.lock()?;
        Inner::history_by_barcode(&inner.conn, barcode)
    }

    fn list_history(&self, filter: HistoryFilter) -> Result<Vec<ScanHistoryRecord>> {
        let inner = self.lock()?;
        Inner::history(&inner.conn, filter)
    }

    fn set_favorite(&self, id: i64, is_favorite: bool) -> Result<bool> {
        let mut inner = self.lock()?;
        let changed = inner.conn.execute(
            "UPDATE scan_history SET is_favorite = ?2 WHERE id = ?1",
            params![id, is_favorite],
        )?;

        if changed > 0 {
            inner.publish_history();
        }
        Ok(changed > 0)
    }

    fn delete_history(&self, id: i64) -> Result<bool> {
        let mut inner = self.lock()?;
        let deleted = inner
            .conn
            .execute("DELETE FROM scan_history WHERE id = ?1", params![id])?;

        if deleted > 0 {
            inner.publish_history();
        }
        Ok(deleted > 0)
    }

    fn prune_non_favorites(&self) -> Result<usize> {
        let mut inner = self.lock()?;
        let deleted = inner
            .conn
            .execute("DELETE FROM scan_history WHERE is_favorite = 0", [])?;

        info!(deleted, "Pruned non-favorite history");
        if deleted > 0 {
            inner.publish_history();
        }
        Ok(deleted)
    }

    fn observe_history(
        &self,
        filter: HistoryFilter,
    ) -> Result<watch::Receiver<Vec<ScanHistoryRecord>>> {
        let mut inner = self.lock()?;
        let Inner { conn, history, .. } = &mut *inner;
        history.subscribe(filter, || Inner::history(conn, filter))
    }
}

/// Raw products row, JSON columns still unparsed
struct ProductRow {
    product: Product,
    additives: String,
    score_category: Option<String>,
}

impl ProductRow {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let calories: Option<f64> = row.get("calories")?;
        let nutrition = match calories {
            Some(calories) => Some(Nutrition {
                calories,
                sugar: row.get::<_, Option<f64>>("sugar")?.unwrap_or_default(),
                fat: row.get::<_, Option<f64>>("fat")?.unwrap_or_default(),
                saturated_fat: row.get::<_, Option<f64>>("saturated_fat")?.unwrap_or_default(),
                salt: row.get::<_, Option<f64>>("salt")?.unwrap_or_default(),
                protein: row.get::<_, Option<f64>>("protein")?.unwrap_or_default(),
                fiber: row.get::<_, Option<f64>>("fiber")?.unwrap_or_default(),
                serving_size: row.get::<_, Option<f64>>("serving_size")?.unwrap_or_default(),
                serving_unit: row.get("serving_unit")?,
            }),
            None => None,
        };

        let score: f64 = row.get("score")?;

        Ok(Self {
            product: Product {
                id: row.get("id")?,
                barcode: row.get("barcode")?,
                name: row.get("name")?,
                brand: row.get("brand")?,
                image_url: row.get("image_url")?,
                ingredients: row.get("ingredients")?,
                score: score as f32,
                calculated_score: row.get("calculated_score")?,
                is_organic: row.get("is_organic")?,
                nutri_score: row.get("nutri_score")?,
                nutri_score_grade: row.get("nutri_score_grade")?,
                nutrition,
                additives: Vec::new(),
                score_category: None,
            },
            additives: row.get("additives")?,
            score_category: row.get("score_category")?,
        })
    }

    fn into_product(self) -> Result<Product> {
        let mut product = self.product;
        product.additives = serde_json::from_str(&self.additives)?;
        product.score_category = self
            .score_category
            .as_deref()
            .map(serde_json::from_str::<ScoreCategory>)
            .transpose()?;
        Ok(product)
    }
}

fn history_from_row(row: &Row) -> rusqlite::Result<ScanHistoryRecord> {
    let scanned_at_ms: i64 = row.get("scanned_at")?;
    let source: String = row.get("source")?;

    let scanned_at = DateTime::<Utc>::from_timestamp_millis(scanned_at_ms)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(9, scanned_at_ms))?;
    let source = ScanSource::parse(&source).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            rusqlite::types::Type::Text,
            format!("unknown scan source: {}", source).into(),
        )
    })?;

    Ok(ScanHistoryRecord {
        id: row.get("id")?,
        barcode: row.get("barcode")?,
        snapshot: ScanSnapshot {
            product_name: row.get("product_name")?,
            brand_name: row.get("brand_name")?,
            image_url: row.get("image_url")?,
            health_score: row.get("health_score")?,
            nutri_score_grade: row.get("nutri_score_grade")?,
            is_organic: row.get("is_organic")?,
        },
        is_favorite: row.get("is_favorite")?,
        scanned_at,
        source,
    })
}
