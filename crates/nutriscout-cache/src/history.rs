use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a scanned product came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ScanSource {
    /// Our own catalog
    Local,
    /// Imported from Open Food Facts
    OpenFoodFacts,
}

impl ScanSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanSource::Local => "Local",
            ScanSource::OpenFoodFacts => "OpenFoodFacts",
        }
    }

    /// Case-insensitive, tolerates the "open-food-facts" spelling
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(|c: char| c == '-' || c == '_' || c == ' ', "");

        match normalized.as_str() {
            "local" => Some(ScanSource::Local),
            "openfoodfacts" | "off" => Some(ScanSource::OpenFoodFacts),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Denormalized display fields copied from the product at scan time
///
/// History has to render without the product row, so everything the list
/// shows lives here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScanSnapshot {
    pub product_name: Option<String>,
    pub brand_name: Option<String>,
    pub image_url: Option<String>,
    pub health_score: i32,
    pub nutri_score_grade: Option<String>,
    pub is_organic: bool,
}

/// A write into scan history, keyed by barcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub barcode: String,
    pub snapshot: ScanSnapshot,
    pub source: ScanSource,
    pub scanned_at: DateTime<Utc>,
    /// `None` keeps whatever favorite flag an existing record has
    pub is_favorite: Option<bool>,
}

impl HistoryEntry {
    pub fn new(barcode: impl Into<String>, snapshot: ScanSnapshot, source: ScanSource) -> Self {
        Self {
            barcode: barcode.into(),
            snapshot,
            source,
            scanned_at: Utc::now(),
            is_favorite: None,
        }
    }
}

/// One stored scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanHistoryRecord {
    pub id: i64,
    pub barcode: String,
    #[serde(flatten)]
    pub snapshot: ScanSnapshot,
    pub is_favorite: bool,
    pub scanned_at: DateTime<Utc>,
    pub source: ScanSource,
}

/// Which history records a listing includes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum HistoryFilter {
    #[default]
    All,
    FavoritesOnly,
}
