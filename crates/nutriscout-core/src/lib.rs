// Core business logic lives here - scoring, caching policy, scan history
pub mod catalog;
pub mod color;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod history;
pub mod indicators;
pub mod scan;

pub use catalog::CatalogSource;
pub use color::Rgb;
pub use config::Config;
pub use coordinator::{CacheCoordinator, RefreshEvent, RefreshKey, RefreshState, RefreshStatus};
pub use error::Error;
pub use health::{Classification, HealthCalculator, HealthCategory, ScoreBreakdown};
pub use history::HistoryTracker;
pub use indicators::{NutriGrade, Nutrient};
pub use scan::{ScanOutcome, ScanService};

pub use nutriscout_api::{Additive, Nutrition, Product, ProductPage, RiskLevel, ScoreCategory};
pub use nutriscout_cache::{
    HistoryFilter, ProductStore, ScanHistoryRecord, ScanSnapshot, ScanSource, SqliteStore,
};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
