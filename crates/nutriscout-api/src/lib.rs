// Product catalog client and the product models it speaks
pub mod catalog;
pub mod models;

// Re-export common types
pub use catalog::{CatalogClient, CatalogError};
pub use models::{Additive, Nutrition, Product, ProductPage, RiskLevel, ScoreCategory};
