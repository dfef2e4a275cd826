use async_trait::async_trait;
use nutriscout_api::{CatalogClient, CatalogError, Product, ProductPage};

/// Trait for the remote catalog - makes testing easier and keeps things flexible
///
/// The HTTP client implements it; tests swap in mocks and fakes. Each call
/// completes once, success or failure, and never retries on its own.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn list_products(&self, limit: u32, offset: u32) -> Result<ProductPage, CatalogError>;
    async fn get_product_by_id(&self, id: &str) -> Result<Product, CatalogError>;
    async fn get_product_by_barcode(&self, barcode: &str) -> Result<Product, CatalogError>;
    async fn get_alternatives(&self, id: &str) -> Result<Vec<Product>, CatalogError>;
    async fn search_products(&self, query: &str) -> Result<Vec<Product>, CatalogError>;
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn list_products(&self, limit: u32, offset: u32) -> Result<ProductPage, CatalogError> {
        CatalogClient::list_products(self, limit, offset).await
    }

    async fn get_product_by_id(&self, id: &str) -> Result<Product, CatalogError> {
        CatalogClient::get_product_by_id(self, id).await
    }

    async fn get_product_by_barcode(&self, barcode: &str) -> Result<Product, CatalogError> {
        CatalogClient::get_product_by_barcode(self, barcode).await
    }

    async fn get_alternatives(&self, id: &str) -> Result<Vec<Product>, CatalogError> {
        CatalogClient::get_alternatives(self, id).await
    }

    async fn search_products(&self, query: &str) -> Result<Vec<Product>, CatalogError> {
        CatalogClient::search_products(self, query).await
    }
}
