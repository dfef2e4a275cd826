use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::models::{Product, ProductPage};

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// Network unreachable, connection reset, timeout
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Catalog returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Malformed catalog response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl CatalogError {
    /// True when the request never got a usable answer from the catalog
    pub fn is_transport(&self) -> bool {
        matches!(self, CatalogError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// HTTP client for the product catalog service
///
/// Every call completes exactly once, success or failure. There is no retry
/// in here on purpose: the cache layer decides when to ask again.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("NutriScout/0.1.0"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One page of the product listing
    pub async fn list_products(&self, limit: u32, offset: u32) -> Result<ProductPage> {
        let url = format!("{}/products", self.base_url);
        let request = self.client.get(&url).query(&[
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
        ]);

        self.fetch(request, "product listing").await
    }

    pub async fn get_product_by_id(&self, id: &str) -> Result<Product> {
        let url = format!("{}/products/{}", self.base_url, urlencoding::encode(id));
        self.fetch(self.client.get(&url), id).await
    }

    pub async fn get_product_by_barcode(&self, barcode: &str) -> Result<Product> {
        let url = format!(
            "{}/products/barcode/{}",
            self.base_url,
            urlencoding::encode(barcode)
        );
        self.fetch(self.client.get(&url), barcode).await
    }

    /// Healthier products in the same category, best first
    pub async fn get_alternatives(&self, id: &str) -> Result<Vec<Product>> {
        let url = format!(
            "{}/products/{}/alternatives",
            self.base_url,
            urlencoding::encode(id)
        );
        self.fetch(self.client.get(&url), id).await
    }

    /// Name/brand search
    pub async fn search_products(&self, query: &str) -> Result<Vec<Product>> {
        let url = format!(
            "{}/products/search/{}",
            self.base_url,
            urlencoding::encode(query)
        );
        self.fetch(self.client.get(&url), query).await
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), what, "Catalog responded");

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(what.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Status {
                status: status.as_u16(),
                body,
            });
        }

        // Read the body as text first so a bad payload shows up as Decode, not Transport
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
