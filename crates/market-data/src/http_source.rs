use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use analysis_core::{AnalysisError, MarketDataSource};

/// Endpoints for the external market-data providers. Each call carries a
/// short timeout so a slow provider cannot stall an analysis run.
#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub volatility_url: String,
    pub sentiment_url: String,
    pub price_base_url: String,
    pub timeout: Duration,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            volatility_url: std::env::var("VOLATILITY_INDEX_URL")
                .unwrap_or_else(|_| "https://marketdata.internal/v1/volatility".to_string()),
            sentiment_url: std::env::var("SENTIMENT_INDEX_URL")
                .unwrap_or_else(|_| "https://marketdata.internal/v1/sentiment".to_string()),
            price_base_url: std::env::var("PRICE_API_URL")
                .unwrap_or_else(|_| "https://marketdata.internal/v1/price".to_string()),
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    value: f64,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: f64,
}

/// HTTP implementation of the market-data boundary.
#[derive(Clone)]
pub struct HttpMarketData {
    client: reqwest::Client,
    config: MarketDataConfig,
}

impl HttpMarketData {
    pub fn new(config: MarketDataConfig) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalysisError::MarketDataError(e.to_string()))?;
        Ok(Self { client, config })
    }

    async fn fetch_index(&self, url: &str) -> Result<f64, AnalysisError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AnalysisError::MarketDataError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::MarketDataError(format!(
                "Status: {}",
                response.status()
            )));
        }

        let body = response
            .json::<IndexResponse>()
            .await
            .map_err(|e| AnalysisError::MarketDataError(e.to_string()))?;
        Ok(body.value)
    }
}

#[async_trait]
impl MarketDataSource for HttpMarketData {
    async fn volatility_index(&self) -> Result<f64, AnalysisError> {
        self.fetch_index(&self.config.volatility_url).await
    }

    async fn sentiment_index(&self) -> Result<f64, AnalysisError> {
        self.fetch_index(&self.config.sentiment_url).await
    }

    async fn instrument_price(&self, symbol: &str) -> Result<f64, AnalysisError> {
        let url = format!("{}/{}", self.config.price_base_url, symbol);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalysisError::MarketDataError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::MarketDataError(format!(
                "Status for {}: {}",
                symbol,
                response.status()
            )));
        }

        let body = response
            .json::<PriceResponse>()
            .await
            .map_err(|e| AnalysisError::MarketDataError(e.to_string()))?;
        Ok(body.price)
    }
}
