use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    // Stores
    pub database_url: String,
    pub redis_url: String,

    // Model endpoint
    pub model_base_url: String,
    pub model_api_key: String,
    pub model_name: String,
    pub model_timeout_seconds: u64,

    // Scheduling
    pub scan_interval_seconds: u64,   // how often a batch cycle runs
    pub batch_size: i64,              // max pending items per cycle
    pub batch_concurrency: usize,     // in-flight items per batch, keep single digits

    // Locking / rate limiting
    pub lock_ttl_seconds: u64,        // must exceed worst-case analysis duration
    pub model_calls_per_minute: u64,  // ceiling for the model tier

    // Market data providers
    pub volatility_index_url: String,
    pub sentiment_index_url: String,
    pub price_api_url: String,
    pub market_data_timeout_seconds: u64,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:newsdesk.db".to_string()),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),

            model_base_url: env::var("MODEL_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model_api_key: env::var("MODEL_API_KEY").context("MODEL_API_KEY not set")?,
            model_name: env::var("MODEL_NAME").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            model_timeout_seconds: env::var("MODEL_TIMEOUT")
                .unwrap_or_else(|_| "45".to_string())
                .parse()?,

            scan_interval_seconds: env::var("SCAN_INTERVAL")
                .unwrap_or_else(|_| "300".to_string())
                .parse()?,
            batch_size: env::var("BATCH_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            batch_concurrency: env::var("BATCH_CONCURRENCY")
                .unwrap_or_else(|_| "4".to_string())
                .parse()?,

            lock_ttl_seconds: env::var("LOCK_TTL")
                .unwrap_or_else(|_| "600".to_string())
                .parse()?,
            model_calls_per_minute: env::var("MODEL_CALLS_PER_MINUTE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,

            volatility_index_url: env::var("VOLATILITY_INDEX_URL")
                .unwrap_or_else(|_| "https://marketdata.internal/v1/volatility".to_string()),
            sentiment_index_url: env::var("SENTIMENT_INDEX_URL")
                .unwrap_or_else(|_| "https://marketdata.internal/v1/sentiment".to_string()),
            price_api_url: env::var("PRICE_API_URL")
                .unwrap_or_else(|_| "https://marketdata.internal/v1/price".to_string()),
            market_data_timeout_seconds: env::var("MARKET_DATA_TIMEOUT")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
        };

        Ok(config)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_secs(self.lock_ttl_seconds)
    }
}
