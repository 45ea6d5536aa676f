use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::{AnalysisArtifact, AnalysisError};

/// "Run a prompt, get structured JSON back" capability. Two independent calls
/// per news item (strategist, executor), each with its own prompt contract.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value, AnalysisError>;
}

/// Shared key-value store with atomic primitives. The canonical backend is
/// Redis; an in-process implementation exists for tests and as a degraded
/// per-instance fallback. The application never does unprotected
/// read-then-write against this store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Atomic insert-if-absent with TTL. Returns true when the key was set.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AnalysisError>;

    async fn get(&self, key: &str) -> Result<Option<String>, AnalysisError>;

    async fn delete(&self, key: &str) -> Result<(), AnalysisError>;

    /// Atomic counter increment. The first increment in a window creates the
    /// counter with the window TTL; returns the new count and when the
    /// current window resets.
    async fn atomic_increment(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<(u64, DateTime<Utc>), AnalysisError>;
}

/// Named market data series fetchers consumed by the data collector.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn volatility_index(&self) -> Result<f64, AnalysisError>;

    async fn sentiment_index(&self) -> Result<f64, AnalysisError>;

    async fn instrument_price(&self, symbol: &str) -> Result<f64, AnalysisError>;
}

/// Relational persistence of analysis artifacts, keyed by `news_id`.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// Idempotent write: on conflict the existing row is fully replaced.
    async fn upsert(&self, artifact: &AnalysisArtifact) -> Result<(), AnalysisError>;

    async fn get(&self, news_id: &str) -> Result<Option<AnalysisArtifact>, AnalysisError>;
}
