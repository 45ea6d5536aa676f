use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

use analysis_core::KeyValueStore;
use kv_store::MemoryStore;

/// Rate-limit tier. Each tier has its own ceiling and window, configured
/// statically: `Auth` covers login-adjacent triggers, `General` covers plain
/// HTTP triggers, `Model` bounds outbound model spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Auth,
    General,
    Model,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Auth => "auth",
            Tier::General => "general",
            Tier::Model => "model",
        }
    }
}

/// Ceiling and window length for one tier.
#[derive(Debug, Clone, Copy)]
pub struct TierConfig {
    pub ceiling: u64,
    pub window: Duration,
}

/// Static tier table. Defaults mirror the production configuration.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub auth: TierConfig,
    pub general: TierConfig,
    pub model: TierConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth: TierConfig {
                ceiling: 10,
                window: Duration::from_secs(60),
            },
            general: TierConfig {
                ceiling: 60,
                window: Duration::from_secs(60),
            },
            model: TierConfig {
                ceiling: 20,
                window: Duration::from_secs(60),
            },
        }
    }
}

impl RateLimitConfig {
    fn tier(&self, tier: Tier) -> TierConfig {
        match tier {
            Tier::Auth => self.auth,
            Tier::General => self.general,
            Tier::Model => self.model,
        }
    }
}

/// Outcome of a rate-limit check. Rejection is retryable: `reset_at` tells
/// the caller when the window rolls over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

/// Fixed-window counter per (identifier, tier).
///
/// The canonical counter lives in the shared store so stateless invocations
/// across instances see one ceiling. When that store is unreachable the
/// limiter degrades to an in-process counter — weaker on purpose (per
/// instance only), preferred over rejecting every request.
pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    fallback: MemoryStore,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            fallback: MemoryStore::new(),
            config: RateLimitConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RateLimitConfig) -> Self {
        self.config = config;
        self
    }

    /// Count one request against `(identifier, tier)` and decide.
    pub async fn check(&self, identifier: &str, tier: Tier) -> RateDecision {
        let cfg = self.config.tier(tier);
        let key = format!("ratelimit:{}:{}", tier.as_str(), identifier);

        let (count, reset_at) = match self.store.atomic_increment(&key, cfg.window).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    "Rate-limit store unavailable for {} ({}), using in-process fallback",
                    key,
                    e
                );
                match self.fallback.atomic_increment(&key, cfg.window).await {
                    Ok(result) => result,
                    // MemoryStore increments are infallible in practice
                    Err(_) => (1, Utc::now()),
                }
            }
        };

        RateDecision {
            allowed: count <= cfg.ceiling,
            limit: cfg.ceiling,
            remaining: cfg.ceiling.saturating_sub(count),
            reset_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::AnalysisError;
    use async_trait::async_trait;

    fn limiter(ceiling: u64, window: Duration) -> RateLimiter {
        let cfg = TierConfig { ceiling, window };
        RateLimiter::new(Arc::new(MemoryStore::new())).with_config(RateLimitConfig {
            auth: cfg,
            general: cfg,
            model: cfg,
        })
    }

    #[tokio::test]
    async fn test_requests_at_ceiling_are_allowed() {
        let limiter = limiter(3, Duration::from_secs(60));
        for i in 0..3 {
            let decision = limiter.check("10.0.0.1", Tier::General).await;
            assert!(decision.allowed, "request {} should pass", i + 1);
        }
    }

    #[tokio::test]
    async fn test_request_over_ceiling_is_rejected_with_future_reset() {
        let limiter = limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            limiter.check("10.0.0.1", Tier::General).await;
        }
        let decision = limiter.check("10.0.0.1", Tier::General).await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.reset_at > Utc::now());
    }

    #[tokio::test]
    async fn test_window_expiry_starts_fresh_window() {
        let limiter = limiter(2, Duration::from_millis(40));
        for _ in 0..2 {
            assert!(limiter.check("10.0.0.1", Tier::General).await.allowed);
        }
        assert!(!limiter.check("10.0.0.1", Tier::General).await.allowed);

        tokio::time::sleep(Duration::from_millis(60)).await;
        let decision = limiter.check("10.0.0.1", Tier::General).await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[tokio::test]
    async fn test_identifiers_and_tiers_count_independently() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.check("10.0.0.1", Tier::General).await.allowed);
        assert!(limiter.check("10.0.0.2", Tier::General).await.allowed);
        assert!(limiter.check("10.0.0.1", Tier::Model).await.allowed);
        assert!(!limiter.check("10.0.0.1", Tier::General).await.allowed);
    }

    struct DownStore;

    #[async_trait]
    impl KeyValueStore for DownStore {
        async fn set_if_absent(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<bool, AnalysisError> {
            Err(AnalysisError::StoreError("down".into()))
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, AnalysisError> {
            Err(AnalysisError::StoreError("down".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), AnalysisError> {
            Err(AnalysisError::StoreError("down".into()))
        }

        async fn atomic_increment(
            &self,
            _key: &str,
            _window: Duration,
        ) -> Result<(u64, DateTime<Utc>), AnalysisError> {
            Err(AnalysisError::StoreError("down".into()))
        }
    }

    #[tokio::test]
    async fn test_fallback_still_enforces_ceiling_in_process() {
        let cfg = TierConfig {
            ceiling: 2,
            window: Duration::from_secs(60),
        };
        let limiter = RateLimiter::new(Arc::new(DownStore)).with_config(RateLimitConfig {
            auth: cfg,
            general: cfg,
            model: cfg,
        });
        assert!(limiter.check("10.0.0.1", Tier::General).await.allowed);
        assert!(limiter.check("10.0.0.1", Tier::General).await.allowed);
        assert!(!limiter.check("10.0.0.1", Tier::General).await.allowed);
    }
}
