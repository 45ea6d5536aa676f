use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use analysis_core::KeyValueStore;

/// Default lock TTL. Must exceed the worst-case single-item analysis duration
/// (two sequential model calls plus data collection) with margin.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(600);

/// Result of a lock acquisition attempt. A store error is deliberately not an
/// `Err`: the caller treats it exactly like contention and skips the item
/// (fail closed), never analyzing without a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockAttempt {
    Acquired,
    Held,
    StoreUnavailable,
}

/// On-store lock record. `expires_at` is advisory; the store's own TTL is
/// what actually reaps crashed holders on backends that enforce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockRecord {
    owner: String,
    expires_at: DateTime<Utc>,
}

/// Per-key mutual exclusion with TTL auto-expiry and owner-token release.
///
/// Safety comes from the store's atomic insert-if-absent; the expired-record
/// reap before acquisition is self-healing cleanup, not the mechanism.
pub struct LockManager {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl LockManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_LOCK_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Try to take the lock for `key` on behalf of `owner_token`.
    pub async fn acquire(&self, key: &str, owner_token: &str) -> LockAttempt {
        self.reap_expired(key).await;

        let record = LockRecord {
            owner: owner_token.to_string(),
            expires_at: Utc::now() + ChronoDuration::milliseconds(self.ttl.as_millis() as i64),
        };
        let payload = match serde_json::to_string(&record) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("Failed to serialize lock record for {}: {}", key, e);
                return LockAttempt::StoreUnavailable;
            }
        };

        match self.store.set_if_absent(key, &payload, self.ttl).await {
            Ok(true) => LockAttempt::Acquired,
            Ok(false) => LockAttempt::Held,
            Err(e) => {
                tracing::warn!("Lock store unavailable for {}: {}", key, e);
                LockAttempt::StoreUnavailable
            }
        }
    }

    /// Release the lock for `key`, but only if `owner_token` still owns it.
    /// Best effort: a stale or already-expired release is a no-op, and no
    /// error ever propagates into the caller's critical path.
    pub async fn release(&self, key: &str, owner_token: &str) {
        let current = match self.store.get(key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Lock release read failed for {}: {}", key, e);
                return;
            }
        };

        let Some(payload) = current else {
            return;
        };
        let Ok(record) = serde_json::from_str::<LockRecord>(&payload) else {
            tracing::warn!("Unparsable lock record for {}, leaving it to expire", key);
            return;
        };
        if record.owner != owner_token {
            return;
        }

        if let Err(e) = self.store.delete(key).await {
            tracing::warn!("Lock release delete failed for {}: {}", key, e);
        }
    }

    /// Best-effort delete of an expired record left by a crashed holder.
    /// Errors are ignored: acquisition safety rests on insert-if-absent.
    async fn reap_expired(&self, key: &str) {
        let Ok(Some(payload)) = self.store.get(key).await else {
            return;
        };
        let expired = match serde_json::from_str::<LockRecord>(&payload) {
            Ok(record) => record.expires_at <= Utc::now(),
            // Unparsable record: treat as garbage and clear it
            Err(_) => true,
        };
        if expired {
            tracing::debug!("Reaping expired lock record for {}", key);
            let _ = self.store.delete(key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::AnalysisError;
    use async_trait::async_trait;
    use kv_store::MemoryStore;
    use uuid::Uuid;

    fn manager(ttl: Duration) -> LockManager {
        LockManager::new(Arc::new(MemoryStore::new())).with_ttl(ttl)
    }

    #[tokio::test]
    async fn test_mutual_exclusion_between_owner_tokens() {
        let locks = Arc::new(manager(Duration::from_secs(60)));
        let token_a = Uuid::new_v4().to_string();
        let token_b = Uuid::new_v4().to_string();
        let (a, b) = tokio::join!(
            locks.acquire("news:1", &token_a),
            locks.acquire("news:1", &token_b),
        );
        let acquired = [a, b]
            .iter()
            .filter(|r| **r == LockAttempt::Acquired)
            .count();
        assert_eq!(acquired, 1);
        assert!(a == LockAttempt::Held || b == LockAttempt::Held);
    }

    #[tokio::test]
    async fn test_independent_keys_do_not_contend() {
        let locks = manager(Duration::from_secs(60));
        assert_eq!(locks.acquire("news:1", "t1").await, LockAttempt::Acquired);
        assert_eq!(locks.acquire("news:2", "t2").await, LockAttempt::Acquired);
    }

    #[tokio::test]
    async fn test_acquire_succeeds_after_ttl_without_release() {
        let locks = manager(Duration::from_millis(30));
        assert_eq!(locks.acquire("news:1", "t1").await, LockAttempt::Acquired);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(locks.acquire("news:1", "t2").await, LockAttempt::Acquired);
    }

    #[tokio::test]
    async fn test_release_frees_lock_for_next_owner() {
        let locks = manager(Duration::from_secs(60));
        assert_eq!(locks.acquire("news:1", "t1").await, LockAttempt::Acquired);
        locks.release("news:1", "t1").await;
        assert_eq!(locks.acquire("news:1", "t2").await, LockAttempt::Acquired);
    }

    #[tokio::test]
    async fn test_release_with_wrong_token_is_noop() {
        let locks = manager(Duration::from_secs(60));
        assert_eq!(locks.acquire("news:1", "t1").await, LockAttempt::Acquired);
        locks.release("news:1", "t2").await;
        // t1 still holds the lock
        assert_eq!(locks.acquire("news:1", "t3").await, LockAttempt::Held);
    }

    #[tokio::test]
    async fn test_release_of_absent_lock_is_noop() {
        let locks = manager(Duration::from_secs(60));
        locks.release("news:none", "t1").await;
    }

    struct FailingStore;

    #[async_trait]
    impl analysis_core::KeyValueStore for FailingStore {
        async fn set_if_absent(
            &self,
            _key: &str,
            _value: &str,
            _ttl: Duration,
        ) -> Result<bool, AnalysisError> {
            Err(AnalysisError::StoreError("connection refused".into()))
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, AnalysisError> {
            Err(AnalysisError::StoreError("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> Result<(), AnalysisError> {
            Err(AnalysisError::StoreError("connection refused".into()))
        }

        async fn atomic_increment(
            &self,
            _key: &str,
            _window: Duration,
        ) -> Result<(u64, DateTime<Utc>), AnalysisError> {
            Err(AnalysisError::StoreError("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_error_fails_closed() {
        let locks = LockManager::new(Arc::new(FailingStore));
        assert_eq!(
            locks.acquire("news:1", "t1").await,
            LockAttempt::StoreUnavailable
        );
        // Release with a dead store must not panic or propagate
        locks.release("news:1", "t1").await;
    }
}
