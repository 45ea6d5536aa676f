use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;

use analysis_core::{AnalysisError, KeyValueStore};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-process key-value store. Used in tests and as the explicitly weaker
/// rate-limiter fallback when Redis is unreachable: it is not shared across
/// instances, so ceilings enforced through it are per-process only.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn window_end(ttl: Duration) -> DateTime<Utc> {
    Utc::now() + ChronoDuration::milliseconds(ttl.as_millis().max(1) as i64)
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AnalysisError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().expires_at > Utc::now() {
                    return Ok(false);
                }
                occupied.insert(StoredValue {
                    value: value.to_string(),
                    expires_at: window_end(ttl),
                });
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue {
                    value: value.to_string(),
                    expires_at: window_end(ttl),
                });
                Ok(true)
            }
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AnalysisError> {
        match self.entries.get(key) {
            Some(entry) if entry.expires_at > Utc::now() => Ok(Some(entry.value.clone())),
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AnalysisError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn atomic_increment(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<(u64, DateTime<Utc>), AnalysisError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let now = Utc::now();
                if occupied.get().expires_at <= now {
                    // Lazy reset: the window elapsed, start a fresh one
                    let reset_at = window_end(window);
                    occupied.insert(StoredValue {
                        value: "1".to_string(),
                        expires_at: reset_at,
                    });
                    return Ok((1, reset_at));
                }
                let count = occupied.get().value.parse::<u64>().unwrap_or(0) + 1;
                let reset_at = occupied.get().expires_at;
                occupied.get_mut().value = count.to_string();
                Ok((count, reset_at))
            }
            Entry::Vacant(vacant) => {
                let reset_at = window_end(window);
                vacant.insert(StoredValue {
                    value: "1".to_string(),
                    expires_at: reset_at,
                });
                Ok((1, reset_at))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_blocks_second_writer() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.set_if_absent("k", "a", ttl).await.unwrap());
        assert!(!store.set_if_absent("k", "b", ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_set_if_absent_succeeds_after_expiry() {
        let store = MemoryStore::new();
        assert!(store
            .set_if_absent("k", "a", Duration::from_millis(20))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(store
            .set_if_absent("k", "b", Duration::from_secs(60))
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_get_hides_expired_values() {
        let store = MemoryStore::new();
        store
            .set_if_absent("k", "a", Duration::from_millis(20))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_atomic_increment_counts_within_window() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);
        let (first, reset_at) = store.atomic_increment("c", window).await.unwrap();
        assert_eq!(first, 1);
        assert!(reset_at > Utc::now());
        let (second, _) = store.atomic_increment("c", window).await.unwrap();
        assert_eq!(second, 2);
        let (third, _) = store.atomic_increment("c", window).await.unwrap();
        assert_eq!(third, 3);
    }

    #[tokio::test]
    async fn test_atomic_increment_resets_after_window() {
        let store = MemoryStore::new();
        let window = Duration::from_millis(30);
        store.atomic_increment("c", window).await.unwrap();
        store.atomic_increment("c", window).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let (count, _) = store.atomic_increment("c", window).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_delete_removes_value() {
        let store = MemoryStore::new();
        store
            .set_if_absent("k", "a", Duration::from_secs(60))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
