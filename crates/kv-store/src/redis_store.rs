use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use analysis_core::{AnalysisError, KeyValueStore};

/// Redis-backed shared store. This is the canonical backend for locks and
/// rate-limit counters: every instance of the service talks to the same
/// counters and lock records.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, AnalysisError> {
        let client = redis::Client::open(url)
            .map_err(|e| AnalysisError::StoreError(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AnalysisError::StoreError(e.to_string()))?;
        Ok(Self { conn })
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    ttl.as_millis().max(1) as i64
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, AnalysisError> {
        let mut conn = self.conn.clone();
        // SET key value NX PX ttl — atomic insert-if-absent with expiry
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| AnalysisError::StoreError(e.to_string()))?;
        Ok(reply.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, AnalysisError> {
        let mut conn = self.conn.clone();
        conn.get(key)
            .await
            .map_err(|e| AnalysisError::StoreError(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), AnalysisError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .del(key)
            .await
            .map_err(|e| AnalysisError::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn atomic_increment(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<(u64, DateTime<Utc>), AnalysisError> {
        let mut conn = self.conn.clone();
        let count: u64 = conn
            .incr(key, 1u64)
            .await
            .map_err(|e| AnalysisError::StoreError(e.to_string()))?;

        if count == 1 {
            // First hit in this window: start the window clock
            let _: bool = conn
                .pexpire(key, ttl_millis(window))
                .await
                .map_err(|e| AnalysisError::StoreError(e.to_string()))?;
            return Ok((count, Utc::now() + ChronoDuration::milliseconds(ttl_millis(window))));
        }

        let remaining: i64 = conn
            .pttl(key)
            .await
            .map_err(|e| AnalysisError::StoreError(e.to_string()))?;

        if remaining < 0 {
            // Counter exists without an expiry (e.g. a crash between INCR and
            // PEXPIRE on the first hit). Re-arm the window so it cannot grow
            // forever.
            let _: bool = conn
                .pexpire(key, ttl_millis(window))
                .await
                .map_err(|e| AnalysisError::StoreError(e.to_string()))?;
            return Ok((count, Utc::now() + ChronoDuration::milliseconds(ttl_millis(window))));
        }

        Ok((count, Utc::now() + ChronoDuration::milliseconds(remaining)))
    }
}
