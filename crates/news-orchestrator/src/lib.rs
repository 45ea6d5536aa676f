use chrono::Utc;
use futures_util::{stream, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

use analysis_core::{
    derive_signal, AnalysisArtifact, AnalysisOutcome, ArtifactRepository, BatchReport, ItemReport,
    NewsItem,
};
use news_analyzer::{NewsAnalyzer, StageError};
use news_lock::{LockAttempt, LockManager};
use rate_limiter::{RateLimiter, Tier};

/// Default cap on concurrently analyzed items in a batch. Deliberately small:
/// it protects both the rate-limit ceilings and the model provider's own
/// throughput limits.
pub const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Shared identifier for the model rate-limit tier, so the ceiling bounds
/// total outbound model spend across all trigger sources.
const MODEL_RATE_IDENTIFIER: &str = "model:analysis";

fn lock_key(news_id: &str) -> String {
    format!("news-analysis:{news_id}")
}

/// Composes the pipeline per news item and across batches: rate-limit gate,
/// per-item lock, strategist → collector → executor, signal derivation,
/// idempotent persistence. Exactly-once per item under concurrent triggers is
/// the lock's job; this type guarantees the lock is always released and that
/// no per-item failure escapes as a panic or error.
pub struct NewsOrchestrator {
    analyzer: NewsAnalyzer,
    locks: LockManager,
    limiter: RateLimiter,
    artifacts: Arc<dyn ArtifactRepository>,
    batch_concurrency: usize,
}

impl NewsOrchestrator {
    pub fn new(
        analyzer: NewsAnalyzer,
        locks: LockManager,
        limiter: RateLimiter,
        artifacts: Arc<dyn ArtifactRepository>,
    ) -> Self {
        Self {
            analyzer,
            locks,
            limiter,
            artifacts,
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    pub fn with_batch_concurrency(mut self, batch_concurrency: usize) -> Self {
        self.batch_concurrency = batch_concurrency.max(1);
        self
    }

    /// Analyze one news item to a terminal outcome. Never panics and never
    /// returns an error: every failure mode is an outcome in the report.
    pub async fn analyze_one(&self, news: &NewsItem) -> ItemReport {
        let decision = self.limiter.check(MODEL_RATE_IDENTIFIER, Tier::Model).await;
        if !decision.allowed {
            tracing::info!(
                "Rate limited, skipping {} (window resets at {})",
                news.news_id,
                decision.reset_at
            );
            return ItemReport {
                news_id: news.news_id.clone(),
                outcome: AnalysisOutcome::SkippedRateLimited,
                signal: None,
                error: Some(format!("retry after {}", decision.reset_at.to_rfc3339())),
            };
        }

        let key = lock_key(&news.news_id);
        let owner_token = Uuid::new_v4().to_string();
        match self.locks.acquire(&key, &owner_token).await {
            LockAttempt::Acquired => {}
            LockAttempt::Held => {
                // Expected under concurrent triggers, not a failure
                tracing::debug!("{} is locked by a concurrent attempt, skipping", news.news_id);
                return ItemReport {
                    news_id: news.news_id.clone(),
                    outcome: AnalysisOutcome::SkippedLocked,
                    signal: None,
                    error: None,
                };
            }
            LockAttempt::StoreUnavailable => {
                // Fail closed: never analyze without a lock
                return ItemReport {
                    news_id: news.news_id.clone(),
                    outcome: AnalysisOutcome::SkippedLocked,
                    signal: None,
                    error: Some("lock store unavailable".to_string()),
                };
            }
        }

        let report = self.analyze_locked(news).await;
        // Release on every path past acquisition, success or failure
        self.locks.release(&key, &owner_token).await;
        report
    }

    async fn analyze_locked(&self, news: &NewsItem) -> ItemReport {
        let output = match self.analyzer.analyze(news).await {
            Ok(output) => output,
            Err(StageError::Strategist(e)) => {
                tracing::warn!("Strategist failed for {}: {}", news.news_id, e);
                return ItemReport {
                    news_id: news.news_id.clone(),
                    outcome: AnalysisOutcome::FailedStrategist,
                    signal: None,
                    error: Some(e.to_string()),
                };
            }
            Err(StageError::Executor(e)) => {
                tracing::warn!("Executor failed for {}: {}", news.news_id, e);
                return ItemReport {
                    news_id: news.news_id.clone(),
                    outcome: AnalysisOutcome::FailedExecutor,
                    signal: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let derived = derive_signal(&output.assessment);
        let artifact = AnalysisArtifact {
            news_id: news.news_id.clone(),
            category: output.plan.category,
            signal: derived.signal,
            importance_score: derived.importance_score,
            would_trade: derived.would_trade,
            time_horizon: derived.time_horizon,
            risk_mode: derived.risk_mode,
            is_breaking: derived.is_breaking,
            trading_pairs: derived.trading_pairs,
            raw_model_output: output.raw_model_output,
            analyzed_at: Utc::now(),
        };

        match self.artifacts.upsert(&artifact).await {
            Ok(()) => {
                tracing::info!(
                    "Analyzed {}: signal={}, importance={}, breaking={}",
                    news.news_id,
                    artifact.signal.as_str(),
                    artifact.importance_score,
                    artifact.is_breaking
                );
                ItemReport {
                    news_id: news.news_id.clone(),
                    outcome: AnalysisOutcome::Analyzed,
                    signal: Some(artifact.signal),
                    error: None,
                }
            }
            Err(e) => {
                // The in-memory artifact is discarded, not retried with stale
                // data; the next scheduled run re-analyzes the item.
                tracing::error!("Persist failed for {}: {}", news.news_id, e);
                ItemReport {
                    news_id: news.news_id.clone(),
                    outcome: AnalysisOutcome::FailedPersist,
                    signal: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Drive a batch with bounded concurrency. Items are independent: one
    /// item failing never aborts the rest, and no ordering across items is
    /// guaranteed or needed.
    pub async fn analyze_batch(&self, items: &[NewsItem]) -> BatchReport {
        let reports: Vec<ItemReport> = stream::iter(items)
            .map(|news| self.analyze_one(news))
            .buffer_unordered(self.batch_concurrency)
            .collect()
            .await;

        let mut batch = BatchReport::default();
        for report in reports {
            batch.push(report);
        }
        tracing::info!("Batch of {} done: {}", items.len(), batch.summary());
        batch
    }
}
