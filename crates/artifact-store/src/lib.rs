use async_trait::async_trait;
use chrono::{DateTime, Utc};

use analysis_core::{
    AnalysisArtifact, AnalysisError, ArtifactRepository, MarketCategory, NewsItem, RiskMode,
    TimeHorizon, TradingSignal,
};

/// Relational store for analysis artifacts, one row per `news_id`.
///
/// Writes are single-statement upserts; re-analysis fully replaces the
/// existing row. The per-item lock already serializes writers for one key,
/// the atomic upsert is defense in depth.
pub struct ArtifactStore {
    db_pool: sqlx::AnyPool,
}

impl ArtifactStore {
    pub fn new(db_pool: sqlx::AnyPool) -> Self {
        Self { db_pool }
    }

    pub async fn init_tables(&self) -> Result<(), AnalysisError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS news_analyses (
                news_id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                signal TEXT NOT NULL,
                importance_score INTEGER NOT NULL,
                would_trade INTEGER NOT NULL,
                time_horizon TEXT NOT NULL,
                risk_mode TEXT NOT NULL,
                is_breaking INTEGER NOT NULL,
                trading_pairs TEXT NOT NULL,
                raw_model_output TEXT NOT NULL,
                analyzed_at TEXT NOT NULL
            )",
        )
        .execute(&self.db_pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_news_analyses_analyzed
             ON news_analyses(analyzed_at)",
        )
        .execute(&self.db_pool)
        .await
        .ok();

        Ok(())
    }

    /// News items the ingester has written that have no artifact yet, newest
    /// first. This is what the scheduled agent retries each cycle.
    pub async fn fetch_unanalyzed(&self, limit: i64) -> Result<Vec<NewsItem>, AnalysisError> {
        let rows: Vec<(String, String, String, String, String, String)> = sqlx::query_as(
            "SELECT n.news_id, n.title, n.body, n.source, n.published_at, n.tickers
             FROM news_items n
             LEFT JOIN news_analyses a ON a.news_id = n.news_id
             WHERE a.news_id IS NULL
             ORDER BY n.published_at DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|(news_id, title, body, source, published_at, tickers)| {
                Ok(NewsItem {
                    news_id,
                    title,
                    body,
                    source,
                    published_at: parse_timestamp(&published_at)?,
                    tickers: serde_json::from_str(&tickers).unwrap_or_default(),
                })
            })
            .collect()
    }
}

fn db_err(e: sqlx::Error) -> AnalysisError {
    AnalysisError::DatabaseError(e.to_string())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AnalysisError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AnalysisError::DatabaseError(format!("bad timestamp {raw:?}: {e}")))
}

#[async_trait]
impl ArtifactRepository for ArtifactStore {
    async fn upsert(&self, artifact: &AnalysisArtifact) -> Result<(), AnalysisError> {
        let trading_pairs = serde_json::to_string(&artifact.trading_pairs)?;
        let raw_model_output = serde_json::to_string(&artifact.raw_model_output)?;

        sqlx::query(
            "INSERT INTO news_analyses
             (news_id, category, signal, importance_score, would_trade,
              time_horizon, risk_mode, is_breaking, trading_pairs,
              raw_model_output, analyzed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(news_id) DO UPDATE SET
              category = excluded.category,
              signal = excluded.signal,
              importance_score = excluded.importance_score,
              would_trade = excluded.would_trade,
              time_horizon = excluded.time_horizon,
              risk_mode = excluded.risk_mode,
              is_breaking = excluded.is_breaking,
              trading_pairs = excluded.trading_pairs,
              raw_model_output = excluded.raw_model_output,
              analyzed_at = excluded.analyzed_at",
        )
        .bind(&artifact.news_id)
        .bind(artifact.category.as_str())
        .bind(artifact.signal.as_str())
        .bind(artifact.importance_score as i64)
        .bind(artifact.would_trade as i64)
        .bind(artifact.time_horizon.as_str())
        .bind(artifact.risk_mode.as_str())
        .bind(artifact.is_breaking as i64)
        .bind(&trading_pairs)
        .bind(&raw_model_output)
        .bind(artifact.analyzed_at.to_rfc3339())
        .execute(&self.db_pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get(&self, news_id: &str) -> Result<Option<AnalysisArtifact>, AnalysisError> {
        let row: Option<(
            String,
            String,
            String,
            i64,
            i64,
            String,
            String,
            i64,
            String,
            String,
            String,
        )> = sqlx::query_as(
            "SELECT news_id, category, signal, importance_score, would_trade,
                    time_horizon, risk_mode, is_breaking, trading_pairs,
                    raw_model_output, analyzed_at
             FROM news_analyses WHERE news_id = ?",
        )
        .bind(news_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(db_err)?;

        let Some((
            news_id,
            category,
            signal,
            importance_score,
            would_trade,
            time_horizon,
            risk_mode,
            is_breaking,
            trading_pairs,
            raw_model_output,
            analyzed_at,
        )) = row
        else {
            return Ok(None);
        };

        Ok(Some(AnalysisArtifact {
            news_id,
            category: MarketCategory::parse(&category),
            signal: TradingSignal::parse(&signal),
            importance_score: importance_score as i32,
            would_trade: would_trade != 0,
            time_horizon: TimeHorizon::parse(&time_horizon),
            risk_mode: RiskMode::parse(&risk_mode),
            is_breaking: is_breaking != 0,
            trading_pairs: serde_json::from_str(&trading_pairs).unwrap_or_default(),
            raw_model_output: serde_json::from_str(&raw_model_output)
                .unwrap_or(serde_json::Value::Null),
            analyzed_at: parse_timestamp(&analyzed_at)?,
        }))
    }
}
