use std::sync::Arc;
use std::time::Duration;

use analysis_core::{ArtifactRepository, KeyValueStore, MarketDataSource, ModelClient};
use anyhow::Result;
use artifact_store::ArtifactStore;
use kv_store::RedisStore;
use market_data::{DataCollector, HttpMarketData, MarketDataConfig};
use model_client::{ChatModelClient, ModelConfig};
use news_analyzer::NewsAnalyzer;
use news_lock::LockManager;
use news_orchestrator::NewsOrchestrator;
use rate_limiter::{RateLimitConfig, RateLimiter, TierConfig};
use tokio::signal::unix::SignalKind;
use tokio::time;

mod config;

use config::AgentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("Starting NewsDesk Analysis Agent");

    // 2. Load configuration
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Scan interval: {} seconds", config.scan_interval_seconds);
    tracing::info!(
        "  Batch: up to {} items, {} concurrent",
        config.batch_size,
        config.batch_concurrency
    );
    tracing::info!("  Lock TTL: {}s", config.lock_ttl_seconds);
    tracing::info!("  Model ceiling: {}/min", config.model_calls_per_minute);

    // 3. Connect the shared store (locks + rate-limit counters)
    let kv: Arc<dyn KeyValueStore> = Arc::new(
        RedisStore::connect(&config.redis_url)
            .await
            .map_err(|e| anyhow::anyhow!("Redis connect failed: {e}"))?,
    );
    tracing::info!("Shared store connected ({})", config.redis_url);

    // 4. Connect the relational store and init tables
    sqlx::any::install_default_drivers();
    let db_pool = sqlx::AnyPool::connect(&config.database_url).await?;
    sqlx::query("SELECT 1").execute(&db_pool).await?;
    let artifacts = Arc::new(ArtifactStore::new(db_pool));
    artifacts
        .init_tables()
        .await
        .map_err(|e| anyhow::anyhow!("Artifact store init failed: {e}"))?;
    tracing::info!("Artifact store initialized");

    // 5. Model client (shared by both pipeline stages)
    let model: Arc<dyn ModelClient> = Arc::new(
        ChatModelClient::new(ModelConfig {
            base_url: config.model_base_url.clone(),
            api_key: config.model_api_key.clone(),
            model: config.model_name.clone(),
            timeout: Duration::from_secs(config.model_timeout_seconds),
        })
        .map_err(|e| anyhow::anyhow!("Model client init failed: {e}"))?,
    );
    tracing::info!("Model client ready ({})", config.model_name);

    // 6. Market data providers
    let market_data: Arc<dyn MarketDataSource> = Arc::new(
        HttpMarketData::new(MarketDataConfig {
            volatility_url: config.volatility_index_url.clone(),
            sentiment_url: config.sentiment_index_url.clone(),
            price_base_url: config.price_api_url.clone(),
            timeout: Duration::from_secs(config.market_data_timeout_seconds),
        })
        .map_err(|e| anyhow::anyhow!("Market data client init failed: {e}"))?,
    );

    // 7. Compose the orchestrator
    let rate_config = RateLimitConfig {
        model: TierConfig {
            ceiling: config.model_calls_per_minute,
            window: Duration::from_secs(60),
        },
        ..Default::default()
    };
    let orchestrator = NewsOrchestrator::new(
        NewsAnalyzer::new(model, DataCollector::new(market_data)),
        LockManager::new(Arc::clone(&kv)).with_ttl(config.lock_ttl()),
        RateLimiter::new(Arc::clone(&kv)).with_config(rate_config),
        Arc::clone(&artifacts) as Arc<dyn ArtifactRepository>,
    )
    .with_batch_concurrency(config.batch_concurrency);
    tracing::info!("Orchestrator initialized");

    // 8. Scheduled batch loop with graceful shutdown
    let mut interval = time::interval(Duration::from_secs(config.scan_interval_seconds));
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_cycle(&orchestrator, &artifacts, config.batch_size).await;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("SIGTERM received, shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// One scan cycle: pick up news items without an artifact and analyze them.
/// Items skipped or failed this cycle are naturally retried on the next one.
async fn run_cycle(orchestrator: &NewsOrchestrator, artifacts: &ArtifactStore, batch_size: i64) {
    let pending = match artifacts.fetch_unanalyzed(batch_size).await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!("Failed to fetch pending news: {}", e);
            return;
        }
    };

    if pending.is_empty() {
        tracing::debug!("No pending news this cycle");
        return;
    }

    tracing::info!("Cycle start: {} pending items", pending.len());
    let report = orchestrator.analyze_batch(&pending).await;
    for item in &report.failed {
        tracing::warn!(
            "  {} -> {:?}: {}",
            item.news_id,
            item.outcome,
            item.error.as_deref().unwrap_or("unknown")
        );
    }
    tracing::info!("Cycle done: {}", report.summary());
}
