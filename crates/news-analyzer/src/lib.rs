use std::sync::Arc;

use analysis_core::{
    AnalysisError, CollectedSeries, ExecutorAssessment, ModelClient, NewsItem, StrategistPlan,
};
use market_data::DataCollector;

pub mod executor;
pub mod prompts;
pub mod strategist;

pub use executor::Executor;
pub use strategist::Strategist;

/// Which pipeline stage an analysis failure came from. The orchestrator maps
/// this onto the distinct failure outcomes reported to trigger callers.
#[derive(Debug)]
pub enum StageError {
    Strategist(AnalysisError),
    Executor(AnalysisError),
}

/// Everything the two-stage pipeline produced for one news item.
#[derive(Debug, Clone)]
pub struct AnalyzerOutput {
    pub plan: StrategistPlan,
    pub collected: Vec<CollectedSeries>,
    pub assessment: ExecutorAssessment,
    /// Both raw model payloads, retained for audit/debugging.
    pub raw_model_output: serde_json::Value,
}

/// The two-stage analysis pipeline: strategist → data collection → executor,
/// strictly sequential. The executor never starts before the strategist and
/// the collector have completed, and never sees the news without a plan.
pub struct NewsAnalyzer {
    strategist: Strategist,
    collector: DataCollector,
    executor: Executor,
}

impl NewsAnalyzer {
    pub fn new(model: Arc<dyn ModelClient>, collector: DataCollector) -> Self {
        Self {
            strategist: Strategist::new(Arc::clone(&model)),
            collector,
            executor: Executor::new(model),
        }
    }

    pub async fn analyze(&self, news: &NewsItem) -> Result<AnalyzerOutput, StageError> {
        if news.body.trim().is_empty() {
            return Err(StageError::Strategist(AnalysisError::InvalidNews(format!(
                "{} has an empty body",
                news.news_id
            ))));
        }

        let (plan, strategist_raw) = self
            .strategist
            .run(news)
            .await
            .map_err(StageError::Strategist)?;

        // Partial failure here is fine; unavailable series are passed through
        let collected = self.collector.collect(&plan.requested_series).await;

        let (assessment, executor_raw) = self
            .executor
            .run(news, &plan, &collected)
            .await
            .map_err(StageError::Executor)?;

        Ok(AnalyzerOutput {
            plan,
            collected,
            assessment,
            raw_model_output: serde_json::json!({
                "strategist": strategist_raw,
                "executor": executor_raw,
            }),
        })
    }
}
